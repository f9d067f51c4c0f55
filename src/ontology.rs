//! Detector-facing text prompts for each ingredient class.
//!
//! Open-vocabulary detectors recall better with a little context, so
//! vegetables get "fresh ...", meats "raw ...", bottled goods "... bottle" and
//! so on. Every prompt maps back to the class it was built from.

use crate::dedup::contains_keyword;
use crate::types::ClassVocabulary;

const VEGETABLE_KEYWORDS: &[&str] = &["tomato", "carrot", "onion", "potato", "bell pepper"];
const HERB_KEYWORDS: &[&str] = &["basil", "cilantro", "mint", "parsley"];
const MEAT_KEYWORDS: &[&str] = &["beef", "pork", "chicken", "fish"];
const PACKAGED_PROMPT_KEYWORDS: &[&str] = &["powder", "sauce", "paste", "oil"];
const DRIED_KEYWORDS: &[&str] = &["noodle", "rice", "vermicelli"];

/// Build the prompt list for one ingredient. The bare name always comes first
/// and no prompt is repeated.
pub fn detection_prompts(ingredient: &str) -> Vec<String> {
    let mut prompts = vec![ingredient.to_string()];
    let mut push = |prompt: String| {
        if !prompts.contains(&prompt) {
            prompts.push(prompt);
        }
    };

    if contains_keyword(ingredient, VEGETABLE_KEYWORDS) {
        push(format!("fresh {ingredient}"));
        push(format!("{ingredient} vegetable"));
    }
    if contains_keyword(ingredient, HERB_KEYWORDS) {
        push(format!("{ingredient} herb"));
        push(format!("fresh {ingredient}"));
    }
    if contains_keyword(ingredient, MEAT_KEYWORDS) {
        push(format!("raw {ingredient}"));
        push(format!("{ingredient} meat"));
    }
    if contains_keyword(ingredient, PACKAGED_PROMPT_KEYWORDS) {
        push(format!("{ingredient} bottle"));
        push(format!("{ingredient} package"));
    }
    if contains_keyword(ingredient, DRIED_KEYWORDS) {
        push(format!("dried {ingredient}"));
    }

    prompts
}

/// A single prompt and the class index it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyEntry {
    pub prompt: String,
    pub class_idx: usize,
}

/// Prompt to class mapping handed to the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ontology {
    entries: Vec<OntologyEntry>,
    num_classes: usize,
}

impl Ontology {
    pub fn build(vocabulary: &ClassVocabulary) -> Self {
        let entries = vocabulary
            .names()
            .iter()
            .enumerate()
            .flat_map(|(class_idx, name)| {
                detection_prompts(name)
                    .into_iter()
                    .map(move |prompt| OntologyEntry { prompt, class_idx })
            })
            .collect();

        Self {
            entries,
            num_classes: vocabulary.len(),
        }
    }

    pub fn entries(&self) -> &[OntologyEntry] {
        &self.entries
    }

    /// All prompts in class order.
    pub fn prompts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.prompt.as_str())
    }

    /// Class index for a prompt, if the prompt belongs to this ontology.
    pub fn class_for_prompt(&self, prompt: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.prompt == prompt)
            .map(|e| e.class_idx)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_for_vegetable() {
        assert_eq!(
            detection_prompts("tomato"),
            vec!["tomato", "fresh tomato", "tomato vegetable"]
        );
    }

    #[test]
    fn test_herb_prompts_are_not_repeated() {
        assert_eq!(
            detection_prompts("basil"),
            vec!["basil", "basil herb", "fresh basil"]
        );
    }

    #[test]
    fn test_prompts_for_packaged_and_plain() {
        assert_eq!(
            detection_prompts("soy sauce"),
            vec!["soy sauce", "soy sauce bottle", "soy sauce package"]
        );
        assert_eq!(detection_prompts("egg"), vec!["egg"]);
        assert_eq!(detection_prompts("rice noodle"), vec!["rice noodle", "dried rice noodle"]);
    }

    #[test]
    fn test_ontology_maps_prompts_to_classes() {
        let vocab = ClassVocabulary::from_names(["tomato", "chicken"]).unwrap();
        let ontology = Ontology::build(&vocab);
        assert_eq!(ontology.num_classes(), 2);
        assert_eq!(ontology.class_for_prompt("fresh tomato"), Some(0));
        assert_eq!(ontology.class_for_prompt("raw chicken"), Some(1));
        assert_eq!(ontology.class_for_prompt("onion"), None);
        assert_eq!(ontology.entries().len(), 6);
        assert_eq!(ontology.prompts().next(), Some("tomato"));
    }
}
