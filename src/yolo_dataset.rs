use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use crate::config::LabelerConfig;
use crate::conversion::LabelingContext;
use crate::detector::Detector;
use crate::error::{LabelError, Result};
use crate::io::{
    create_dataset_yaml, emit_labeled_image, setup_output_directories, unique_output_stems,
};
use crate::ontology::Ontology;
use crate::split::plan_split;
use crate::types::{ClassVocabulary, DatasetSplit, FolderStats, OutputDirs, ProcessingStats};
use crate::utils::{
    create_io_thread_pool, create_progress_bar, list_image_files, list_subdirectories,
};

/// Where a labeling run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    DirectoriesReady,
    OntologyBuilt,
    PerFolder { class_name: String },
    ManifestWritten,
    Done,
    Failed(String),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::DirectoriesReady => f.write_str("directories ready"),
            PipelineState::OntologyBuilt => f.write_str("ontology built"),
            PipelineState::PerFolder { class_name } => write!(f, "labeling {}", class_name),
            PipelineState::ManifestWritten => f.write_str("manifest written"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Drives a full labeling run: directories, ontology, every class folder,
/// then the manifest.
pub struct AutoLabeler<'a> {
    config: LabelerConfig,
    detector: &'a dyn Detector,
    state: PipelineState,
}

impl<'a> AutoLabeler<'a> {
    pub fn new(config: LabelerConfig, detector: &'a dyn Detector) -> Self {
        Self {
            config,
            detector,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn config(&self) -> &LabelerConfig {
        &self.config
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run the pipeline. Run-level failures leave the labeler in
    /// [`PipelineState::Failed`]; image-level failures only bump the skip count.
    pub fn run(&mut self) -> Result<ProcessingStats> {
        match self.run_stages() {
            Ok(stats) => Ok(stats),
            Err(e) => {
                self.transition(PipelineState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn run_stages(&mut self) -> Result<ProcessingStats> {
        let config = self.config.clone();
        if !config.source_dir.is_dir() {
            return Err(LabelError::SourceDirMissing(config.source_dir));
        }
        info!("Source dir: {}", config.source_dir.display());
        info!("Output dir: {}", config.output_dir.display());
        info!(
            "Split ratios: train {}, val {}, test {} (seed {})",
            config.ratios.train(),
            config.ratios.val(),
            config.ratios.test(),
            config.seed
        );

        let output_dirs = setup_output_directories(&config.output_dir)?;
        self.transition(PipelineState::DirectoriesReady);

        let vocabulary = ClassVocabulary::from_file(&config.classes_file)?;
        info!(
            "Loaded {} classes from {}",
            vocabulary.len(),
            config.classes_file.display()
        );
        let ontology = Ontology::build(&vocabulary);
        info!(
            "Built ontology: {} prompts for {} classes",
            ontology.entries().len(),
            ontology.num_classes()
        );
        debug!("Prompts: {:?}", ontology.prompts().collect::<Vec<_>>());
        self.transition(PipelineState::OntologyBuilt);

        let pool = create_io_thread_pool(config.workers)?;
        let ctx = LabelingContext {
            detector: self.detector,
            ontology: &ontology,
            config: &config,
        };

        let mut stats = ProcessingStats::new(&vocabulary);
        let folders = list_subdirectories(&config.source_dir);
        info!("Processing {} ingredient folders...", folders.len());

        for folder in folders {
            let class_name = folder
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some(class_idx) = vocabulary.index_of(&class_name) else {
                warn!(
                    "Skipping folder {:?}: not in {}",
                    class_name,
                    config.classes_file.display()
                );
                continue;
            };

            self.transition(PipelineState::PerFolder {
                class_name: class_name.clone(),
            });
            let folder_stats = pool.install(|| {
                process_class_folder(&ctx, &folder, &class_name, class_idx, &output_dirs)
            });
            stats.add_folder(&class_name, &folder_stats);
        }

        info!("Creating data.yaml file...");
        let manifest_path = create_dataset_yaml(&output_dirs.root, vocabulary.names())?;
        self.transition(PipelineState::ManifestWritten);
        info!("Dataset YAML created at: {}", manifest_path.display());

        stats.print_summary();
        self.transition(PipelineState::Done);
        Ok(stats)
    }
}

/// One image of a class folder and the output stem reserved for it.
#[derive(Debug, Clone)]
struct LabelJob {
    image_path: PathBuf,
    stem: String,
}

/// Label every image of one class folder that matches the image extension
/// allowlist. Output names and the split are decided before any image is
/// processed; images within a split run in parallel on the current rayon pool.
pub fn process_class_folder(
    ctx: &LabelingContext<'_>,
    folder: &Path,
    class_name: &str,
    class_idx: usize,
    output_dirs: &OutputDirs,
) -> FolderStats {
    let image_paths = list_image_files(folder);
    if image_paths.is_empty() {
        info!("No images in {}", folder.display());
        return FolderStats::default();
    }

    let stems = unique_output_stems(class_name, &image_paths);
    let jobs: Vec<LabelJob> = image_paths
        .into_iter()
        .zip(stems)
        .map(|(image_path, stem)| LabelJob { image_path, stem })
        .collect();
    let split_data = plan_split(&jobs, &ctx.config.ratios, ctx.config.seed);
    let counters = SplitCounters::default();
    let pb = create_progress_bar(jobs.len() as u64, class_name);

    for split in DatasetSplit::ALL {
        let images_dir = output_dirs.images_dir(split);
        let labels_dir = output_dirs.labels_dir(split);

        split_data.get(split).par_iter().for_each(|job| {
            match label_and_emit(ctx, job, class_name, class_idx, images_dir, labels_dir) {
                Ok(true) => counters.record(split),
                Ok(false) => counters.skip(),
                Err(e) => {
                    error!("Error labeling image {}: {}", job.image_path.display(), e);
                    counters.skip();
                }
            }
            pb.inc(1);
        });
    }
    pb.finish_with_message(format!("{} complete", class_name));

    counters.snapshot()
}

/// Returns `Ok(false)` when nothing survived filtering and the image was skipped.
fn label_and_emit(
    ctx: &LabelingContext<'_>,
    job: &LabelJob,
    class_name: &str,
    class_idx: usize,
    images_dir: &Path,
    labels_dir: &Path,
) -> Result<bool> {
    let detections = ctx.label_single_image(&job.image_path, class_name, class_idx)?;
    if detections.is_empty() {
        return Ok(false);
    }
    emit_labeled_image(&job.image_path, &job.stem, &detections, images_dir, labels_dir)?;
    Ok(true)
}

#[derive(Debug, Default)]
struct SplitCounters {
    train: AtomicUsize,
    val: AtomicUsize,
    test: AtomicUsize,
    skipped: AtomicUsize,
}

impl SplitCounters {
    fn record(&self, split: DatasetSplit) {
        let counter = match split {
            DatasetSplit::Train => &self.train,
            DatasetSplit::Val => &self.val,
            DatasetSplit::Test => &self.test,
        };
        counter.fetch_add(1, Relaxed);
    }

    fn skip(&self) {
        self.skipped.fetch_add(1, Relaxed);
    }

    fn snapshot(&self) -> FolderStats {
        FolderStats {
            train: self.train.load(Relaxed),
            val: self.val.load(Relaxed),
            test: self.test.load(Relaxed),
            skipped: self.skipped.load(Relaxed),
        }
    }
}

/// Main dataset processing pipeline
pub fn process_dataset(config: LabelerConfig, detector: &dyn Detector) -> Result<ProcessingStats> {
    AutoLabeler::new(config, detector).run()
}
