use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LabelError, Result};
use crate::types::is_image_file;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    pb
}

/// Create an output directory if needed and return its path. Existing
/// directories and their contents are left alone.
pub fn create_output_directory(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        debug!("Directory {:?} already exists, reusing it.", path);
    } else {
        fs::create_dir_all(path).map_err(|e| LabelError::io(path, e))?;
    }
    Ok(path.to_path_buf())
}

/// Read width and height from the image header without decoding pixels.
pub fn read_image_dimensions(path: &Path) -> Result<(u32, u32)> {
    let size = imagesize::size(path).map_err(|source| LabelError::ImageDimensions {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((size.width as u32, size.height as u32))
}

/// Build the rayon pool used for per-image work. `None` uses one thread per core.
pub fn create_io_thread_pool(workers: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = workers {
        builder = builder.num_threads(workers.max(1));
    }
    Ok(builder.build()?)
}

/// Immediate subdirectories of `dir`, sorted by name.
pub fn list_subdirectories(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path())
        .collect()
}

/// Image files directly inside `dir`, sorted by name.
pub fn list_image_files(dir: &Path) -> Vec<PathBuf> {
    collect_image_files(dir, 1)
}

/// Image files anywhere below `dir`, in sorted walk order.
pub fn list_image_files_recursive(dir: &Path) -> Vec<PathBuf> {
    collect_image_files(dir, usize::MAX)
}

fn collect_image_files(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| is_image_file(path))
        .collect()
}

/// Single-quote a YAML scalar, doubling embedded quotes.
pub fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render `names` as a single-quoted YAML flow sequence.
pub fn yaml_name_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| yaml_quote(name)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Parse a YAML flow sequence of names as written by [`yaml_name_list`].
/// Unquoted items are trimmed. Returns `None` on anything else.
pub fn parse_yaml_name_list(value: &str) -> Option<Vec<String>> {
    let inner = value.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut chars = inner.trim().chars().peekable();
    let mut names = Vec::new();

    while chars.peek().is_some() {
        let name = if chars.peek() == Some(&'\'') {
            chars.next();
            let mut quoted = String::new();
            loop {
                match chars.next()? {
                    '\'' if chars.peek() == Some(&'\'') => {
                        chars.next();
                        quoted.push('\'');
                    }
                    '\'' => break,
                    c => quoted.push(c),
                }
            }
            quoted
        } else {
            let mut bare = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                bare.push(c);
                chars.next();
            }
            bare.trim().to_string()
        };
        names.push(name);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some(_) => return None,
        }
    }
    Some(names)
}
