use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maximum size of a single text file accepted for indexing (50 MB).
const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

fn collect_text_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory '{}'", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_text_files(&path, out)?;
        } else if is_text_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    let size = fs::metadata(path)
        .with_context(|| format!("Cannot access file at '{}'", path.display()))?
        .len();
    if size > MAX_FILE_SIZE {
        anyhow::bail!(
            "File '{}' is too large: {} bytes (max {} bytes)",
            path.display(),
            size,
            MAX_FILE_SIZE
        );
    }
    fs::read_to_string(path).with_context(|| format!("Error reading file at '{}'", path.display()))
}

/// Loads already-extracted plain text. A file path yields one document; a
/// directory yields every `.txt` file beneath it, in path order.
pub fn load_documents(path: &Path) -> Result<Vec<String>> {
    if path.is_dir() {
        let mut files = Vec::new();
        collect_text_files(path, &mut files)?;
        files.sort();
        debug!(dir = %path.display(), files = files.len(), "Loading directory");
        files.iter().map(|f| read_text(f)).collect()
    } else {
        Ok(vec![read_text(path)?])
    }
}
