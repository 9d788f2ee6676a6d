//! Output collection for tools that write Markdown files into a directory.
//!
//! mineru decides on its own where under the output directory its files
//! land (usually `<out>/<stem>/<method>/<stem>.md`). We scan recursively,
//! order by path string so results never depend on directory iteration
//! order, and join the documents with a horizontal-rule separator.

use crate::engine::Artifact;
use crate::error::ConversionError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Separator placed between documents in the combined output.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// The combined text of every collected file plus one artifact per file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedOutput {
    pub text: String,
    pub artifacts: Vec<Artifact>,
}

/// Recursively find files under `root` whose extension is in `extensions`,
/// sorted by path string ascending. Extensions compare case-sensitively.
pub fn find_markdown_files(
    root: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>, ConversionError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            ConversionError::io(format!("Failed to scan '{}'", dir.display()), e)
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                ConversionError::io(format!("Failed to scan '{}'", dir.display()), e)
            })?;
            let file_type = entry.file_type().map_err(|e| {
                ConversionError::io(format!("Failed to stat '{}'", entry.path().display()), e)
            })?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if has_extension(&path, extensions) {
                found.push(path);
            }
        }
    }

    found.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    debug!("Found {} markdown files under {}", found.len(), root.display());
    Ok(found)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .is_some_and(|ext| extensions.iter().any(|e| ext == e.as_str()))
}

/// Read a file as UTF-8, substituting invalid sequences instead of failing.
pub fn read_text_lossy(path: &Path) -> Result<String, ConversionError> {
    let bytes = std::fs::read(path)
        .map_err(|e| ConversionError::io(format!("Failed to read '{}'", path.display()), e))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(
                "{} is not valid UTF-8, decoding with replacement",
                path.display()
            );
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Scan `root`, read every matching file, and join them in path order.
///
/// An empty directory yields empty text and no artifacts.
pub fn collect_markdown(
    root: &Path,
    extensions: &[String],
) -> Result<CollectedOutput, ConversionError> {
    let files = find_markdown_files(root, extensions)?;
    let mut parts = Vec::with_capacity(files.len());
    let mut artifacts = Vec::with_capacity(files.len());

    for path in files {
        let text = read_text_lossy(&path)?;
        let size = std::fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| ConversionError::io(format!("Failed to stat '{}'", path.display()), e))?;
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();

        artifacts.push(Artifact {
            path: relative,
            full_path: path.to_string_lossy().into_owned(),
            size,
        });
        parts.push(text);
    }

    Ok(CollectedOutput {
        text: parts.join(DOCUMENT_SEPARATOR),
        artifacts,
    })
}
