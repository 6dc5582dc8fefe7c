use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::model::checklist::Checklist;
use crate::model::store::ItemStore;
use crate::parse::{parse_checklist, serialize_checklist};

/// Error type for checklist and config file I/O
#[derive(Debug, thiserror::Error)]
pub enum ChecklistIoError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ConfigParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Load a checklist file. A missing file is an empty checklist.
/// Also returns the lines that were not understood.
pub fn load_checklist(path: &Path) -> Result<(Checklist, Vec<String>), ChecklistIoError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "checklist file missing, starting empty");
            return Ok((Checklist::default(), Vec::new()));
        }
        Err(e) => {
            return Err(ChecklistIoError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    Ok(parse_checklist(&text))
}

/// Write a checklist file atomically
pub fn save_checklist(
    path: &Path,
    title: Option<&str>,
    store: &ItemStore,
) -> Result<(), ChecklistIoError> {
    let content = serialize_checklist(title, store);
    atomic_write(path, content.as_bytes()).map_err(|e| ChecklistIoError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), items = store.len(), "checklist saved");
    Ok(())
}

/// Write to a temp file in the same directory, then rename over `path`
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
