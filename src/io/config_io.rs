use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::checklist_io::ChecklistIoError;
use crate::model::config::ChecklistConfig;

/// Name of the config file looked up beside a checklist
pub const CONFIG_FILE_NAME: &str = "checklist.toml";

/// The config file that belongs to a checklist file
pub fn config_path_for(checklist: &Path) -> PathBuf {
    match checklist.parent() {
        Some(dir) => dir.join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    }
}

/// Read a config file; a missing file means defaults
pub fn read_config(path: &Path) -> Result<ChecklistConfig, ChecklistIoError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ChecklistConfig::default()),
        Err(e) => {
            return Err(ChecklistIoError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    toml::from_str(&text).map_err(|e| ChecklistIoError::ConfigParseError {
        path: path.to_path_buf(),
        source: e,
    })
}
