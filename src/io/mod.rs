pub mod checklist_io;
pub mod config_io;

pub use checklist_io::{load_checklist, save_checklist, ChecklistIoError};
pub use config_io::{config_path_for, read_config};
