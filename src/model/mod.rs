pub mod checklist;
pub mod config;
pub mod item;
pub mod store;

pub use checklist::*;
pub use config::*;
pub use item::*;
pub use store::*;
