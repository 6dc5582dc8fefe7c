pub mod engine;
pub mod events;
pub mod history;
pub mod manager;
pub mod ordering;
