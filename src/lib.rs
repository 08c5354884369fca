pub mod api;
pub mod assets;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod journal;
pub mod models;
pub mod render;

pub use error::{JournalError, Result};
pub use journal::Journal;
