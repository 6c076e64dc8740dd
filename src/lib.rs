//! Macro automation engine: command trees of clicks, key presses, image
//! waits, conditionals and loops, interpreted against a cancellation token.

pub mod config;
pub mod editor;
pub mod error;
pub mod executor;
pub mod graph;
pub mod history;
pub mod listing;
pub mod node_types;
pub mod persistence;
pub mod registry;
pub mod settings;
