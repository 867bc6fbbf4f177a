pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod progress;
pub mod registry;
pub mod scores;
pub mod tracker;
