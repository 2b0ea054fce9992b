//! Common types and utilities for the karma service

pub mod config;
pub mod error;
pub mod events;
pub mod levels;
pub mod models;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use events::KarmaEvent;
pub use levels::{Level, LevelTable};
