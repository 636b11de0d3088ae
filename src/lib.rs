//! slotcast: builds a day-long video channel playlist from half-hour slots.
//!
//! All selection, commercial fill and persistence logic lives here.
//! The CLI consumes this crate.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filler;
pub mod history;
pub mod ini;
pub mod media;
pub mod paths;
pub mod player;
pub mod playlist;
pub mod schedule;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
