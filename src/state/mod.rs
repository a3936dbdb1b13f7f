//! State shared across pipeline stages
//!
//! # Components
//!
//! - `DeduplicationIndex`: per-stage set of identity keys
//! - `ProgressTracker`: bounded counters and the phase state machine
//! - `StatusRenderer`: live status line sampling the tracker

mod dedup;
mod progress;
mod status;

pub use dedup::DeduplicationIndex;
pub use progress::{
    Archiving, Discovering, Phase, ProgressSnapshot, ProgressTracker, Scraping,
};
pub use status::StatusRenderer;
