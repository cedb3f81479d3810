//! AWS Export library crate for the edge-to-cloud publish stage.
//!
//! Re-exports all modules so external crates (e.g. `ae-e2e-tests`) can
//! drive the settings loader and publisher directly.

pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod publisher;
pub mod settings;

pub use error::{ConfigError, PublishError};
pub use input::PayloadReader;
pub use pipeline::{EventContext, EventRecord, StageOutcome};
pub use publisher::Publisher;
pub use settings::{LoadedSettings, SettingsLoader, load};
