// LogSift - core/mod.rs
//
// Core classification layer.
// Must NOT depend on: platform, app, or direct filesystem access.

pub mod aggregator;
pub mod classifier;
pub mod dispatcher;
pub mod export;
pub mod lifecycle;
pub mod model;
pub mod rules;
pub mod source;
pub mod timestamp;
