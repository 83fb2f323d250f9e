// LogSift - platform/mod.rs
//
// Platform layer: filesystem-backed log source and configuration paths.
// Dependencies: core (source trait and model), util, directories, memmap2.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
