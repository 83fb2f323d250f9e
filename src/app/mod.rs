// LogSift - app/mod.rs
//
// Application layer: chain assembly, run orchestration, console reporting.
// Dependencies: core, platform.

pub mod processor;
pub mod report;
pub mod rules_mgr;
