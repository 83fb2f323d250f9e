// LogSift - lib.rs
//
// Library entry point. The `logsift` binary is a thin CLI over this crate;
// integration tests and programmatic users link against it directly.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
