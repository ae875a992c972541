// WellSleuth - lib.rs
//
// Library entry point, exposing the pipeline, batch runner and platform
// helpers for the CLI binary and integration tests.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
