//! Shared library modules providing error types, path and shell helpers, and telemetry initialization.

pub mod errors;
pub mod paths;
pub mod shell;
pub mod telemetry;
