//! Library crate root re-exporting the launch composer, profile loader and CLI.

#[path = "lib/mod.rs"]
pub mod lib_mod;
pub use lib_mod as lib;
pub mod cli;
pub mod config;
pub mod launch;
