pub mod analyzer;
pub mod args;
pub mod config;
pub mod error;
pub mod io_utils;
pub mod model;
pub mod report;
pub mod run_processing;
pub mod stats;
