pub mod cli;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod extracts;
pub mod introspection;
pub mod inventory;
pub mod logging;
pub mod metrics;
