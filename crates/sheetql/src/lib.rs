#![forbid(unsafe_code)]

pub mod cli;
pub mod completion;
pub mod config;
pub mod execute;
pub mod identifier;
pub mod introspect;
pub mod materialize;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod translate;
pub mod utils;
pub mod workbook;

pub use cli::app::{Cli, Command};
