//! Command-line interface for gh-census
//!
//! This module implements the CLI commands and acts as the external request
//! handler for collection runs.
//!
//! ## Commands
//!
//! - **collect**: Collect a user's profile and repositories, score each
//!   repository, write the JSON documents, and print a run report
//! - **init**: Generate a default configuration file
//! - **validate**: Check configuration file syntax and values
//!
//! The `run` function parses command-line arguments using clap and routes
//! to the appropriate command handler. The [`Host`] trait stands in for the
//! process environment so commands can be driven from tests.

mod collect;
mod common;
mod host;
mod init;
mod run;
mod validate;

pub use collect::{CollectArgs, process_collect};
pub use common::{ColorMode, LogLevel};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
