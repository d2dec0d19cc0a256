//! Output of collection results
//!
//! - **JSON**: the profile, repository, scored repository, and summary documents
//!   written for every successful run
//! - **Console**: a short human-readable table of scores
//! - **Run report**: the status summary printed for every run, successful or not

mod console;
mod json;
mod run_report;

pub use console::generate as generate_console;
pub use json::{OutputFiles, PROFILE_FILE, REPOSITORIES_FILE, SCORES_FILE, SUMMARY_FILE, write_outputs};
pub use run_report::{ReportStatus, RunReport};
