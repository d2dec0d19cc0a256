#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for gh-census
//!
//! This library collects a GitHub user's profile and repository metadata,
//! scores every repository for completeness, and writes the results as JSON.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`config`]: Configuration loading and validation
//! - [`facts`]: Rate-limited data collection from the GitHub API
//! - [`scoring`]: Repository quality scoring
//! - [`reports`]: JSON documents, console output, and run reports

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod config;
#[cfg(not(any(debug_assertions, test)))]
mod config;

#[cfg(any(debug_assertions, test))]
pub mod facts;
#[cfg(not(any(debug_assertions, test)))]
mod facts;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

#[cfg(any(debug_assertions, test))]
pub mod scoring;
#[cfg(not(any(debug_assertions, test)))]
mod scoring;

pub use crate::commands::{Host, run};
