//! Data collection for GitHub users and their repositories
//!
//! This module retrieves a user's profile and the repositories they own from
//! the GitHub REST API, enriches each repository with a README check, and
//! scores it.
//!
//! # Implementation Model
//!
//! Every request goes through one shared [`RateLimitedClient`]. The client draws
//! a token from a [`TokenBucket`] before each request, waits out provider rate
//! limits up to a ceiling, and retries transient failures under a
//! [`RetryPolicy`] with jittered exponential backoff.
//!
//! The [`Collector`] drives a run through its phases:
//! - **Profile**: a single request through [`ProfileFetcher`]
//! - **Repositories**: paginated listing through [`RepositoryFetcher`]; a
//!   failure after the first page, or a page cap reached while more pages
//!   remain, yields a [`PartialResult`] instead of an error
//! - **Scoring**: README detail fetches and scoring run concurrently for every
//!   repository, then results are restored to provider order
//!
//! Failures are reported as [`FetchError`], whose [`ErrorKind`] distinguishes
//! missing users, exhausted quotas, persistent transient failures, permanent
//! failures, and cancellation.

mod client;
mod collection_result;
mod collector;
mod error;
mod profile;
mod repositories;
mod retry_policy;
mod run_state;
mod token_bucket;

pub use client::{ClientOptions, DEFAULT_API_BASE_URL, RateLimitInfo, RateLimitedClient};
pub use collection_result::{CollectionResult, RunStatus, SummaryStats};
pub use collector::Collector;
pub use error::{ErrorKind, FetchError};
pub use profile::{ProfileFetcher, UserProfile, validate_username};
pub use repositories::{PartialResult, Repository, RepositoryFetcher, RepositoryListing};
pub use retry_policy::RetryPolicy;
pub use run_state::{RunState, RunTracker};
pub use token_bucket::{TokenBucket, WaitExceeded};
