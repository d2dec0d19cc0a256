use super::run_state::{RunState, RunTracker};
use super::{
    CollectionResult, FetchError, ProfileFetcher, RateLimitInfo, RateLimitedClient, Repository, RepositoryFetcher, RunStatus,
    SummaryStats,
};
use crate::config::Config;
use crate::scoring::{QualityScore, ScoreCalculator};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = " collector";

/// A repository after its detail fetch and scoring.
struct Enriched {
    repository: Repository,
    score: Option<QualityScore>,
    warning: Option<String>,
}

/// Orchestrates one collection run: profile, repository listing, detail fetches, and scoring.
#[derive(Debug)]
pub struct Collector {
    client: Arc<RateLimitedClient>,
    profiles: ProfileFetcher,
    repositories: RepositoryFetcher,
    calculator: ScoreCalculator,
    fetch_readme: bool,
}

impl Collector {
    #[must_use]
    pub fn new(client: Arc<RateLimitedClient>, config: &Config) -> Self {
        Self {
            profiles: ProfileFetcher::new(Arc::clone(&client)),
            repositories: RepositoryFetcher::new(Arc::clone(&client), config.page_size, config.max_pages),
            calculator: ScoreCalculator::new(config.scoring_weights.clone()),
            fetch_readme: config.fetch_readme,
            client,
        }
    }

    /// Verify credentials and seed the request budget before a run.
    pub async fn preflight(&self) -> Result<RateLimitInfo, FetchError> {
        self.client.rate_limit_status().await
    }

    /// Collect the profile, repositories, and scores of `username`.
    ///
    /// Once `cancel` fires, in-flight requests are dropped and the run resolves
    /// to [`FetchError::Cancelled`], never to a partial result.
    pub async fn run(&self, username: &str, cancel: &CancellationToken) -> Result<CollectionResult, FetchError> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                log::info!(target: LOG_TARGET, "Collection for '{username}' was cancelled");
                Err(FetchError::Cancelled)
            }

            result = self.collect(username) => result,
        }
    }

    async fn collect(&self, username: &str) -> Result<CollectionResult, FetchError> {
        let collected_at = Utc::now();
        let mut tracker = RunTracker::new(username);

        tracker.advance(RunState::FetchingProfile);
        let profile = match self.profiles.fetch_profile(username).await {
            Ok(profile) => profile,
            Err(e) => {
                tracker.advance(RunState::Failed);
                return Err(e);
            }
        };

        tracker.advance(RunState::FetchingRepositories);
        let listing = match self.repositories.fetch_repositories(username).await {
            Ok(listing) => listing,
            Err(e) => {
                tracker.advance(RunState::Failed);
                return Err(e);
            }
        };

        if listing.partial.is_some() {
            tracker.advance(RunState::PartiallyDone);
        }

        let mut warnings = Vec::new();
        let repositories = dedupe(listing.repositories, &mut warnings);

        tracker.advance(RunState::Scoring);
        let (repositories, scores) = self.enrich_and_score(repositories, collected_at, &mut warnings).await;

        let summary = SummaryStats::compute(&profile, &repositories, &scores);
        let status = if listing.partial.is_some() { RunStatus::Partial } else { RunStatus::Done };
        tracker.advance(RunState::Done);

        log::info!(
            target: LOG_TARGET,
            "Collected {} repositories for '{username}' ({status}, {} warning(s))",
            repositories.len(),
            warnings.len()
        );

        Ok(CollectionResult {
            username: username.to_owned(),
            collected_at,
            status,
            profile,
            repositories,
            scores,
            partial: listing.partial,
            warnings,
            summary,
        })
    }

    /// Run every detail fetch and score concurrently, then restore provider order.
    async fn enrich_and_score(
        &self,
        repositories: Vec<Repository>,
        now: DateTime<Utc>,
        warnings: &mut Vec<String>,
    ) -> (Vec<Repository>, Vec<QualityScore>) {
        let order: Vec<String> = repositories.iter().map(|r| r.id.clone()).collect();

        let mut pending: FuturesUnordered<_> = repositories.into_iter().map(|repo| self.enrich_one(repo, now)).collect();

        let mut completed = HashMap::with_capacity(order.len());
        while let Some(enriched) = pending.next().await {
            let _ = completed.insert(enriched.repository.id.clone(), enriched);
        }

        let mut kept = Vec::with_capacity(order.len());
        let mut scores = Vec::with_capacity(order.len());

        for id in order {
            let Some(enriched) = completed.remove(&id) else {
                continue;
            };

            if let Some(warning) = enriched.warning {
                warnings.push(warning);
            }

            match enriched.score {
                Some(score) => {
                    kept.push(enriched.repository);
                    scores.push(score);
                }
                None => warnings.push(format!("repository '{id}' could not be scored and was left out")),
            }
        }

        (kept, scores)
    }

    async fn enrich_one(&self, mut repository: Repository, now: DateTime<Utc>) -> Enriched {
        let mut warning = None;

        if self.fetch_readme {
            match self.readme_present(&repository.id).await {
                Ok(present) => repository.has_readme = Some(present),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not check README of '{}': {e}", repository.id);
                    warning = Some(format!("README presence of '{}' is unknown: {e}", repository.id));
                }
            }
        }

        let score = self.calculator.score(&repository, now).ok();

        Enriched {
            repository,
            score,
            warning,
        }
    }

    async fn readme_present(&self, repository_id: &str) -> Result<bool, FetchError> {
        match self.client.get(&format!("/repos/{repository_id}/readme")).await {
            Ok(_) => Ok(true),
            Err(FetchError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Drop repositories without an identifier and repeated identifiers, keeping first occurrences.
fn dedupe(repositories: Vec<Repository>, warnings: &mut Vec<String>) -> Vec<Repository> {
    let mut seen = HashSet::with_capacity(repositories.len());
    let mut unique = Vec::with_capacity(repositories.len());

    for repo in repositories {
        if repo.id.trim().is_empty() {
            log::warn!(target: LOG_TARGET, "Skipping repository without an identifier (name '{}')", repo.name);
            warnings.push(format!("skipped a repository without an identifier (name '{}')", repo.name));
            continue;
        }

        if !seen.insert(repo.id.clone()) {
            log::debug!(target: LOG_TARGET, "Skipping duplicate repository '{}'", repo.id);
            continue;
        }

        unique.push(repo);
    }

    unique
}
