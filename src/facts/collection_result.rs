use super::{PartialResult, Repository, UserProfile};
use crate::scoring::QualityScore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

/// How completely a successful run collected the user's repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Done,
    Partial,
}

/// Aggregates across the profile and the collected repositories
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_public_repos: u64,
    pub total_followers: u64,
    pub total_following: u64,
    pub total_public_gists: u64,
    pub total_stars: u64,
    pub average_score: f64,
}

impl SummaryStats {
    #[must_use]
    pub fn compute(profile: &UserProfile, repositories: &[Repository], scores: &[QualityScore]) -> Self {
        #[expect(clippy::cast_precision_loss, reason = "repository counts are far below 2^52")]
        let average_score = if scores.is_empty() {
            0.0
        } else {
            let total: f64 = scores.iter().map(|s| s.score).sum();
            ((total / scores.len() as f64) * 100.0).round() / 100.0
        };

        Self {
            total_public_repos: repositories.len() as u64,
            total_followers: profile.followers,
            total_following: profile.following,
            total_public_gists: profile.public_gists,
            total_stars: repositories.iter().map(|r| r.stars).fold(0, u64::saturating_add),
            average_score,
        }
    }
}

/// Everything one successful run produced.
///
/// `repositories` and `scores` are parallel: entry `i` of each describes the
/// same repository, in provider order.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub username: String,
    pub collected_at: DateTime<Utc>,
    pub status: RunStatus,
    pub profile: UserProfile,
    pub repositories: Vec<Repository>,
    pub scores: Vec<QualityScore>,
    pub partial: Option<PartialResult>,
    pub warnings: Vec<String>,
    pub summary: SummaryStats,
}

impl CollectionResult {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::Partial
    }

    #[must_use]
    pub fn score_for(&self, repository_id: &str) -> Option<&QualityScore> {
        self.scores.iter().find(|s| s.repository_id == repository_id)
    }

    /// Each repository with its score.
    pub fn scored_repositories(&self) -> impl Iterator<Item = (&Repository, &QualityScore)> {
        self.repositories.iter().zip(&self.scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn profile() -> UserProfile {
        UserProfile {
            login: "octocat".into(),
            name: None,
            bio: None,
            followers: 10,
            following: 2,
            public_repos: 3,
            public_gists: 1,
            created_at: None,
            node_id: None,
            profile_url: None,
            avatar_url: None,
            account_type: None,
            company: None,
            location: None,
            email: None,
            blog: None,
            twitter_username: None,
        }
    }

    fn score(id: &str, value: f64) -> QualityScore {
        QualityScore {
            repository_id: id.into(),
            score: value,
            factors: BTreeMap::new(),
        }
    }

    #[test]
    fn test_summary_stats() {
        let repos = vec![
            Repository {
                id: "octocat/a".into(),
                stars: 5,
                ..Repository::default()
            },
            Repository {
                id: "octocat/b".into(),
                stars: 7,
                ..Repository::default()
            },
        ];
        let scores = vec![score("octocat/a", 40.0), score("octocat/b", 61.0)];

        let stats = SummaryStats::compute(&profile(), &repos, &scores);
        assert_eq!(stats.total_public_repos, 2);
        assert_eq!(stats.total_stars, 12);
        assert_eq!(stats.total_followers, 10);
        assert_eq!(stats.total_following, 2);
        assert_eq!(stats.total_public_gists, 1);
        assert!((stats.average_score - 50.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_stats_without_repositories() {
        let stats = SummaryStats::compute(&profile(), &[], &[]);
        assert_eq!(stats.total_public_repos, 0);
        assert!(stats.average_score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_run_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&RunStatus::Partial).unwrap(), r#""partial""#);
        assert_eq!(RunStatus::Done.to_string(), "done");
    }
}
