use crate::Result;
use crate::facts::{CollectionResult, PartialResult, Repository, RunStatus, SummaryStats};
use crate::scoring::{Factor, QualityScore};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};

const LOG_TARGET: &str = "      json";

pub const PROFILE_FILE: &str = "github_user_profile.json";
pub const REPOSITORIES_FILE: &str = "github_repositories.json";
pub const SCORES_FILE: &str = "github_repository_scores.json";
pub const SUMMARY_FILE: &str = "github_summary_stats.json";

/// A repository together with its quality score
#[derive(Debug, Serialize)]
struct ScoredRepository<'a> {
    #[serde(flatten)]
    repository: &'a Repository,
    quality: ScoreView<'a>,
}

#[derive(Debug, Serialize)]
struct ScoreView<'a> {
    score: f64,
    factors: &'a BTreeMap<Factor, f64>,
}

#[derive(Debug, Serialize)]
struct SummaryDocument<'a> {
    username: &'a str,
    collected_at: DateTime<Utc>,
    status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    partial: Option<&'a PartialResult>,
    warnings: &'a [String],
    #[serde(flatten)]
    stats: &'a SummaryStats,
}

/// Paths of the documents written for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub profile: Utf8PathBuf,
    pub repositories: Utf8PathBuf,
    pub scores: Utf8PathBuf,
    pub summary: Utf8PathBuf,
}

/// Write the JSON documents of a successful run into `output_dir`.
pub fn write_outputs(result: &CollectionResult, output_dir: &Utf8Path) -> Result<OutputFiles> {
    fs::create_dir_all(output_dir).into_app_err_with(|| format!("unable to create output directory '{output_dir}'"))?;

    let files = OutputFiles {
        profile: output_dir.join(PROFILE_FILE),
        repositories: output_dir.join(REPOSITORIES_FILE),
        scores: output_dir.join(SCORES_FILE),
        summary: output_dir.join(SUMMARY_FILE),
    };

    save(&result.profile, &files.profile)?;
    save(&result.repositories, &files.repositories)?;
    save(&scored_repositories(&result.repositories, &result.scores), &files.scores)?;
    save(
        &SummaryDocument {
            username: &result.username,
            collected_at: result.collected_at,
            status: result.status,
            partial: result.partial.as_ref(),
            warnings: &result.warnings,
            stats: &result.summary,
        },
        &files.summary,
    )?;

    log::info!(target: LOG_TARGET, "Wrote collection results for '{}' to '{output_dir}'", result.username);
    Ok(files)
}

fn scored_repositories<'a>(repositories: &'a [Repository], scores: &'a [QualityScore]) -> Vec<ScoredRepository<'a>> {
    repositories
        .iter()
        .zip(scores)
        .map(|(repository, score)| ScoredRepository {
            repository,
            quality: ScoreView {
                score: score.score,
                factors: &score.factors,
            },
        })
        .collect()
}

fn save<T: Serialize>(data: &T, path: &Utf8Path) -> Result<()> {
    let file = File::create(path).into_app_err_with(|| format!("unable to create output file '{path}'"))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, data).into_app_err_with(|| format!("unable to write output file '{path}'"))?;
    writer.flush().into_app_err_with(|| format!("unable to flush output file '{path}'"))?;

    log::debug!(target: LOG_TARGET, "Wrote '{path}'");
    Ok(())
}
