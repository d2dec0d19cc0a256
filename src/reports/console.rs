use crate::Result;
use crate::facts::CollectionResult;
use core::fmt::Write;
use owo_colors::OwoColorize;

/// Scores below this are shown in red.
const LOW_SCORE: f64 = 40.0;

/// Scores at or above this are shown in green.
const HIGH_SCORE: f64 = 70.0;

pub fn generate<W: Write>(result: &CollectionResult, use_colors: bool, writer: &mut W) -> Result<()> {
    let profile = &result.profile;
    let title = profile
        .name
        .as_deref()
        .map_or_else(|| profile.login.clone(), |name| format!("{name} ({})", profile.login));

    if use_colors {
        writeln!(writer, "{}", title.bold())?;
    } else {
        writeln!(writer, "{title}")?;
    }

    writeln!(
        writer,
        "  {} followers, {} following, {} public repositories",
        profile.followers, profile.following, profile.public_repos
    )?;

    if result.repositories.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No repositories found")?;
    } else {
        let width = result.repositories.iter().map(|r| r.id.len()).max().unwrap_or(0);

        writeln!(writer)?;
        for (repo, score) in result.scored_repositories() {
            let score_text = format!("{:>6.2}", score.score);
            let colored = if use_colors {
                if score.score < LOW_SCORE {
                    score_text.red().to_string()
                } else if score.score < HIGH_SCORE {
                    score_text.yellow().to_string()
                } else {
                    score_text.green().to_string()
                }
            } else {
                score_text
            };

            writeln!(writer, "  {:<width$}  {colored}  ★ {}", repo.id, repo.stars)?;
        }
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "Average score {:.2} across {} repositories, {} stars in total",
        result.summary.average_score, result.summary.total_public_repos, result.summary.total_stars
    )?;

    if let Some(partial) = &result.partial {
        let note = format!(
            "Results are partial: page {} of the repository listing failed ({})",
            partial.failed_page, partial.kind
        );
        if use_colors {
            writeln!(writer, "{}", note.yellow())?;
        } else {
            writeln!(writer, "{note}")?;
        }
    }

    for warning in &result.warnings {
        writeln!(writer, "warning: {warning}")?;
    }

    Ok(())
}
