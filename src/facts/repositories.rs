use super::client::has_next_page;
use super::profile::validate_username;
use super::{ErrorKind, FetchError, RateLimitedClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "     repos";

/// Metadata of one repository owned by the user.
///
/// `id` is the provider's `owner/name` identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub language: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub license: Option<String>,
    pub topics: Vec<String>,
    pub archived: bool,
    pub fork: bool,

    /// `None` until a detail fetch has established whether a README exists.
    pub has_readme: Option<bool>,
}

/// Describes where pagination stopped when it could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialResult {
    pub failed_page: u32,
    pub pages_fetched: u32,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of listing a user's repositories
#[derive(Debug, Clone)]
pub struct RepositoryListing {
    pub repositories: Vec<Repository>,
    pub pages_fetched: u32,
    pub partial: Option<PartialResult>,
}

/// Shape of one element of `GET /users/{username}/repos`
#[derive(Debug, Deserialize)]
struct ApiRepository {
    full_name: Option<String>,
    name: Option<String>,
    description: Option<String>,
    stargazers_count: Option<u64>,
    forks_count: Option<u64>,
    open_issues_count: Option<u64>,
    language: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    pushed_at: Option<DateTime<Utc>>,
    html_url: Option<String>,
    license: Option<ApiLicense>,
    topics: Option<Vec<String>>,
    archived: Option<bool>,
    fork: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ApiLicense {
    spdx_id: Option<String>,
    key: Option<String>,
    name: Option<String>,
}

impl From<ApiRepository> for Repository {
    fn from(repo: ApiRepository) -> Self {
        Self {
            id: repo.full_name.unwrap_or_default(),
            name: repo.name.unwrap_or_default(),
            description: repo.description.filter(|d| !d.trim().is_empty()),
            stars: repo.stargazers_count.unwrap_or(0),
            forks: repo.forks_count.unwrap_or(0),
            open_issues: repo.open_issues_count.unwrap_or(0),
            language: repo.language,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            pushed_at: repo.pushed_at,
            url: repo.html_url,
            license: repo.license.map(|l| l.spdx_id.or(l.key).or(l.name).unwrap_or_else(|| "unknown".to_owned())),
            topics: repo.topics.unwrap_or_default(),
            archived: repo.archived.unwrap_or(false),
            fork: repo.fork.unwrap_or(false),
            has_readme: None,
        }
    }
}

/// Retrieves the paginated list of repositories owned by a user.
#[derive(Debug, Clone)]
pub struct RepositoryFetcher {
    client: Arc<RateLimitedClient>,
    page_size: u8,
    max_pages: u32,
}

impl RepositoryFetcher {
    #[must_use]
    pub fn new(client: Arc<RateLimitedClient>, page_size: u8, max_pages: u32) -> Self {
        Self {
            client,
            page_size: page_size.clamp(1, 100),
            max_pages: max_pages.max(1),
        }
    }

    /// List every repository owned by `username`, in provider order.
    ///
    /// A failure on the first page fails the whole listing. A failure on a later
    /// page returns what was collected so far, qualified by a [`PartialResult`].
    /// Stopping at `max_pages` while the provider still advertises a next page is
    /// reported the same way.
    pub async fn fetch_repositories(&self, username: &str) -> Result<RepositoryListing, FetchError> {
        validate_username(username)?;

        let mut repositories = Vec::new();
        let mut pages_fetched = 0;
        let mut page = 1;

        loop {
            let (items, has_next) = match self.fetch_page(username, page).await {
                Ok(fetched) => fetched,
                Err(e) if page == 1 => return Err(first_page_error(username, e)),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch page {page} of repositories for '{username}': {e}");
                    return Ok(RepositoryListing {
                        repositories,
                        pages_fetched,
                        partial: Some(PartialResult {
                            failed_page: page,
                            pages_fetched,
                            kind: e.kind(),
                            message: e.to_string(),
                        }),
                    });
                }
            };

            pages_fetched += 1;
            if items.is_empty() {
                break;
            }

            repositories.extend(items.into_iter().map(Repository::from));

            if !has_next {
                break;
            }

            if page >= self.max_pages {
                log::warn!(target: LOG_TARGET, "Reached maximum page limit ({}) for '{username}', stopping pagination after {} repositories", self.max_pages, repositories.len());
                return Ok(RepositoryListing {
                    repositories,
                    pages_fetched,
                    partial: Some(PartialResult {
                        failed_page: page + 1,
                        pages_fetched,
                        kind: ErrorKind::Fatal,
                        message: format!("stopped at the limit of {} pages with more pages remaining", self.max_pages),
                    }),
                });
            }

            page += 1;
        }

        log::debug!(target: LOG_TARGET, "Listed {} repositories for '{username}' in {pages_fetched} page(s)", repositories.len());

        Ok(RepositoryListing {
            repositories,
            pages_fetched,
            partial: None,
        })
    }

    async fn fetch_page(&self, username: &str, page: u32) -> Result<(Vec<ApiRepository>, bool), FetchError> {
        let path = format!(
            "/users/{username}/repos?type=owner&sort=full_name&per_page={}&page={page}",
            self.page_size
        );

        let resp = self.client.get(&path).await?;
        let has_next = has_next_page(resp.headers());
        let items = resp.json().await.map_err(|e| FetchError::from_decode(&e, &path))?;

        Ok((items, has_next))
    }
}

fn first_page_error(username: &str, e: FetchError) -> FetchError {
    match e {
        FetchError::NotFound { .. } => FetchError::NotFound {
            resource: format!("repositories of GitHub user '{username}'"),
        },
        FetchError::Fatal { .. } | FetchError::Cancelled => e,
        FetchError::Transient { status, .. } => FetchError::Fatal {
            message: format!("could not list repositories of '{username}': {e}"),
            status,
        },
        FetchError::RateLimitExceeded { .. } => FetchError::fatal(format!("could not list repositories of '{username}': {e}")),
    }
}
