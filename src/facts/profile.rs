use super::{FetchError, RateLimitedClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "   profile";

/// GitHub logins are at most 39 characters long.
const MAX_USERNAME_LEN: usize = 39;

/// Public profile of a GitHub account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub public_repos: u64,
    pub public_gists: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub node_id: Option<String>,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    pub account_type: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
}

/// Shape of `GET /users/{username}`
#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    #[serde(default)]
    followers: u64,
    #[serde(default)]
    following: u64,
    #[serde(default)]
    public_repos: u64,
    #[serde(default)]
    public_gists: u64,
    created_at: Option<DateTime<Utc>>,
    node_id: Option<String>,
    html_url: Option<String>,
    avatar_url: Option<String>,
    #[serde(rename = "type")]
    account_type: Option<String>,
    company: Option<String>,
    location: Option<String>,
    email: Option<String>,
    blog: Option<String>,
    twitter_username: Option<String>,
}

impl From<ApiUser> for UserProfile {
    fn from(user: ApiUser) -> Self {
        Self {
            login: user.login,
            name: non_blank(user.name),
            bio: non_blank(user.bio),
            followers: user.followers,
            following: user.following,
            public_repos: user.public_repos,
            public_gists: user.public_gists,
            created_at: user.created_at,
            node_id: user.node_id,
            profile_url: user.html_url,
            avatar_url: user.avatar_url,
            account_type: user.account_type,
            company: non_blank(user.company),
            location: non_blank(user.location),
            email: non_blank(user.email),
            blog: non_blank(user.blog),
            twitter_username: non_blank(user.twitter_username),
        }
    }
}

/// GitHub returns empty strings for some unset profile fields.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Reject usernames that GitHub could never have issued.
///
/// Checked before any request so that a bad input never reaches the network.
pub fn validate_username(username: &str) -> Result<(), FetchError> {
    if username.is_empty() {
        return Err(FetchError::fatal("username must not be empty"));
    }

    if username.len() > MAX_USERNAME_LEN
        || username.starts_with('-')
        || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(FetchError::fatal(format!("'{username}' is not a valid GitHub username")));
    }

    Ok(())
}

/// Retrieves a single user's profile.
#[derive(Debug, Clone)]
pub struct ProfileFetcher {
    client: Arc<RateLimitedClient>,
}

impl ProfileFetcher {
    #[must_use]
    pub const fn new(client: Arc<RateLimitedClient>) -> Self {
        Self { client }
    }

    pub async fn fetch_profile(&self, username: &str) -> Result<UserProfile, FetchError> {
        validate_username(username)?;

        let path = format!("/users/{username}");
        log::debug!(target: LOG_TARGET, "Fetching profile of '{username}'");

        let resp = self.client.get(&path).await.map_err(|e| match e {
            FetchError::NotFound { .. } => FetchError::NotFound {
                resource: format!("GitHub user '{username}'"),
            },
            other => other,
        })?;

        let user: ApiUser = resp.json().await.map_err(|e| FetchError::from_decode(&e, &path))?;
        Ok(user.into())
    }
}
