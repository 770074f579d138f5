//! GitHub API Client
//!
//! Module for managing interactions with the GitHub API

use std::collections::HashMap;

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::reconcile::LabelStore;

/// Default GitHub API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Encode a string for use in URL path segments (RFC 3986 with UTF-8 support)
///
/// Only unreserved characters (A-Z, a-z, 0-9, -, ., _, ~) are left unencoded,
/// so label names with spaces or non-ASCII text are safe in routes.
fn encode_path_segment(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            // RFC 3986 unreserved characters
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~' => c.to_string(),
            // Everything else gets percent-encoded as UTF-8 bytes
            _ => c
                .to_string()
                .bytes()
                .map(|b| format!("%{:02X}", b))
                .collect::<String>(),
        })
        .collect()
}

/// Hostname of an API base URL, for credential lookups and error messages
pub fn api_host(base_url: &str) -> String {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| base_url.to_string())
}

/// Issue Label
///
/// A named, colored tag attachable to issues and pull requests.
/// The color is 6 hex digits without a leading `#`, as the API serves it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub color: String,
}

impl Label {
    pub fn new<N: Into<String>, C: Into<String>>(name: N, color: C) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// User Account Profile
///
/// Typed record of the fields rendered by `gh user show`; optional fields
/// are absent for accounts the token has no private visibility into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub id: u64,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub html_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub total_private_repos: Option<u64>,
    #[serde(default)]
    pub public_gists: u64,
    #[serde(default)]
    pub private_gists: Option<u64>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub disk_usage: Option<u64>,
}

/// Rate Limit Information
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Hourly limit
    pub limit: u32,

    /// Remaining usage count
    pub remaining: u32,

    /// Reset time
    pub reset_at: chrono::DateTime<chrono::Utc>,
}

/// Parse a repository spec into owner and name
///
/// Accepts `owner/repo` or a bare `repo` name, defaulting the owner to the
/// authenticated user.
///
/// # Errors
/// Returns an error if the spec is empty or has more than one slash
pub fn parse_repo_spec(spec: &str, default_owner: &str) -> Result<(String, String)> {
    match spec.split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok((owner.to_string(), repo.to_string()))
        }
        None if !spec.is_empty() => Ok((default_owner.to_string(), spec.to_string())),
        _ => Err(Error::InvalidRepositorySpec(spec.to_string())),
    }
}

/// Client Factory
///
/// Constructed once per process invocation and passed into commands;
/// caches authenticated sessions keyed by the `(credentials, base_url)`
/// tuple to avoid redundant authentication handshakes. The cache is
/// append-only for the lifetime of the process.
#[derive(Default)]
pub struct ClientFactory {
    cache: HashMap<(Credentials, String), Session>,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reuse) an authenticated session
    ///
    /// # Errors
    /// Returns an error if client construction fails, or an authentication
    /// error if the credentials cannot resolve a login
    pub async fn session(&mut self, credentials: &Credentials, base_url: &str) -> Result<Session> {
        let key = (credentials.clone(), base_url.to_string());
        if let Some(session) = self.cache.get(&key) {
            return Ok(session.clone());
        }

        let builder = Octocrab::builder();
        let builder = match credentials {
            Credentials::Token { token, .. } => builder.personal_token(token.clone()),
            Credentials::Basic { login, password } => {
                builder.basic_auth(login.clone(), password.clone())
            }
        };
        let octocrab = builder
            .base_uri(base_url)
            .map_err(Error::GitHubApi)?
            .build()
            .map_err(Error::GitHubApi)?;

        // The login is needed as the default repository owner; fetch it
        // once when the credentials do not carry one.
        let login = match credentials.login() {
            Some(login) => login.to_string(),
            None => {
                octocrab
                    .current()
                    .user()
                    .await
                    .map_err(|_| Error::Authentication(api_host(base_url)))?
                    .login
            }
        };

        let session = Session { octocrab, login };
        self.cache.insert(key, session.clone());
        Ok(session)
    }
}

/// Authenticated API Session
///
/// An authenticated octocrab client plus the login of the authenticated
/// user, used as the default owner for bare repository names.
#[derive(Clone)]
pub struct Session {
    octocrab: Octocrab,
    login: String,
}

impl Session {
    /// Login of the authenticated user
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Open a client for one named repository
    ///
    /// # Errors
    /// Returns an error if the repository spec is malformed
    pub fn repo(&self, spec: &str) -> Result<RepoClient> {
        let (owner, repo) = parse_repo_spec(spec, &self.login)?;
        Ok(RepoClient {
            octocrab: self.octocrab.clone(),
            owner,
            repo,
        })
    }

    /// Fetch a user profile, defaulting to the authenticated user
    ///
    /// # Errors
    /// Returns an error if the user does not exist or the API call fails
    pub async fn user_profile(&self, login: Option<&str>) -> Result<UserProfile> {
        let route = match login {
            Some(login) => format!("/users/{}", encode_path_segment(login)),
            None => "/user".to_string(),
        };
        let profile: UserProfile = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(Error::GitHubApi)?;
        Ok(profile)
    }

    /// Get rate limit information
    ///
    /// # Errors
    /// Returns an error if the GitHub API call fails
    pub async fn rate_limit(&self) -> Result<RateLimitInfo> {
        let rate_limit = self
            .octocrab
            .ratelimit()
            .get()
            .await
            .map_err(Error::GitHubApi)?;

        Ok(RateLimitInfo {
            limit: rate_limit.resources.core.limit as u32,
            remaining: rate_limit.resources.core.remaining as u32,
            reset_at: chrono::DateTime::from_timestamp(rate_limit.resources.core.reset as i64, 0)
                .unwrap_or_else(chrono::Utc::now),
        })
    }
}

/// Repository Client
///
/// Remote accessor for one named repository: fetch current labels,
/// create a label, update a label's color.
pub struct RepoClient {
    octocrab: Octocrab,
    owner: String,
    repo: String,
}

impl RepoClient {
    async fn fetch_labels(&self) -> Result<Vec<Label>> {
        let mut labels = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .octocrab
                .issues(&self.owner, &self.repo)
                .list_labels_for_repo()
                .page(page)
                .per_page(100)
                .send()
                .await
                .map_err(|e| {
                    if e.to_string().contains("Not Found") {
                        Error::RepositoryNotFound(format!("{}/{}", self.owner, self.repo))
                    } else {
                        Error::GitHubApi(e)
                    }
                })?;

            if response.items.is_empty() {
                break;
            }

            for label in response.items {
                labels.push(Label {
                    name: label.name,
                    color: label.color,
                });
            }

            page += 1;
        }

        Ok(labels)
    }
}

#[async_trait]
impl LabelStore for RepoClient {
    fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    async fn exists(&self) -> bool {
        self.octocrab
            .repos(&self.owner, &self.repo)
            .get()
            .await
            .is_ok()
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        self.fetch_labels().await
    }

    async fn create_label(&self, name: &str, color: &str) -> Result<()> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .create_label(name, color, "")
            .await
            .map_err(Error::GitHubApi)?;

        Ok(())
    }

    async fn set_label_color(&self, name: &str, color: &str) -> Result<()> {
        // octocrab has no dedicated label update method; PATCH the color
        // directly so issue associations survive (a delete/recreate would
        // drop them).
        let route = format!(
            "/repos/{}/{}/labels/{}",
            self.owner,
            self.repo,
            encode_path_segment(name)
        );
        let body = serde_json::json!({ "color": color });
        let _: serde_json::Value = self
            .octocrab
            .patch(route, Some(&body))
            .await
            .map_err(Error::GitHubApi)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_segment() {
        // Basic ASCII characters
        assert_eq!(encode_path_segment("bug"), "bug");
        assert_eq!(encode_path_segment("feature-request"), "feature-request");

        // Spaces and special characters
        assert_eq!(
            encode_path_segment("good first issue"),
            "good%20first%20issue"
        );
        assert_eq!(encode_path_segment("help wanted"), "help%20wanted");

        // Non-ASCII (UTF-8)
        assert_eq!(encode_path_segment("バグ"), "%E3%83%90%E3%82%B0");

        // RFC 3986 unreserved characters stay unchanged
        assert_eq!(
            encode_path_segment("test-label_v1.2~alpha"),
            "test-label_v1.2~alpha"
        );

        // Reserved characters get encoded
        assert_eq!(encode_path_segment("test/label"), "test%2Flabel");
        assert_eq!(encode_path_segment("test@label"), "test%40label");
    }

    #[test]
    fn test_parse_repo_spec_qualified() {
        let (owner, repo) = parse_repo_spec("jhermann/waif", "me").unwrap();
        assert_eq!(owner, "jhermann");
        assert_eq!(repo, "waif");
    }

    #[test]
    fn test_parse_repo_spec_bare_defaults_owner() {
        let (owner, repo) = parse_repo_spec("waif", "jhermann").unwrap();
        assert_eq!(owner, "jhermann");
        assert_eq!(repo, "waif");
    }

    #[test]
    fn test_parse_repo_spec_invalid() {
        assert!(parse_repo_spec("", "me").is_err());
        assert!(parse_repo_spec("/repo", "me").is_err());
        assert!(parse_repo_spec("owner/", "me").is_err());
        assert!(parse_repo_spec("owner/repo/sub", "me").is_err());
    }

    #[test]
    fn test_api_host() {
        assert_eq!(api_host("https://api.github.com"), "api.github.com");
        assert_eq!(api_host("https://ghe.example.org/api/v3"), "ghe.example.org");
    }

    #[test]
    fn test_user_profile_deserializes_sparse_response() {
        let json = r##"{
            "login": "jhermann",
            "id": 1068245,
            "type": "User",
            "html_url": "https://github.com/jhermann",
            "created_at": "2011-09-27T13:27:25Z",
            "updated_at": "2015-06-01T09:00:00Z",
            "public_repos": 42,
            "public_gists": 7,
            "followers": 100,
            "following": 50
        }"##;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.login, "jhermann");
        assert_eq!(profile.account_type, "User");
        assert_eq!(profile.name, None);
        assert_eq!(profile.total_private_repos, None);
        assert_eq!(profile.disk_usage, None);
    }
}
