//! # gh-commander
//!
//! A library and CLI to access the GitHub API and automate otherwise
//! tedious issue label management across repositories
//!
//! ## Features
//! - Label import/export in several dataset formats
//! - Minimal-diff label reconciliation (create/update only, never delete)
//! - Credential resolution from the environment or a netrc-style file
//! - Account profile inspection

pub mod auth;
pub mod dataset;
pub mod error;
pub mod github;
pub mod reconcile;

pub use auth::Credentials;
pub use dataset::Format;
pub use error::{Error, Result};
pub use github::{ClientFactory, Label, RepoClient, Session};
pub use reconcile::{reconcile, DesiredLabels, Outcome};

/// Main functionality of gh-commander
///
/// Builds a desired label set from decoded dataset records and converges
/// each given repository toward it, returning one outcome per repository.
///
/// # Examples
///
/// ```rust,no_run
/// use gh_commander::{auth, github};
///
/// #[tokio::main]
/// async fn main() -> gh_commander::Result<()> {
///     let host = github::api_host(github::DEFAULT_BASE_URL);
///     let credentials = auth::resolve_credentials(&host)?;
///
///     let mut factory = github::ClientFactory::new();
///     let session = factory.session(&credentials, github::DEFAULT_BASE_URL).await?;
///
///     let records = vec![("bug".to_string(), "#d73a4a".to_string())];
///     let outcomes = gh_commander::import_labels(&session, &["jhermann/waif".to_string()], records).await?;
///
///     for outcome in outcomes {
///         println!("{}: {} created", outcome.repo, outcome.created.len());
///     }
///     Ok(())
/// }
/// ```
pub async fn import_labels<I>(
    session: &Session,
    repos: &[String],
    records: I,
) -> Result<Vec<Outcome>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let desired = DesiredLabels::from_records(records)?;

    let mut outcomes = Vec::with_capacity(repos.len());
    for spec in repos {
        let repo = session.repo(spec)?;
        outcomes.push(reconcile(&repo, &desired).await);
    }

    Ok(outcomes)
}
