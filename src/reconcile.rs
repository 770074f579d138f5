//! Label Reconciliation Engine
//!
//! Converges a repository's live label set toward a desired set via
//! minimal create/update calls, and reports exactly what happened.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::github::Label;

/// Normalize a label color: strip one leading `#` and lowercase
pub fn normalize_color(color: &str) -> String {
    color.strip_prefix('#').unwrap_or(color).to_lowercase()
}

/// Validate a normalized color against the 6-hex-digit pattern
fn is_valid_hex_color(color: &str) -> bool {
    color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit())
}

/// Informational note about a duplicate name in one decoded dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateNote {
    pub name: String,
    pub old_color: String,
    pub new_color: String,
}

/// Desired Label Set
///
/// Mapping from label name to normalized color, built fresh per import
/// invocation from the decoded dataset. Within one dataset the later of
/// two occurrences of the same name wins; that is recorded as an
/// informational note, not an error.
#[derive(Debug, Clone, Default)]
pub struct DesiredLabels {
    map: BTreeMap<String, String>,
    notes: Vec<DuplicateNote>,
}

impl DesiredLabels {
    /// Normalize and validate decoded records into a desired mapping
    ///
    /// # Errors
    /// Returns a validation error for an empty name or a color that does
    /// not normalize to 6 hex digits. This is a hard stop for the whole
    /// import: invalid input must not partially apply.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = BTreeMap::new();
        let mut notes = Vec::new();

        for (name, color) in records {
            if name.trim().is_empty() {
                return Err(Error::label_validation("Label name cannot be empty"));
            }

            let normalized = normalize_color(&color);
            if !is_valid_hex_color(&normalized) {
                return Err(Error::InvalidLabelColor { name, color });
            }

            if let Some(old) = map.insert(name.clone(), normalized.clone()) {
                if old != normalized {
                    notes.push(DuplicateNote {
                        name,
                        old_color: old,
                        new_color: normalized,
                    });
                }
            }
        }

        Ok(Self { map, notes })
    }

    /// Duplicate-name notes collected while building the mapping
    pub fn notes(&self) -> &[DuplicateNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }
}

/// Remote label accessor for one repository
///
/// The seam between the reconciliation engine and the GitHub client,
/// mockable for tests.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Repository identifier in `owner/repo` form
    fn full_name(&self) -> String;

    /// Whether the repository exists and is accessible
    async fn exists(&self) -> bool;

    /// Fetch all current labels
    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// Create a label with the given name and color (no leading `#`)
    async fn create_label(&self, name: &str, color: &str) -> Result<()>;

    /// Update an existing label's color (no leading `#`)
    async fn set_label_color(&self, name: &str, color: &str) -> Result<()>;
}

/// Kind of remote call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
        }
    }
}

/// A single create/update call that failed
///
/// Reported inline; never aborts the remaining labels or repositories.
#[derive(Debug, Clone)]
pub struct CallFailure {
    pub action: Action,
    pub name: String,
    pub reason: String,
}

/// An applied color change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelUpdate {
    pub name: String,
    pub old_color: String,
    pub new_color: String,
}

/// Reconciliation Outcome
///
/// Per-repository result, produced fresh for every reconciliation call.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Repository identifier in `owner/repo` form
    pub repo: String,

    /// False if the repository is absent or inaccessible; all other
    /// fields are then empty
    pub repo_found: bool,

    /// Labels actually added, ascending by name
    pub created: Vec<Label>,

    /// Labels actually changed, in order of occurrence in the live set
    pub updated: Vec<LabelUpdate>,

    /// Calls that failed, reported inline
    pub failed: Vec<CallFailure>,

    /// Names present remotely but absent from the desired set, sorted
    pub unique_existing: Vec<String>,
}

impl Outcome {
    /// Create a new empty outcome for a repository
    pub fn new<S: Into<String>>(repo: S) -> Self {
        Self {
            repo: repo.into(),
            repo_found: true,
            created: Vec::new(),
            updated: Vec::new(),
            failed: Vec::new(),
            unique_existing: Vec::new(),
        }
    }

    fn not_found(repo: String) -> Self {
        Self {
            repo_found: false,
            ..Self::new(repo)
        }
    }

    /// Whether any label was created or updated, or any call failed
    pub fn has_changes(&self) -> bool {
        !self.created.is_empty() || !self.updated.is_empty() || !self.failed.is_empty()
    }
}

/// Reconcile one repository against the desired label set
///
/// Computes and applies the minimal diff: existing labels with a differing
/// color get an update call, desired names absent from the live set get a
/// create call, and remote labels outside the desired set are only
/// reported, never touched. Running the same import twice yields zero
/// creates and updates on the second run.
pub async fn reconcile(store: &dyn LabelStore, desired: &DesiredLabels) -> Outcome {
    let repo = store.full_name();

    if !store.exists().await {
        return Outcome::not_found(repo);
    }

    let current = match store.list_labels().await {
        Ok(labels) => labels,
        Err(_) => return Outcome::not_found(repo),
    };

    let mut outcome = Outcome::new(repo);
    let mut remaining = desired.map.clone();

    for label in &current {
        match remaining.remove(&label.name) {
            Some(want) => {
                if want != label.color {
                    match store.set_label_color(&label.name, &want).await {
                        Ok(()) => outcome.updated.push(LabelUpdate {
                            name: label.name.clone(),
                            old_color: label.color.clone(),
                            new_color: want,
                        }),
                        Err(e) => outcome.failed.push(CallFailure {
                            action: Action::Update,
                            name: label.name.clone(),
                            reason: e.to_string(),
                        }),
                    }
                }
            }
            None => outcome.unique_existing.push(label.name.clone()),
        }
    }

    // BTreeMap iteration keeps the creates ascending by name
    for (name, color) in &remaining {
        match store.create_label(name, color).await {
            Ok(()) => outcome.created.push(Label::new(name.clone(), color.clone())),
            Err(e) => outcome.failed.push(CallFailure {
                action: Action::Create,
                name: name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    outcome.unique_existing.sort();
    outcome
}
