//! Domain newtypes with validation
//!
//! This module provides [`BlobPath`], the strongly-typed key of a remote
//! object, together with the fixed naming conventions of the blob store:
//!
//! ```text
//! models/<id>.glb
//! renders/<category>/<projectId>/<fileName>
//! configs/requests/<requestId>.json
//! ```
//!
//! UUIDs are always rendered in lowercase hyphenated form.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::ContentCategory;
use super::errors::DomainError;

/// Prefix under which project models are stored
pub const MODELS_PREFIX: &str = "models";

/// Prefix under which rendered outputs are stored
pub const RENDERS_PREFIX: &str = "renders";

/// Prefix under which rendering request manifests are stored
pub const REQUESTS_PREFIX: &str = "configs/requests";

// ============================================================================
// BlobPath
// ============================================================================

/// A hierarchical key identifying a remote object
///
/// Blob paths are relative (no leading `/`), contain no empty segments and
/// no `..` traversal. They are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobPath(String);

impl BlobPath {
    /// Create a new BlobPath
    ///
    /// # Errors
    /// Returns error if the path is empty, absolute, or contains empty or
    /// traversal segments
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();

        if path.is_empty() {
            return Err(DomainError::InvalidBlobPath(
                "Blob path must not be empty".to_string(),
            ));
        }

        if path.starts_with('/') {
            return Err(DomainError::InvalidBlobPath(format!(
                "Blob path must be relative: {path}"
            )));
        }

        if path.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(DomainError::InvalidBlobPath(format!(
                "Blob path contains an invalid segment: {path}"
            )));
        }

        Ok(Self(path))
    }

    /// Path of a project's model: `models/<id>.glb`
    #[must_use]
    pub fn model(project: Uuid) -> Self {
        Self(format!(
            "{MODELS_PREFIX}/{}.{}",
            lowercase(project),
            ContentCategory::Model.extension()
        ))
    }

    /// Path of a rendered output: `renders/<category>/<project>/<file_name>`
    ///
    /// # Errors
    /// Returns error if `file_name` is not a single path segment
    pub fn render(
        category: ContentCategory,
        project: Uuid,
        file_name: &str,
    ) -> Result<Self, DomainError> {
        if file_name.is_empty() || file_name.contains('/') || file_name == ".." {
            return Err(DomainError::InvalidBlobPath(format!(
                "Invalid file name component: {file_name}"
            )));
        }

        Self::new(format!("{}/{file_name}", Self::render_prefix(category, project)))
    }

    /// Listing prefix for one project's outputs of one category
    #[must_use]
    pub fn render_prefix(category: ContentCategory, project: Uuid) -> String {
        format!(
            "{RENDERS_PREFIX}/{}/{}",
            category.remote_folder(),
            lowercase(project)
        )
    }

    /// Listing prefix for all outputs of one category
    #[must_use]
    pub fn render_category_prefix(category: ContentCategory) -> String {
        format!("{RENDERS_PREFIX}/{}", category.remote_folder())
    }

    /// Path of a rendering request manifest: `configs/requests/<id>.json`
    #[must_use]
    pub fn request_manifest(request: Uuid) -> Self {
        Self(format!("{REQUESTS_PREFIX}/{}.json", lowercase(request)))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the last path segment
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Get the last path segment without its extension
    #[must_use]
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// Parse the file stem as a UUID (request ids, project ids)
    #[must_use]
    pub fn stem_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(self.file_stem()).ok()
    }

    /// Get the parent path, if any
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Returns true if this path lies under `prefix`
    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        prefix.is_empty()
            || self.0 == prefix
            || (self.0.starts_with(prefix) && self.0[prefix.len()..].starts_with('/'))
    }
}

/// Lowercase hyphenated representation used in every blob path
#[must_use]
pub fn lowercase(id: Uuid) -> String {
    id.as_hyphenated().to_string()
}

impl Display for BlobPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlobPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BlobPath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BlobPath> for String {
    fn from(path: BlobPath) -> Self {
        path.0
    }
}
