//! Content items and categories
//!
//! A project is one 3D model plus the images and videos rendered from it.
//! [`ContentCategory`] names those three kinds of content and knows where
//! each lives remotely and locally.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ContentCategory
// ============================================================================

/// Logical category of a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    /// A project's 3D model
    Model,
    /// A rendered still image
    Image,
    /// A rendered video
    Video,
}

impl ContentCategory {
    /// The categories produced by the renderer, in a fixed order
    pub const fn render_categories() -> [ContentCategory; 2] {
        [ContentCategory::Image, ContentCategory::Video]
    }

    /// Returns true for images and videos
    pub fn is_render(&self) -> bool {
        !matches!(self, ContentCategory::Model)
    }

    /// Folder name used in blob paths
    pub fn remote_folder(&self) -> &'static str {
        match self {
            ContentCategory::Model => "models",
            ContentCategory::Image => "images",
            ContentCategory::Video => "videos",
        }
    }

    /// Folder name used inside a local project directory
    pub fn local_folder(&self) -> &'static str {
        match self {
            ContentCategory::Model => "",
            ContentCategory::Image => "Images",
            ContentCategory::Video => "Videos",
        }
    }

    /// Default file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ContentCategory::Model => "glb",
            ContentCategory::Image => "png",
            ContentCategory::Video => "mp4",
        }
    }

    /// Look up a render category by its remote folder name
    pub fn from_remote_folder(folder: &str) -> Option<Self> {
        Self::render_categories()
            .into_iter()
            .find(|category| category.remote_folder() == folder)
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentCategory::Model => write!(f, "model"),
            ContentCategory::Image => write!(f, "image"),
            ContentCategory::Video => write!(f, "video"),
        }
    }
}

// ============================================================================
// ContentItem
// ============================================================================

/// A catalog entry: one project or one piece of project content
///
/// The engine never mutates a `ContentItem`; it reads it by identifier from
/// the catalog and uses `local_path` as the source or destination of a
/// transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable identifier, also used to derive blob paths
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Where the content lives on the local filesystem
    pub local_path: PathBuf,
    /// Logical category
    pub category: ContentCategory,
}

impl ContentItem {
    /// Creates a new model item
    pub fn model(id: Uuid, name: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: name.into(),
            local_path: local_path.into(),
            category: ContentCategory::Model,
        }
    }
}

// ============================================================================
// LocalFile
// ============================================================================

/// A file observed in local storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    /// File name (last path component)
    pub name: String,
    /// Full path on disk
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

impl LocalFile {
    /// Zero-byte files stand in for content that exists only remotely
    pub fn is_placeholder(&self) -> bool {
        self.size == 0
    }
}
