//! Rendering job records
//!
//! A rendering request is a JSON manifest stored at
//! `configs/requests/<id>.json`. The renderer updates its `status` in place
//! as the job moves through `queue → rendering → composing → done | error`.
//!
//! The writer stores `settings` as a JSON-encoded string; other producers
//! nest it as an object. Both shapes decode to [`RenderingSettings`].

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use super::content::ContentCategory;
use super::errors::DomainError;
use super::newtypes::lowercase;

// ============================================================================
// RenderingStatus
// ============================================================================

/// Progress state of a remote rendering job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingStatus {
    /// Waiting in the renderer queue
    Queue,
    /// Frames are being rendered
    Rendering,
    /// Frames are being composed into the output
    Composing,
    /// The job failed
    Error,
    /// The output has been written
    Done,
}

impl RenderingStatus {
    /// Returns true for `Done` and `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderingStatus::Done | RenderingStatus::Error)
    }
}

impl fmt::Display for RenderingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderingStatus::Queue => "queue",
            RenderingStatus::Rendering => "rendering",
            RenderingStatus::Composing => "composing",
            RenderingStatus::Error => "error",
            RenderingStatus::Done => "done",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// RenderingKind
// ============================================================================

/// Kind of output a rendering job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderingKind {
    Image,
    Video,
}

impl RenderingKind {
    /// Content category of the produced output
    pub fn category(&self) -> ContentCategory {
        match self {
            RenderingKind::Image => ContentCategory::Image,
            RenderingKind::Video => ContentCategory::Video,
        }
    }

    fn code(&self) -> u8 {
        match self {
            RenderingKind::Image => 0,
            RenderingKind::Video => 1,
        }
    }
}

impl fmt::Display for RenderingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category())
    }
}

impl std::str::FromStr for RenderingKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "0" => Ok(RenderingKind::Image),
            "video" | "1" => Ok(RenderingKind::Video),
            other => Err(DomainError::InvalidSettings(format!(
                "unknown rendering type: {other}"
            ))),
        }
    }
}

// The writer encodes the kind as its integer code.
impl Serialize for RenderingKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for RenderingKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(0) => Ok(RenderingKind::Image),
            Raw::Code(1) => Ok(RenderingKind::Video),
            Raw::Code(other) => Err(de::Error::custom(format!(
                "unknown rendering type code: {other}"
            ))),
            Raw::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

// ============================================================================
// RenderingSettings
// ============================================================================

/// Parameters of a rendering job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderingSettings {
    /// Output kind
    #[serde(rename = "type")]
    pub kind: RenderingKind,
    /// Camera path
    pub flyby: String,
    /// Effect applied to the scene
    pub scene_effect: String,
    /// Effect applied after composition
    pub post_effect: String,
    /// Duration in seconds (videos)
    #[serde(default)]
    pub duration: f64,
    /// First frame to render
    #[serde(default)]
    pub start_frame: u32,
}

impl Default for RenderingSettings {
    fn default() -> Self {
        Self {
            kind: RenderingKind::Image,
            flyby: "circleHorizontal".to_string(),
            scene_effect: "empty".to_string(),
            post_effect: "empty".to_string(),
            duration: 0.0,
            start_frame: 0,
        }
    }
}

impl RenderingSettings {
    /// Encodes the settings as a JSON string, the form stored in manifests
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_string(&self) -> Result<String, DomainError> {
        serde_json::to_string(self).map_err(|e| DomainError::InvalidSettings(e.to_string()))
    }
}

fn settings_from_string_or_object<'de, D>(deserializer: D) -> Result<RenderingSettings, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Encoded(String),
        Object(RenderingSettings),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Encoded(json) => serde_json::from_str(&json).map_err(de::Error::custom),
        Raw::Object(settings) => Ok(settings),
    }
}

fn settings_as_string<S: Serializer>(
    settings: &RenderingSettings,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let json = serde_json::to_string(settings).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&json)
}

// ============================================================================
// RenderingJobRecord
// ============================================================================

/// A rendering request manifest as stored remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderingJobRecord {
    /// Request identifier, also the manifest and output file stem
    pub id: String,
    /// Credential of the requesting user
    pub id_token: String,
    /// Project whose model is rendered
    pub id_model: String,
    /// Current job status
    pub status: RenderingStatus,
    /// Job parameters
    #[serde(
        deserialize_with = "settings_from_string_or_object",
        serialize_with = "settings_as_string"
    )]
    pub settings: RenderingSettings,
}

impl RenderingJobRecord {
    /// A freshly queued request
    pub fn queued(
        id: Uuid,
        model: Uuid,
        id_token: impl Into<String>,
        settings: RenderingSettings,
    ) -> Self {
        Self {
            id: lowercase(id),
            id_token: id_token.into(),
            id_model: lowercase(model),
            status: RenderingStatus::Queue,
            settings,
        }
    }

    /// Placeholder published when the real record cannot be read
    ///
    /// Carries the terminal `Error` status so that every observer of the job
    /// finishes.
    pub fn failed(id: Uuid) -> Self {
        Self {
            id: lowercase(id),
            id_token: String::new(),
            id_model: String::new(),
            status: RenderingStatus::Error,
            settings: RenderingSettings::default(),
        }
    }

    /// Placeholder for a job whose manifest has not been read yet
    pub fn pending(id: Uuid) -> Self {
        Self {
            status: RenderingStatus::Queue,
            ..Self::failed(id)
        }
    }

    /// Returns true once the job is `Done` or `Error`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Parsed request identifier
    pub fn request_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id).ok()
    }

    /// Parsed model identifier
    pub fn model_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id_model).ok()
    }

    /// File name the renderer writes the output under
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.id, self.settings.kind.category().extension())
    }

    /// Decodes a manifest body
    ///
    /// # Errors
    /// Returns error if the body is not a valid manifest
    pub fn from_json(bytes: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(bytes).map_err(|e| DomainError::InvalidSettings(e.to_string()))
    }

    /// Encodes the manifest body
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| DomainError::InvalidSettings(e.to_string()))
    }
}
