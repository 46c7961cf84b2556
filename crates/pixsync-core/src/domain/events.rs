//! Project notifications
//!
//! Published by the orchestration layer whenever the set of projects or the
//! content of a project changes, so presentation code can refresh without
//! polling.

use serde::Serialize;
use uuid::Uuid;

use super::content::ContentCategory;

/// A change to the set of projects or to one project's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProjectEvent {
    /// A project appeared in the local catalog
    Added { project: Uuid },
    /// A project was removed locally and remotely
    Removed { project: Uuid },
    /// New files landed in one content folder of a project
    ContentChanged {
        project: Uuid,
        category: ContentCategory,
        files: Vec<String>,
    },
}

impl ProjectEvent {
    /// Project the event refers to
    pub fn project(&self) -> Uuid {
        match self {
            ProjectEvent::Added { project }
            | ProjectEvent::Removed { project }
            | ProjectEvent::ContentChanged { project, .. } => *project,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_event_tag() {
        let event = ProjectEvent::ContentChanged {
            project: Uuid::nil(),
            category: ContentCategory::Image,
            files: vec!["a.png".into()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "content_changed");
        assert_eq!(json["category"], "image");
        assert_eq!(event.project(), Uuid::nil());
    }
}
