use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a learning resource: its vault-relative note path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a new `ResourceId`
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the underlying path
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Title derived from the path: last segment without the `.md` extension.
    #[must_use]
    pub fn title_hint(&self) -> &str {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        name.strip_suffix(".md").unwrap_or(name)
    }
}

/// Unique identifier for a Nudge
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NudgeId(u64);

impl NudgeId {
    /// Creates a new `NudgeId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for a quiz session
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizSessionId(Uuid);

impl QuizSessionId {
    /// Generates a fresh random session id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

impl fmt::Debug for NudgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NudgeId({})", self.0)
    }
}

impl fmt::Debug for QuizSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuizSessionId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for NudgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QuizSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ResourceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "ResourceId".to_string(),
            });
        }
        Ok(ResourceId::new(trimmed))
    }
}

impl FromStr for NudgeId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(NudgeId::new)
            .map_err(|_| ParseIdError {
                kind: "NudgeId".to_string(),
            })
    }
}

impl FromStr for QuizSessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(QuizSessionId)
            .map_err(|_| ParseIdError {
                kind: "QuizSessionId".to_string(),
            })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_title_hint() {
        let id = ResourceId::new("04_resources/designing-data-apps.md");
        assert_eq!(id.title_hint(), "designing-data-apps");

        let bare = ResourceId::new("notes");
        assert_eq!(bare.title_hint(), "notes");
    }

    #[test]
    fn test_resource_id_from_str_rejects_blank() {
        assert!("   ".parse::<ResourceId>().is_err());
        let id: ResourceId = " 04_resources/a.md ".parse().unwrap();
        assert_eq!(id.as_str(), "04_resources/a.md");
    }

    #[test]
    fn test_nudge_id_display() {
        let id = NudgeId::new(42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_nudge_id_from_str_invalid() {
        let result = "not-a-number".parse::<NudgeId>();
        assert!(result.is_err());
    }

    #[test]
    fn test_quiz_session_id_roundtrip() {
        let original = QuizSessionId::generate();
        let parsed: QuizSessionId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }
}
