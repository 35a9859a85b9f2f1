use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::{NudgeId, ResourceId};
use crate::model::resource::ParseEnumError;

/// Why a nudge was raised.
///
/// The detection pass only raises `Abandonment`. `ReviewDue` and `Milestone`
/// are read back from `kind` values other tools write into the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    #[default]
    Abandonment,
    ReviewDue,
    Milestone,
}

impl NudgeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NudgeKind::Abandonment => "abandonment",
            NudgeKind::ReviewDue => "review_due",
            NudgeKind::Milestone => "milestone",
        }
    }
}

impl fmt::Display for NudgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NudgeKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "abandonment" => Ok(Self::Abandonment),
            "review_due" => Ok(Self::ReviewDue),
            "milestone" => Ok(Self::Milestone),
            other => Err(ParseEnumError::new("nudge kind", other)),
        }
    }
}

/// A nudge that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNudge {
    pub resource_id: ResourceId,
    pub kind: NudgeKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewNudge {
    #[must_use]
    pub fn abandonment(
        resource_id: ResourceId,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_id,
            kind: NudgeKind::Abandonment,
            message: message.into(),
            created_at,
        }
    }

    #[must_use]
    pub fn assign_id(self, id: NudgeId) -> Nudge {
        Nudge {
            id,
            resource_id: self.resource_id,
            kind: self.kind,
            message: self.message,
            created_at: self.created_at,
            delivered: false,
            delivered_at: None,
        }
    }
}

/// One-shot coaching message prompting a return to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nudge {
    pub id: NudgeId,
    pub resource_id: ResourceId,
    pub kind: NudgeKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Nudge {
    pub fn mark_delivered(&mut self, at: DateTime<Utc>) {
        if !self.delivered {
            self.delivered = true;
            self.delivered_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn new_nudge_starts_undelivered() {
        let nudge = NewNudge::abandonment(ResourceId::new("a.md"), "come back", fixed_now())
            .assign_id(NudgeId::new(7));
        assert_eq!(nudge.id, NudgeId::new(7));
        assert_eq!(nudge.kind, NudgeKind::Abandonment);
        assert!(!nudge.delivered);
        assert!(nudge.delivered_at.is_none());
    }

    #[test]
    fn mark_delivered_keeps_first_timestamp() {
        let mut nudge = NewNudge::abandonment(ResourceId::new("a.md"), "x", fixed_now())
            .assign_id(NudgeId::new(1));
        nudge.mark_delivered(fixed_now());
        nudge.mark_delivered(fixed_now() + chrono::Duration::hours(1));
        assert_eq!(nudge.delivered_at, Some(fixed_now()));
    }

    #[test]
    fn kind_parses_from_storage_string() {
        assert_eq!("review_due".parse::<NudgeKind>().unwrap(), NudgeKind::ReviewDue);
        assert!("spam".parse::<NudgeKind>().is_err());
    }
}
