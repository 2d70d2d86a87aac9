//! Audit records describing each committed mutation.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntityKind {
    Credit,
    Budget,
    Refund,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Credit => "Credit",
            EntityKind::Budget => "Budget",
            EntityKind::Refund => "Refund",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Created => "created",
            ActionKind::Updated => "updated",
            ActionKind::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub previous: Option<String>,
    pub current: Option<String>,
}

impl FieldChange {
    pub fn describe(&self) -> String {
        match (&self.previous, &self.current) {
            (None, Some(current)) => format!("{} set to \"{}\"", self.field, current),
            (Some(previous), Some(current)) => format!(
                "{} changed from \"{}\" to \"{}\"",
                self.field, previous, current
            ),
            (Some(previous), None) => format!("{} cleared (was \"{}\")", self.field, previous),
            (None, None) => format!("{} unchanged", self.field),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRecord {
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub action: ActionKind,
    pub actor: String,
    pub changes: Vec<FieldChange>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Human-readable diff, one clause per changed field.
    pub fn summary(&self) -> String {
        if self.changes.is_empty() {
            return format!("{} {}", self.entity, self.action);
        }
        let clauses: Vec<String> = self.changes.iter().map(FieldChange::describe).collect();
        clauses.join(", ")
    }
}

/// Collects field diffs between the committed and the candidate entity.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `field` when the values differ. A missing `previous` means the
    /// entity is new.
    pub fn track<T: PartialEq + Display>(&mut self, field: &str, previous: Option<&T>, current: &T) {
        if previous == Some(current) {
            return;
        }
        self.changes.push(FieldChange {
            field: field.to_string(),
            previous: previous.map(ToString::to_string),
            current: Some(current.to_string()),
        });
    }

    pub fn track_opt<T: PartialEq + Display>(
        &mut self,
        field: &str,
        previous: Option<&Option<T>>,
        current: &Option<T>,
    ) {
        let previous_inner = previous.and_then(Option::as_ref);
        if previous.is_some() && previous_inner == current.as_ref() {
            return;
        }
        if previous.is_none() && current.is_none() {
            return;
        }
        self.changes.push(FieldChange {
            field: field.to_string(),
            previous: previous_inner.map(ToString::to_string),
            current: current.as_ref().map(ToString::to_string),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_record(
        self,
        entity: EntityKind,
        entity_id: Uuid,
        action: ActionKind,
        actor: &str,
        recorded_at: DateTime<Utc>,
    ) -> AuditRecord {
        AuditRecord {
            entity,
            entity_id,
            action,
            actor: actor.to_string(),
            changes: self.changes,
            recorded_at,
        }
    }
}
