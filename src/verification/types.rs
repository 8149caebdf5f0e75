// Core types for the stage verification workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::WorkflowError;

/// Supply-chain checkpoint kinds, in their natural custody order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    Harvest,
    Processing,
    Packaging,
    Shipping,
    Delivery,
}

impl StageType {
    pub const ALL: [StageType; 5] = [
        StageType::Harvest,
        StageType::Processing,
        StageType::Packaging,
        StageType::Shipping,
        StageType::Delivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Harvest => "harvest",
            StageType::Processing => "processing",
            StageType::Packaging => "packaging",
            StageType::Shipping => "shipping",
            StageType::Delivery => "delivery",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage type '{0}'")]
pub struct UnknownStageType(pub String);

impl FromStr for StageType {
    type Err = UnknownStageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StageType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| UnknownStageType(s.to_string()))
    }
}

/// Status of one stage instance. Everything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Approved,
    Rejected,
    Flagged,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Approved => "approved",
            StageStatus::Rejected => "rejected",
            StageStatus::Flagged => "flagged",
        };
        f.write_str(s)
    }
}

/// Identifier of the physical batch (lot) being traced
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Batch ids must contain at least one non-whitespace character
    pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(WorkflowError::InvalidBatchId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Repository-assigned stage identifier, opaque to the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stage instance for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStage {
    pub id: StageId,
    pub batch_id: BatchId,
    pub stage_type: StageType,
    pub status: StageStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl VerificationStage {
    pub fn is_pending(&self) -> bool {
        self.status == StageStatus::Pending
    }
}

/// Free text that is guaranteed to contain something besides whitespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notes(String);

impl Notes {
    pub fn new(text: impl Into<String>) -> Result<Self, WorkflowError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(WorkflowError::NotesRequired);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Untyped decision kind, as a caller's button or CLI subcommand would name it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAction {
    Approve,
    Reject,
    Flag,
}

impl StageAction {
    pub fn target_status(&self) -> StageStatus {
        match self {
            StageAction::Approve => StageStatus::Approved,
            StageAction::Reject => StageStatus::Rejected,
            StageAction::Flag => StageStatus::Flagged,
        }
    }
}

/// A validated decision on a pending stage. Reject and Flag cannot exist without notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve(Option<Notes>),
    Reject(Notes),
    Flag(Notes),
}

impl Decision {
    /// Build a decision from an action plus optional free text.
    ///
    /// Blank text counts as absent: fine for `Approve`, `NotesRequired` otherwise.
    pub fn from_action(action: StageAction, notes: Option<String>) -> Result<Self, WorkflowError> {
        let notes = notes.map(Notes::new).and_then(Result::ok);
        match action {
            StageAction::Approve => Ok(Decision::Approve(notes)),
            StageAction::Reject => notes.map(Decision::Reject).ok_or(WorkflowError::NotesRequired),
            StageAction::Flag => notes.map(Decision::Flag).ok_or(WorkflowError::NotesRequired),
        }
    }

    pub fn approve() -> Self {
        Decision::Approve(None)
    }

    pub fn reject(notes: impl Into<String>) -> Result<Self, WorkflowError> {
        Ok(Decision::Reject(Notes::new(notes)?))
    }

    pub fn flag(notes: impl Into<String>) -> Result<Self, WorkflowError> {
        Ok(Decision::Flag(Notes::new(notes)?))
    }

    pub fn action(&self) -> StageAction {
        match self {
            Decision::Approve(_) => StageAction::Approve,
            Decision::Reject(_) => StageAction::Reject,
            Decision::Flag(_) => StageAction::Flag,
        }
    }

    pub fn target_status(&self) -> StageStatus {
        self.action().target_status()
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            Decision::Approve(notes) => notes.as_ref().map(Notes::as_str),
            Decision::Reject(notes) | Decision::Flag(notes) => Some(notes.as_str()),
        }
    }
}

/// Trim free text and drop it entirely when nothing is left
pub(crate) fn normalize_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
