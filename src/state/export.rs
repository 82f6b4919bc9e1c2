//! State export/import
//!
//! Serializable snapshots of every question and vote, used by the admin
//! export/import endpoints and by the snapshot file.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::AppState;
use crate::error::PollError;
use crate::store::StoreContents;
use crate::types::*;
use crate::validation::{validate_options, validate_question_text};

/// Schema version for export format compatibility
pub const EXPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] PollError),
}

/// A serializable snapshot of all polls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub schema_version: u32,
    /// Export timestamp (RFC 3339)
    pub exported_at: String,
    pub questions: Vec<Question>,
    /// Votes in recording order
    pub votes: Vec<Vote>,
}

impl PollSnapshot {
    pub fn new(contents: StoreContents) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            questions: contents.questions,
            votes: contents.votes,
        }
    }

    /// Validate the snapshot before import
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.schema_version > EXPORT_SCHEMA_VERSION {
            return Err(SnapshotError::Invalid(format!(
                "schema version {} is newer than supported version {}",
                self.schema_version, EXPORT_SCHEMA_VERSION
            )));
        }

        let mut option_counts: HashMap<&QuestionId, usize> = HashMap::new();
        for question in &self.questions {
            validate_question_text(&question.question)
                .and_then(|_| validate_options(&question.options))
                .map_err(|e| {
                    SnapshotError::Invalid(format!("question '{}': {}", question.id, e))
                })?;

            if option_counts
                .insert(&question.id, question.options.len())
                .is_some()
            {
                return Err(SnapshotError::Invalid(format!(
                    "duplicate question id '{}'",
                    question.id
                )));
            }
        }

        let mut vote_ids = HashSet::new();
        for vote in &self.votes {
            let option_count = option_counts.get(&vote.question_id).ok_or_else(|| {
                SnapshotError::Invalid(format!(
                    "vote '{}' references question '{}' which doesn't exist",
                    vote.id, vote.question_id
                ))
            })?;

            if vote.choice >= *option_count {
                return Err(SnapshotError::Invalid(format!(
                    "vote '{}' has choice {} but question '{}' has {} options",
                    vote.id, vote.choice, vote.question_id, option_count
                )));
            }

            if !vote_ids.insert(&vote.id) {
                return Err(SnapshotError::Invalid(format!(
                    "duplicate vote id '{}'",
                    vote.id
                )));
            }
        }

        Ok(())
    }
}

impl AppState {
    pub async fn export_snapshot(&self) -> Result<PollSnapshot, SnapshotError> {
        let contents = self.store.snapshot().await?;
        Ok(PollSnapshot::new(contents))
    }

    /// Replace all questions and votes with a validated snapshot
    pub async fn import_snapshot(&self, snapshot: PollSnapshot) -> Result<(), SnapshotError> {
        snapshot.validate()?;

        let question_count = snapshot.questions.len();
        let vote_count = snapshot.votes.len();
        self.store
            .restore(StoreContents {
                questions: snapshot.questions,
                votes: snapshot.votes,
            })
            .await?;

        tracing::info!(
            questions = question_count,
            votes = vote_count,
            "Imported snapshot"
        );
        Ok(())
    }
}
