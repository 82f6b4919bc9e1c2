use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type QuestionId = String;
pub type VoteId = String;
pub type OwnerId = String;

/// Anonymous visitor identity carried in the `voter-token` cookie.
///
/// Never tied to an account. Handlers receive it as a request extension set by
/// [`crate::identity::voter_token_middleware`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterToken(String);

impl VoterToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for VoterToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single answer option of a question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOption {
    pub label: String,
}

impl PollOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    /// Fixed at creation; vote choices index into this list
    pub options: Vec<PollOption>,
    pub owner_id: OwnerId,
    /// RFC 3339 timestamp
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub id: VoteId,
    pub question_id: QuestionId,
    pub voter_token: VoterToken,
    /// 0-based index into the question's options
    pub choice: usize,
    pub created_at: String,
}

/// Payload for creating a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestion {
    pub question: String,
    pub options: Vec<PollOption>,
}

/// Payload for casting a vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    /// Signed so a negative index is reported as out of range
    pub choice: i64,
}

/// Per-option counts plus the requester's own choice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub counts: Vec<u32>,
    /// `None` when the requester has not voted
    pub requester_choice: Option<usize>,
    pub total: u32,
}

impl Tally {
    pub fn has_voted(&self) -> bool {
        self.requester_choice.is_some()
    }
}

/// A question as seen by one requester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub question: Question,
    pub is_owner: bool,
    pub tally: Tally,
}

/// Response to a successful vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub choice: usize,
    pub tally: Tally,
}
