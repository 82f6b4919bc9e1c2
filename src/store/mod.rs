mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;

use crate::error::PollResult;
use crate::types::{OwnerId, Question, QuestionId, Vote};

/// Full contents of a store, used for export/import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreContents {
    pub questions: Vec<Question>,
    /// Votes in recording order
    pub votes: Vec<Vote>,
}

/// Persistence collaborator for questions and votes
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Questions created by `owner`, newest first
    async fn find_questions_by_owner(&self, owner: &OwnerId) -> PollResult<Vec<Question>>;

    async fn find_question_by_id(&self, id: &QuestionId) -> PollResult<Option<Question>>;

    async fn create_question(&self, question: Question) -> PollResult<Question>;

    /// Remove a question together with all of its votes.
    /// Returns false if the question did not exist.
    async fn delete_question_and_votes(&self, id: &QuestionId) -> PollResult<bool>;

    /// Votes for a question in the order they were recorded
    async fn find_votes_by_question(&self, id: &QuestionId) -> PollResult<Vec<Vote>>;

    /// Record a vote.
    ///
    /// Fails with `NotFound` for an unknown question, `InvalidIndex` for a
    /// choice outside the option list and `AlreadyVoted` if the token has
    /// already voted on this question. The check and the insert are atomic.
    async fn create_vote(&self, vote: Vote) -> PollResult<Vote>;

    async fn snapshot(&self) -> PollResult<StoreContents>;

    /// Replace everything in the store
    async fn restore(&self, contents: StoreContents) -> PollResult<()>;
}
