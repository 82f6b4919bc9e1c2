use super::AppState;
use crate::error::{PollError, PollResult};
use crate::tally::compute_tally;
use crate::types::*;

impl AppState {
    /// Cast a vote for `choice` on a question.
    ///
    /// One vote per voter token per question: a second attempt fails with
    /// `AlreadyVoted` and leaves the first vote in place.
    pub async fn submit_vote(
        &self,
        question_id: &QuestionId,
        voter: &VoterToken,
        choice: i64,
    ) -> PollResult<VoteReceipt> {
        if voter.is_empty() {
            return Err(PollError::Unauthorized);
        }
        let choice = self.resolve_choice(question_id, choice).await?;

        let vote = Vote {
            id: self.next_id(),
            question_id: question_id.clone(),
            voter_token: voter.clone(),
            choice,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let vote = self.store.create_vote(vote).await?;
        tracing::info!(question_id = %question_id, choice, "Vote recorded");

        let tally = self
            .tally(question_id, voter)
            .await?
            .ok_or_else(|| PollError::NotFound(question_id.clone()))?;

        Ok(VoteReceipt {
            choice: vote.choice,
            tally,
        })
    }

    /// Negative indices can never name an option. The upper bound is checked
    /// by the store together with the duplicate check.
    async fn resolve_choice(&self, question_id: &QuestionId, choice: i64) -> PollResult<usize> {
        if let Ok(index) = usize::try_from(choice) {
            return Ok(index);
        }

        let question = self
            .store
            .find_question_by_id(question_id)
            .await?
            .ok_or_else(|| PollError::NotFound(question_id.clone()))?;
        Err(PollError::InvalidIndex {
            index: choice,
            option_count: question.options.len(),
        })
    }

    /// Tally a question for one requester. None if the question does not exist.
    pub async fn tally(
        &self,
        question_id: &QuestionId,
        voter: &VoterToken,
    ) -> PollResult<Option<Tally>> {
        let Some(question) = self.store.find_question_by_id(question_id).await? else {
            return Ok(None);
        };

        let votes = self.store.find_votes_by_question(question_id).await?;
        compute_tally(question.options.len(), &votes, voter).map(Some)
    }
}
