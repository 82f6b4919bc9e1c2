use super::AppState;
use crate::error::{PollError, PollResult};
use crate::tally::compute_tally;
use crate::types::*;
use crate::validation::validate_question;

impl AppState {
    /// Create a question owned by the authenticated caller
    pub async fn create_question(
        &self,
        owner: Option<&OwnerId>,
        input: CreateQuestion,
    ) -> PollResult<Question> {
        let owner = owner.ok_or(PollError::Unauthorized)?;
        validate_question(&input)?;

        let question = Question {
            id: self.next_id(),
            question: input.question,
            options: input.options,
            owner_id: owner.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let question = self.store.create_question(question).await?;
        tracing::info!(
            question_id = %question.id,
            options = question.options.len(),
            "Created question"
        );
        Ok(question)
    }

    /// Questions owned by the authenticated caller, newest first
    pub async fn list_questions(&self, owner: Option<&OwnerId>) -> PollResult<Vec<Question>> {
        let owner = owner.ok_or(PollError::Unauthorized)?;
        self.store.find_questions_by_owner(owner).await
    }

    pub async fn get_question(&self, id: &QuestionId) -> PollResult<Option<Question>> {
        self.store.find_question_by_id(id).await
    }

    /// A question with the requester's personalised tally.
    /// Returns None if the question does not exist.
    pub async fn view_question(
        &self,
        id: &QuestionId,
        owner: Option<&OwnerId>,
        voter: &VoterToken,
    ) -> PollResult<Option<QuestionView>> {
        let Some(question) = self.store.find_question_by_id(id).await? else {
            return Ok(None);
        };

        let votes = self.store.find_votes_by_question(id).await?;
        let tally = compute_tally(question.options.len(), &votes, voter)?;
        let is_owner = owner.is_some_and(|o| *o == question.owner_id);

        Ok(Some(QuestionView {
            question,
            is_owner,
            tally,
        }))
    }

    /// Delete a question and its votes. Only the owner may do this.
    pub async fn delete_question(
        &self,
        owner: Option<&OwnerId>,
        id: &QuestionId,
    ) -> PollResult<()> {
        let owner = owner.ok_or(PollError::Unauthorized)?;

        let question = self
            .store
            .find_question_by_id(id)
            .await?
            .ok_or_else(|| PollError::NotFound(id.clone()))?;

        if question.owner_id != *owner {
            tracing::warn!(question_id = %id, "Rejected delete by non-owner");
            return Err(PollError::Unauthorized);
        }

        if !self.store.delete_question_and_votes(id).await? {
            return Err(PollError::NotFound(id.clone()));
        }

        tracing::info!(question_id = %id, "Deleted question");
        Ok(())
    }
}
