use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{PollStore, StoreContents};
use crate::error::{PollError, PollResult};
use crate::types::{OwnerId, Question, QuestionId, Vote};

/// In-memory store.
///
/// Lock order is always `questions` then `votes`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    questions: Arc<RwLock<HashMap<QuestionId, Question>>>,
    votes: Arc<RwLock<HashMap<QuestionId, Vec<Vote>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn find_questions_by_owner(&self, owner: &OwnerId) -> PollResult<Vec<Question>> {
        let questions = self.questions.read().await;
        let mut owned: Vec<Question> = questions
            .values()
            .filter(|q| q.owner_id == *owner)
            .cloned()
            .collect();
        // Ids are monotonic ULIDs, so id order is creation order
        owned.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(owned)
    }

    async fn find_question_by_id(&self, id: &QuestionId) -> PollResult<Option<Question>> {
        Ok(self.questions.read().await.get(id).cloned())
    }

    async fn create_question(&self, question: Question) -> PollResult<Question> {
        let mut questions = self.questions.write().await;
        if questions.contains_key(&question.id) {
            return Err(PollError::Storage(format!(
                "Question id {} already exists",
                question.id
            )));
        }
        questions.insert(question.id.clone(), question.clone());
        Ok(question)
    }

    async fn delete_question_and_votes(&self, id: &QuestionId) -> PollResult<bool> {
        let mut questions = self.questions.write().await;
        let mut votes = self.votes.write().await;

        let removed = questions.remove(id).is_some();
        votes.remove(id);
        Ok(removed)
    }

    async fn find_votes_by_question(&self, id: &QuestionId) -> PollResult<Vec<Vote>> {
        Ok(self.votes.read().await.get(id).cloned().unwrap_or_default())
    }

    async fn create_vote(&self, vote: Vote) -> PollResult<Vote> {
        // Holding the question read lock keeps a concurrent delete out
        let questions = self.questions.read().await;
        let question = questions
            .get(&vote.question_id)
            .ok_or_else(|| PollError::NotFound(vote.question_id.clone()))?;

        if vote.choice >= question.options.len() {
            return Err(PollError::InvalidIndex {
                index: vote.choice as i64,
                option_count: question.options.len(),
            });
        }

        let mut votes = self.votes.write().await;
        let question_votes = votes.entry(vote.question_id.clone()).or_default();
        if question_votes
            .iter()
            .any(|v| v.voter_token == vote.voter_token)
        {
            return Err(PollError::AlreadyVoted(vote.question_id.clone()));
        }

        question_votes.push(vote.clone());
        Ok(vote)
    }

    async fn snapshot(&self) -> PollResult<StoreContents> {
        let questions = self.questions.read().await;
        let votes = self.votes.read().await;

        let mut question_list: Vec<Question> = questions.values().cloned().collect();
        question_list.sort_by(|a, b| a.id.cmp(&b.id));

        // Keep per-question recording order; group by question id for stable output
        let mut vote_groups: Vec<(&QuestionId, &Vec<Vote>)> = votes.iter().collect();
        vote_groups.sort_by(|a, b| a.0.cmp(b.0));
        let vote_list = vote_groups
            .into_iter()
            .flat_map(|(_, group)| group.iter().cloned())
            .collect();

        Ok(StoreContents {
            questions: question_list,
            votes: vote_list,
        })
    }

    async fn restore(&self, contents: StoreContents) -> PollResult<()> {
        let mut questions = self.questions.write().await;
        let mut votes = self.votes.write().await;

        *questions = contents
            .questions
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect();

        votes.clear();
        for vote in contents.votes {
            votes.entry(vote.question_id.clone()).or_default().push(vote);
        }

        Ok(())
    }
}
