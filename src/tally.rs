//! Vote tally engine
//!
//! Pure fold over the votes of one question. Votes are scanned in the order
//! given; when a requester has more than one vote the first one scanned is
//! reported as their choice.

use crate::error::{PollError, PollResult};
use crate::types::{Tally, Vote, VoterToken};

/// Count votes per option and find the requester's own choice.
///
/// Rejects the whole computation with [`PollError::InvalidIndex`] if any vote
/// points past the end of the option list. An empty requester token never
/// matches a vote.
pub fn compute_tally(
    option_count: usize,
    votes: &[Vote],
    requester: &VoterToken,
) -> PollResult<Tally> {
    let mut counts = vec![0u32; option_count];
    let mut requester_choice = None;

    for vote in votes {
        let slot = counts
            .get_mut(vote.choice)
            .ok_or(PollError::InvalidIndex {
                index: vote.choice as i64,
                option_count,
            })?;
        *slot += 1;

        if requester_choice.is_none() && !requester.is_empty() && vote.voter_token == *requester
        {
            requester_choice = Some(vote.choice);
        }
    }

    Ok(Tally {
        counts,
        requester_choice,
        total: votes.len() as u32,
    })
}
