use std::convert::TryFrom;
use std::fmt::{self, Display};

use chrono::{DateTime, Duration, offset::Utc};
use serde::{Deserialize, Serialize};

use crate::{tally, util};

pub type Timestamp = DateTime<Utc>;

pub const MAX_SUBMISSIONS: usize = 20;
/// Marks a ballot slot the voter has not chosen yet.
pub const UNSET: i32 = -1;
pub const MIN_HOURS: i64 = 1;
pub const MAX_HOURS: i64 = 168;
/// Reserved as the action token field separator, so never part of a poll id.
pub const ID_FORBIDDEN: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    Submission,
    Voting,
    Completed,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Submission => "submission",
            Phase::Voting => "voting",
            Phase::Completed => "completed",
        };
        write!(f, "{}", name)
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> u8 {
        match phase {
            Phase::Submission => 0,
            Phase::Voting => 1,
            Phase::Completed => 2,
        }
    }
}

#[derive(Debug)]
pub struct UnknownPhase(u8);

impl Display for UnknownPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown poll phase ordinal {}", self.0)
    }
}

impl TryFrom<u8> for Phase {
    type Error = UnknownPhase;

    fn try_from(ordinal: u8) -> Result<Phase, UnknownPhase> {
        match ordinal {
            0 => Ok(Phase::Submission),
            1 => Ok(Phase::Voting),
            2 => Ok(Phase::Completed),
            other => Err(UnknownPhase(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(alias = "user_id")]
    pub owner_id: String,
    #[serde(alias = "username")]
    pub owner_name: String,
    #[serde(alias = "game_name")]
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub submitted_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(alias = "user_id")]
    pub owner_id: String,
    /// Candidate indices, most preferred first.
    pub rankings: Vec<i32>,
    /// Set when the ballot is finalized, cleared again by any later slot change.
    pub voted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    WrongPhase { expected: Phase, actual: Phase },
    NotCreator,
    NoSubmissions,
    SubmissionsFull,
    InvalidDuration(i64),
    InvalidGroupId(String),
    NoVote,
    DuplicateVoter(String),
    RankOutOfRange(usize),
    IncompleteRanking { expected: usize, actual: usize },
    InvalidCandidate(i32),
    DuplicateRanking(i32),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationError::WrongPhase { expected, actual } =>
                write!(f, "poll is in the {} phase, not the {} phase", actual, expected),
            ValidationError::NotCreator => write!(f, "only the poll creator can do that"),
            ValidationError::NoSubmissions => write!(f, "poll has no submissions"),
            ValidationError::SubmissionsFull =>
                write!(f, "maximum number of submissions ({}) has been reached", MAX_SUBMISSIONS),
            ValidationError::InvalidDuration(hours) =>
                write!(f, "poll duration must be {}-{} hours, got {}", MIN_HOURS, MAX_HOURS, hours),
            ValidationError::InvalidGroupId(group_id) =>
                write!(f, "group id must be non-empty and must not contain '{}': {:?}", ID_FORBIDDEN, group_id),
            ValidationError::NoVote => write!(f, "no ballot in progress"),
            ValidationError::DuplicateVoter(user_id) => write!(f, "user {} has more than one ballot", user_id),
            ValidationError::RankOutOfRange(rank) => write!(f, "no choice number {}", rank + 1),
            ValidationError::IncompleteRanking { expected, .. } =>
                write!(f, "must rank all {} submissions", expected),
            ValidationError::InvalidCandidate(index) => write!(f, "invalid ranking index: {}", index),
            ValidationError::DuplicateRanking(index) =>
                write!(f, "submission {} is ranked more than once", index + 1),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A ranked-choice poll moving forward through submission, voting and completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    id: String,
    #[serde(alias = "guild_id")]
    group_id: String,
    channel_id: String,
    creator_id: String,
    phase: Phase,
    submissions: Vec<Submission>,
    votes: Vec<Vote>,
    #[serde(alias = "submission_end_time")]
    end_time: Timestamp,
    created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    render_target: Option<String>,
}

impl Poll {
    pub fn new(
        group_id: &str,
        channel_id: &str,
        creator_id: &str,
        hours: i64,
        render_target: Option<String>,
        now: Timestamp,
    ) -> Result<Poll, ValidationError> {
        if hours < MIN_HOURS || hours > MAX_HOURS {
            return Err(ValidationError::InvalidDuration(hours));
        }
        if group_id.is_empty() || group_id.contains(ID_FORBIDDEN) {
            return Err(ValidationError::InvalidGroupId(group_id.to_owned()));
        }
        Ok(Poll {
            id: format!("{}-{}", group_id, now.timestamp()),
            group_id: group_id.to_owned(),
            channel_id: channel_id.to_owned(),
            creator_id: creator_id.to_owned(),
            phase: Phase::Submission,
            submissions: Vec::new(),
            votes: Vec::new(),
            end_time: now + Duration::hours(hours),
            created_at: now,
            render_target,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Where the transport renders this poll. Never interpreted here.
    pub fn render_target(&self) -> Option<&str> {
        self.render_target.as_deref()
    }

    pub fn ballot(&self, user_id: &str) -> Option<&Vote> {
        self.votes.iter().find(|v| v.owner_id == user_id)
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), ValidationError> {
        if self.phase != expected {
            return Err(ValidationError::WrongPhase { expected, actual: self.phase });
        }
        Ok(())
    }

    fn expect_creator(&self, actor_id: &str) -> Result<(), ValidationError> {
        if actor_id != self.creator_id {
            return Err(ValidationError::NotCreator);
        }
        Ok(())
    }

    /// Whether a new submission would currently be accepted.
    pub fn check_can_submit(&self) -> Result<(), ValidationError> {
        self.expect_phase(Phase::Submission)?;
        if self.submissions.len() >= MAX_SUBMISSIONS {
            return Err(ValidationError::SubmissionsFull);
        }
        Ok(())
    }

    /// Whether a ballot can currently be filled in.
    pub fn check_can_vote(&self) -> Result<(), ValidationError> {
        self.expect_phase(Phase::Voting)?;
        if self.submissions.is_empty() {
            return Err(ValidationError::NoSubmissions);
        }
        Ok(())
    }

    pub fn add_submission(&mut self, submission: Submission) -> Result<(), ValidationError> {
        self.check_can_submit()?;
        self.submissions.push(submission);
        Ok(())
    }

    /// Sets one slot of the user's ballot, creating the ballot on first use.
    ///
    /// Content is not validated until [`Poll::finalize_vote`].
    pub fn upsert_vote(&mut self, user_id: &str, rank: usize, candidate: i32) -> Result<&Vote, ValidationError> {
        self.check_can_vote()?;
        if rank >= self.submissions.len() {
            return Err(ValidationError::RankOutOfRange(rank));
        }

        let position = match self.votes.iter().position(|v| v.owner_id == user_id) {
            Some(position) => position,
            None => {
                self.votes.push(Vote {
                    owner_id: user_id.to_owned(),
                    rankings: vec![UNSET; self.submissions.len()],
                    voted_at: None,
                });
                self.votes.len() - 1
            }
        };

        let vote = &mut self.votes[position];
        let slot = vote.rankings
            .get_mut(rank)
            .ok_or(ValidationError::RankOutOfRange(rank))?;
        *slot = candidate;
        vote.voted_at = None;
        Ok(vote)
    }

    pub fn finalize_vote(&mut self, user_id: &str, now: Timestamp) -> Result<&Vote, ValidationError> {
        self.expect_phase(Phase::Voting)?;
        let candidates = self.submissions.len();
        let vote = self.votes
            .iter_mut()
            .find(|v| v.owner_id == user_id)
            .ok_or(ValidationError::NoVote)?;

        check_ranking(&vote.rankings, candidates)?;
        vote.voted_at = Some(now);
        Ok(vote)
    }

    pub fn lock(&mut self, actor_id: &str) -> Result<(), ValidationError> {
        self.expect_creator(actor_id)?;
        self.expect_phase(Phase::Submission)?;
        if self.submissions.is_empty() {
            return Err(ValidationError::NoSubmissions);
        }
        info!("transitioning poll to voting phase poll_id={}", self.id);
        self.phase = Phase::Voting;
        Ok(())
    }

    pub fn end(&mut self, actor_id: &str) -> Result<(), ValidationError> {
        self.expect_creator(actor_id)?;
        self.expect_phase(Phase::Voting)?;
        info!("completing poll poll_id={} votes={}", self.id, self.votes.len());
        self.phase = Phase::Completed;
        Ok(())
    }

    /// Full standings, winner first, as submission indices.
    pub fn results(&self) -> Vec<usize> {
        let ballots: Vec<&[i32]> = self.votes.iter().map(|v| v.rankings.as_slice()).collect();
        tally::instant_runoff(self.submissions.len(), &ballots)
    }

    /// Checks the invariants a restored poll must already satisfy: submission
    /// capacity, one ballot per user, ballots sized to the submission count and
    /// finalized ballots holding a valid ranking.
    pub fn check_integrity(&self) -> Result<(), ValidationError> {
        let candidates = self.submissions.len();
        if candidates > MAX_SUBMISSIONS {
            return Err(ValidationError::SubmissionsFull);
        }
        if let Some(owner) = util::first_duplicate(self.votes.iter().map(|v| v.owner_id.as_str())) {
            return Err(ValidationError::DuplicateVoter(owner.to_owned()));
        }
        for vote in &self.votes {
            match vote.voted_at {
                Some(_) => check_ranking(&vote.rankings, candidates)?,
                None if vote.rankings.len() != candidates => {
                    return Err(ValidationError::IncompleteRanking {
                        expected: candidates,
                        actual: vote.rankings.len(),
                    });
                }
                None => (),
            }
        }
        Ok(())
    }

    /// True when the advisory end time lies before `cutoff`.
    pub fn ended_before(&self, cutoff: Timestamp) -> bool {
        self.end_time < cutoff
    }
}

/// A complete ranking names every candidate exactly once.
fn check_ranking(rankings: &[i32], candidates: usize) -> Result<(), ValidationError> {
    if rankings.len() != candidates {
        return Err(ValidationError::IncompleteRanking {
            expected: candidates,
            actual: rankings.len(),
        });
    }
    if let Some(&invalid) = rankings.iter().find(|&&r| r < 0 || r as usize >= candidates) {
        return Err(ValidationError::InvalidCandidate(invalid));
    }
    if let Some(duplicate) = util::first_duplicate(rankings.iter().copied()) {
        return Err(ValidationError::DuplicateRanking(duplicate));
    }
    Ok(())
}
