use serde::{Deserialize, Serialize};

use crate::poll::{Phase, Poll, Submission, Timestamp, Vote, MAX_SUBMISSIONS};
use crate::util;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreatePollRequest {
    pub group_id: String,
    pub channel_id: String,
    pub hours: i64,
    #[serde(default)]
    pub render_target: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub candidate: i32,
}

/// Body of an interaction routed by action token.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ActionPayload {
    #[serde(default)]
    pub submission: Option<SubmissionRequest>,
    #[serde(default)]
    pub selection: Option<i32>,
}

/// The user performing a request, already authenticated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub link: Option<String>,
    pub submitted_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PollView {
    pub id: String,
    pub group_id: String,
    pub channel_id: String,
    pub creator_id: String,
    pub phase: Phase,
    pub submission_count: usize,
    pub max_submissions: usize,
    pub vote_count: usize,
    pub end_time: Timestamp,
    pub seconds_remaining: i64,
    pub time_remaining: String,
    pub render_target: Option<String>,
    pub submissions: Vec<SubmissionSummary>,
    pub results: Option<Vec<usize>>,
}

impl PollView {
    pub fn new(poll: &Poll, now: Timestamp) -> PollView {
        let remaining = poll.end_time() - now;
        let results = match poll.phase() {
            Phase::Completed => Some(poll.results()),
            _ => None,
        };
        PollView {
            id: poll.id().to_owned(),
            group_id: poll.group_id().to_owned(),
            channel_id: poll.channel_id().to_owned(),
            creator_id: poll.creator_id().to_owned(),
            phase: poll.phase(),
            submission_count: poll.submissions().len(),
            max_submissions: MAX_SUBMISSIONS,
            vote_count: poll.votes().len(),
            end_time: poll.end_time(),
            seconds_remaining: remaining.num_seconds(),
            time_remaining: util::format_remaining(remaining),
            render_target: poll.render_target().map(str::to_owned),
            submissions: poll.submissions()
                .iter()
                .enumerate()
                .map(|(index, s)| SubmissionSummary::new(index, s))
                .collect(),
            results,
        }
    }
}

impl SubmissionSummary {
    fn new(index: usize, submission: &Submission) -> SubmissionSummary {
        SubmissionSummary {
            index,
            name: submission.name.clone(),
            description: submission.description.clone(),
            link: submission.link.clone(),
            submitted_by: submission.owner_name.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BallotView {
    pub poll_id: String,
    pub owner_id: String,
    pub rankings: Vec<i32>,
    pub voted_at: Option<Timestamp>,
}

impl BallotView {
    pub fn new(poll_id: &str, vote: &Vote) -> BallotView {
        BallotView {
            poll_id: poll_id.to_owned(),
            owner_id: vote.owner_id.clone(),
            rankings: vote.rankings.clone(),
            voted_at: vote.voted_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub place: usize,
    pub index: usize,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub poll_id: String,
    pub phase: Phase,
    pub vote_count: usize,
    pub standings: Vec<Standing>,
}

impl ResultsView {
    pub fn new(poll: &Poll) -> ResultsView {
        let submissions = poll.submissions();
        let standings = poll.results()
            .into_iter()
            .enumerate()
            .filter_map(|(place, index)| submissions.get(index).map(|s| Standing {
                place: place + 1,
                index,
                name: s.name.clone(),
            }))
            .collect();
        ResultsView {
            poll_id: poll.id().to_owned(),
            phase: poll.phase(),
            vote_count: poll.votes().len(),
            standings,
        }
    }
}

/// What the transport should show after a routed interaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "view", rename_all = "snake_case")]
pub enum ActionOutcome {
    Poll(PollView),
    Ballot(BallotView),
    BallotForm(PollView),
    SubmissionForm(PollView),
}
