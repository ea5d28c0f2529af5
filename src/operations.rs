use std::fmt::{self, Display};
use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::model::*;
use crate::poll::{Submission, ValidationError};
use crate::registry::{CreatePollError, PollHandle, PollRegistry};
use crate::store::{log_persistence_error, PollStore};
use crate::token::{ActionKind, ActionToken};

#[cfg(test)]
use mockall::automock;

#[derive(Debug)]
pub enum OperationError {
    PollNotFound(String),
    Conflict(String),
    Invalid(ValidationError),
    MissingPayload(ActionKind),
}

impl Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperationError::PollNotFound(_) => write!(f, "Poll not found or has expired."),
            OperationError::Conflict(id) => write!(f, "poll {} already exists", id),
            OperationError::Invalid(e) => write!(f, "{}", e),
            OperationError::MissingPayload(kind) => write!(f, "{} action is missing its payload", kind),
        }
    }
}

impl std::error::Error for OperationError {}

impl From<ValidationError> for OperationError {
    fn from(e: ValidationError) -> Self {
        OperationError::Invalid(e)
    }
}

impl From<CreatePollError> for OperationError {
    fn from(e: CreatePollError) -> Self {
        match e {
            CreatePollError::Invalid(e) => OperationError::Invalid(e),
            CreatePollError::Conflict(id) => OperationError::Conflict(id),
        }
    }
}

/// A routed interaction, resolved from its token and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SubmitModal(SubmissionRequest),
    VoteSelect { rank: usize, candidate: i32 },
    VoteSubmit,
    Lock,
    End,
    /// Open the ballot form.
    Vote,
    /// Open the submission form.
    Submit,
}

impl Action {
    pub fn resolve(token: &ActionToken, payload: ActionPayload) -> Result<Action, OperationError> {
        let action = match token.kind {
            ActionKind::SubmitModal => Action::SubmitModal(
                payload.submission.ok_or(OperationError::MissingPayload(token.kind))?
            ),
            ActionKind::VoteSelect => Action::VoteSelect {
                rank: token.rank,
                candidate: payload.selection.ok_or(OperationError::MissingPayload(token.kind))?,
            },
            ActionKind::VoteSubmit => Action::VoteSubmit,
            ActionKind::Lock => Action::Lock,
            ActionKind::End => Action::End,
            ActionKind::Vote => Action::Vote,
            ActionKind::Submit => Action::Submit,
        };
        Ok(action)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PollOperationsT: Send + Sync {
    async fn create_poll(&self, actor: &Actor, request: &CreatePollRequest) -> Result<PollView, OperationError>;
    async fn get_poll(&self, poll_id: &str) -> Result<PollView, OperationError>;
    async fn remove_poll(&self, actor: &Actor, poll_id: &str) -> Result<(), OperationError>;
    async fn add_submission(&self, actor: &Actor, poll_id: &str, request: &SubmissionRequest)
        -> Result<PollView, OperationError>;
    async fn upsert_vote(&self, actor: &Actor, poll_id: &str, rank: usize, candidate: i32)
        -> Result<BallotView, OperationError>;
    async fn finalize_vote(&self, actor: &Actor, poll_id: &str) -> Result<BallotView, OperationError>;
    async fn lock(&self, actor: &Actor, poll_id: &str) -> Result<PollView, OperationError>;
    async fn end(&self, actor: &Actor, poll_id: &str) -> Result<PollView, OperationError>;
    async fn results(&self, poll_id: &str) -> Result<ResultsView, OperationError>;
    async fn dispatch(&self, actor: &Actor, poll_id: &str, action: Action) -> Result<ActionOutcome, OperationError>;
}

/// Runs each operation against one poll under that poll's lock, then saves.
#[derive(Clone)]
pub struct PollOperations {
    registry: Arc<PollRegistry>,
    store: Arc<PollStore>,
    clock: Arc<dyn Clock>,
}

impl PollOperations {
    pub fn new(registry: Arc<PollRegistry>, store: Arc<PollStore>, clock: Arc<dyn Clock>) -> PollOperations {
        PollOperations {
            registry,
            store,
            clock,
        }
    }

    async fn poll(&self, poll_id: &str) -> Result<PollHandle, OperationError> {
        self.registry.get(poll_id)
            .await
            .ok_or_else(|| {
                warn!("failed to find poll poll_id={}", poll_id);
                OperationError::PollNotFound(poll_id.to_owned())
            })
    }

    /// Save failures never fail the operation; memory stays authoritative.
    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.registry).await {
            log_persistence_error(&e);
        }
    }
}

#[async_trait]
impl PollOperationsT for PollOperations {
    async fn create_poll(&self, actor: &Actor, request: &CreatePollRequest) -> Result<PollView, OperationError> {
        let now = self.clock.now();
        let handle = self.registry.create(&actor.id, request, now).await?;
        let view = PollView::new(&*handle.lock().await, now);
        self.persist().await;
        Ok(view)
    }

    async fn get_poll(&self, poll_id: &str) -> Result<PollView, OperationError> {
        let handle = self.poll(poll_id).await?;
        let poll = handle.lock().await;
        Ok(PollView::new(&poll, self.clock.now()))
    }

    async fn remove_poll(&self, actor: &Actor, poll_id: &str) -> Result<(), OperationError> {
        let handle = self.poll(poll_id).await?;
        if handle.lock().await.creator_id() != actor.id {
            return Err(ValidationError::NotCreator.into());
        }
        self.registry.remove(poll_id).await;
        info!("removed poll poll_id={}", poll_id);
        self.persist().await;
        Ok(())
    }

    async fn add_submission(&self, actor: &Actor, poll_id: &str, request: &SubmissionRequest)
    -> Result<PollView, OperationError> {
        let handle = self.poll(poll_id).await?;
        let now = self.clock.now();
        let view = {
            let mut poll = handle.lock().await;
            poll.add_submission(Submission {
                owner_id: actor.id.clone(),
                owner_name: actor.display_name.clone(),
                name: request.name.clone(),
                description: request.description.clone(),
                link: request.link.clone().filter(|l| !l.is_empty()),
                submitted_at: now,
            })?;
            info!("added submission poll_id={} user_id={} count={}", poll_id, actor.id, poll.submissions().len());
            PollView::new(&poll, now)
        };
        self.persist().await;
        Ok(view)
    }

    async fn upsert_vote(&self, actor: &Actor, poll_id: &str, rank: usize, candidate: i32)
    -> Result<BallotView, OperationError> {
        let handle = self.poll(poll_id).await?;
        let ballot = {
            let mut poll = handle.lock().await;
            let vote = poll.upsert_vote(&actor.id, rank, candidate)?;
            debug!("user selected candidate poll_id={} user_id={} rank_pos={} candidate={}",
                poll_id, actor.id, rank, candidate);
            BallotView::new(poll_id, vote)
        };
        self.persist().await;
        Ok(ballot)
    }

    async fn finalize_vote(&self, actor: &Actor, poll_id: &str) -> Result<BallotView, OperationError> {
        let handle = self.poll(poll_id).await?;
        let ballot = {
            let mut poll = handle.lock().await;
            let vote = poll.finalize_vote(&actor.id, self.clock.now())?;
            info!("vote recorded poll_id={} user_id={}", poll_id, actor.id);
            BallotView::new(poll_id, vote)
        };
        self.persist().await;
        Ok(ballot)
    }

    async fn lock(&self, actor: &Actor, poll_id: &str) -> Result<PollView, OperationError> {
        let handle = self.poll(poll_id).await?;
        let view = {
            let mut poll = handle.lock().await;
            poll.lock(&actor.id)?;
            PollView::new(&poll, self.clock.now())
        };
        self.persist().await;
        Ok(view)
    }

    async fn end(&self, actor: &Actor, poll_id: &str) -> Result<PollView, OperationError> {
        let handle = self.poll(poll_id).await?;
        let view = {
            let mut poll = handle.lock().await;
            poll.end(&actor.id)?;
            PollView::new(&poll, self.clock.now())
        };
        self.persist().await;
        Ok(view)
    }

    async fn results(&self, poll_id: &str) -> Result<ResultsView, OperationError> {
        let handle = self.poll(poll_id).await?;
        let poll = handle.lock().await;
        Ok(ResultsView::new(&poll))
    }

    async fn dispatch(&self, actor: &Actor, poll_id: &str, action: Action) -> Result<ActionOutcome, OperationError> {
        info!("processing poll action poll_id={} user_id={} action={:?}", poll_id, actor.id, action);
        match action {
            Action::SubmitModal(request) =>
                self.add_submission(actor, poll_id, &request).await.map(ActionOutcome::Poll),
            Action::VoteSelect { rank, candidate } =>
                self.upsert_vote(actor, poll_id, rank, candidate).await.map(ActionOutcome::Ballot),
            Action::VoteSubmit =>
                self.finalize_vote(actor, poll_id).await.map(ActionOutcome::Ballot),
            Action::Lock => self.lock(actor, poll_id).await.map(ActionOutcome::Poll),
            Action::End => self.end(actor, poll_id).await.map(ActionOutcome::Poll),
            Action::Vote => {
                let handle = self.poll(poll_id).await?;
                let poll = handle.lock().await;
                poll.check_can_vote()?;
                Ok(ActionOutcome::BallotForm(PollView::new(&poll, self.clock.now())))
            }
            Action::Submit => {
                let handle = self.poll(poll_id).await?;
                let poll = handle.lock().await;
                poll.check_can_submit()?;
                Ok(ActionOutcome::SubmissionForm(PollView::new(&poll, self.clock.now())))
            }
        }
    }
}
