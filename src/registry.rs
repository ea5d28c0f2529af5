use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::sync::Arc;

use itertools::Itertools;
use tokio::sync::{Mutex, RwLock};

use crate::model::CreatePollRequest;
use crate::poll::{Poll, Timestamp, ValidationError};

/// Shared handle to one poll. Every mutation happens under its lock.
pub type PollHandle = Arc<Mutex<Poll>>;

#[derive(Debug)]
pub enum CreatePollError {
    Invalid(ValidationError),
    Conflict(String),
}

impl Display for CreatePollError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CreatePollError::Invalid(e) => write!(f, "{}", e),
            CreatePollError::Conflict(id) => write!(f, "poll {} already exists", id),
        }
    }
}

impl std::error::Error for CreatePollError {}

impl From<ValidationError> for CreatePollError {
    fn from(e: ValidationError) -> Self {
        CreatePollError::Invalid(e)
    }
}

/// All live polls keyed by identity.
///
/// The map lock only guards the map itself; it is released before a caller
/// locks any individual poll.
#[derive(Default)]
pub struct PollRegistry {
    polls: RwLock<HashMap<String, PollHandle>>,
}

impl PollRegistry {
    pub fn new() -> PollRegistry {
        PollRegistry::default()
    }

    pub async fn create(&self, creator_id: &str, request: &CreatePollRequest, now: Timestamp)
    -> Result<PollHandle, CreatePollError> {
        let poll = Poll::new(
            &request.group_id,
            &request.channel_id,
            creator_id,
            request.hours,
            request.render_target.clone(),
            now,
        )?;
        let id = poll.id().to_owned();

        let mut polls = self.polls.write().await;
        if polls.contains_key(&id) {
            return Err(CreatePollError::Conflict(id));
        }
        let handle = Arc::new(Mutex::new(poll));
        polls.insert(id.clone(), handle.clone());
        info!("created poll poll_id={} creator_id={}", id, creator_id);
        Ok(handle)
    }

    pub async fn get(&self, id: &str) -> Option<PollHandle> {
        self.polls.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<PollHandle> {
        self.polls.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.polls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.polls.read().await.is_empty()
    }

    /// Handles to every poll, ordered by identity.
    pub async fn list_all(&self) -> Vec<PollHandle> {
        self.polls.read().await
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(_, handle)| handle.clone())
            .collect()
    }

    /// Point-in-time copy of every poll. Each poll is locked in turn.
    pub async fn snapshot(&self) -> BTreeMap<String, Poll> {
        let mut snapshot = BTreeMap::new();
        for handle in self.list_all().await {
            let poll = handle.lock().await;
            snapshot.insert(poll.id().to_owned(), poll.clone());
        }
        snapshot
    }

    /// Replaces the registry contents, skipping polls that fail their integrity
    /// check. Returns the number of polls now held.
    pub async fn restore(&self, snapshot: BTreeMap<String, Poll>) -> usize {
        let restored: HashMap<String, PollHandle> = snapshot
            .into_iter()
            .filter(|(key, poll)| match poll.check_integrity() {
                Ok(()) => true,
                Err(e) => {
                    warn!("skipping inconsistent poll key={} poll_id={}: {}", key, poll.id(), e);
                    false
                }
            })
            .map(|(key, poll)| {
                if key != poll.id() {
                    warn!("snapshot key {} does not match poll_id={}", key, poll.id());
                }
                (poll.id().to_owned(), Arc::new(Mutex::new(poll)))
            })
            .collect();
        let count = restored.len();
        *self.polls.write().await = restored;
        count
    }

    /// Drops polls whose advisory end time is before `cutoff`, returning their ids.
    pub async fn purge_ended_before(&self, cutoff: Timestamp) -> Vec<String> {
        let mut expired = Vec::new();
        for handle in self.list_all().await {
            let poll = handle.lock().await;
            if poll.ended_before(cutoff) {
                expired.push(poll.id().to_owned());
            }
        }

        if !expired.is_empty() {
            let mut polls = self.polls.write().await;
            for id in &expired {
                polls.remove(id);
            }
        }
        expired
    }
}
