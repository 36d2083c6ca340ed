//! Generation-token bookkeeping for out-of-order asynchronous fetches.
//!
//! Every fetch belongs to a [`LogicalKey`] (one chart stream, eg/ `etf_holdings`). Issuing a
//! fetch bumps the key's [`FetchGeneration`] and hands back a [`Ticket`]; a response is only
//! accepted if its ticket still carries the key's current generation when it arrives.

use crate::error::DataError;
use derive_more::{Constructor, Display, From};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{collections::HashMap, future::Future, sync::Arc};
use tracing::{debug, error};

/// Identifier of one fetch/render stream, the scope of staleness.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, From, Deserialize, Serialize,
)]
pub struct LogicalKey(SmolStr);

impl LogicalKey {
    pub fn new<S: AsRef<str>>(key: S) -> Self {
        Self(SmolStr::new(key))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for LogicalKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LogicalKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Monotonically increasing request counter of a [`LogicalKey`].
#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Display,
    From,
    Constructor,
    Deserialize,
    Serialize,
)]
pub struct FetchGeneration(pub u64);

impl FetchGeneration {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Proof of issue for one fetch, returned to [`RequestCoordinator::resolve`] with the response.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
#[display("{key}#{generation}")]
pub struct Ticket {
    pub key: LogicalKey,
    pub generation: FetchGeneration,
}

/// Lifecycle of the latest fetch of a key.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching,
    Delivered,
    /// The current response was discarded because another member of its set was superseded.
    Stale,
    Failed,
}

/// Result of resolving a response against the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// Current response, safe to render.
    Delivered(T),
    /// Superseded response, must be dropped without rendering or surfacing an error.
    Stale,
    /// Current request failed. Previously rendered state must be left as it is.
    Failed(DataError),
}

impl<T> FetchOutcome<T> {
    pub fn map<U, F>(self, op: F) -> FetchOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            FetchOutcome::Delivered(value) => FetchOutcome::Delivered(op(value)),
            FetchOutcome::Stale => FetchOutcome::Stale,
            FetchOutcome::Failed(error) => FetchOutcome::Failed(error),
        }
    }

    pub fn delivered(self) -> Option<T> {
        match self {
            FetchOutcome::Delivered(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, FetchOutcome::Stale)
    }
}

#[derive(Debug, Default)]
struct Stream {
    generation: FetchGeneration,
    state: FetchState,
}

/// Cloneable handle tracking the current generation and [`FetchState`] of every key.
///
/// The lock is only held for bookkeeping, never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct RequestCoordinator {
    streams: Arc<Mutex<HashMap<LogicalKey, Stream>>>,
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new fetch for `key`, superseding any fetch still in flight for it.
    pub fn issue<K: Into<LogicalKey>>(&self, key: K) -> Ticket {
        let key = key.into();
        let mut streams = self.streams.lock();
        let stream = streams.entry(key.clone()).or_default();
        stream.generation = stream.generation.next();
        stream.state = FetchState::Fetching;

        debug!(%key, generation = %stream.generation, "issued fetch");
        Ticket {
            key,
            generation: stream.generation,
        }
    }

    /// Issue one ticket per key, for a set that is combined once every member arrives.
    ///
    /// A key repeated within the set is issued once and its members share that ticket.
    pub fn issue_set<I, K>(&self, keys: I) -> Vec<Ticket>
    where
        I: IntoIterator<Item = K>,
        K: Into<LogicalKey>,
    {
        let mut issued = HashMap::<LogicalKey, Ticket>::new();
        keys.into_iter()
            .map(|key| {
                let key = key.into();
                match issued.get(&key) {
                    Some(ticket) => ticket.clone(),
                    None => {
                        let ticket = self.issue(key.clone());
                        issued.insert(key, ticket.clone());
                        ticket
                    }
                }
            })
            .collect()
    }

    /// Whether `ticket` still carries the current generation of its key.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.streams
            .lock()
            .get(&ticket.key)
            .is_some_and(|stream| stream.generation == ticket.generation)
    }

    /// Resolve a single response against its ticket.
    ///
    /// Staleness is checked before the result, so a superseded failure is dropped like a
    /// superseded success and never changes the key's state.
    pub fn resolve<T>(&self, ticket: &Ticket, result: Result<T, DataError>) -> FetchOutcome<T> {
        let mut streams = self.streams.lock();

        let Some(stream) = streams
            .get_mut(&ticket.key)
            .filter(|stream| stream.generation == ticket.generation)
        else {
            debug!(%ticket, "dropping stale response");
            return FetchOutcome::Stale;
        };

        match result {
            Ok(value) => {
                stream.state = FetchState::Delivered;
                FetchOutcome::Delivered(value)
            }
            Err(error) => {
                stream.state = FetchState::Failed;
                error!(%ticket, %error, "fetch failed");
                FetchOutcome::Failed(error)
            }
        }
    }

    /// Resolve every response of a set issued together.
    ///
    /// The combined value is only delivered when every member is current and succeeded, in
    /// the order given. Any superseded member makes the whole set stale (remaining current
    /// members are marked [`FetchState::Stale`]); otherwise any failure fails the set.
    pub fn resolve_set<T>(&self, responses: Vec<(Ticket, Result<T, DataError>)>) -> FetchOutcome<Vec<T>> {
        let mut streams = self.streams.lock();

        let is_current = |streams: &HashMap<LogicalKey, Stream>, ticket: &Ticket| {
            streams
                .get(&ticket.key)
                .is_some_and(|stream| stream.generation == ticket.generation)
        };

        if let Some((superseded, _)) = responses
            .iter()
            .find(|(ticket, _)| !is_current(&*streams, ticket))
        {
            debug!(%superseded, members = responses.len(), "dropping stale response set");
            for (ticket, _) in &responses {
                if let Some(stream) = streams
                    .get_mut(&ticket.key)
                    .filter(|stream| stream.generation == ticket.generation)
                {
                    stream.state = FetchState::Stale;
                }
            }
            return FetchOutcome::Stale;
        }

        let mut values = Vec::with_capacity(responses.len());
        let mut failure = None;
        for (ticket, result) in responses {
            let Some(stream) = streams.get_mut(&ticket.key) else {
                continue;
            };
            match result {
                Ok(value) => {
                    stream.state = FetchState::Delivered;
                    values.push(value);
                }
                Err(error) => {
                    stream.state = FetchState::Failed;
                    error!(%ticket, %error, "fetch failed");
                    failure.get_or_insert(error);
                }
            }
        }

        match failure {
            Some(error) => FetchOutcome::Failed(error),
            None => FetchOutcome::Delivered(values),
        }
    }

    /// Issue, await and resolve a single fetch.
    pub async fn fetch<K, T, F>(&self, key: K, request: F) -> FetchOutcome<T>
    where
        K: Into<LogicalKey>,
        F: Future<Output = Result<T, DataError>>,
    {
        let ticket = self.issue(key);
        let result = request.await;
        self.resolve(&ticket, result)
    }

    /// Issue every fetch of a set up front, await them concurrently and resolve them as a join.
    pub async fn fetch_all<K, T, F>(&self, requests: Vec<(K, F)>) -> FetchOutcome<Vec<T>>
    where
        K: Into<LogicalKey>,
        F: Future<Output = Result<T, DataError>>,
    {
        let (keys, futures): (Vec<_>, Vec<_>) = requests.into_iter().unzip();
        let tickets = self.issue_set(keys);

        let results = join_all(futures).await;
        self.resolve_set(tickets.into_iter().zip(results).collect())
    }

    /// Current generation of `key`, `None` if it was never fetched.
    pub fn generation(&self, key: &LogicalKey) -> Option<FetchGeneration> {
        self.streams.lock().get(key).map(|stream| stream.generation)
    }

    pub fn state(&self, key: &LogicalKey) -> FetchState {
        self.streams
            .lock()
            .get(key)
            .map(|stream| stream.state)
            .unwrap_or_default()
    }
}
