use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// What a single probe saw: the entity snapshot (if the remote system
/// returned one) and its status label.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T> {
    pub snapshot: Option<T>,
    pub status: String,
}

impl<T> Observation<T> {
    pub fn new(snapshot: T, status: impl Into<String>) -> Self {
        Self {
            snapshot: Some(snapshot),
            status: status.into(),
        }
    }

    /// The entity does not exist. Not an error; the transition table
    /// decides what absence means.
    pub fn absent() -> Self {
        Self {
            snapshot: None,
            status: String::new(),
        }
    }

    /// A status without a snapshot, e.g. a synthetic "NotFound" label.
    pub fn status_only(status: impl Into<String>) -> Self {
        Self {
            snapshot: None,
            status: status.into(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.snapshot.is_none() && self.status.is_empty()
    }
}

/// Fetches the current observable status of an entity.
///
/// Implementations must return `Ok(Observation::absent())` when the entity
/// does not exist and reserve `Err` for genuine faults (network, auth,
/// malformed responses). Consecutive calls may observe stale state.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    type Snapshot: Send;

    async fn probe(&self, id: &str) -> Result<Observation<Self::Snapshot>>;
}

#[async_trait]
impl<P: StatusProbe + ?Sized> StatusProbe for &P {
    type Snapshot = P::Snapshot;

    async fn probe(&self, id: &str) -> Result<Observation<Self::Snapshot>> {
        (**self).probe(id).await
    }
}

/// Closure-backed probe, see [`probe_fn`].
pub struct FnProbe<F, T> {
    f: F,
    _snapshot: PhantomData<fn() -> T>,
}

/// Turns an async closure taking the entity id into a [`StatusProbe`].
pub fn probe_fn<F, Fut, T>(f: F) -> FnProbe<F, T>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>>> + Send,
    T: Send,
{
    FnProbe {
        f,
        _snapshot: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> StatusProbe for FnProbe<F, T>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>>> + Send,
    T: Send,
{
    type Snapshot = T;

    async fn probe(&self, id: &str) -> Result<Observation<T>> {
        (self.f)(id.to_string()).await
    }
}
