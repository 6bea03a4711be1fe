//! One-call-site orchestration of an optimistic mutation.
//!
//! [`Mutation::mutate`] runs, in order: take the rollback registered with
//! [`Mutation::set_rollback`], `on_mutate`, the mutation itself, then either
//! `on_success` or (rollback, `on_error`), and finally `on_settled`. A failure
//! is always handed back to the caller after the local state is restored.

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type MutationFn<I, O, E> = Box<dyn Fn(I) -> BoxFuture<'static, Result<O, E>> + Send + Sync>;
type Rollback = Box<dyn FnOnce() + Send>;

/// A reusable mutation with lifecycle callbacks.
pub struct Mutation<I, O, E> {
    mutation_fn: MutationFn<I, O, E>,
    on_mutate: Option<Box<dyn Fn(&I) + Send + Sync>>,
    on_success: Option<Box<dyn Fn(&O, &I) + Send + Sync>>,
    on_error: Option<Box<dyn Fn(&E, &I) + Send + Sync>>,
    on_settled: Option<Box<dyn Fn(Option<&O>, Option<&E>, &I) + Send + Sync>>,
    rollback: StdMutex<Option<Rollback>>,
    in_flight: AtomicUsize,
}

impl<I, O, E> Mutation<I, O, E>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    /// Wrap an async mutation function.
    pub fn new<F, Fut>(mutation_fn: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        Self {
            mutation_fn: Box::new(move |input| mutation_fn(input).boxed()),
            on_mutate: None,
            on_success: None,
            on_error: None,
            on_settled: None,
            rollback: StdMutex::new(None),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Called before the mutation runs, to apply the optimistic change.
    pub fn on_mutate(mut self, f: impl Fn(&I) + Send + Sync + 'static) -> Self {
        self.on_mutate = Some(Box::new(f));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&O, &I) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called after the rollback when the mutation fails.
    pub fn on_error(mut self, f: impl Fn(&E, &I) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called last, whatever the outcome.
    pub fn on_settled(
        mut self,
        f: impl Fn(Option<&O>, Option<&E>, &I) + Send + Sync + 'static,
    ) -> Self {
        self.on_settled = Some(Box::new(f));
        self
    }

    /// Register how to undo the next mutation's optimistic change.
    ///
    /// The closure is consumed by the next [`mutate`](Self::mutate) call,
    /// and only runs if that call fails.
    pub fn set_rollback(&self, f: impl FnOnce() + Send + 'static) {
        *self.rollback.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(f));
    }

    /// Whether any call to [`mutate`](Self::mutate) is in flight.
    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Run the mutation.
    pub async fn mutate(&self, input: I) -> Result<O, E> {
        let rollback = self
            .rollback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let _in_flight = InFlight::enter(&self.in_flight);

        if let Some(on_mutate) = &self.on_mutate {
            on_mutate(&input);
        }

        let result = (self.mutation_fn)(input.clone()).await;

        match &result {
            Ok(output) => {
                if let Some(on_success) = &self.on_success {
                    on_success(output, &input);
                }
            }
            Err(error) => {
                match rollback {
                    Some(rollback) => {
                        tracing::debug!("mutation failed, rolling back optimistic change");
                        rollback();
                    }
                    None => tracing::debug!("mutation failed with no rollback registered"),
                }
                if let Some(on_error) = &self.on_error {
                    on_error(error, &input);
                }
            }
        }

        if let Some(on_settled) = &self.on_settled {
            on_settled(result.as_ref().ok(), result.as_ref().err(), &input);
        }

        result
    }

    /// Run the mutation while holding `entity_id`'s lock, so overlapping
    /// mutations of one entity complete one after another.
    pub async fn mutate_exclusive(
        &self,
        locks: &EntityLocks,
        entity_id: &str,
        input: I,
    ) -> Result<O, E> {
        let _guard = locks.lock(entity_id).await;
        self.mutate(input).await
    }
}

impl<I, O, E> std::fmt::Debug for Mutation<I, O, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-entity async locks.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `entity_id`.
    pub async fn lock(&self, entity_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(entity_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
