//! # Operation Module
//!
//! Asynchronous completion of mutating requests.
//!
//! A mutating backend call hands back a [`ResultSource`]. The dispatcher turns it into an
//! [`Operation`]: a coroutine waits for the backend's result, runs the optional completion
//! callback on it (self-link rewriting for create and update) and publishes it. The request
//! coroutine meanwhile waits at most its timeout for the publication:
//!
//! - published in time: the response carries the real result
//! - still pending: the response is `202 Accepted` with a `Working` placeholder naming the
//!   operation, which stays pollable in the [`Operations`] registry
//!
//! The callback runs exactly once, before the result becomes observable, on whichever side
//! of the timeout it lands. A callback that runs after the request already answered `202`
//! still affects what later polls see, never the response already sent.

use crate::error::ApiError;
use crate::runtime::{Object, Status};
use crate::runtime_config::{DEFAULT_OPERATION_TTL, DEFAULT_STACK_SIZE};
use crate::storage::{RestResult, ResultSource};
use may::sync::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Longest single condvar wait; longer waits are taken in slices so the timer never sees
/// an unrepresentable deadline.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(60 * 60);

/// Hook applied to the backend result before it is published.
pub type OnComplete = Box<dyn FnOnce(&mut RestResult) + Send + 'static>;

/// A published (or placeholder) result.
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub object: Arc<dyn Object>,
    pub created: bool,
}

impl From<RestResult> for OperationResult {
    fn from(result: RestResult) -> Self {
        Self {
            object: Arc::from(result.object),
            created: result.created,
        }
    }
}

#[derive(Default)]
struct OperationState {
    result: Option<OperationResult>,
    finished_at: Option<Instant>,
}

/// One in-flight or finished mutation.
pub struct Operation {
    id: String,
    created_at: Instant,
    state: Mutex<OperationState>,
    done: Condvar,
}

impl Operation {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            state: Mutex::new(OperationState::default()),
            done: Condvar::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Block until the operation finished or `timeout` elapsed, whichever comes first.
    /// Returns `true` when the operation finished.
    ///
    /// A timeout too large to form a deadline waits for completion without one.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while guard.result.is_none() {
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    remaining.min(MAX_WAIT_SLICE)
                }
                None => MAX_WAIT_SLICE,
            };
            let (next, _timed_out) = self
                .done
                .wait_timeout(guard, slice)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next;
        }
        true
    }

    /// The published result, or a `Working` placeholder while pending. The flag is `true`
    /// when the result is final.
    #[must_use]
    pub fn status_or_result(&self) -> (OperationResult, bool) {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &guard.result {
            Some(result) => (result.clone(), true),
            None => (
                OperationResult {
                    object: Arc::new(Status::working(&self.id)),
                    created: false,
                },
                false,
            ),
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .result
            .is_some()
    }

    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(guard.finished_at, Some(at) if now.saturating_duration_since(at) > ttl)
    }

    fn finish(&self, result: RestResult) {
        {
            let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.result.is_some() {
                return;
            }
            guard.result = Some(result.into());
            guard.finished_at = Some(Instant::now());
        }
        self.done.notify_all();
    }
}

/// Registry of operations, addressable by id until they expire.
pub struct Operations {
    ops: Mutex<HashMap<String, Arc<Operation>>>,
    last_id: AtomicU64,
    ttl: Duration,
    stack_size: usize,
}

impl Default for Operations {
    fn default() -> Self {
        Self::new()
    }
}

impl Operations {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_OPERATION_TTL, DEFAULT_STACK_SIZE)
    }

    /// `ttl` is how long a finished operation stays in the registry; `stack_size` is the
    /// stack of the completion coroutine.
    #[must_use]
    pub fn with_config(ttl: Duration, stack_size: usize) -> Self {
        Self {
            ops: Mutex::new(HashMap::new()),
            last_id: AtomicU64::new(0),
            ttl,
            stack_size,
        }
    }

    /// Register an operation completing from `source` and start waiting for it.
    pub fn new_operation(
        &self,
        source: ResultSource,
        on_complete: Option<OnComplete>,
    ) -> Arc<Operation> {
        self.expire();

        let id = (self.last_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        let op = Arc::new(Operation::new(id.clone()));
        self.lock_ops().insert(id.clone(), Arc::clone(&op));

        let worker = Arc::clone(&op);
        // SAFETY: Builder::spawn is marked unsafe by the may runtime. The coroutine owns its
        // captures and only blocks on may primitives.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .name(format!("operation-{id}"))
                .stack_size(self.stack_size)
                .spawn(move || complete(&worker, source, on_complete))
        };
        if let Err(e) = spawned {
            error!(operation_id = %id, error = %e, "Failed to spawn operation coroutine");
            op.finish(RestResult::from_error(&ApiError::Internal(format!(
                "unable to start operation: {e}"
            ))));
        }
        debug!(operation_id = %id, "Operation started");
        op
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Operation>> {
        self.lock_ops().get(id).cloned()
    }

    /// All registered operations ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Operation>> {
        let mut ops: Vec<_> = self.lock_ops().values().cloned().collect();
        ops.sort_by_key(|op| op.id().parse::<u64>().unwrap_or(u64::MAX));
        ops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_ops().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop finished operations older than the TTL.
    pub fn expire(&self) {
        let now = Instant::now();
        let mut ops = self.lock_ops();
        let before = ops.len();
        ops.retain(|_, op| !op.expired(now, self.ttl));
        let removed = before - ops.len();
        if removed > 0 {
            info!(removed, remaining = ops.len(), "Expired finished operations");
        }
    }

    fn lock_ops(&self) -> may::sync::MutexGuard<'_, HashMap<String, Arc<Operation>>> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl std::fmt::Debug for Operations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operations")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn complete(op: &Operation, source: ResultSource, on_complete: Option<OnComplete>) {
    let mut result = source.recv().unwrap_or_else(|| {
        error!(operation_id = %op.id(), "Backend dropped the result sender without a result");
        RestResult::from_error(&ApiError::Internal(
            "backend finished without producing a result".to_string(),
        ))
    });
    if let Some(callback) = on_complete {
        callback(&mut result);
    }
    debug!(
        operation_id = %op.id(),
        created = result.created,
        age_ms = op.age().as_millis() as u64,
        "Operation finished"
    );
    op.finish(result);
}
