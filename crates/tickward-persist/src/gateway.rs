//! The async query gateway.
//!
//! # Life of a query
//!
//! 1. The tick thread calls [`QueryGateway::submit`] (or moves a whole
//!    [`QueryQueue`] in with [`submit_all`](QueryGateway::submit_all)). The
//!    continuation is parked in the gateway under a sequence number; only
//!    the [`Query`] is sent to the dispatcher task.
//! 2. The dispatcher runs at most `workers` backend calls at once and sends
//!    each result back tagged with its sequence number.
//! 3. On the next [`drain`](QueryGateway::drain) the tick thread picks up
//!    finished results and runs their continuations in submission order
//!    per issuer, skipping any whose slot ticket went stale.
//!
//! Continuations are `FnOnce(&mut C, QueryResult)` with no `Send` bound:
//! they never leave the tick thread. They also never receive the gateway,
//! so a continuation that needs a follow-up query pushes it onto a
//! [`QueryQueue`] owned by `C`, which the engine submits afterwards.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tickward_protocol::SlotTicket;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, trace, warn};

use crate::{Backend, PersistError, Query, ResultSet};

// ---------------------------------------------------------------------------
// Issuer / result / context
// ---------------------------------------------------------------------------

/// On whose behalf a query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Issuer {
    /// Server-wide work. Never stale.
    Global,
    /// Work for a client; dropped if the ticket stops being current.
    Slot(SlotTicket),
}

/// What a continuation receives: rows on success, the error otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    inner: Result<ResultSet, PersistError>,
}

impl QueryResult {
    pub fn new(inner: Result<ResultSet, PersistError>) -> Self {
        Self { inner }
    }

    pub fn is_ok(&self) -> bool {
        self.inner.is_ok()
    }

    pub fn error(&self) -> Option<&PersistError> {
        self.inner.as_ref().err()
    }

    /// The rows, or `None` on failure.
    pub fn into_rows(self) -> Option<ResultSet> {
        self.inner.ok()
    }

    /// The cursor positioned on the first row, or `None` if the query failed
    /// or returned nothing. Lets callers treat "error" and "absent" alike.
    pub fn into_first(self) -> Option<ResultSet> {
        let mut rows = self.inner.ok()?;
        rows.next().then_some(rows)
    }

    pub fn into_inner(self) -> Result<ResultSet, PersistError> {
        self.inner
    }
}

/// The state continuations run against.
pub trait CompletionContext {
    /// Is `ticket` still the identity of its slot?
    fn ticket_is_current(&self, ticket: SlotTicket) -> bool;
}

/// A parked continuation.
pub type Completion<C> = Box<dyn FnOnce(&mut C, QueryResult)>;

// ---------------------------------------------------------------------------
// QueryQueue
// ---------------------------------------------------------------------------

struct Queued<C> {
    issuer: Issuer,
    query: Query,
    on_complete: Option<Completion<C>>,
}

/// Queries requested from inside the tick, submitted by the engine later.
pub struct QueryQueue<C> {
    entries: Vec<Queued<C>>,
}

impl<C> Default for QueryQueue<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<C> QueryQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a query whose result is handed to `on_complete`.
    pub fn push<F>(&mut self, issuer: Issuer, query: Query, on_complete: F)
    where
        F: FnOnce(&mut C, QueryResult) + 'static,
    {
        self.entries.push(Queued {
            issuer,
            query,
            on_complete: Some(Box::new(on_complete)),
        });
    }

    /// Queues a write nobody waits for.
    pub fn push_detached(&mut self, issuer: Issuer, query: Query) {
        self.entries.push(Queued {
            issuer,
            query,
            on_complete: None,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Maximum concurrently running backend calls.
    pub workers: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl GatewayConfig {
    pub fn validated(mut self) -> Self {
        if self.workers == 0 {
            warn!("gateway workers is 0, using 1");
            self.workers = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

struct Job {
    seq: u64,
    query: Query,
}

struct Done {
    seq: u64,
    result: Result<ResultSet, PersistError>,
}

struct Pending<C> {
    issuer: Issuer,
    label: String,
    on_complete: Option<Completion<C>>,
    result: Option<Result<ResultSet, PersistError>>,
}

/// Runs queries off the tick thread and applies their results on it.
pub struct QueryGateway<C> {
    jobs: mpsc::UnboundedSender<Job>,
    done_rx: mpsc::UnboundedReceiver<Done>,
    next_seq: u64,
    /// Everything submitted and not yet applied, by sequence number.
    pending: BTreeMap<u64, Pending<C>>,
}

impl<C: CompletionContext> QueryGateway<C> {
    /// Spawns the dispatcher task. Must be called inside a Tokio runtime.
    pub fn new<B: Backend>(backend: Arc<B>, config: GatewayConfig) -> Self {
        let config = config.validated();
        let (jobs, job_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        tokio::spawn(dispatch(backend, config.workers, job_rx, done_tx));
        debug!(workers = config.workers, "query gateway started");

        Self {
            jobs,
            done_rx,
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Submits a query. Returns immediately with its sequence number.
    pub fn submit<F>(&mut self, issuer: Issuer, query: Query, on_complete: F) -> u64
    where
        F: FnOnce(&mut C, QueryResult) + 'static,
    {
        self.enqueue(issuer, query, Some(Box::new(on_complete)))
    }

    /// Submits everything in `queue`, in order, leaving it empty.
    pub fn submit_all(&mut self, queue: &mut QueryQueue<C>) -> usize {
        let entries = std::mem::take(&mut queue.entries);
        let n = entries.len();
        for entry in entries {
            self.enqueue(entry.issuer, entry.query, entry.on_complete);
        }
        n
    }

    fn enqueue(&mut self, issuer: Issuer, query: Query, on_complete: Option<Completion<C>>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        let label = query.to_string();
        let result = match self.jobs.send(Job { seq, query }) {
            Ok(()) => None,
            Err(_) => {
                warn!(seq, %label, "query workers gone, failing query");
                Some(Err(PersistError::Unavailable))
            }
        };
        trace!(seq, %label, "query submitted");

        self.pending.insert(
            seq,
            Pending {
                issuer,
                label,
                on_complete,
                result,
            },
        );
        seq
    }

    /// Number of submitted queries whose continuation has not run yet.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Applies every finished result that is next in line for its issuer.
    /// Never waits. Returns the number of queries retired (applied or
    /// discarded as stale).
    pub fn drain(&mut self, ctx: &mut C) -> usize {
        while let Ok(done) = self.done_rx.try_recv() {
            if let Some(p) = self.pending.get_mut(&done.seq) {
                p.result = Some(done.result);
            }
        }

        if self.jobs.is_closed() {
            for p in self.pending.values_mut() {
                if p.result.is_none() {
                    p.result = Some(Err(PersistError::Unavailable));
                }
            }
        }

        let mut blocked: HashSet<Issuer> = HashSet::new();
        let mut ready = Vec::new();
        for (seq, p) in &self.pending {
            if blocked.contains(&p.issuer) {
                continue;
            }
            if p.result.is_some() {
                ready.push(*seq);
            } else {
                blocked.insert(p.issuer);
            }
        }

        let mut retired = 0;
        for seq in ready {
            let Some(p) = self.pending.remove(&seq) else {
                continue;
            };
            retired += 1;
            let Some(result) = p.result else { continue };

            if let Issuer::Slot(ticket) = p.issuer {
                if !ctx.ticket_is_current(ticket) {
                    debug!(seq, %ticket, query = %p.label, "stale completion discarded");
                    continue;
                }
            }
            if let Err(e) = &result {
                warn!(seq, query = %p.label, error = %e, "query failed");
            }
            if let Some(on_complete) = p.on_complete {
                on_complete(ctx, QueryResult::new(result));
            }
        }
        retired
    }

    /// Waits for every in-flight query and applies it. For shutdown and tests.
    pub async fn flush(&mut self, ctx: &mut C) {
        loop {
            self.drain(ctx);
            if self.pending.is_empty() {
                return;
            }
            match self.done_rx.recv().await {
                Some(done) => {
                    if let Some(p) = self.pending.get_mut(&done.seq) {
                        p.result = Some(done.result);
                    }
                }
                None => {
                    // Dispatcher and workers are gone; fail what is left.
                    self.drain(ctx);
                    return;
                }
            }
        }
    }
}

/// Dispatcher loop: hands jobs to the backend, bounded by a semaphore.
async fn dispatch<B: Backend>(
    backend: Arc<B>,
    workers: usize,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    done: mpsc::UnboundedSender<Done>,
) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(job) = jobs.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let backend = Arc::clone(&backend);
        let done = done.clone();
        tokio::spawn(async move {
            let result = backend.execute(job.query).await;
            let _ = done.send(Done {
                seq: job.seq,
                result,
            });
            drop(permit);
        });
    }

    debug!("query dispatcher stopped");
}
