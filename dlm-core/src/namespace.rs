use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use tokio::sync::{oneshot, Mutex};
#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use crate::dispatch;
use crate::glimpse;
use crate::grant::{self, Attempt};
use crate::lock::{Holder, LockId};
#[cfg(feature = "tracing")]
use crate::log_utils::{fmt_cancelled, fmt_deferred, fmt_granted, fmt_released};
use crate::lvb::Lvb;
use crate::mode::LockMode;
use crate::owner::{LockOwner, TransportError};
use crate::policy::Policy;
use crate::resource::{Resource, ResourceKey};
use crate::Error;

/// The lock manager's root handle. Holds the resource table; everything else
/// hangs off per-resource state. Explicitly constructed and passed around,
/// never process-global.
#[derive(Debug, Default)]
pub struct Namespace {
    resources: Mutex<BTreeMap<ResourceKey, Arc<Resource>>>,
}

#[derive(Debug)]
pub struct LockRequest {
    pub key: ResourceKey,
    pub mode: LockMode,
    pub policy: Policy,
    pub owner: Arc<dyn LockOwner>,
    /// Read-ahead / lock-ahead request; its holder's size view is advisory.
    pub speculative: bool,
    pub intent: Option<Intent>,
}

/// Side query carried by an enqueue instead of (or before) a real grant.
#[derive(Debug, Clone, Copy)]
pub enum Intent {
    Glimpse { threshold: u64 },
}

#[derive(Debug)]
pub enum LockOutcome {
    Granted(LockToken),
    /// Conflicts found; blocking callbacks are out and the request sits on
    /// the waiting queue in arrival order.
    Queued(QueuedLock),
    /// Intent-only request answered from the glimpse path; no lock taken.
    Glimpsed(Lvb),
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The request was cancelled while its blocking callbacks were in
    /// flight.
    Cancelled,
    /// The protected object is gone or mid-destruction.
    Stale,
}

/// The requester's handle on a lock. Holds the resource weakly so a token
/// kept past resource teardown degrades to a no-op instead of resurrecting
/// state.
#[derive(Debug, Clone)]
pub struct LockToken {
    res: Weak<Resource>,
    id: LockId,
}
impl LockToken {
    pub fn id(&self) -> LockId {
        self.id
    }
}

/// A queued request plus the channel its grant arrives on.
#[derive(Debug)]
pub struct QueuedLock {
    token: LockToken,
    waiter: oneshot::Receiver<()>,
}
impl QueuedLock {
    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// Resolves when a reprocessing pass grants the lock. A closed channel
    /// means the request was cancelled out from under the waiter.
    pub async fn granted(self) -> Result<LockToken, Error> {
        match self.waiter.await {
            Ok(()) => Ok(self.token),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    async fn lookup_or_create(&self, key: ResourceKey) -> Arc<Resource> {
        let mut table = self.resources.lock().await;
        table.entry(key).or_insert_with(|| Resource::new(key)).clone()
    }

    /// Drop the resource from the table once nothing references it: no
    /// granted locks, no waiters, and no concurrent operation holding the
    /// `Arc` (the table's and the caller's references are the two allowed).
    async fn prune(&self, res: &Arc<Resource>) {
        let mut table = self.resources.lock().await;
        if !res.state.lock().await.is_idle() {
            return;
        }
        if Arc::strong_count(res) != 2 {
            return;
        }
        if let Some(current) = table.get(&res.key) {
            if Arc::ptr_eq(current, res) {
                table.remove(&res.key);
            }
        }
    }

    /// Drive a new request to a grant, the waiting queue, or an abort.
    ///
    /// The first pass collects the full blocking set; if there are
    /// conflicts the lock is linked to the waiting queue (once; it is never
    /// re-linked on retry), the resource guard is dropped, the blocking
    /// batch runs, the guard is reacquired, and a `StateChanged` reply
    /// restarts the pass. Queue membership is re-validated after every
    /// reacquire; a concurrent cancel surfaces as `Aborted`.
    pub async fn enqueue(&self, req: LockRequest) -> Result<LockOutcome, Error> {
        if let Some(Intent::Glimpse { threshold }) = req.intent {
            return match self.glimpse(req.key, threshold).await {
                Ok(lvb) => Ok(LockOutcome::Glimpsed(lvb)),
                Err(Error::StaleObject(_)) => Ok(LockOutcome::Aborted(AbortReason::Stale)),
                Err(e) => Err(e),
            };
        }

        #[cfg(feature = "tracing")]
        let (owner_id, mode, policy, key) = (req.owner.id(), req.mode, req.policy, req.key);

        let res = self.lookup_or_create(req.key).await;
        let mut st = res.state.lock().await;
        let id = st.insert_lock(req.owner, req.mode, req.policy, req.speculative)?;

        loop {
            let mut work = Vec::new();
            match grant::try_grant_first(&mut st, id, &mut work)? {
                Attempt::Granted => {
                    #[cfg(feature = "tracing")]
                    info!("{}", fmt_granted(owner_id, mode, policy, key));
                    return Ok(LockOutcome::Granted(LockToken {
                        res: Arc::downgrade(&res),
                        id,
                    }));
                }
                Attempt::Blocked => {
                    st.link_waiting(id);
                    if work.is_empty() {
                        // conflicts exist but none of their owners can be
                        // asked to release; stay queued until they go away
                        break;
                    }
                    let entries = st.ast_entries(&work);
                    drop(st);
                    let outcome = dispatch::blocking_batch(entries).await;
                    st = res.state.lock().await;
                    st.release_dispatch_holds(work.iter().copied());

                    if st.arena.get(id).is_none() {
                        // cancelled while the callbacks were in flight
                        drop(st);
                        self.prune(&res).await;
                        return Ok(LockOutcome::Aborted(AbortReason::Cancelled));
                    }
                    if outcome.delivered == 0 && outcome.failed > 0 {
                        // transport is down across the board; the request
                        // cannot make progress and is not silently parked
                        st.unlink(id);
                        st.arena.release(id, Holder::Requester);
                        drop(st);
                        self.prune(&res).await;
                        return Err(Error::Transport(TransportError {
                            reason: format!(
                                "all {} blocking callbacks undeliverable",
                                outcome.failed
                            ),
                        }));
                    }
                    if outcome.retry {
                        #[cfg(feature = "tracing")]
                        debug!("conflicting lock state changed, retrying grant pass");
                        continue;
                    }
                    break;
                }
            }
        }

        #[cfg(feature = "tracing")]
        info!("{}", fmt_deferred(owner_id, mode, policy, key));
        let waiter = st
            .arena
            .get_mut(id)
            .and_then(|rec| rec.waiter.take())
            .ok_or_else(|| {
                Error::InvariantViolation("queued lock is missing its grant waiter".into())
            })?;
        Ok(LockOutcome::Queued(QueuedLock {
            token: LockToken {
                res: Arc::downgrade(&res),
                id,
            },
            waiter,
        }))
    }

    /// Give up a lock, granted or still waiting. Conflict resolution for
    /// blocked requests arrives through here: the holder that received a
    /// blocking callback eventually cancels, and the reprocessing sweep
    /// wakes whoever was waiting on it.
    pub async fn cancel(&self, token: &LockToken) -> Result<(), Error> {
        self.retire(token, None, Verb::Cancel).await
    }

    /// Release a granted lock, merging the owner's final view of the object
    /// into the cached LVB (never shrinking it).
    pub async fn release(&self, token: &LockToken, lvb: Option<Lvb>) -> Result<(), Error> {
        self.retire(token, lvb, Verb::Release).await
    }

    async fn retire(&self, token: &LockToken, lvb: Option<Lvb>, _verb: Verb) -> Result<(), Error> {
        let Some(res) = token.res.upgrade() else {
            // resource already pruned; nothing left to unlink
            return Ok(());
        };
        let mut st = res.state.lock().await;
        let Some(_rec) = st.arena.get(token.id) else {
            #[cfg(feature = "tracing")]
            warn!("retire of unknown lock {} on {}", token.id, res.key);
            return Ok(());
        };
        #[cfg(feature = "tracing")]
        let line = {
            let (o, m, p) = (_rec.owner.id(), _rec.queue_mode(), _rec.policy);
            match _verb {
                Verb::Cancel => fmt_cancelled(o, m, p, res.key),
                Verb::Release => fmt_released(o, m, p, res.key),
            }
        };
        if let Some(lvb) = lvb {
            st.lvb.merge(&lvb);
        }
        st.unlink(token.id);
        st.arena.release(token.id, Holder::Requester);
        let _woken = grant::reprocess_all(&mut st);
        #[cfg(feature = "tracing")]
        {
            info!("{}", line);
            debug!("reprocessing woke {} waiter(s)", _woken);
        }
        drop(st);
        self.prune(&res).await;
        Ok(())
    }

    /// Size query for the data-object layer: ask the highest in-flight
    /// writers past `threshold` for their view and merge it into the cached
    /// LVB. With no reachable writer past the threshold the cached LVB is
    /// the answer.
    pub async fn glimpse(&self, key: ResourceKey, threshold: u64) -> Result<Lvb, Error> {
        let res = self.lookup_or_create(key).await;
        let mut st = res.state.lock().await;
        let scan = glimpse::collect(&st, threshold)?;
        if scan.entries.is_empty() {
            #[cfg(feature = "tracing")]
            if scan.unreachable_writer {
                debug!("glimpse on {}: writer unreachable, trusting cached LVB", key);
            }
            let cached = st.lvb;
            drop(st);
            // a glimpse on an unknown key must not leave an empty resource
            self.prune(&res).await;
            return Ok(cached);
        }

        let ids: Vec<LockId> = scan.entries.iter().map(|e| e.id).collect();
        for &id in &ids {
            st.arena.retain(id, Holder::Dispatch);
        }
        let cached = st.lvb;
        drop(st);
        let outcome = dispatch::glimpse_batch(scan.entries).await;
        let mut st = res.state.lock().await;
        st.release_dispatch_holds(ids);

        if outcome.gone {
            return Err(Error::StaleObject(key));
        }
        if outcome.delivered == 0 {
            // every glimpse died in transit; degrade to the cached view
            #[cfg(feature = "tracing")]
            warn!("glimpse on {}: {} callbacks undeliverable", key, outcome.failed);
            return Ok(cached);
        }
        let mut merged = st.lvb;
        if let Some(lvb) = outcome.lvb {
            merged.merge(&lvb);
        }
        st.lvb = merged;
        Ok(merged)
    }
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Cancel,
    Release,
}
