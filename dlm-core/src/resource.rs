use std::collections::BTreeMap;
use std::sync::Arc;

use imbl::ordset;
use tokio::sync::{oneshot, Mutex};

use crate::arena::LockArena;
use crate::compat::Candidate;
use crate::dispatch::AstEntry;
use crate::interval::IntervalTree;
use crate::lock::{Holder, LockId, LockRecord, LockState};
use crate::lvb::Lvb;
use crate::mode::LockMode;
use crate::owner::LockOwner;
use crate::policy::Policy;
use crate::queue::LockQueue;
use crate::Error;

/// Stable identity of a protected object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub object: u64,
    pub generation: u32,
}
impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res:{:#x}.{}", self.object, self.generation)
    }
}

/// The named thing being protected. All queue and index mutation happens
/// under `state`; the namespace table holds the only long-lived `Arc`.
#[derive(Debug)]
pub(crate) struct Resource {
    pub key: ResourceKey,
    pub state: Mutex<ResourceState>,
}
impl Resource {
    pub fn new(key: ResourceKey) -> Arc<Self> {
        Arc::new(Resource {
            key,
            state: Mutex::new(ResourceState::new(key)),
        })
    }
}

#[derive(Debug)]
pub(crate) struct ResourceState {
    pub key: ResourceKey,
    pub arena: LockArena,
    pub granted: LockQueue,
    pub waiting: LockQueue,
    /// One interval index per mode; populated only by granted extent locks.
    pub trees: BTreeMap<LockMode, IntervalTree>,
    pub lvb: Lvb,
    next_seq: u64,
}

impl ResourceState {
    pub fn new(key: ResourceKey) -> Self {
        ResourceState {
            key,
            arena: LockArena::new(),
            granted: LockQueue::default(),
            waiting: LockQueue::default(),
            trees: BTreeMap::new(),
            lvb: Lvb::default(),
            next_seq: 0,
        }
    }

    /// Build a fresh Pending lock owned by the requester. Rejects a policy
    /// kind differing from what the resource already carries; that can only
    /// come from queue corruption or a confused caller, and granting through
    /// it would void every conflict check.
    pub fn insert_lock(
        &mut self,
        owner: Arc<dyn LockOwner>,
        mode: LockMode,
        policy: Policy,
        speculative: bool,
    ) -> Result<LockId, Error> {
        if let Some(existing) = self.any_policy() {
            if !existing.same_kind(&policy) {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    "policy kind mismatch on {}: {} vs existing {}",
                    self.key,
                    policy,
                    existing
                );
                return Err(Error::InvariantViolation(format!(
                    "policy kind mismatch on {}",
                    self.key
                )));
            }
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let (completion, waiter) = oneshot::channel();
        let id = self.arena.insert(|id| LockRecord {
            id,
            owner,
            req_mode: mode,
            granted_mode: None,
            policy,
            state: LockState::Pending,
            seq,
            speculative,
            in_waiting: false,
            holders: ordset![Holder::Requester],
            completion: Some(completion),
            waiter: Some(waiter),
        });
        Ok(id)
    }

    fn any_policy(&self) -> Option<Policy> {
        self.granted
            .iter()
            .chain(self.waiting.iter())
            .next()
            .and_then(|id| self.arena.get(id))
            .map(|rec| rec.policy)
    }

    pub fn candidate(&self, id: LockId) -> Option<Candidate> {
        self.arena.get(id).map(|rec| Candidate {
            id,
            mode: rec.req_mode,
            policy: rec.policy,
            seq: rec.seq,
        })
    }

    /// Link onto the waiting queue, once. A retried request is already
    /// linked and stays exactly where it is: unlinking and re-appending
    /// would reorder it behind late arrivals and can starve it.
    pub fn link_waiting(&mut self, id: LockId) {
        let Some(rec) = self.arena.get_mut(id) else {
            return;
        };
        if rec.in_waiting {
            return;
        }
        rec.in_waiting = true;
        let (mode, policy) = (rec.req_mode, rec.policy);
        self.waiting.insert(id, mode, policy);
        self.arena.retain(id, Holder::Queue);
    }

    /// Move a lock to the granted queue: unlink from waiting if present,
    /// link into the interval index for extent policies, fire the grant
    /// waiter.
    pub fn grant(&mut self, id: LockId) {
        let Some(rec) = self.arena.get_mut(id) else {
            return;
        };
        let (mode, policy) = (rec.req_mode, rec.policy);
        let was_waiting = std::mem::replace(&mut rec.in_waiting, false);
        rec.state = LockState::Granted;
        rec.granted_mode = Some(mode);
        let completion = rec.completion.take();

        if was_waiting {
            let unlinked = self.waiting.remove(id);
            assert!(unlinked, "waiting flag out of sync with queue");
        }
        self.granted.insert(id, mode, policy);
        self.arena.retain(id, Holder::Queue);
        if let Policy::Extent(extent) = policy {
            self.trees.entry(mode).or_default().insert(extent, id);
            self.arena.retain(id, Holder::Tree);
        }
        if let Some(tx) = completion {
            // a Granted outcome from the first pass never consumed the waiter
            let _ = tx.send(());
        }
    }

    /// Remove a lock from every structure it is linked into and drop the
    /// queue-side holds. The record itself survives as long as someone else
    /// (requester, in-flight dispatch) still holds it.
    pub fn unlink(&mut self, id: LockId) {
        let Some(rec) = self.arena.get_mut(id) else {
            return;
        };
        rec.state = LockState::Cancelling;
        rec.completion.take();
        let policy = rec.policy;
        let mode = rec.queue_mode();
        let was_waiting = std::mem::replace(&mut rec.in_waiting, false);

        let in_granted = self.granted.remove(id);
        let in_waiting = self.waiting.remove(id);
        assert!(
            was_waiting == in_waiting,
            "waiting flag out of sync with queue"
        );
        if let Policy::Extent(extent) = policy {
            let in_tree = self
                .trees
                .get_mut(&mode)
                .map_or(false, |t| t.remove(extent, id));
            if in_tree {
                self.arena.release(id, Holder::Tree);
            }
        }
        if in_granted || in_waiting {
            self.arena.release(id, Holder::Queue);
        }
    }

    /// Snapshot dispatchable entries for the given locks, marking granted
    /// targets as Blocking and giving the dispatcher its own hold on each.
    pub fn ast_entries(&mut self, work: &[LockId]) -> Vec<AstEntry> {
        let key = self.key;
        let mut entries = Vec::with_capacity(work.len());
        for &l in work {
            let Some(rec) = self.arena.get_mut(l) else {
                continue;
            };
            if rec.state == LockState::Granted {
                rec.state = LockState::Blocking;
            }
            entries.push(AstEntry {
                id: l,
                owner: rec.owner.clone(),
                desc: rec.desc(key),
            });
            self.arena.retain(l, Holder::Dispatch);
        }
        entries
    }

    pub fn release_dispatch_holds(&mut self, ids: impl IntoIterator<Item = LockId>) {
        for id in ids {
            self.arena.release(id, Holder::Dispatch);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.granted.is_empty() && self.waiting.is_empty()
    }
}
