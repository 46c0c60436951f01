use std::sync::Arc;

use imbl::OrdSet;
use tokio::sync::oneshot;

use crate::mode::LockMode;
use crate::owner::{LockDesc, LockOwner};
use crate::policy::Policy;
use crate::resource::ResourceKey;

/// Handle into a resource's lock arena. The generation guards against slot
/// reuse: a handle kept past its lock's destruction resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId {
    pub(crate) idx: u32,
    pub(crate) gen: u32,
}
impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock:{}.{}", self.idx, self.gen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Waiting for compatibility to succeed.
    Pending,
    /// On the granted queue.
    Granted,
    /// Granted, but its owner has been asked to release or downgrade.
    Blocking,
    /// Unlinked from every structure; terminal.
    Cancelling,
}

/// One party currently keeping a lock record alive. The record is freed
/// exactly when no holder remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Holder {
    Requester,
    Queue,
    Tree,
    Dispatch,
}

#[derive(Debug)]
pub(crate) struct LockRecord {
    pub id: LockId,
    pub owner: Arc<dyn LockOwner>,
    pub req_mode: LockMode,
    /// Differs from `req_mode` only while a downgrade is pending.
    pub granted_mode: Option<LockMode>,
    pub policy: Policy,
    pub state: LockState,
    /// Arrival sequence within the resource; queue fairness is defined in
    /// terms of it and it never changes after enqueue.
    pub seq: u64,
    /// Read-ahead / lock-ahead locks do not reliably reflect file size.
    pub speculative: bool,
    pub in_waiting: bool,
    pub holders: OrdSet<Holder>,
    pub completion: Option<oneshot::Sender<()>>,
    pub waiter: Option<oneshot::Receiver<()>>,
}
impl LockRecord {
    pub fn queue_mode(&self) -> LockMode {
        self.granted_mode.unwrap_or(self.req_mode)
    }

    pub fn desc(&self, resource: ResourceKey) -> LockDesc {
        LockDesc {
            id: self.id,
            resource,
            mode: self.queue_mode(),
            policy: self.policy,
        }
    }
}
