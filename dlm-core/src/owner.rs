use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::lock::LockId;
use crate::lvb::Lvb;
use crate::mode::LockMode;
use crate::policy::Policy;
use crate::resource::ResourceKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(pub u64);
impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner:{}", self.0)
    }
}

/// Delivery failure for one callback. Recorded per entry; a batch is never
/// aborted by a single unreachable peer.
#[derive(Error, Debug, Clone)]
#[error("AST delivery failed: {reason}")]
pub struct TransportError {
    pub reason: String,
}

/// Reply to a blocking notification. `StateChanged` means the conflicting
/// lock was already released or downgraded by the time the callback landed;
/// the grant pass restarts when it sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingReply {
    Acknowledged,
    StateChanged,
}

/// Reply to a glimpse. `Gone` distinguishes an object racing with unlink
/// from a mere transport hiccup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlimpseReply {
    Lvb(Lvb),
    Gone,
}

/// What an owner can be asked over its callback channel. `Unreachable` is a
/// disconnected or legacy client (skip it, trust the cached LVB);
/// `Unsupported` is an owner being torn down, which poisons the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstCapability {
    Available,
    Unreachable,
    Unsupported,
}

/// Snapshot of a lock handed to owner callbacks. Owners never see arena
/// internals, only this description.
#[derive(Debug, Clone)]
pub struct LockDesc {
    pub id: LockId,
    pub resource: ResourceKey,
    pub mode: LockMode,
    pub policy: Policy,
}

/// Capability seam for lock holders: a network client proxy, a local
/// in-process object, whatever can answer blocking and glimpse requests.
#[async_trait]
pub trait LockOwner: Send + Sync + Debug {
    fn id(&self) -> OwnerId;

    /// Whether blocking notifications can be delivered to this owner at all.
    fn blocking_capability(&self) -> AstCapability {
        AstCapability::Available
    }

    fn glimpse_capability(&self) -> AstCapability {
        AstCapability::Available
    }

    /// Ask the owner to release or downgrade `lock` because a conflicting
    /// request is waiting on it.
    async fn on_blocking(&self, lock: LockDesc) -> Result<BlockingReply, TransportError>;

    /// Ask the owner for its current view of the object behind `lock`
    /// without giving the lock up.
    async fn on_glimpse(&self, lock: LockDesc) -> Result<GlimpseReply, TransportError>;
}
