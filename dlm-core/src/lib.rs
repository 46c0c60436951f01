use thiserror::Error;

// note: every structure here is resource-local; cross-resource operations never
// hold two resource guards at once

mod arena;
mod compat;
mod dispatch;
mod glimpse;
mod grant;
mod interval;
mod lock;
mod log_utils;
mod lvb;
mod mode;
mod namespace;
mod owner;
mod policy;
mod queue;
mod resource;


pub use lock::{LockId, LockState};
pub use lvb::Lvb;
pub use mode::LockMode;
pub use namespace::{
    AbortReason, Intent, LockOutcome, LockRequest, LockToken, Namespace, QueuedLock,
};
pub use owner::{
    AstCapability, BlockingReply, GlimpseReply, LockDesc, LockOwner, OwnerId, TransportError,
};
pub use policy::{Extent, InodeBits, Policy, EOF};
pub use resource::ResourceKey;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Stale Object: {0}")]
    StaleObject(ResourceKey),
    #[error("Transport Error: {0}")]
    Transport(#[from] TransportError),
    #[error("Lock Request Cancelled")]
    Cancelled,
    #[error("Protocol Invariant Violation: {0}")]
    InvariantViolation(String),
}
