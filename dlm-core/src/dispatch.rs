use std::sync::Arc;

use futures::future;
#[cfg(feature = "tracing")]
use tracing::warn;

use crate::lock::LockId;
use crate::lvb::Lvb;
use crate::owner::{BlockingReply, GlimpseReply, LockDesc, LockOwner};

/// One deliverable notification: everything the dispatcher needs, snapshotted
/// under the resource guard so delivery runs entirely outside it.
#[derive(Debug)]
pub(crate) struct AstEntry {
    pub id: LockId,
    pub owner: Arc<dyn LockOwner>,
    pub desc: LockDesc,
}

#[derive(Debug, Default)]
pub(crate) struct BlockingOutcome {
    /// A conflicting lock changed state before the callback landed; the
    /// grant pass should restart.
    pub retry: bool,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct GlimpseOutcome {
    /// Max-merge of every successful reply.
    pub lvb: Option<Lvb>,
    /// Some owner reported the object racing with unlink.
    pub gone: bool,
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver a batch of blocking notifications concurrently and wait for all
/// of them. Per-entry transport failures are tolerated; duplicates to one
/// owner are not coalesced (receivers are idempotent by contract).
pub(crate) async fn blocking_batch(entries: Vec<AstEntry>) -> BlockingOutcome {
    let replies =
        future::join_all(entries.iter().map(|e| e.owner.on_blocking(e.desc.clone()))).await;
    let mut out = BlockingOutcome::default();
    for (_entry, reply) in entries.iter().zip(replies) {
        match reply {
            Ok(BlockingReply::Acknowledged) => out.delivered += 1,
            Ok(BlockingReply::StateChanged) => {
                out.delivered += 1;
                out.retry = true;
            }
            Err(_err) => {
                out.failed += 1;
                #[cfg(feature = "tracing")]
                warn!("blocking AST to {} failed: {}", _entry.desc.id, _err);
            }
        }
    }
    out
}

/// Deliver a batch of glimpses concurrently and merge the replies.
pub(crate) async fn glimpse_batch(entries: Vec<AstEntry>) -> GlimpseOutcome {
    let replies =
        future::join_all(entries.iter().map(|e| e.owner.on_glimpse(e.desc.clone()))).await;
    let mut out = GlimpseOutcome::default();
    for (_entry, reply) in entries.iter().zip(replies) {
        match reply {
            Ok(GlimpseReply::Lvb(lvb)) => {
                out.delivered += 1;
                match out.lvb.as_mut() {
                    Some(merged) => merged.merge(&lvb),
                    None => out.lvb = Some(lvb),
                }
            }
            Ok(GlimpseReply::Gone) => {
                out.delivered += 1;
                out.gone = true;
            }
            Err(_err) => {
                out.failed += 1;
                #[cfg(feature = "tracing")]
                warn!("glimpse AST to {} failed: {}", _entry.desc.id, _err);
            }
        }
    }
    out
}
