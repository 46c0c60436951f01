use crate::compat::{scan_queue, Verdict};
use crate::lock::{LockId, LockState};
use crate::resource::ResourceState;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    Granted,
    Blocked,
}

/// First-enqueue (and retry) pass. Scans granted then waiting with the
/// shared work list so the full blocking set is accumulated in one pass over
/// each queue; both scans must independently come back compatible for an
/// immediate grant.
///
/// The waiting scan is bounded by the candidate's own arrival sequence, so a
/// retried request, still linked where it first landed, is never blocked
/// by later arrivals and never conflicts with itself.
pub(crate) fn try_grant_first(
    st: &mut ResourceState,
    id: LockId,
    work: &mut Vec<LockId>,
) -> Result<Attempt, Error> {
    let req = st
        .candidate(id)
        .ok_or_else(|| Error::InvariantViolation(format!("lock vanished mid-pass on {}", st.key)))?;
    if st
        .arena
        .get(id)
        .map_or(false, |rec| rec.state == LockState::Granted)
    {
        // a reprocessing pass got here first while the guard was dropped
        return Ok(Attempt::Granted);
    }

    let granted = scan_queue(&st.arena, &st.granted, &req, None, Some(&mut *work));
    let waiting = scan_queue(&st.arena, &st.waiting, &req, Some(req.seq), Some(work));
    if granted == Verdict::Compatible && waiting == Verdict::Compatible {
        st.grant(id);
        Ok(Attempt::Granted)
    } else {
        Ok(Attempt::Blocked)
    }
}

/// Wake-up path: blocking callbacks for this lock's conflicts were already
/// sent, so no work list: stop at the first conflict and leave the lock
/// where it is.
pub(crate) fn reprocess_one(st: &mut ResourceState, id: LockId) -> bool {
    let Some(req) = st.candidate(id) else {
        return false;
    };
    if scan_queue(&st.arena, &st.granted, &req, None, None) == Verdict::Incompatible {
        return false;
    }
    if scan_queue(&st.arena, &st.waiting, &req, Some(req.seq), None) == Verdict::Incompatible {
        return false;
    }
    st.grant(id);
    true
}

/// Sweep the waiting queue in arrival order after a release or cancel and
/// grant everything that has become compatible. A still-blocked earlier
/// waiter keeps gating later conflicting waiters through their bounded
/// waiting-queue scans, so continuing past it cannot reorder grants.
pub(crate) fn reprocess_all(st: &mut ResourceState) -> usize {
    let mut waiters: Vec<(u64, LockId)> = st
        .waiting
        .iter()
        .filter_map(|id| st.arena.get(id).map(|rec| (rec.seq, id)))
        .collect();
    waiters.sort_unstable_by_key(|&(seq, _)| seq);

    let mut woken = 0;
    for (_, id) in waiters {
        if reprocess_one(st, id) {
            woken += 1;
        }
    }
    woken
}
