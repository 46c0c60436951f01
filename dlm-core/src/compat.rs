use crate::arena::LockArena;
use crate::lock::LockId;
use crate::mode::LockMode;
use crate::owner::AstCapability;
use crate::policy::Policy;
use crate::queue::LockQueue;

/// Candidate view copied out of the arena so a scan can hold the arena
/// immutably while the caller keeps the candidate's identity around.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub id: LockId,
    pub mode: LockMode,
    pub policy: Policy,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Compatible,
    Incompatible,
}

/// Scan `queue` for locks conflicting with `req`.
///
/// Mode groups whose mode coexists with `req` are skipped whole, as are
/// policy groups whose policy cannot conflict; the cost of a pure probe is
/// proportional to the number of groups, not the number of locks.
///
/// With `work` absent the scan stops at the first conflict. With `work`
/// supplied it keeps going, appending every conflicting lock whose owner can
/// take a blocking callback (deduplicated), and still reports the verdict.
///
/// `bound` makes locks with an arrival sequence at or past it invisible;
/// passing the candidate's own sequence when scanning a queue the candidate
/// is linked into bounds the scan at the candidate itself, so a lock is
/// always compatible with itself and is never blocked by later arrivals.
pub(crate) fn scan_queue(
    arena: &LockArena,
    queue: &LockQueue,
    req: &Candidate,
    bound: Option<u64>,
    mut work: Option<&mut Vec<LockId>>,
) -> Verdict {
    let mut verdict = Verdict::Compatible;
    for group in queue.groups() {
        if group.mode.compatible(req.mode) {
            continue;
        }
        for pg in &group.policies {
            if !req.policy.conflicts_with(&pg.policy) {
                continue;
            }
            for &l in &pg.locks {
                if l == req.id {
                    continue;
                }
                let rec = match arena.get(l) {
                    Some(rec) => rec,
                    None => continue,
                };
                if let Some(bound) = bound {
                    if rec.seq >= bound {
                        continue;
                    }
                }
                match work.as_deref_mut() {
                    None => return Verdict::Incompatible,
                    Some(w) => {
                        verdict = Verdict::Incompatible;
                        if rec.owner.blocking_capability() == AstCapability::Available
                            && !w.contains(&l)
                        {
                            w.push(l);
                        }
                    }
                }
            }
        }
    }
    verdict
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use imbl::ordset;
    use proptest::prelude::*;

    use super::*;
    use crate::lock::{Holder, LockRecord, LockState};
    use crate::owner::AstCapability;
    use crate::policy::{Extent, InodeBits};
    use crate::test::util::StubOwner;

    /// Reference implementation: one flat pass over every lock, no group
    /// skipping. The grouped scan must agree with it on verdict and on the
    /// collected work set.
    fn scan_linear(
        arena: &LockArena,
        queue: &LockQueue,
        req: &Candidate,
        bound: Option<u64>,
        mut work: Option<&mut Vec<LockId>>,
    ) -> Verdict {
        let mut verdict = Verdict::Compatible;
        for l in queue.iter() {
            if l == req.id {
                continue;
            }
            let rec = match arena.get(l) {
                Some(rec) => rec,
                None => continue,
            };
            if let Some(bound) = bound {
                if rec.seq >= bound {
                    continue;
                }
            }
            if rec.queue_mode().compatible(req.mode) {
                continue;
            }
            if !req.policy.conflicts_with(&rec.policy) {
                continue;
            }
            match work.as_deref_mut() {
                None => return Verdict::Incompatible,
                Some(w) => {
                    verdict = Verdict::Incompatible;
                    if rec.owner.blocking_capability() == AstCapability::Available
                        && !w.contains(&l)
                    {
                        w.push(l);
                    }
                }
            }
        }
        verdict
    }

    fn lock_mode_gen() -> BoxedStrategy<LockMode> {
        prop_oneof![
            Just(LockMode::Nl),
            Just(LockMode::Cr),
            Just(LockMode::Cw),
            Just(LockMode::Pr),
            Just(LockMode::Pw),
            Just(LockMode::Ex),
        ]
        .boxed()
    }

    // small universes on purpose: collisions are where grouping goes wrong
    fn policy_gen(extents: bool) -> BoxedStrategy<Policy> {
        if extents {
            (0u64..12, 1u64..6)
                .prop_map(|(start, len)| Policy::Extent(Extent::new(start, start + len)))
                .boxed()
        } else {
            (0u64..16).prop_map(|b| Policy::InodeBits(InodeBits(b))).boxed()
        }
    }

    fn entry_gen(extents: bool) -> BoxedStrategy<(LockMode, Policy, bool)> {
        (lock_mode_gen(), policy_gen(extents), proptest::bool::ANY).boxed()
    }

    fn build(
        entries: &[(LockMode, Policy, bool)],
    ) -> (LockArena, LockQueue) {
        let mut arena = LockArena::new();
        let mut queue = LockQueue::default();
        for (i, &(mode, policy, capable)) in entries.iter().enumerate() {
            let cap = if capable {
                AstCapability::Available
            } else {
                AstCapability::Unreachable
            };
            let id = arena.insert(|id| LockRecord {
                id,
                owner: Arc::new(StubOwner::new(i as u64).with_blocking_capability(cap)),
                req_mode: mode,
                granted_mode: Some(mode),
                policy,
                state: LockState::Granted,
                seq: i as u64,
                speculative: false,
                in_waiting: false,
                holders: ordset![Holder::Queue],
                completion: None,
                waiter: None,
            });
            queue.insert(id, mode, policy);
        }
        (arena, queue)
    }

    type Case = (Vec<(LockMode, Policy, bool)>, LockMode, Policy, Option<u64>);

    // one policy kind per queue, as a real resource has
    fn case_gen() -> BoxedStrategy<Case> {
        proptest::bool::ANY
            .prop_flat_map(|extents| {
                (
                    proptest::collection::vec(entry_gen(extents), 0..24),
                    lock_mode_gen(),
                    policy_gen(extents),
                    proptest::option::of(0u64..26),
                )
            })
            .boxed()
    }

    proptest! {
        // the grouped skip-scan and the naive linear scan agree on the
        // verdict and on the work list as a set, for any grouping shape
        #[test]
        fn skip_scan_matches_linear_scan((entries, mode, policy, bound) in case_gen()) {
            let (mut arena, queue) = build(&entries);
            let id = arena.insert(|id| LockRecord {
                id,
                owner: Arc::new(StubOwner::new(999)),
                req_mode: mode,
                granted_mode: None,
                policy,
                state: LockState::Pending,
                seq: entries.len() as u64,
                speculative: false,
                in_waiting: false,
                holders: ordset![Holder::Requester],
                completion: None,
                waiter: None,
            });
            let req = Candidate { id, mode, policy, seq: entries.len() as u64 };

            let mut grouped = Vec::new();
            let mut linear = Vec::new();
            let v1 = scan_queue(&arena, &queue, &req, bound, Some(&mut grouped));
            let v2 = scan_linear(&arena, &queue, &req, bound, Some(&mut linear));
            prop_assert_eq!(v1, v2);
            grouped.sort_unstable();
            linear.sort_unstable();
            prop_assert_eq!(grouped, linear);

            // the fast probe agrees with the collecting pass
            let v3 = scan_queue(&arena, &queue, &req, bound, None);
            prop_assert_eq!(v3, v1);
        }
    }

    // a lock linked into the queue it is scanned against never conflicts
    // with itself
    #[test]
    fn self_is_always_compatible() {
        let entries = [(LockMode::Pw, Policy::InodeBits(InodeBits::UPDATE), true)];
        let (arena, mut queue) = build(&entries);
        let id = queue.iter().next().unwrap();
        let rec = arena.get(id).unwrap();
        let req = Candidate {
            id,
            mode: rec.req_mode,
            policy: rec.policy,
            seq: rec.seq,
        };
        // also bounded by its own sequence, as the reprocess path scans
        assert_eq!(
            scan_queue(&arena, &queue, &req, Some(req.seq), None),
            Verdict::Compatible
        );
        queue.remove(id);
    }

    #[test]
    fn collecting_scan_keeps_going_past_first_conflict() {
        let bits = Policy::InodeBits(InodeBits::UPDATE);
        let entries = [
            (LockMode::Pw, bits, true),
            (LockMode::Pr, bits, true),
            (LockMode::Ex, bits, false), // no blocking channel: conflicts, not collected
        ];
        let (mut arena, queue) = build(&entries);
        let id = arena.insert(|id| LockRecord {
            id,
            owner: Arc::new(StubOwner::new(7)),
            req_mode: LockMode::Pw,
            granted_mode: None,
            policy: bits,
            state: LockState::Pending,
            seq: 3,
            speculative: false,
            in_waiting: false,
            holders: ordset![Holder::Requester],
            completion: None,
            waiter: None,
        });
        let req = Candidate {
            id,
            mode: LockMode::Pw,
            policy: bits,
            seq: 3,
        };
        let mut work = Vec::new();
        assert_eq!(
            scan_queue(&arena, &queue, &req, None, Some(&mut work)),
            Verdict::Incompatible
        );
        // PW and PR holders both conflict and can be notified; the EX holder
        // conflicts but has no channel
        assert_eq!(work.len(), 2);
    }
}
