use crate::lock::LockId;
use crate::mode::LockMode;
use crate::policy::Policy;

/// A granted or waiting queue, kept partitioned into contiguous mode groups
/// and, inside each, policy groups. The compatibility scan skips whole
/// groups; group boundaries are structural, so there are no tail pointers to
/// keep in sync with the membership.
///
/// A new lock joins the existing group for its mode and policy or opens a new
/// group at the tail. A lock is never moved once linked.
#[derive(Debug, Default)]
pub(crate) struct LockQueue {
    groups: Vec<ModeGroup>,
    len: usize,
}

#[derive(Debug)]
pub(crate) struct ModeGroup {
    pub mode: LockMode,
    pub policies: Vec<PolicyGroup>,
}

#[derive(Debug)]
pub(crate) struct PolicyGroup {
    pub policy: Policy,
    pub locks: Vec<LockId>,
}

impl LockQueue {
    pub fn insert(&mut self, id: LockId, mode: LockMode, policy: Policy) {
        assert!(!self.contains(id), "lock already linked");
        self.len += 1;
        match self.groups.iter_mut().find(|g| g.mode == mode) {
            Some(group) => match group.policies.iter_mut().find(|p| p.policy == policy) {
                Some(pg) => pg.locks.push(id),
                None => group.policies.push(PolicyGroup {
                    policy,
                    locks: vec![id],
                }),
            },
            None => self.groups.push(ModeGroup {
                mode,
                policies: vec![PolicyGroup {
                    policy,
                    locks: vec![id],
                }],
            }),
        }
    }

    pub fn remove(&mut self, id: LockId) -> bool {
        for group in self.groups.iter_mut() {
            for pg in group.policies.iter_mut() {
                if let Some(i) = pg.locks.iter().position(|&l| l == id) {
                    pg.locks.remove(i);
                    group.policies.retain(|p| !p.locks.is_empty());
                    self.groups.retain(|g| !g.policies.is_empty());
                    self.len -= 1;
                    return true;
                }
            }
        }
        false
    }

    pub fn contains(&self, id: LockId) -> bool {
        self.iter().any(|l| l == id)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn groups(&self) -> &[ModeGroup] {
        &self.groups
    }

    /// Group-order traversal of every linked lock.
    pub fn iter(&self) -> impl Iterator<Item = LockId> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.policies.iter())
            .flat_map(|p| p.locks.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::InodeBits;

    fn id(n: u32) -> LockId {
        LockId { idx: n, gen: 0 }
    }

    #[test]
    fn same_mode_and_policy_share_one_group() {
        let mut q = LockQueue::default();
        let bits = Policy::InodeBits(InodeBits::UPDATE);
        q.insert(id(0), LockMode::Pr, bits);
        q.insert(id(1), LockMode::Pw, bits);
        q.insert(id(2), LockMode::Pr, bits);
        assert_eq!(q.groups().len(), 2);
        assert_eq!(q.groups()[0].policies[0].locks, vec![id(0), id(2)]);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn distinct_policies_split_groups() {
        let mut q = LockQueue::default();
        q.insert(id(0), LockMode::Pr, Policy::InodeBits(InodeBits::UPDATE));
        q.insert(id(1), LockMode::Pr, Policy::InodeBits(InodeBits::LOOKUP));
        assert_eq!(q.groups().len(), 1);
        assert_eq!(q.groups()[0].policies.len(), 2);
    }

    #[test]
    fn remove_prunes_empty_groups() {
        let mut q = LockQueue::default();
        q.insert(id(0), LockMode::Pw, Policy::InodeBits(InodeBits::UPDATE));
        assert!(q.remove(id(0)));
        assert!(!q.remove(id(0)));
        assert!(q.is_empty());
        assert!(q.groups().is_empty());
    }
}
