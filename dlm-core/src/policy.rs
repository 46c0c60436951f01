/// End-of-file sentinel for extents that run to the end of the object.
pub const EOF: u64 = u64::MAX;

/// Bitmask of protected inode attributes for metadata locks. Holders with
/// disjoint masks coexist even under conflicting modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeBits(pub u64);
impl InodeBits {
    pub const LOOKUP: InodeBits = InodeBits(1 << 0);
    pub const UPDATE: InodeBits = InodeBits(1 << 1);
    pub const OPEN: InodeBits = InodeBits(1 << 2);
    pub const LAYOUT: InodeBits = InodeBits(1 << 3);
    pub const XATTR: InodeBits = InodeBits(1 << 4);
    pub const PERM: InodeBits = InodeBits(1 << 5);
    pub const DOM: InodeBits = InodeBits(1 << 6);

    pub fn intersects(self, other: InodeBits) -> bool {
        self.0 & other.0 != 0
    }
}
impl std::ops::BitOr for InodeBits {
    type Output = InodeBits;
    fn bitor(self, rhs: InodeBits) -> InodeBits {
        InodeBits(self.0 | rhs.0)
    }
}
impl std::fmt::Display for InodeBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bits:{:#x}", self.0)
    }
}

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Extent {
    pub start: u64,
    pub end: u64,
}
impl Extent {
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start < end, "empty extent");
        Extent { start, end }
    }
    pub fn to_eof(start: u64) -> Self {
        Extent { start, end: EOF }
    }
    pub fn overlaps(self, other: Extent) -> bool {
        self.start < other.end && other.start < self.end
    }
}
impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.end == EOF {
            write!(f, "[{}, EOF)", self.start)
        } else {
            write!(f, "[{}, {})", self.start, self.end)
        }
    }
}

/// Sub-resource scoping of a lock. Every lock on one resource carries the
/// same variant; mixing kinds is queue corruption and is rejected upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    Extent(Extent),
    InodeBits(InodeBits),
}
impl Policy {
    pub fn conflicts_with(&self, other: &Policy) -> bool {
        match (self, other) {
            (Policy::InodeBits(a), Policy::InodeBits(b)) => a.intersects(*b),
            (Policy::Extent(a), Policy::Extent(b)) => a.overlaps(*b),
            // heterogeneous kinds never legitimately meet on one resource;
            // treat as conflicting so corruption cannot widen a grant
            _ => true,
        }
    }
    pub(crate) fn same_kind(&self, other: &Policy) -> bool {
        matches!(
            (self, other),
            (Policy::Extent(_), Policy::Extent(_)) | (Policy::InodeBits(_), Policy::InodeBits(_))
        )
    }
}
impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Extent(e) => write!(f, "{}", e),
            Policy::InodeBits(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_bits_do_not_conflict() {
        let a = Policy::InodeBits(InodeBits::LOOKUP);
        let b = Policy::InodeBits(InodeBits::UPDATE);
        assert!(!a.conflicts_with(&b));
        assert!(a.conflicts_with(&Policy::InodeBits(InodeBits::LOOKUP | InodeBits::UPDATE)));
    }

    #[test]
    fn extent_overlap_is_half_open() {
        let a = Extent::new(0, 4096);
        let b = Extent::new(4096, 8192);
        assert!(!a.overlaps(b));
        assert!(a.overlaps(Extent::new(4095, 4097)));
        assert!(Extent::to_eof(100).overlaps(Extent::new(0, 101)));
        assert!(!Extent::to_eof(100).overlaps(Extent::new(0, 100)));
    }

    #[test]
    fn mixed_kinds_always_conflict() {
        let a = Policy::Extent(Extent::new(0, 1));
        let b = Policy::InodeBits(InodeBits::LOOKUP);
        assert!(a.conflicts_with(&b));
        assert!(!a.same_kind(&b));
    }
}
