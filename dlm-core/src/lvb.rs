/// Lock Value Block: the resource's best-known size and timestamps, refreshed
/// by glimpse replies and by granted-lock release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lvb {
    pub size: u64,
    pub blocks: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}
impl Lvb {
    /// Merge a concurrent view into this one. Every field prefers the larger
    /// value; in particular the size never shrinks underneath a concurrent
    /// append.
    pub fn merge(&mut self, other: &Lvb) {
        self.size = self.size.max(other.size);
        self.blocks = self.blocks.max(other.blocks);
        self.atime = self.atime.max(other.atime);
        self.mtime = self.mtime.max(other.mtime);
        self.ctime = self.ctime.max(other.ctime);
    }
}
