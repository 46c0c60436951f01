use crate::lock::{Holder, LockId, LockRecord};

/// The single authoritative store for a resource's lock records. Queues,
/// interval trees, and the dispatcher hold `LockId`s, never references; the
/// explicit holder set decides when a record dies.
#[derive(Debug, Default)]
pub(crate) struct LockArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

#[derive(Debug)]
struct Slot {
    gen: u32,
    rec: Option<LockRecord>,
}

impl LockArena {
    pub fn new() -> Self {
        LockArena::default()
    }

    pub fn insert(&mut self, make: impl FnOnce(LockId) -> LockRecord) -> LockId {
        match self.free.pop() {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                slot.gen = slot.gen.wrapping_add(1);
                let id = LockId { idx, gen: slot.gen };
                slot.rec = Some(make(id));
                id
            }
            None => {
                let idx = self.slots.len() as u32;
                let id = LockId { idx, gen: 0 };
                self.slots.push(Slot {
                    gen: 0,
                    rec: Some(make(id)),
                });
                id
            }
        }
    }

    pub fn get(&self, id: LockId) -> Option<&LockRecord> {
        self.slots
            .get(id.idx as usize)
            .filter(|s| s.gen == id.gen)
            .and_then(|s| s.rec.as_ref())
    }

    pub fn get_mut(&mut self, id: LockId) -> Option<&mut LockRecord> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|s| s.gen == id.gen)
            .and_then(|s| s.rec.as_mut())
    }

    pub fn retain(&mut self, id: LockId, holder: Holder) {
        if let Some(rec) = self.get_mut(id) {
            rec.holders.insert(holder);
        }
    }

    /// Drops one holder; frees the slot when the holder set empties.
    /// Returns whether the record was freed by this call.
    pub fn release(&mut self, id: LockId, holder: Holder) -> bool {
        let emptied = match self.get_mut(id) {
            Some(rec) => {
                rec.holders.remove(&holder);
                rec.holders.is_empty()
            }
            None => false,
        };
        if emptied {
            let slot = &mut self.slots[id.idx as usize];
            slot.rec = None;
            self.free.push(id.idx);
        }
        emptied
    }

    pub fn iter(&self) -> impl Iterator<Item = &'_ LockRecord> {
        self.slots.iter().filter_map(|s| s.rec.as_ref())
    }
}
