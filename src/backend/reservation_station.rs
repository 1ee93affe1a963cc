use crate::instructions::instructions::{InstrIndex, InstrStore, Tag};

/// The unified pool of in-flight instructions between dispatch and
/// retirement. Entries are kept in insertion (program) order, but nothing
/// depends on that; issue imposes tag order itself.
pub(crate) struct RSTable {
    pub(crate) capacity: usize,
    entries: Vec<InstrIndex>,
}

impl RSTable {
    pub(crate) fn new(capacity: usize) -> RSTable {
        RSTable {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // `pending` counts entries already bound for the RS this cycle but not
    // inserted yet.
    pub(crate) fn has_space(&self, pending: usize) -> bool {
        self.entries.len() + pending < self.capacity
    }

    pub(crate) fn entries(&self) -> &[InstrIndex] {
        &self.entries
    }

    pub(crate) fn insert(&mut self, index: InstrIndex) {
        debug_assert!(
            self.entries.len() < self.capacity,
            "RS overflow: dispatch must respect the capacity bound"
        );
        self.entries.push(index);
    }

    pub(crate) fn remove(&mut self, index: InstrIndex) {
        let pos = self.entries.iter().position(|&entry| entry == index);
        debug_assert!(pos.is_some(), "instruction is not in the RS");
        if let Some(pos) = pos {
            self.entries.remove(pos);
        }
    }

    // Broadcast of `producer`: every entry waiting on that tag gets the
    // matching source marked ready. A woken entry is issuable in the same
    // cycle.
    pub(crate) fn wakeup(&self, store: &mut InstrStore, producer: Tag) {
        for &index in &self.entries {
            let instr = store.get_mut(index);
            for s in 0..2 {
                if !instr.src_ready[s] && instr.src_tag[s] == Some(producer) {
                    instr.src_ready[s] = true;
                    instr.src_tag[s] = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::instructions::DecodedInstr;

    fn store_with(count: usize) -> (InstrStore, Vec<InstrIndex>) {
        let mut store = InstrStore::new();
        let mut handles = Vec::new();
        for _ in 0..count {
            handles.push(store.allocate(
                DecodedInstr {
                    op_code: 0,
                    dest_reg: -1,
                    src_reg: [-1, -1],
                },
                1,
            ));
        }
        (store, handles)
    }

    #[test]
    fn test_has_space_counts_pending() {
        let (_, handles) = store_with(2);
        let mut rs_table = RSTable::new(2);
        rs_table.insert(handles[0]);

        assert!(rs_table.has_space(0));
        assert!(!rs_table.has_space(1));
    }

    #[test]
    fn test_wakeup_marks_matching_sources() {
        let (mut store, handles) = store_with(3);

        // handle 1 waits on tag 1 through src 0, handle 2 through src 1
        {
            let instr = store.get_mut(handles[1]);
            instr.src_tag[0] = Some(1);
            instr.src_ready[1] = true;
        }
        {
            let instr = store.get_mut(handles[2]);
            instr.src_ready[0] = true;
            instr.src_tag[1] = Some(2);
        }

        let mut rs_table = RSTable::new(6);
        rs_table.insert(handles[1]);
        rs_table.insert(handles[2]);

        rs_table.wakeup(&mut store, 1);

        let woken = store.get(handles[1]);
        assert!(woken.src_ready[0] && woken.src_ready[1]);
        assert_eq!(woken.src_tag[0], None);

        // the entry waiting on tag 2 is untouched
        let waiting = store.get(handles[2]);
        assert!(!waiting.src_ready[1]);
        assert_eq!(waiting.src_tag[1], Some(2));
    }

    #[test]
    fn test_remove_keeps_the_rest() {
        let (_, handles) = store_with(3);
        let mut rs_table = RSTable::new(6);
        for &handle in &handles {
            rs_table.insert(handle);
        }

        rs_table.remove(handles[1]);
        assert_eq!(rs_table.entries(), &[handles[0], handles[2]]);
        assert_eq!(rs_table.size(), 2);
    }
}
