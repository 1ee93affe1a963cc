use crate::instructions::instructions::{
    InstrIndex, InstrStore, Tag, FU_LATENCY, FU_TYPE_COUNT,
};

/// A single functional unit. The slot is the exclusive owner of the
/// instruction it holds and stays occupied after the countdown reaches
/// zero: it is released only when the result wins a CDB slot, so a congested
/// bus shows up as a structural bottleneck in execute.
pub(crate) struct FU {
    pub(crate) fu_type: usize,
    pub(crate) instr: Option<InstrIndex>,
    // ticks until execution completes
    pub(crate) remaining: u8,
}

/// The pool of all functional units, partitioned by type.
pub(crate) struct FUTable {
    array: Vec<FU>,
}

impl FUTable {
    // Units are created type 0 first, then 1, then 2; find_free scans in
    // that pool order.
    pub(crate) fn new(fu_counts: &[u16; FU_TYPE_COUNT]) -> FUTable {
        let total = fu_counts.iter().map(|&count| count as usize).sum();
        let mut array: Vec<FU> = Vec::with_capacity(total);
        for (fu_type, &count) in fu_counts.iter().enumerate() {
            for _ in 0..count {
                array.push(FU {
                    fu_type,
                    instr: None,
                    remaining: 0,
                });
            }
        }
        FUTable { array }
    }

    pub(crate) fn find_free(&self, fu_type: usize) -> Option<usize> {
        self.array
            .iter()
            .position(|fu| fu.fu_type == fu_type && fu.instr.is_none())
    }

    pub(crate) fn any_busy(&self) -> bool {
        self.array.iter().any(|fu| fu.instr.is_some())
    }

    pub(crate) fn assign(
        &mut self,
        fu_index: usize,
        store: &mut InstrStore,
        instr_index: InstrIndex,
        cycle: u64,
    ) {
        let fu = &mut self.array[fu_index];
        debug_assert!(fu.instr.is_none(), "FU {} is already occupied", fu_index);

        fu.instr = Some(instr_index);
        fu.remaining = FU_LATENCY[fu.fu_type];

        let instr = store.get_mut(instr_index);
        debug_assert!(instr.fu_type == fu.fu_type);
        instr.exec_c = cycle;
        instr.fu_index = Some(fu_index);
    }

    // Advance every busy unit one cycle. A unit that hits zero parks its
    // instruction on the bus-wait list; the slot itself is not freed here.
    pub(crate) fn tick(
        &mut self,
        store: &mut InstrStore,
        cycle: u64,
        bus_wait: &mut Vec<InstrIndex>,
    ) {
        for fu in &mut self.array {
            let instr_index = match fu.instr {
                Some(instr_index) => instr_index,
                None => continue,
            };
            if fu.remaining == 0 {
                continue;
            }

            fu.remaining -= 1;
            if fu.remaining > 0 {
                continue;
            }

            let instr = store.get_mut(instr_index);
            if instr.waiting_bus {
                continue;
            }
            if instr.completion_c == 0 {
                instr.completion_c = cycle;
            }
            instr.waiting_bus = true;
            if !instr.enqueued_bus {
                instr.enqueued_bus = true;
                bus_wait.push(instr_index);
            }
        }
    }

    // Free the slot once its result won a CDB grant.
    pub(crate) fn release(&mut self, store: &mut InstrStore, instr_index: InstrIndex) {
        let instr = store.get_mut(instr_index);
        if let Some(fu_index) = instr.fu_index.take() {
            let fu = &mut self.array[fu_index];
            debug_assert!(
                fu.instr == Some(instr_index),
                "FU back-reference out of sync"
            );
            fu.instr = None;
            fu.remaining = 0;
        }
    }

    /// Projects, per type, how many units will be free for instructions
    /// issued this cycle (they reach execute next cycle). Idle units count
    /// directly. A busy unit counts only if the CDB can actually broadcast
    /// its result next cycle: candidates are ordered by (free cycle, tag)
    /// and at most `cdb_count` of them are granted, mirroring the arbiter.
    pub(crate) fn projected_free(
        &self,
        store: &InstrStore,
        cycle: u64,
        cdb_count: usize,
    ) -> [usize; FU_TYPE_COUNT] {
        let mut free_cnt = [0usize; FU_TYPE_COUNT];

        struct Candidate {
            fu_type: usize,
            free_cycle: u64,
            tag: Tag,
        }
        let mut candidates: Vec<Candidate> = Vec::new();

        for fu in &self.array {
            let instr_index = match fu.instr {
                Some(instr_index) => instr_index,
                None => {
                    free_cnt[fu.fu_type] += 1;
                    continue;
                }
            };

            let instr = store.get(instr_index);
            if instr.waiting_bus {
                candidates.push(Candidate {
                    fu_type: fu.fu_type,
                    free_cycle: instr.completion_c,
                    tag: instr.tag,
                });
            } else if fu.remaining == 1 {
                // finishes at the next execute tick and can free right after
                candidates.push(Candidate {
                    fu_type: fu.fu_type,
                    free_cycle: cycle + 1,
                    tag: instr.tag,
                });
            }
        }

        candidates.sort_by_key(|candidate| (candidate.free_cycle, candidate.tag));

        for candidate in candidates.iter().take(cdb_count) {
            free_cnt[candidate.fu_type] += 1;
        }

        free_cnt
    }
}
