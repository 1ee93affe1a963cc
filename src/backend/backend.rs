use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::backend::functional_unit::FUTable;
use crate::backend::register_map::RegisterMap;
use crate::backend::reservation_station::RSTable;
use crate::instructions::instructions::{InstrIndex, InstrStore, Latch, FU_TYPE_COUNT};
use crate::sim::{PerfCounters, SimConfig, Trace};

/// Stages 2-5 of the pipeline: dispatch, schedule, execute and state
/// update, plus the CDB arbiter between execute and retirement.
pub(crate) struct Backend {
    instr_store: Rc<RefCell<InstrStore>>,
    fd_latch: Rc<RefCell<Latch>>,
    ds_latch: Latch,
    se_latch: Latch,
    disp_queue: VecDeque<InstrIndex>,
    rs_table: RSTable,
    fu_table: FUTable,
    reg_map: RegisterMap,
    // completed results contending for the CDB
    bus_wait: Vec<InstrIndex>,
    // results broadcast last cycle, leaving the pipeline this cycle
    st_update: Vec<InstrIndex>,
    cdb_count: usize,
    trace: Trace,
    perf_counters: Rc<RefCell<PerfCounters>>,
}

impl Backend {
    pub(crate) fn new(
        config: &SimConfig,
        instr_store: &Rc<RefCell<InstrStore>>,
        fd_latch: &Rc<RefCell<Latch>>,
        perf_counters: &Rc<RefCell<PerfCounters>>,
    ) -> Backend {
        let total_fus: usize = config.fu_counts.iter().map(|&count| count as usize).sum();

        Backend {
            instr_store: Rc::clone(instr_store),
            fd_latch: Rc::clone(fd_latch),
            ds_latch: Latch::new(),
            se_latch: Latch::new(),
            disp_queue: VecDeque::new(),
            rs_table: RSTable::new(2 * total_fus),
            fu_table: FUTable::new(&config.fu_counts),
            reg_map: RegisterMap::new(),
            bus_wait: Vec::new(),
            st_update: Vec::new(),
            cdb_count: config.cdb_count as usize,
            trace: config.trace.clone(),
            perf_counters: Rc::clone(perf_counters),
        }
    }

    // One tick. Stages run in reverse pipeline order so that a result can
    // broadcast, wake a dependent and see that dependent issue within the
    // same cycle: each stage consumes what its upstream stage produced in
    // the previous tick.
    pub(crate) fn do_cycle(&mut self, cycle: u64) {
        self.cycle_retire();
        self.cycle_execute(cycle);
        self.cycle_broadcast(cycle);
        self.cycle_start_execute(cycle);
        self.cycle_rs_insert(cycle);
        self.cycle_dispatch_fill(cycle);
        self.sample_disp_queue();
        self.cycle_issue(cycle);
        self.cycle_dispatch_drain();

        self.ds_latch.advance();
        self.se_latch.advance();
    }

    // True when nothing is left anywhere in the backend.
    pub(crate) fn is_empty(&self) -> bool {
        self.disp_queue.is_empty()
            && self.rs_table.is_empty()
            && self.st_update.is_empty()
            && self.bus_wait.is_empty()
            && self.ds_latch.is_empty()
            && self.se_latch.is_empty()
            && !self.fu_table.any_busy()
    }

    // Stage 5: instructions that broadcast last cycle leave the RS.
    fn cycle_retire(&mut self) {
        if self.st_update.is_empty() {
            return;
        }

        let store = self.instr_store.borrow();
        let mut perf_counters = self.perf_counters.borrow_mut();

        for &index in &self.st_update {
            self.rs_table.remove(index);
            perf_counters.retired_cnt += 1;

            if self.trace.retire {
                let instr = store.get(index);
                println!(
                    "Retired [{}] fetch={} disp={} sched={} exec={} state={}",
                    instr, instr.fetch_c, instr.disp_c, instr.sched_c, instr.exec_c, instr.state_c
                );
            }
        }
        self.st_update.clear();
    }

    // Stage 4a: every busy FU advances one cycle; completions queue up for
    // bus arbitration.
    fn cycle_execute(&mut self, cycle: u64) {
        let mut store = self.instr_store.borrow_mut();
        self.fu_table.tick(&mut store, cycle, &mut self.bus_wait);
    }

    // Stage 4b: CDB arbitration. Oldest completion first, ties to the
    // older tag, at most cdb_count winners. A winner frees its FU, clears
    // its rename entry if it still owns it, and wakes its dependents; a
    // loser keeps sitting on its FU.
    fn cycle_broadcast(&mut self, cycle: u64) {
        if self.bus_wait.is_empty() {
            return;
        }

        let mut store = self.instr_store.borrow_mut();

        let mut ordered = self.bus_wait.clone();
        ordered.sort_by_key(|&index| {
            let instr = store.get(index);
            (instr.completion_c, instr.tag)
        });

        let mut losers = Vec::new();
        for (slot, &index) in ordered.iter().enumerate() {
            if slot >= self.cdb_count {
                losers.push(index);
                continue;
            }

            let (tag, dest_reg) = {
                let instr = store.get_mut(index);
                instr.waiting_bus = false;
                instr.enqueued_bus = false;
                instr.state_c = cycle;
                (instr.tag, instr.raw.dest_reg)
            };

            self.fu_table.release(&mut store, index);
            self.reg_map.clear_if_equal(dest_reg, tag);
            self.rs_table.wakeup(&mut store, tag);

            if self.trace.broadcast {
                println!("Broadcast [{}]", store.get(index));
            }
            self.st_update.push(index);
        }

        self.bus_wait = losers;
    }

    // Stage 4c: issued instructions move from the latch into their FUs.
    // The lookahead guaranteed a free unit; not finding one is an
    // invariant violation.
    fn cycle_start_execute(&mut self, cycle: u64) {
        let entries = self.se_latch.take_cur();
        if entries.is_empty() {
            return;
        }

        let mut store = self.instr_store.borrow_mut();
        for index in entries {
            let fu_type = store.get(index).fu_type;
            let fu_index = match self.fu_table.find_free(fu_type) {
                Some(fu_index) => fu_index,
                None => panic!(
                    "no free FU of type {} for [{}]: the issue lookahead oversubscribed",
                    fu_type,
                    store.get(index)
                ),
            };
            self.fu_table.assign(fu_index, &mut store, index, cycle);

            if self.trace.execute {
                println!("Executing [{}]", store.get(index));
            }
        }
    }

    // Stage 3a: dispatched instructions enter the RS. Both sources look up
    // their producer before the instruction installs itself as the
    // youngest writer of its destination, so an instruction reading its
    // own destination register waits on the previous writer.
    fn cycle_rs_insert(&mut self, cycle: u64) {
        let entries = self.ds_latch.take_cur();
        if entries.is_empty() {
            return;
        }

        let mut store = self.instr_store.borrow_mut();
        for index in entries {
            let instr = store.get_mut(index);
            instr.sched_c = cycle;
            // eligible for issue the same cycle it enters the RS
            instr.sched_ready_c = cycle;

            for s in 0..2 {
                match self.reg_map.lookup(instr.raw.src_reg[s]) {
                    None => {
                        instr.src_ready[s] = true;
                        instr.src_tag[s] = None;
                    }
                    Some(producer) => {
                        instr.src_ready[s] = false;
                        instr.src_tag[s] = Some(producer);
                    }
                }
            }
            self.reg_map.rename(instr.raw.dest_reg, instr.tag);

            if self.trace.rs_insert {
                println!("RS insert [{}]", instr);
            }
            self.rs_table.insert(index);
        }
    }

    // Stage 2b: the fetch->dispatch latch drains into the dispatch queue.
    fn cycle_dispatch_fill(&mut self, cycle: u64) {
        let entries = self.fd_latch.borrow_mut().take_cur();
        if entries.is_empty() {
            return;
        }

        let mut store = self.instr_store.borrow_mut();
        for index in entries {
            let instr = store.get_mut(index);
            instr.disp_c = cycle;

            if self.trace.dispatch {
                println!("Dispatched [{}]", instr);
            }
            self.disp_queue.push_back(index);
        }
    }

    // The occupancy sample includes this cycle's arrivals and none of this
    // cycle's departures.
    fn sample_disp_queue(&mut self) {
        let mut perf_counters = self.perf_counters.borrow_mut();
        let size = self.disp_queue.len() as u64;
        perf_counters.disp_size_sum += size;
        if size > perf_counters.disp_size_max {
            perf_counters.disp_size_max = size;
        }
    }

    // Stage 3b: walk the RS in tag order and fire every entry whose
    // sources are ready, as long as the projection still has a unit of its
    // type to hand out next cycle.
    fn cycle_issue(&mut self, cycle: u64) {
        if self.rs_table.is_empty() {
            return;
        }

        let mut store = self.instr_store.borrow_mut();

        let mut ordered: Vec<InstrIndex> = self.rs_table.entries().to_vec();
        ordered.sort_by_key(|&index| store.get(index).tag);

        let free_next = self.fu_table.projected_free(&store, cycle, self.cdb_count);
        let mut reserved = [0usize; FU_TYPE_COUNT];

        let mut perf_counters = self.perf_counters.borrow_mut();
        for index in ordered {
            let instr = store.get_mut(index);
            if instr.issued {
                continue;
            }
            if cycle < instr.sched_ready_c {
                continue;
            }
            if !(instr.src_ready[0] && instr.src_ready[1]) {
                continue;
            }

            let fu_type = instr.fu_type;
            if reserved[fu_type] >= free_next[fu_type] {
                continue;
            }

            instr.issued = true;
            reserved[fu_type] += 1;
            perf_counters.issue_cnt += 1;

            if self.trace.issue {
                println!("Issued [{}]", instr);
            }
            self.se_latch.push(index);
        }
    }

    // Stage 2a: dispatch in program order, bounded by the RS slots left
    // over after this cycle's own insertions.
    fn cycle_dispatch_drain(&mut self) {
        while let Some(&index) = self.disp_queue.front() {
            if !self.rs_table.has_space(self.ds_latch.nxt_len()) {
                break;
            }
            self.disp_queue.pop_front();
            self.ds_latch.push(index);
        }
    }
}
