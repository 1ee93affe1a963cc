use std::cell::RefCell;
use std::rc::Rc;

use crate::instructions::instructions::{InstrSource, InstrStore, Latch};
use crate::sim::{PerfCounters, SimConfig};

/// Stage 1: pulls decoded records from the instruction source, gives each
/// one a fresh tag and pushes it into the fetch->dispatch latch.
pub(crate) struct Frontend {
    instr_store: Rc<RefCell<InstrStore>>,
    fd_latch: Rc<RefCell<Latch>>,
    perf_counters: Rc<RefCell<PerfCounters>>,
    source: Option<Box<dyn InstrSource>>,
    n_wide: u8,
    trace: bool,
    trace_done: bool,
}

impl Frontend {
    pub(crate) fn new(
        config: &SimConfig,
        instr_store: &Rc<RefCell<InstrStore>>,
        fd_latch: &Rc<RefCell<Latch>>,
        perf_counters: &Rc<RefCell<PerfCounters>>,
    ) -> Frontend {
        Frontend {
            instr_store: Rc::clone(instr_store),
            fd_latch: Rc::clone(fd_latch),
            perf_counters: Rc::clone(perf_counters),
            source: None,
            n_wide: config.fetch_n_wide,
            trace: config.trace.fetch,
            trace_done: false,
        }
    }

    pub(crate) fn init(&mut self, source: Box<dyn InstrSource>) {
        self.source = Some(source);
        self.trace_done = false;
    }

    pub(crate) fn trace_done(&self) -> bool {
        self.trace_done
    }

    pub(crate) fn do_cycle(&mut self, cycle: u64) {
        if self.trace_done {
            return;
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return,
        };

        let mut store = self.instr_store.borrow_mut();
        let mut fd_latch = self.fd_latch.borrow_mut();
        let mut perf_counters = self.perf_counters.borrow_mut();

        for _ in 0..self.n_wide {
            let raw = match source.read_instruction() {
                Some(raw) => raw,
                None => {
                    self.trace_done = true;
                    break;
                }
            };

            let index = store.allocate(raw, cycle);
            perf_counters.fetch_cnt += 1;

            if self.trace {
                println!("Fetched [{}]", store.get(index));
            }
            fd_latch.push(index);
        }
    }
}
