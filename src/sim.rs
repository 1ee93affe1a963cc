use std::cell::RefCell;
use std::error::Error;
use std::fs::File;
use std::rc::Rc;

use serde::Deserialize;

use crate::backend::backend::Backend;
use crate::frontend::frontend::Frontend;
use crate::instructions::instructions::{InstrSource, InstrStore, Latch, FU_TYPE_COUNT};

// Per-stage print switches, all off by default.
#[derive(Clone, Deserialize, Debug, Default)]
#[serde(default)]
pub struct Trace {
    pub fetch: bool,
    pub dispatch: bool,
    pub rs_insert: bool,
    pub issue: bool,
    pub execute: bool,
    pub broadcast: bool,
    pub retire: bool,
    pub cycle: bool,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct SimConfig {
    // the number of instructions fetched from the trace per cycle
    pub fetch_n_wide: u8,
    // the number of result buses; a configured 0 is normalized to 1
    pub cdb_count: u8,
    // the number of functional units of each type
    pub fu_counts: [u16; FU_TYPE_COUNT],
    // if processing of single instructions should be traced (printed)
    pub trace: Trace,
}

impl Default for SimConfig {
    // the reference configuration of the published benchmark runs
    fn default() -> SimConfig {
        SimConfig {
            fetch_n_wide: 8,
            cdb_count: 8,
            fu_counts: [3, 3, 3],
            trace: Trace::default(),
        }
    }
}

pub fn load_sim_config(file_path: &str) -> Result<SimConfig, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let config = serde_yaml::from_reader(file)?;
    Ok(config)
}

pub(crate) struct PerfCounters {
    pub fetch_cnt: u64,
    pub issue_cnt: u64,
    pub retired_cnt: u64,
    pub cycle_cnt: u64,
    pub disp_size_sum: u64,
    pub disp_size_max: u64,
}

impl PerfCounters {
    pub fn new() -> PerfCounters {
        PerfCounters {
            fetch_cnt: 0,
            issue_cnt: 0,
            retired_cnt: 0,
            cycle_cnt: 0,
            disp_size_sum: 0,
            disp_size_max: 0,
        }
    }
}

/// The statistics record handed back to the caller. `run` fills the two
/// counts, `complete` the averages; everything is zero for an empty trace.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimStats {
    pub cycle_count: u64,
    pub retired_instruction: u64,
    pub avg_inst_fired: f32,
    pub avg_inst_retired: f32,
    pub avg_disp_size: f32,
    pub max_disp_size: u64,
}

impl SimStats {
    pub fn print(&self) {
        println!("Cycles:                   {}", self.cycle_count);
        println!("Instructions retired:     {}", self.retired_instruction);
        println!("Avg instructions fired:   {:.6}", self.avg_inst_fired);
        println!("Avg instructions retired: {:.6}", self.avg_inst_retired);
        println!("Avg dispatch queue size:  {:.6}", self.avg_disp_size);
        println!("Max dispatch queue size:  {}", self.max_disp_size);
    }
}

/// The whole machine: frontend, backend and the cycle loop.
pub struct Processor {
    frontend: Frontend,
    backend: Backend,
    fd_latch: Rc<RefCell<Latch>>,
    perf_counters: Rc<RefCell<PerfCounters>>,
    trace_cycle: bool,
}

impl Processor {
    pub fn new(config: &SimConfig) -> Processor {
        assert!(config.fetch_n_wide >= 1, "fetch width must be at least 1");
        for (fu_type, &count) in config.fu_counts.iter().enumerate() {
            // a type with zero units can never drain; negative opcodes
            // always map to type 1
            assert!(count >= 1, "FU type {} has no units", fu_type);
        }

        let mut config = config.clone();
        if config.cdb_count == 0 {
            config.cdb_count = 1;
        }

        let instr_store = Rc::new(RefCell::new(InstrStore::new()));
        let fd_latch = Rc::new(RefCell::new(Latch::new()));
        let perf_counters = Rc::new(RefCell::new(PerfCounters::new()));

        let backend = Backend::new(&config, &instr_store, &fd_latch, &perf_counters);
        let frontend = Frontend::new(&config, &instr_store, &fd_latch, &perf_counters);

        Processor {
            frontend,
            backend,
            fd_latch,
            perf_counters,
            trace_cycle: config.trace.cycle,
        }
    }

    /// Drains the source to completion and fills `cycle_count` and
    /// `retired_instruction`. The averages are left for `complete`.
    pub fn run(&mut self, source: Box<dyn InstrSource>, stats: &mut SimStats) {
        self.frontend.init(source);

        let mut cycle: u64 = 0;
        while !self.frontend.trace_done() || !self.pipeline_empty() {
            cycle += 1;

            self.backend.do_cycle(cycle);
            self.frontend.do_cycle(cycle);
            self.fd_latch.borrow_mut().advance();

            if self.trace_cycle {
                let perf_counters = self.perf_counters.borrow();
                println!(
                    "[Cycle {}][Fetched={}][Fired={}][Retired={}]",
                    cycle,
                    perf_counters.fetch_cnt,
                    perf_counters.issue_cnt,
                    perf_counters.retired_cnt
                );
            }
        }

        let mut perf_counters = self.perf_counters.borrow_mut();
        if perf_counters.fetch_cnt == 0 {
            *stats = SimStats::default();
            return;
        }

        // the loop runs one tick past the last useful work
        if cycle > 0 {
            cycle -= 1;
        }
        perf_counters.cycle_cnt = cycle;

        stats.cycle_count = cycle;
        stats.retired_instruction = perf_counters.retired_cnt;
    }

    /// Second half of the reporting surface: the averages over the
    /// effective cycle count.
    pub fn complete(&self, stats: &mut SimStats) {
        if stats.cycle_count == 0 {
            stats.avg_inst_fired = 0.0;
            stats.avg_inst_retired = 0.0;
            stats.avg_disp_size = 0.0;
            stats.max_disp_size = 0;
            return;
        }

        let perf_counters = self.perf_counters.borrow();
        stats.avg_inst_fired = perf_counters.issue_cnt as f32 / stats.cycle_count as f32;
        stats.avg_inst_retired = stats.retired_instruction as f32 / stats.cycle_count as f32;
        stats.avg_disp_size =
            (perf_counters.disp_size_sum as f64 / stats.cycle_count as f64) as f32;
        stats.max_disp_size = perf_counters.disp_size_max;
    }

    fn pipeline_empty(&self) -> bool {
        self.backend.is_empty() && self.fd_latch.borrow().is_empty()
    }
}
