use std::process;

use clap::Parser;

use crate::loader::loader::load_trace;
use crate::sim::{load_sim_config, Processor, SimConfig, SimStats};

mod backend;
mod frontend;
mod instructions;
mod loader;
mod sim;

/// Command-line arguments for the pipeline timing simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "Out-of-order superscalar pipeline timing simulator")]
struct Args {
    /// Trace file: one `op dest src0 src1` record per line.
    trace: String,

    /// YAML configuration file; built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Fetch width override.
    #[arg(short = 'f', long)]
    fetch: Option<u8>,

    /// CDB width override.
    #[arg(short = 'r', long)]
    cdb: Option<u8>,

    /// Type-0 FU count override.
    #[arg(long)]
    k0: Option<u16>,

    /// Type-1 FU count override.
    #[arg(long)]
    k1: Option<u16>,

    /// Type-2 FU count override.
    #[arg(long)]
    k2: Option<u16>,
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match load_sim_config(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error loading config {}: {}", path, err);
                process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    if let Some(fetch_n_wide) = args.fetch {
        config.fetch_n_wide = fetch_n_wide;
    }
    if let Some(cdb_count) = args.cdb {
        config.cdb_count = cdb_count;
    }
    if let Some(k0) = args.k0 {
        config.fu_counts[0] = k0;
    }
    if let Some(k1) = args.k1 {
        config.fu_counts[1] = k1;
    }
    if let Some(k2) = args.k2 {
        config.fu_counts[2] = k2;
    }

    let records = match load_trace(&args.trace) {
        Ok(records) => records,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    let mut processor = Processor::new(&config);
    let mut stats = SimStats::default();
    processor.run(Box::new(records.into_iter()), &mut stats);
    processor.complete(&mut stats);
    stats.print();
}
