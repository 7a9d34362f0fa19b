use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use crate::cli::CountArgs;
use crate::errors::CoreResult;
use crate::kmer::Kmer;
use crate::kmercount::{self, configure_counting, KmerCountWriter};
use crate::sequence_source::open_sources;
use crate::utils::{default_memory_budget_bytes, track_progress_and_resources};

struct CsvCountWriter {
    writer: csv::Writer<std::fs::File>,
}

impl KmerCountWriter for CsvCountWriter {
    fn write_entry(&mut self, kmer: Kmer, count: u64) -> CoreResult<()> {
        let seq = String::from_utf8(kmer.to_seq()).unwrap_or_default();
        self.writer
            .write_record(&[seq, count.to_string()])
            .map_err(|e| crate::errors::CoreError::storage_error("CsvCountWriter", "write_entry", std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
    }
}

pub fn run_count(args: CountArgs) -> Result<()> {
    info!("Starting count command with args: {:?}", args);

    let mut source = open_sources(&args.input_files, args.kmer_size).context("opening input files")?;

    let memory_budget = match args.memory_budget {
        Some(b) => b as usize,
        None => default_memory_budget_bytes().context("deriving default memory budget")? as usize,
    };
    let estimated = args.estimated_num_mers.unwrap_or(1_000_000);
    let config = configure_counting(args.kmer_size, estimated, memory_budget).context("configuring counting partitions")?;
    info!("counting config: {:?}", config);

    let own_spill_dir = args.spill_dir.is_none();
    let spill_dir: PathBuf = args
        .spill_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("chainweave-spill-{}", std::process::id())));
    std::fs::create_dir_all(&spill_dir).context("creating spill directory")?;

    let mut writer = CsvCountWriter {
        writer: csv::WriterBuilder::new().has_headers(false).from_path(&args.output_file).context("creating output CSV")?,
    };

    let stats = track_progress_and_resources("Counting k-mers", args.input_files.len() as u64, |_pb| {
        kmercount::build(&mut source, args.kmer_size, config, &spill_dir, &mut writer).context("counting k-mers")
    })?;
    writer.writer.flush().context("flushing output CSV")?;
    if own_spill_dir {
        let _ = std::fs::remove_dir_all(&spill_dir);
    }

    info!(
        "observed {} mers, {} distinct, {} runs written",
        stats.num_mers_observed, stats.num_distinct_mers, stats.num_runs_written
    );
    println!("{} distinct k-mers written to {:?}", stats.num_distinct_mers, args.output_file);

    Ok(())
}
