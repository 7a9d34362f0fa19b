use anyhow::{Context, Result};
use log::info;

use crate::cli::IndexArgs;
use crate::merstream;
use crate::positiondb::{ExistDb, FilterMode, KmerSetExistDb, PositionDb, PositionDbParams};
use crate::sequence_source::open_sources;
use crate::utils::{default_memory_budget_bytes, track_progress_and_resources};

pub fn run_index(args: IndexArgs) -> Result<()> {
    info!("Starting index command with args: {:?}", args);

    let mut mers_path = args.output_prefix.clone();
    mers_path.set_extension("mers");
    let mut posdb_path = args.output_prefix.clone();
    posdb_path.set_extension("posdb");

    let mut source = open_sources(&args.input_files, args.kmer_size).context("opening input files")?;

    let stats = track_progress_and_resources("Building mer-stream archive", args.input_files.len() as u64, |_pb| {
        let stats = merstream::build(&mut source, args.kmer_size, &mers_path).context("building mer-stream archive")?;
        Ok(stats)
    })?;
    info!("Wrote {} mers across {} blocks to {:?}", stats.num_mers, stats.num_blocks, mers_path);

    source.rewind().context("rewinding input for position-DB build")?;
    let tbl_bits = args.tbl_bits.unwrap_or_else(|| ((2 * args.kmer_size as u32).saturating_sub(4)).max(4).min(2 * args.kmer_size as u32 - 1));
    let memory_budget = match args.memory_budget {
        Some(b) => b as usize,
        None => default_memory_budget_bytes().context("deriving default memory budget")? as usize,
    };
    let params = PositionDbParams { k: args.kmer_size, skip: args.skip, tbl_bits };

    let (filter_mode, existdb): (FilterMode, Option<KmerSetExistDb>) = if let Some(path) = &args.mask_kmers {
        (FilterMode::Mask, Some(KmerSetExistDb::from_file(path, args.kmer_size).context("loading mask k-mer set")?))
    } else if let Some(path) = &args.only_kmers {
        (FilterMode::Only, Some(KmerSetExistDb::from_file(path, args.kmer_size).context("loading only k-mer set")?))
    } else {
        (FilterMode::None, None)
    };
    let existdb_ref: Option<&dyn ExistDb> = existdb.as_ref().map(|db| db as &dyn ExistDb);
    if let Some(db) = &existdb {
        info!("loaded {} k-mers for {:?} filtering", db.len(), filter_mode);
    }

    let db = track_progress_and_resources("Building position database", args.input_files.len() as u64, |_pb| {
        PositionDb::build(&mut source, params, filter_mode, existdb_ref, Some(memory_budget)).context("building position database")
    })?;
    db.save(&posdb_path).context("saving position database")?;
    info!("Wrote {} distinct mers to {:?}", db.num_distinct(), posdb_path);

    println!("mer-stream: {:?} ({} mers, {} blocks)", mers_path, stats.num_mers, stats.num_blocks);
    println!("position-db: {:?} ({} distinct mers)", posdb_path, db.num_distinct());

    Ok(())
}
