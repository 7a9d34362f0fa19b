use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};

use crate::cli::QueryArgs;
use crate::kmer::Kmer;
use crate::positiondb::PositionDb;

pub fn run_query(args: QueryArgs) -> Result<()> {
    info!("Starting query command with args: {:?}", args);

    let db = PositionDb::load(&args.database_file).context("loading position database")?;

    let mut queries: Vec<String> = args.kmers.clone();
    if let Some(path) = &args.kmer_file {
        let file = File::open(path).with_context(|| format!("opening k-mer file {path:?}"))?;
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                queries.push(trimmed.to_string());
            }
        }
    }
    if queries.is_empty() {
        anyhow::bail!("no k-mers given; pass --kmer or --kmer-file");
    }

    let mut out: Box<dyn Write> = match &args.output_file {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| format!("creating {path:?}"))?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    for q in &queries {
        let kmer = Kmer::from_seq(q.as_bytes(), db.k()).with_context(|| format!("parsing k-mer {q:?}"))?;
        match db.lookup(&kmer).with_context(|| format!("querying {q:?}"))? {
            Some(positions) => {
                let list = positions.to_vec();
                let rendered: Vec<String> = list.iter().map(|p| p.to_string()).collect();
                writeln!(out, "{}\t{}", q, rendered.join(","))?;
            }
            None => {
                writeln!(out, "{}\t", q)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
