use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::chainer::{Chainer, ChainerConfig, Segment};
use crate::cli::ChainArgs;

fn parse_segments(path: &std::path::Path) -> Result<Vec<Segment>> {
    let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
    let mut segments = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < 6 {
            if lineno == 0 {
                continue; // tolerate a header line
            }
            anyhow::bail!("line {}: expected 6 tab-separated fields, got {}", lineno + 1, fields.len());
        }
        let parsed: Result<Vec<i64>, _> = fields[..5].iter().map(|f| f.parse::<i64>()).collect();
        let parsed = match parsed {
            Ok(p) => p,
            Err(_) if lineno == 0 => continue, // header line with non-numeric fields
            Err(e) => return Err(e).with_context(|| format!("line {}: parsing fields", lineno + 1)),
        };
        let error_rate: f64 = fields[5]
            .parse()
            .with_context(|| format!("line {}: parsing error_rate", lineno + 1))?;
        segments.push(Segment {
            a_begin: parsed[0],
            a_end: parsed[1],
            b_begin: parsed[2],
            b_end: parsed[3],
            score: parsed[4],
            error_rate,
        });
    }
    Ok(segments)
}

pub fn run_chain(args: ChainArgs) -> Result<()> {
    info!("Starting chain command with args: {:?}", args);

    let segments = parse_segments(&args.segments_file)?;
    if segments.is_empty() {
        anyhow::bail!("no segments parsed from {:?}", args.segments_file);
    }

    let config = ChainerConfig {
        min_usable: args.min_usable,
        min_aligned_cols: args.min_aligned_cols,
        minor_thresh: args.minor_thresh,
        a_len: args.a_len,
        b_len: args.b_len,
    };
    let mut chainer = Chainer::new(config);

    let mut found = 0usize;
    let mut overlap = chainer.find_local_overlap(segments, args.complement).context("finding local overlap")?;
    while let Some(ov) = overlap {
        found += 1;
        println!(
            "overlap #{found}: pieces={} score={} begin_offset={} end_offset={} diffs={} indif={:.4} length={} complement={}",
            ov.num_pieces, ov.score, ov.begin_offset, ov.end_offset, ov.differences, ov.aligned_indifference, ov.length, ov.is_complement
        );
        for (i, seg) in ov.chain.segments.iter().enumerate() {
            let gap = &ov.chain.gaps[i];
            println!(
                "  gap{}: a={} b={} type={:?}  segment: a=[{},{}) b=[{},{}) score={}",
                i, gap.a_gap, gap.b_gap, gap.gap_type, seg.a_begin, seg.a_end, seg.b_begin, seg.b_end, seg.score
            );
        }
        let trail = &ov.chain.gaps[ov.chain.gaps.len() - 1];
        println!("  trailing gap: a={} b={} type={:?}", trail.a_gap, trail.b_gap, trail.gap_type);

        if found >= args.count {
            break;
        }
        overlap = chainer.next_best(args.complement).context("finding next-best overlap")?;
    }

    if found == 0 {
        println!("no overlap found (chain did not reach min_aligned_cols)");
    }

    Ok(())
}
