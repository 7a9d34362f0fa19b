//! The CLI's concrete, non-core [`SequenceSource`] implementation, backed
//! by `needletail`. Lives alongside the CLI rather than inside the core
//! components, per §6.

use crate::errors::{CoreError, CoreResult};
use crate::kmer::Kmer;
use crate::merstream::{MerObservation, SequenceSource};
use needletail::{parse_fastx_file, Sequence};
use std::path::{Path, PathBuf};

const COMPONENT: &str = "NeedletailSequenceSource";

struct PendingWindow {
    bases: Vec<u8>,
    defline: String,
    base_position: u64,
    seq_idx: u32,
}

/// Adapts one or more FASTA/FASTQ files into the k-mer-with-position stream
/// the core expects, normalizing records and sliding a window of width `k`
/// over each. Records containing ambiguity codes are skipped window by
/// window, not discarded wholesale, matching the teacher CLI's tolerance
/// for mixed-quality input.
pub struct NeedletailSequenceSource {
    files: Vec<PathBuf>,
    k: u8,
    file_idx: usize,
    next_seq_idx: u32,
    pending: Vec<PendingWindow>,
}

impl NeedletailSequenceSource {
    pub fn new(files: Vec<PathBuf>, k: u8) -> CoreResult<Self> {
        if k == 0 || k > crate::kmer::MAX_K {
            return Err(CoreError::invalid_input(COMPONENT, "new", format!("k={k} out of range")));
        }
        let mut src = NeedletailSequenceSource { files, k, file_idx: 0, next_seq_idx: 0, pending: Vec::new() };
        src.load_next_file()?;
        Ok(src)
    }

    fn load_next_file(&mut self) -> CoreResult<()> {
        self.pending.clear();
        while self.file_idx < self.files.len() {
            let path = self.files[self.file_idx].clone();
            self.file_idx += 1;
            let mut reader = parse_fastx_file(&path)
                .map_err(|e| CoreError::storage_error(COMPONENT, "load_next_file", std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
            while let Some(record) = reader.next() {
                let record = record.map_err(|e| {
                    CoreError::corrupt_archive(COMPONENT, "load_next_file", path.clone(), e.to_string())
                })?;
                let defline = String::from_utf8_lossy(record.id()).to_string();
                let norm = record.normalize(false);
                self.pending.push(PendingWindow { bases: norm.to_vec(), defline, base_position: 0, seq_idx: self.next_seq_idx });
                self.next_seq_idx += 1;
            }
            if !self.pending.is_empty() {
                return Ok(());
            }
        }
        Ok(())
    }
}

impl SequenceSource for NeedletailSequenceSource {
    fn next_mer(&mut self) -> CoreResult<Option<MerObservation>> {
        loop {
            if self.pending.is_empty() {
                return Ok(None);
            }
            let window = {
                let rec = &self.pending[0];
                let start = rec.base_position as usize;
                if start + self.k as usize > rec.bases.len() {
                    None
                } else {
                    Some(rec.bases[start..start + self.k as usize].to_vec())
                }
            };
            match window {
                None => {
                    self.pending.remove(0);
                    if self.pending.is_empty() {
                        self.load_next_file()?;
                    }
                    continue;
                }
                Some(bases) => {
                    let base_position = self.pending[0].base_position;
                    let defline = self.pending[0].defline.clone();
                    let seq_idx = self.pending[0].seq_idx;
                    self.pending[0].base_position += 1;
                    match Kmer::from_seq(&bases, self.k) {
                        Ok(forward) => {
                            let reverse = forward.reverse_complement();
                            return Ok(Some(MerObservation {
                                kmer_forward: forward,
                                kmer_reverse: reverse,
                                base_position,
                                sequence_index: seq_idx,
                                defline,
                            }));
                        }
                        Err(_) => continue, // window contained a non-ACGT base
                    }
                }
            }
        }
    }

    fn rewind(&mut self) -> CoreResult<()> {
        self.file_idx = 0;
        self.next_seq_idx = 0;
        self.load_next_file()
    }
}

/// Builds a [`NeedletailSequenceSource`] and validates every input path
/// exists before any parsing begins, so a typo surfaces immediately.
pub fn open_sources(files: &[PathBuf], k: u8) -> CoreResult<NeedletailSequenceSource> {
    for f in files {
        if !Path::new(f).exists() {
            return Err(CoreError::invalid_input("NeedletailSequenceSource", "open_sources", format!("no such file: {}", f.display())));
        }
    }
    NeedletailSequenceSource::new(files.to_vec(), k)
}
