//! A compact, seekable, delta-encoded archive of a mer stream: header,
//! block index, mer payload, defline table (§4.3). Built from an external
//! [`SequenceSource`]; read back via `open`/`next`/`seek_to_mer`.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use crate::bitio::{BitReader, BitWriter};
use crate::errors::{CoreError, CoreResult};
use crate::kmer::Kmer;

const COMPONENT: &str = "MerStreamFile";
const MAGIC: &[u8; 16] = b"merStream1      ";

/// Lazy stream of k-mers-with-positions; the core's one external input.
/// `defline_ref` in the wire contract is realized here as an owned `String`
/// per record rather than a borrow stable "until the next call" — simpler
/// to express under Rust's ownership rules and cheap at k-mer granularity.
pub trait SequenceSource {
    fn next_mer(&mut self) -> CoreResult<Option<MerObservation>>;
    fn rewind(&mut self) -> CoreResult<()>;
}

#[derive(Debug, Clone)]
pub struct MerObservation {
    pub kmer_forward: Kmer,
    pub kmer_reverse: Kmer,
    pub base_position: u64,
    pub sequence_index: u32,
    pub defline: String,
}

/// A record produced while reading a built archive.
#[derive(Debug, Clone)]
pub struct MerRecord {
    pub kmer: Kmer,
    pub position: u64,
    pub sequence_index: u32,
    pub defline: String,
}

#[derive(Debug, Clone, Copy)]
struct BlockRecord {
    length: u64,
    sequence_index: u32,
    start_position: u64,
}

#[derive(Debug, Default, Clone)]
pub struct MerStreamStats {
    pub num_mers: u64,
    pub num_blocks: u64,
    pub num_defs: u64,
}

struct Header {
    mer_size: u32,
    num_mers: u64,
    num_blocks: u64,
    num_defs: u64,
    def_length: u64,
    block_index_bytes: u64,
    payload_bytes: u64,
    defline_bytes: u64,
    block_index_bit_start: u64,
    payload_bit_start: u64,
    defline_bit_start: u64,
}

const HEADER_BYTES: u64 = 16 + 4 + 4 + 8 + 8 + 8 + 8 + 8 + 8 + 8 + 8 + 8 + 8;

impl Header {
    fn write(&self, out: &mut impl Write) -> CoreResult<()> {
        let io_err = |e: std::io::Error| CoreError::storage_error(COMPONENT, "write_header", e);
        out.write_all(MAGIC).map_err(io_err)?;
        out.write_all(&self.mer_size.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.mer_size.to_le_bytes()).map_err(io_err)?; // duplicated for padding
        out.write_all(&self.num_mers.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.num_blocks.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.num_defs.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.def_length.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.block_index_bytes.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.payload_bytes.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.defline_bytes.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.block_index_bit_start.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.payload_bit_start.to_le_bytes()).map_err(io_err)?;
        out.write_all(&self.defline_bit_start.to_le_bytes()).map_err(io_err)?;
        Ok(())
    }

    fn read(buf: &[u8], path: &Path) -> CoreResult<Header> {
        if buf.len() < HEADER_BYTES as usize {
            return Err(CoreError::corrupt_archive(COMPONENT, "read_header", path, "file shorter than header"));
        }
        if &buf[0..16] != MAGIC {
            return Err(CoreError::corrupt_archive(COMPONENT, "read_header", path, "magic mismatch"));
        }
        let mut off = 16usize;
        let mut take_u32 = || {
            let v = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            off += 4;
            v
        };
        let mer_size = take_u32();
        let _mer_size_dup = take_u32();
        let mut take_u64 = |off: &mut usize| {
            let v = u64::from_le_bytes(buf[*off..*off + 8].try_into().unwrap());
            *off += 8;
            v
        };
        let num_mers = take_u64(&mut off);
        let num_blocks = take_u64(&mut off);
        let num_defs = take_u64(&mut off);
        let def_length = take_u64(&mut off);
        let block_index_bytes = take_u64(&mut off);
        let payload_bytes = take_u64(&mut off);
        let defline_bytes = take_u64(&mut off);
        let block_index_bit_start = take_u64(&mut off);
        let payload_bit_start = take_u64(&mut off);
        let defline_bit_start = take_u64(&mut off);
        Ok(Header {
            mer_size,
            num_mers,
            num_blocks,
            num_defs,
            def_length,
            block_index_bytes,
            payload_bytes,
            defline_bytes,
            block_index_bit_start,
            payload_bit_start,
            defline_bit_start,
        })
    }
}

fn words_to_bytes(words: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 8);
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    bytes
}

fn bytes_to_words(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(8)
        .map(|c| {
            let mut arr = [0u8; 8];
            arr[..c.len()].copy_from_slice(c);
            u64::from_le_bytes(arr)
        })
        .collect()
}

/// Builds a MerStreamFile at `path` from a fully-drained `source`. Writes to
/// a temp file alongside `path` and renames on success (§3.6).
pub fn build<S: SequenceSource>(source: &mut S, k: u8, path: &Path) -> CoreResult<MerStreamStats> {
    let mut block_writer = BitWriter::new();
    let mut payload_writer = BitWriter::new();
    let mut deflines: Vec<String> = Vec::new();
    let mut seq_table_index: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();

    let mut num_mers: u64 = 0;
    let mut num_blocks: u64 = 0;

    let mut last_position: Option<u64> = None;
    let mut last_external_seq: Option<u32> = None;
    let mut block_table_idx: u32 = 0;
    let mut block_start_position: u64 = 0;
    let mut current_block_length: u64 = 0;

    let mut flush_block = |block_writer: &mut BitWriter, len: u64, seq_idx: u32, start: u64| -> CoreResult<()> {
        block_writer.put_number(len)?;
        block_writer.put_number(seq_idx as u64)?;
        block_writer.put_number(start)?;
        Ok(())
    };

    while let Some(obs) = source.next_mer()? {
        num_mers += 1;
        let table_idx = *seq_table_index.entry(obs.sequence_index).or_insert_with(|| {
            deflines.push(obs.defline.clone());
            (deflines.len() - 1) as u32
        });

        let contiguous = last_position == Some(obs.base_position.wrapping_sub(1)) && last_external_seq == Some(obs.sequence_index);

        if current_block_length == 0 {
            // first mer overall
            payload_writer.put_bits(obs.kmer_forward.bits(), 2 * k as u32)?;
            block_table_idx = table_idx;
            block_start_position = obs.base_position;
            current_block_length = 1;
        } else if contiguous && table_idx == block_table_idx {
            let low_two = obs.kmer_forward.bits() & 0b11;
            payload_writer.put_bits(low_two, 2)?;
            current_block_length += 1;
        } else {
            flush_block(&mut block_writer, current_block_length, block_table_idx, block_start_position)?;
            num_blocks += 1;
            payload_writer.put_bits(obs.kmer_forward.bits(), 2 * k as u32)?;
            block_table_idx = table_idx;
            block_start_position = obs.base_position;
            current_block_length = 1;
        }

        last_position = Some(obs.base_position);
        last_external_seq = Some(obs.sequence_index);
    }
    if current_block_length > 0 {
        flush_block(&mut block_writer, current_block_length, block_table_idx, block_start_position)?;
        num_blocks += 1;
    }

    let block_words = block_writer.into_words();
    let payload_words = payload_writer.into_words();
    let block_bytes = words_to_bytes(&block_words);
    let payload_bytes_vec = words_to_bytes(&payload_words);

    let mut defline_blob = Vec::new();
    for d in &deflines {
        defline_blob.extend_from_slice(&(d.len() as u32).to_le_bytes());
        defline_blob.extend_from_slice(d.as_bytes());
    }
    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(&defline_blob).map_err(|e| CoreError::storage_error(COMPONENT, "build", e))?;
    let defline_compressed = gz.finish().map_err(|e| CoreError::storage_error(COMPONENT, "build", e))?;

    let header = Header {
        mer_size: k as u32,
        num_mers,
        num_blocks,
        num_defs: deflines.len() as u64,
        def_length: defline_blob.len() as u64,
        block_index_bytes: block_bytes.len() as u64,
        payload_bytes: payload_bytes_vec.len() as u64,
        defline_bytes: defline_compressed.len() as u64,
        block_index_bit_start: HEADER_BYTES * 8,
        payload_bit_start: (HEADER_BYTES + block_bytes.len() as u64) * 8,
        defline_bit_start: (HEADER_BYTES + block_bytes.len() as u64 + payload_bytes_vec.len() as u64) * 8,
    };

    let tmp_path = path.with_extension("merstream.tmp");
    {
        let mut f = File::create(&tmp_path).map_err(|e| CoreError::storage_error(COMPONENT, "build", e))?;
        header.write(&mut f)?;
        f.write_all(&block_bytes).map_err(|e| CoreError::storage_error(COMPONENT, "build", e))?;
        f.write_all(&payload_bytes_vec).map_err(|e| CoreError::storage_error(COMPONENT, "build", e))?;
        f.write_all(&defline_compressed).map_err(|e| CoreError::storage_error(COMPONENT, "build", e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| CoreError::storage_error(COMPONENT, "build", e))?;

    Ok(MerStreamStats { num_mers, num_blocks, num_defs: deflines.len() as u64 })
}

/// An opened, fully in-memory archive ready for sequential or seeking reads.
pub struct MerStreamFile {
    k: u8,
    num_mers: u64,
    blocks: Vec<BlockRecord>,
    cumulative: Vec<u64>, // len blocks.len()+1
    deflines: Vec<String>,
    payload_words: Vec<u64>,
    payload_bit_len: u64,

    cursor_block: usize,
    remaining_in_block: u64,
    cursor_kmer_bits: u64,
    cursor_position: u64,
    cursor_bit_pos: u64,
}

impl MerStreamFile {
    pub fn open(path: &Path) -> CoreResult<MerStreamFile> {
        let mut f = File::open(path).map_err(|e| CoreError::storage_error(COMPONENT, "open", e))?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).map_err(|e| CoreError::storage_error(COMPONENT, "open", e))?;
        let header = Header::read(&buf, path)?;

        let block_start = (header.block_index_bit_start / 8) as usize;
        let block_end = block_start + header.block_index_bytes as usize;
        let payload_start = (header.payload_bit_start / 8) as usize;
        let payload_end = payload_start + header.payload_bytes as usize;
        let defline_start = (header.defline_bit_start / 8) as usize;
        let defline_end = defline_start + header.defline_bytes as usize;
        if buf.len() < defline_end {
            return Err(CoreError::corrupt_archive(COMPONENT, "open", path, "truncated body"));
        }

        let block_words = bytes_to_words(&buf[block_start..block_end]);
        let mut block_reader = BitReader::with_bit_len(&block_words, header.block_index_bytes * 8);
        let mut blocks = Vec::with_capacity(header.num_blocks as usize);
        let mut cumulative = vec![0u64];
        for _ in 0..header.num_blocks {
            let length = block_reader.get_number()?;
            let sequence_index = block_reader.get_number()? as u32;
            let start_position = block_reader.get_number()?;
            cumulative.push(cumulative.last().unwrap() + length);
            blocks.push(BlockRecord { length, sequence_index, start_position });
        }

        let mut gz = flate2::read::GzDecoder::new(&buf[defline_start..defline_end]);
        let mut defline_blob = Vec::new();
        gz.read_to_end(&mut defline_blob).map_err(|e| CoreError::storage_error(COMPONENT, "open", e))?;
        let mut deflines = Vec::with_capacity(header.num_defs as usize);
        let mut off = 0usize;
        for _ in 0..header.num_defs {
            if off + 4 > defline_blob.len() {
                return Err(CoreError::corrupt_archive(COMPONENT, "open", path, "truncated defline table"));
            }
            let len = u32::from_le_bytes(defline_blob[off..off + 4].try_into().unwrap()) as usize;
            off += 4;
            let s = String::from_utf8_lossy(&defline_blob[off..off + len]).into_owned();
            off += len;
            deflines.push(s);
        }

        let payload_words = bytes_to_words(&buf[payload_start..payload_end]);

        Ok(MerStreamFile {
            k: header.mer_size as u8,
            num_mers: header.num_mers,
            blocks,
            cumulative,
            deflines,
            payload_words,
            payload_bit_len: header.payload_bytes * 8,
            cursor_block: 0,
            remaining_in_block: 0,
            cursor_kmer_bits: 0,
            cursor_position: 0,
            cursor_bit_pos: 0,
        })
    }

    pub fn num_mers(&self) -> u64 {
        self.num_mers
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn k(&self) -> u8 {
        self.k
    }

    pub fn next(&mut self) -> CoreResult<Option<MerRecord>> {
        if self.remaining_in_block == 0 {
            if self.cursor_block >= self.blocks.len() {
                return Ok(None);
            }
            let block = self.blocks[self.cursor_block];
            let mut r = BitReader::with_bit_len(&self.payload_words, self.payload_bit_len);
            r.seek(self.cursor_bit_pos)?;
            let bits = r.get_bits(2 * self.k as u32)?;
            self.cursor_bit_pos = r.tell_bit_offset();
            self.cursor_kmer_bits = bits;
            self.cursor_position = block.start_position;
            self.remaining_in_block = block.length;
        } else {
            let mut r = BitReader::with_bit_len(&self.payload_words, self.payload_bit_len);
            r.seek(self.cursor_bit_pos)?;
            let two = r.get_bits(2)?;
            self.cursor_bit_pos = r.tell_bit_offset();
            let width_mask = if self.k == 32 { u64::MAX } else { (1u64 << (2 * self.k)) - 1 };
            self.cursor_kmer_bits = ((self.cursor_kmer_bits << 2) | two) & width_mask;
            self.cursor_position += 1;
        }

        let block = self.blocks[self.cursor_block];
        let kmer = Kmer::from_bits(self.cursor_kmer_bits, self.k)?;
        let record = MerRecord {
            kmer,
            position: self.cursor_position,
            sequence_index: block.sequence_index,
            defline: self.deflines.get(block.sequence_index as usize).cloned().unwrap_or_default(),
        };
        self.remaining_in_block -= 1;
        if self.remaining_in_block == 0 {
            self.cursor_block += 1;
        }
        Ok(Some(record))
    }

    /// Positions the iterator so the next `next()` returns the n-th k-mer
    /// (0-indexed), via binary search over cumulative block lengths.
    pub fn seek_to_mer(&mut self, n: u64) -> CoreResult<()> {
        if n >= self.num_mers {
            return Err(CoreError::out_of_range(
                COMPONENT,
                "seek_to_mer",
                format!("index {n} outside [0, {})", self.num_mers),
            ));
        }
        let block_idx = match self.cumulative.binary_search(&n) {
            Ok(i) => i, // n is exactly a cumulative boundary -> first mer of block i
            Err(i) => i - 1,
        };
        let block = self.blocks[block_idx];
        let offset_in_block = n - self.cumulative[block_idx];

        let mut r = BitReader::with_bit_len(&self.payload_words, self.payload_bit_len);
        let block_bit_start = self.bit_offset_of_block(block_idx)?;
        r.seek(block_bit_start)?;
        let first = r.get_bits(2 * self.k as u32)?;
        let width_mask = if self.k == 32 { u64::MAX } else { (1u64 << (2 * self.k)) - 1 };
        let mut bits = first;
        for _ in 0..offset_in_block {
            let two = r.get_bits(2)?;
            bits = ((bits << 2) | two) & width_mask;
        }

        self.cursor_block = block_idx;
        self.cursor_kmer_bits = bits;
        self.cursor_position = block.start_position + offset_in_block;
        self.cursor_bit_pos = r.tell_bit_offset();
        self.remaining_in_block = block.length - offset_in_block;
        Ok(())
    }

    /// Bit offset of the start of `block_idx`'s payload region; requires a
    /// linear scan over the widths of preceding blocks (each block's first
    /// k-mer is `2k` bits, each extension 2 bits).
    fn bit_offset_of_block(&self, block_idx: usize) -> CoreResult<u64> {
        let mut bit = 0u64;
        for b in &self.blocks[..block_idx] {
            bit += 2 * self.k as u64 + 2 * (b.length - 1);
        }
        Ok(bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSource {
        records: Vec<MerObservation>,
        idx: usize,
    }

    impl VecSource {
        fn from_seq(seq: &[u8], k: u8, seq_idx: u32, defline: &str) -> VecSource {
            let mut records = Vec::new();
            for i in 0..=(seq.len() - k as usize) {
                let fwd = Kmer::from_seq(&seq[i..i + k as usize], k).unwrap();
                let rev = fwd.reverse_complement();
                records.push(MerObservation {
                    kmer_forward: fwd,
                    kmer_reverse: rev,
                    base_position: i as u64,
                    sequence_index: seq_idx,
                    defline: defline.to_string(),
                });
            }
            VecSource { records, idx: 0 }
        }
    }

    impl SequenceSource for VecSource {
        fn next_mer(&mut self) -> CoreResult<Option<MerObservation>> {
            if self.idx >= self.records.len() {
                return Ok(None);
            }
            let r = self.records[self.idx].clone();
            self.idx += 1;
            Ok(Some(r))
        }
        fn rewind(&mut self) -> CoreResult<()> {
            self.idx = 0;
            Ok(())
        }
    }

    #[test]
    fn build_then_iterate_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mstream");
        let mut src = VecSource::from_seq(b"ACGTACGTACGTACGT", 4, 0, "seq1");
        let stats = build(&mut src, 4, &path).unwrap();
        assert_eq!(stats.num_mers, 13);
        assert_eq!(stats.num_blocks, 1);
        assert_eq!(stats.num_defs, 1);

        let mut reader = MerStreamFile::open(&path).unwrap();
        assert_eq!(reader.num_mers(), 13);
        let expected: Vec<&[u8]> = vec![b"ACGT", b"CGTA", b"GTAC", b"TACG", b"ACGT", b"CGTA", b"GTAC", b"TACG", b"ACGT", b"CGTA", b"GTAC", b"TACG", b"ACGT"];
        for (i, exp) in expected.iter().enumerate() {
            let rec = reader.next().unwrap().unwrap();
            assert_eq!(rec.kmer.to_seq(), exp.to_vec(), "mer {i}");
            assert_eq!(rec.position, i as u64);
        }
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn seek_to_mer_matches_sequential_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test2.mstream");
        let mut src = VecSource::from_seq(b"ACGTACGTACGTACGT", 4, 0, "seq1");
        build(&mut src, 4, &path).unwrap();

        let mut reader = MerStreamFile::open(&path).unwrap();
        reader.seek_to_mer(5).unwrap();
        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.kmer.to_seq(), b"CGTA".to_vec());
        assert_eq!(rec.position, 5);
    }

    #[test]
    fn empty_source_yields_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mstream");
        let mut src = VecSource { records: Vec::new(), idx: 0 };
        let stats = build(&mut src, 4, &path).unwrap();
        assert_eq!(stats.num_mers, 0);
        assert_eq!(stats.num_blocks, 0);
        assert_eq!(stats.num_defs, 0);

        let mut reader = MerStreamFile::open(&path).unwrap();
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn seek_past_end_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test3.mstream");
        let mut src = VecSource::from_seq(b"ACGTACGT", 4, 0, "seq1");
        build(&mut src, 4, &path).unwrap();
        let mut reader = MerStreamFile::open(&path).unwrap();
        assert!(matches!(reader.seek_to_mer(1000), Err(CoreError::OutOfRange { .. })));
    }

    #[test]
    fn two_sequences_produce_two_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.mstream");
        struct Chained(Vec<VecSource>, usize);
        impl SequenceSource for Chained {
            fn next_mer(&mut self) -> CoreResult<Option<MerObservation>> {
                while self.1 < self.0.len() {
                    if let Some(r) = self.0[self.1].next_mer()? {
                        return Ok(Some(r));
                    }
                    self.1 += 1;
                }
                Ok(None)
            }
            fn rewind(&mut self) -> CoreResult<()> {
                for s in &mut self.0 {
                    s.rewind()?;
                }
                self.1 = 0;
                Ok(())
            }
        }
        let mut src = Chained(
            vec![VecSource::from_seq(b"ACGTACGT", 4, 0, "seq1"), VecSource::from_seq(b"TTTTGGGG", 4, 1, "seq2")],
            0,
        );
        let stats = build(&mut src, 4, &path).unwrap();
        assert_eq!(stats.num_blocks, 2);
        assert_eq!(stats.num_defs, 2);
    }
}
