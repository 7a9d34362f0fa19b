//! A multi-pass hash-bucket index mapping k-mers to the positions where
//! they occurred (§4.4). Built in three passes over a [`SequenceSource`]:
//! count, fill, sort-and-pack. In-memory only, as the original; the spec
//! permits an optional on-disk mirror, which is kept separately in
//! `positiondb_io.rs`-style form inline below (`save`/`load`), compressed
//! with `zstd`.

use std::path::Path;

use crate::errors::{CoreError, CoreResult};
use crate::kmer::{canonical_u64, Kmer};
use crate::merstream::SequenceSource;

const COMPONENT: &str = "PositionDB";

/// Read-only membership predicate consulted during build, in two modes
/// (§6, §1B). Implementations are expected to be cheap and thread-safe for
/// concurrent readers.
pub trait ExistDb {
    fn exists(&self, m: &Kmer) -> bool;
}

/// A standalone `ExistDB` (§1B): built once from a k-mer list, independent
/// of any particular PositionDB, and reusable across many downstream
/// mask/only builds. Backed by a sorted array of canonical bit patterns,
/// consulted by binary search.
pub struct KmerSetExistDb {
    k: u8,
    canonical_bits: Vec<u64>,
}

impl KmerSetExistDb {
    pub fn from_kmers(k: u8, kmers: impl IntoIterator<Item = Kmer>) -> CoreResult<KmerSetExistDb> {
        let mut canonical_bits = Vec::new();
        for m in kmers {
            if m.k() != k {
                return Err(CoreError::invalid_input(
                    COMPONENT,
                    "KmerSetExistDb::from_kmers",
                    format!("k mismatch: expected {}, got {}", k, m.k()),
                ));
            }
            canonical_bits.push(canonical_u64(m.bits(), k)?);
        }
        canonical_bits.sort_unstable();
        canonical_bits.dedup();
        Ok(KmerSetExistDb { k, canonical_bits })
    }

    /// Builds from one k-mer sequence per line of a text file.
    pub fn from_file(path: &Path, k: u8) -> CoreResult<KmerSetExistDb> {
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::storage_error(COMPONENT, "KmerSetExistDb::from_file", e))?;
        let mut mers = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            mers.push(Kmer::from_seq(line.as_bytes(), k)?);
        }
        Self::from_kmers(k, mers)
    }

    pub fn len(&self) -> usize {
        self.canonical_bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical_bits.is_empty()
    }
}

impl ExistDb for KmerSetExistDb {
    fn exists(&self, m: &Kmer) -> bool {
        match canonical_u64(m.bits(), self.k) {
            Ok(bits) => self.canonical_bits.binary_search(&bits).is_ok(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    None,
    Mask,
    Only,
}

#[derive(Debug, Clone, Copy)]
pub struct PositionDbParams {
    pub k: u8,
    pub skip: u32,
    pub tbl_bits: u32,
}

#[derive(Debug, Clone, Copy)]
enum Payload {
    Single(u64),
    Multi { start: u32 },
}

#[derive(Debug, Clone, Copy)]
struct BucketEntry {
    check: u64,
    payload: Payload,
}

/// Result of a successful [`PositionDb::lookup`].
#[derive(Debug, Clone)]
pub enum PositionSet<'a> {
    Single(u64),
    Multi(&'a [u64]),
}

impl<'a> PositionSet<'a> {
    pub fn to_vec(&self) -> Vec<u64> {
        match self {
            PositionSet::Single(p) => vec![*p],
            PositionSet::Multi(ps) => ps.to_vec(),
        }
    }
}

pub struct PositionDb {
    k: u8,
    skip: u32,
    tbl_bits: u32,
    pos_width: u32,
    hash_table: Vec<u64>, // len 2^tbl_bits + 1
    buckets: Vec<BucketEntry>,
    position_list: Vec<u64>,
    num_mers: u64,
    num_distinct: u64,
}

fn hash_of(bits: u64, k: u8, tbl_bits: u32) -> u64 {
    let chk_width = 2 * k as u32 - tbl_bits;
    bits >> chk_width
}

fn check_of(bits: u64, k: u8, tbl_bits: u32) -> u64 {
    let chk_width = 2 * k as u32 - tbl_bits;
    let mask = if chk_width >= 64 { u64::MAX } else { (1u64 << chk_width) - 1 };
    bits & mask
}

/// Advances `source` past `skip` intervening mers and returns the next one
/// that should be indexed (stride parameter from §3.3).
fn next_eligible<S: SequenceSource>(source: &mut S, skip: u32) -> CoreResult<Option<crate::merstream::MerObservation>> {
    let mut last = None;
    for _ in 0..=skip {
        match source.next_mer()? {
            Some(obs) => last = Some(obs),
            None => return Ok(None),
        }
    }
    Ok(last)
}

impl PositionDb {
    /// Three-pass build (§4.4). `filter` is consulted against the canonical
    /// form of each mer, matching the original's mask/only semantics; the
    /// index itself is keyed on the forward (not canonical) k-mer, since
    /// PositionDB indexes literal stream occurrences.
    pub fn build<S: SequenceSource>(
        source: &mut S,
        params: PositionDbParams,
        filter: FilterMode,
        existdb: Option<&dyn ExistDb>,
        memory_budget: Option<usize>,
    ) -> CoreResult<PositionDb> {
        if params.k == 0 || params.k > crate::kmer::MAX_K {
            return Err(CoreError::invalid_input(COMPONENT, "build", format!("k={} out of range", params.k)));
        }
        if params.tbl_bits == 0 || params.tbl_bits >= 2 * params.k as u32 {
            return Err(CoreError::invalid_input(
                COMPONENT,
                "build",
                format!("tbl_bits={} must be in 1..{}", params.tbl_bits, 2 * params.k),
            ));
        }
        let num_buckets = 1usize << params.tbl_bits;

        let accept = |bits: u64, k: u8| -> CoreResult<bool> {
            match (filter, existdb) {
                (FilterMode::None, _) => Ok(true),
                (FilterMode::Mask, Some(db)) => {
                    let canon = crate::kmer::canonical_u64(bits, k)?;
                    let km = Kmer::from_bits(canon, k)?;
                    Ok(!db.exists(&km))
                }
                (FilterMode::Only, Some(db)) => {
                    let canon = crate::kmer::canonical_u64(bits, k)?;
                    let km = Kmer::from_bits(canon, k)?;
                    Ok(db.exists(&km))
                }
                (FilterMode::Mask | FilterMode::Only, None) => Err(CoreError::invalid_input(
                    COMPONENT,
                    "build",
                    "mask/only filter mode requires an ExistDb".to_string(),
                )),
            }
        };

        // Pass 1: count.
        source.rewind()?;
        let mut max_position: u64 = 0;
        let mut num_mers: u64 = 0;
        while let Some(obs) = next_eligible(source, params.skip)? {
            if !accept(obs.kmer_forward.bits(), params.k)? {
                continue;
            }
            num_mers += 1;
            max_position = max_position.max(obs.base_position);
        }
        let pos_width = (64 - max_position.leading_zeros()).max(1);

        if let Some(budget) = memory_budget {
            let estimated = num_mers as usize * (std::mem::size_of::<u64>() * 2);
            if estimated > budget {
                return Err(CoreError::insufficient_memory(
                    COMPONENT,
                    "build",
                    format!("estimated {estimated} bytes exceeds budget {budget}"),
                ));
            }
        }

        // Pass 2: fill. Append directly into per-bucket vectors in stream
        // order (a stable sort in pass 3 then preserves insertion order
        // within each check-value run, satisfying the testable property
        // that multi-occurrence positions come back in insertion order).
        source.rewind()?;
        let mut buckets: Vec<Vec<(u64, u64)>> = vec![Vec::new(); num_buckets];
        while let Some(obs) = next_eligible(source, params.skip)? {
            let bits = obs.kmer_forward.bits();
            if !accept(bits, params.k)? {
                continue;
            }
            let h = hash_of(bits, params.k, params.tbl_bits) as usize;
            let c = check_of(bits, params.k, params.tbl_bits);
            buckets[h].push((c, obs.base_position));
        }

        // Pass 3: sort & pack.
        let mut hash_table = Vec::with_capacity(num_buckets + 1);
        let mut flat_buckets = Vec::new();
        let mut position_list = Vec::new();
        hash_table.push(0u64);
        for bucket in &mut buckets {
            bucket.sort_by_key(|(c, _)| *c);
            let mut i = 0;
            while i < bucket.len() {
                let c = bucket[i].0;
                let mut j = i;
                while j < bucket.len() && bucket[j].0 == c {
                    j += 1;
                }
                if j - i == 1 {
                    flat_buckets.push(BucketEntry { check: c, payload: Payload::Single(bucket[i].1) });
                } else {
                    let start = position_list.len() as u32;
                    position_list.push((j - i) as u64);
                    for item in &bucket[i..j] {
                        position_list.push(item.1);
                    }
                    flat_buckets.push(BucketEntry { check: c, payload: Payload::Multi { start } });
                }
                i = j;
            }
            hash_table.push(flat_buckets.len() as u64);
        }

        if *hash_table.last().unwrap() != flat_buckets.len() as u64 {
            return Err(CoreError::corrupt_internal_state(
                COMPONENT,
                "build",
                "final hash table entry does not cover all bucket entries",
            ));
        }

        let num_distinct = flat_buckets.len() as u64;
        Ok(PositionDb {
            k: params.k,
            skip: params.skip,
            tbl_bits: params.tbl_bits,
            pos_width,
            hash_table,
            buckets: flat_buckets,
            position_list,
            num_mers,
            num_distinct,
        })
    }

    pub fn k(&self) -> u8 {
        self.k
    }

    pub fn skip(&self) -> u32 {
        self.skip
    }

    pub fn num_mers(&self) -> u64 {
        self.num_mers
    }

    pub fn num_distinct(&self) -> u64 {
        self.num_distinct
    }

    pub fn lookup(&self, m: &Kmer) -> CoreResult<Option<PositionSet<'_>>> {
        if m.k() != self.k {
            return Err(CoreError::invalid_input(COMPONENT, "lookup", format!("k mismatch: db k={} query k={}", self.k, m.k())));
        }
        let h = hash_of(m.bits(), self.k, self.tbl_bits) as usize;
        if h + 1 >= self.hash_table.len() {
            return Err(CoreError::corrupt_internal_state(COMPONENT, "lookup", "hash prefix out of bucket range"));
        }
        let c = check_of(m.bits(), self.k, self.tbl_bits);
        let lo = self.hash_table[h] as usize;
        let hi = self.hash_table[h + 1] as usize;
        let slice = &self.buckets[lo..hi];
        match slice.binary_search_by_key(&c, |e| e.check) {
            Ok(idx) => Ok(Some(self.resolve(&slice[idx])?)),
            Err(_) => Ok(None),
        }
    }

    /// Invokes `callback` once per occurrence, in pass-2 insertion order.
    pub fn stream_positions(&self, m: &Kmer, callback: &mut dyn FnMut(u64)) -> CoreResult<()> {
        match self.lookup(m)? {
            None => Ok(()),
            Some(PositionSet::Single(p)) => {
                callback(p);
                Ok(())
            }
            Some(PositionSet::Multi(ps)) => {
                for p in ps {
                    callback(*p);
                }
                Ok(())
            }
        }
    }

    fn resolve(&self, entry: &BucketEntry) -> CoreResult<PositionSet<'_>> {
        match entry.payload {
            Payload::Single(p) => Ok(PositionSet::Single(p)),
            Payload::Multi { start } => {
                let start = start as usize;
                let count = *self.position_list.get(start).ok_or_else(|| {
                    CoreError::corrupt_internal_state(COMPONENT, "resolve", "position-list pointer out of range")
                })? as usize;
                let slice = self.position_list.get(start + 1..start + 1 + count).ok_or_else(|| {
                    CoreError::corrupt_internal_state(COMPONENT, "resolve", "position-list run shorter than its count")
                })?;
                Ok(PositionSet::Multi(slice))
            }
        }
    }

    /// Serializes the optional on-disk mirror (§6): length-prefixed, zstd
    /// compressed 64-bit word arrays for the hash table, bucket array, and
    /// position list.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(self.k as u32).to_le_bytes());
        raw.extend_from_slice(&self.skip.to_le_bytes());
        raw.extend_from_slice(&self.tbl_bits.to_le_bytes());
        raw.extend_from_slice(&self.pos_width.to_le_bytes());
        raw.extend_from_slice(&self.num_mers.to_le_bytes());
        raw.extend_from_slice(&self.num_distinct.to_le_bytes());
        write_u64_array(&mut raw, &self.hash_table);
        let mut packed_buckets = Vec::with_capacity(self.buckets.len() * 2);
        for b in &self.buckets {
            packed_buckets.push(b.check);
            match b.payload {
                Payload::Single(p) => packed_buckets.push((p << 1) | 1),
                Payload::Multi { start } => packed_buckets.push((start as u64) << 1),
            }
        }
        write_u64_array(&mut raw, &packed_buckets);
        write_u64_array(&mut raw, &self.position_list);

        let compressed = zstd::stream::encode_all(&raw[..], 0)
            .map_err(|e| CoreError::storage_error(COMPONENT, "save", e))?;
        std::fs::write(path, compressed).map_err(|e| CoreError::storage_error(COMPONENT, "save", e))
    }

    pub fn load(path: &Path) -> CoreResult<PositionDb> {
        let compressed = std::fs::read(path).map_err(|e| CoreError::storage_error(COMPONENT, "load", e))?;
        let mut raw = Vec::new();
        zstd::stream::copy_decode(&compressed[..], &mut raw).map_err(|e| CoreError::storage_error(COMPONENT, "load", e))?;
        let mut off = 0usize;
        let k = read_u32(&raw, &mut off, path)? as u8;
        let skip = read_u32(&raw, &mut off, path)?;
        let tbl_bits = read_u32(&raw, &mut off, path)?;
        let pos_width = read_u32(&raw, &mut off, path)?;
        let num_mers = read_u64(&raw, &mut off, path)?;
        let num_distinct = read_u64(&raw, &mut off, path)?;
        let hash_table = read_u64_array(&raw, &mut off, path)?;
        let packed_buckets = read_u64_array(&raw, &mut off, path)?;
        let position_list = read_u64_array(&raw, &mut off, path)?;
        let mut buckets = Vec::with_capacity(packed_buckets.len() / 2);
        for pair in packed_buckets.chunks(2) {
            let check = pair[0];
            let tagged = pair[1];
            let payload = if tagged & 1 == 1 { Payload::Single(tagged >> 1) } else { Payload::Multi { start: (tagged >> 1) as u32 } };
            buckets.push(BucketEntry { check, payload });
        }
        Ok(PositionDb {
            k,
            skip,
            tbl_bits,
            pos_width,
            hash_table,
            buckets,
            position_list,
            num_mers,
            num_distinct,
        })
    }
}

fn write_u64_array(out: &mut Vec<u8>, data: &[u64]) {
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn read_u32(buf: &[u8], off: &mut usize, path: &Path) -> CoreResult<u32> {
    if *off + 4 > buf.len() {
        return Err(CoreError::corrupt_archive(COMPONENT, "load", path, "truncated u32 field"));
    }
    let v = u32::from_le_bytes(buf[*off..*off + 4].try_into().unwrap());
    *off += 4;
    Ok(v)
}

fn read_u64(buf: &[u8], off: &mut usize, path: &Path) -> CoreResult<u64> {
    if *off + 8 > buf.len() {
        return Err(CoreError::corrupt_archive(COMPONENT, "load", path, "truncated u64 field"));
    }
    let v = u64::from_le_bytes(buf[*off..*off + 8].try_into().unwrap());
    *off += 8;
    Ok(v)
}

fn read_u64_array(buf: &[u8], off: &mut usize, path: &Path) -> CoreResult<Vec<u64>> {
    let len = read_u64(buf, off, path)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_u64(buf, off, path)?);
    }
    Ok(out)
}
