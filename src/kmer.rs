//! Two-bit (and N-extended three-bit) k-mer codec: encode/decode, reverse
//! complement, canonical form. `k` is fixed at 1..=31 so a k-mer's 2-bit
//! packed form always fits a u64 with room to spare for PositionDB's tag
//! bit (see `positiondb.rs`).

use crate::errors::{CoreError, CoreResult};

const COMPONENT: &str = "KmerCodec";
const BITS_PER_BASE: u8 = 2;
pub const MAX_K: u8 = 31;

/// A nucleotide symbol, including the wildcard `N` used by the three-bit
/// extension (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    A,
    C,
    G,
    T,
    N,
}

impl Base {
    /// Two-bit code; `N` has none.
    pub fn to_2bit(self) -> Option<u64> {
        match self {
            Base::A => Some(0b00),
            Base::C => Some(0b01),
            Base::G => Some(0b10),
            Base::T => Some(0b11),
            Base::N => None,
        }
    }

    pub fn from_2bit(val: u64) -> Base {
        match val & 0b11 {
            0b00 => Base::A,
            0b01 => Base::C,
            0b10 => Base::G,
            _ => Base::T,
        }
    }

    /// Base-5 code used by the packed three-bases-per-byte extension form.
    pub fn to_base5(self) -> u8 {
        match self {
            Base::A => 0,
            Base::C => 1,
            Base::G => 2,
            Base::T => 3,
            Base::N => 4,
        }
    }

    pub fn from_base5(val: u8) -> CoreResult<Base> {
        match val {
            0 => Ok(Base::A),
            1 => Ok(Base::C),
            2 => Ok(Base::G),
            3 => Ok(Base::T),
            4 => Ok(Base::N),
            other => Err(CoreError::invalid_input(
                COMPONENT,
                "Base::from_base5",
                format!("value {other} is not a valid base-5 digit"),
            )),
        }
    }

    /// N is its own complement; A/T and C/G pair up.
    pub fn complement(self) -> Base {
        match self {
            Base::A => Base::T,
            Base::T => Base::A,
            Base::C => Base::G,
            Base::G => Base::C,
            Base::N => Base::N,
        }
    }

    pub fn from_ascii(b: u8) -> Option<Base> {
        match b {
            b'A' | b'a' => Some(Base::A),
            b'C' | b'c' => Some(Base::C),
            b'G' | b'g' => Some(Base::G),
            b'T' | b't' => Some(Base::T),
            b'N' | b'n' => Some(Base::N),
            _ => None,
        }
    }

    pub fn to_ascii(self) -> u8 {
        match self {
            Base::A => b'A',
            Base::C => b'C',
            Base::G => b'G',
            Base::T => b'T',
            Base::N => b'N',
        }
    }
}

/// Encodes a single DNA base into its 2-bit representation (A=0,C=1,G=2,T=3).
#[inline]
pub fn encode(base: u8) -> Option<u64> {
    Base::from_ascii(base).and_then(Base::to_2bit)
}

/// Inverse of [`encode`].
#[inline]
pub fn decode(val: u64) -> u8 {
    Base::from_2bit(val).to_ascii()
}

fn check_k(operation: &'static str, k: u8) -> CoreResult<()> {
    if k == 0 || k > MAX_K {
        return Err(CoreError::invalid_input(
            COMPONENT,
            operation,
            format!("k={k} is outside the supported range 1..={MAX_K}"),
        ));
    }
    Ok(())
}

/// Encodes an ACGT sequence slice (length exactly `k`) into a packed u64.
/// Returns `InvalidInput` on a non-ACGT symbol or a length mismatch.
pub fn seq_to_u64(seq: &[u8], k: u8) -> CoreResult<u64> {
    check_k("seq_to_u64", k)?;
    if seq.len() != k as usize {
        return Err(CoreError::invalid_input(
            COMPONENT,
            "seq_to_u64",
            format!("sequence length {} does not match k={}", seq.len(), k),
        ));
    }
    let mut kmer_val: u64 = 0;
    for (i, &base) in seq.iter().enumerate() {
        let base_val = encode(base).ok_or_else(|| {
            CoreError::invalid_input(COMPONENT, "seq_to_u64", format!("non-ACGT symbol {:?}", base as char))
        })?;
        kmer_val |= base_val << (BITS_PER_BASE * (k - 1 - i as u8));
    }
    Ok(kmer_val)
}

/// Decodes a packed u64 k-mer back into an ACGT byte sequence.
pub fn u64_to_seq(kmer_val: u64, k: u8) -> CoreResult<Vec<u8>> {
    check_k("u64_to_seq", k)?;
    let mask = 0b11u64;
    let mut seq = Vec::with_capacity(k as usize);
    for i in 0..k {
        let shift = BITS_PER_BASE * (k - 1 - i);
        seq.push(decode((kmer_val >> shift) & mask));
    }
    Ok(seq)
}

/// Bitwise-complement-then-reverse; an involution over the packed form.
pub fn reverse_complement_u64(kmer_val: u64, k: u8) -> CoreResult<u64> {
    check_k("reverse_complement_u64", k)?;
    let mask = 0b11u64;
    let mut rc_val: u64 = 0;
    for i in 0..k {
        let base_val = (kmer_val >> (BITS_PER_BASE * i)) & mask;
        let complemented = base_val ^ 0b11;
        rc_val |= complemented << (BITS_PER_BASE * (k - 1 - i));
    }
    Ok(rc_val)
}

/// `min(m, reverse_complement(m))` under unsigned order on the packed bits.
pub fn canonical_u64(kmer_val: u64, k: u8) -> CoreResult<u64> {
    let rc = reverse_complement_u64(kmer_val, k)?;
    Ok(kmer_val.min(rc))
}

/// Packs `bases` (one byte per three input bases, base-5 positional) for the
/// N-tolerant storage form. `bases[0]` is the least-significant digit of each
/// byte triple.
pub fn pack_base5(bases: &[Base]) -> Vec<u8> {
    bases
        .chunks(3)
        .map(|chunk| {
            let mut value: u16 = 0;
            for (i, b) in chunk.iter().enumerate() {
                value += (b.to_base5() as u16) * 5u16.pow(i as u32);
            }
            value as u8
        })
        .collect()
}

/// Inverse of [`pack_base5`]; `n` is the original base count (needed because
/// the last byte may encode fewer than three bases).
pub fn unpack_base5(bytes: &[u8], n: usize) -> CoreResult<Vec<Base>> {
    let mut bases = Vec::with_capacity(n);
    for &byte in bytes {
        let mut value = byte as u16;
        for _ in 0..3 {
            if bases.len() == n {
                break;
            }
            bases.push(Base::from_base5((value % 5) as u8)?);
            value /= 5;
        }
    }
    Ok(bases)
}

/// An immutable, fixed-width canonical-or-not k-mer value. `k` never changes
/// after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Kmer {
    bits: u64,
    k: u8,
}

impl Kmer {
    pub fn from_seq(seq: &[u8], k: u8) -> CoreResult<Kmer> {
        Ok(Kmer { bits: seq_to_u64(seq, k)?, k })
    }

    pub fn from_bits(bits: u64, k: u8) -> CoreResult<Kmer> {
        check_k("from_bits", k)?;
        let mask = if k == 32 { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        if bits & !mask != 0 {
            return Err(CoreError::invalid_input(
                COMPONENT,
                "from_bits",
                format!("value {bits:#x} has bits set beyond the 2*k={} packed width", 2 * k),
            ));
        }
        Ok(Kmer { bits, k })
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn k(&self) -> u8 {
        self.k
    }

    pub fn to_seq(&self) -> Vec<u8> {
        u64_to_seq(self.bits, self.k).expect("Kmer always holds a value valid for its own k")
    }

    /// Pure, involutive: `rc.reverse_complement() == self`.
    pub fn reverse_complement(&self) -> Kmer {
        Kmer {
            bits: reverse_complement_u64(self.bits, self.k).expect("width checked at construction"),
            k: self.k,
        }
    }

    pub fn canonical(&self) -> Kmer {
        let rc = self.reverse_complement();
        if self.bits <= rc.bits { *self } else { rc }
    }

    /// Shifts a new base in at the low end, dropping the highest base. Used
    /// by sliding-window producers (the external `SequenceSource`).
    pub fn shift_append(&self, base: u8) -> CoreResult<Kmer> {
        let base_val = encode(base).ok_or_else(|| {
            CoreError::invalid_input(COMPONENT, "shift_append", format!("non-ACGT symbol {:?}", base as char))
        })?;
        let mask = if self.k == 32 { u64::MAX } else { (1u64 << (2 * self.k)) - 1 };
        let bits = ((self.bits << BITS_PER_BASE) | base_val) & mask;
        Ok(Kmer { bits, k: self.k })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problematic_classify_kmers() {
        let k = 4;
        let tttt_val = seq_to_u64(b"TTTT", k).unwrap();
        let tttt_canon = canonical_u64(tttt_val, k).unwrap();
        let aaaa_val = seq_to_u64(b"AAAA", k).unwrap();
        assert_eq!(tttt_canon, aaaa_val, "Canonical of TTTT should be AAAA value (0)");

        let tggg_val = seq_to_u64(b"TGGG", k).unwrap();
        let tggg_canon = canonical_u64(tggg_val, k).unwrap();
        let ccca_val = seq_to_u64(b"CCCA", k).unwrap();
        assert_eq!(tggg_canon, ccca_val, "Canonical of TGGG should be CCCA value (84)");

        let ggga_val = seq_to_u64(b"GGGA", k).unwrap();
        let ggga_canon = canonical_u64(ggga_val, k).unwrap();
        assert_eq!(ggga_canon, ggga_val, "Canonical of GGGA (168) should be GGGA (168)");

        assert_ne!(tggg_canon, ggga_canon, "Canon(TGGG) from input should NOT match Canon(GGGA) from DB");
    }

    #[test]
    fn test_encode_decode() {
        assert_eq!(encode(b'A'), Some(0b00));
        assert_eq!(encode(b'c'), Some(0b01));
        assert_eq!(encode(b'G'), Some(0b10));
        assert_eq!(encode(b't'), Some(0b11));
        assert_eq!(encode(b'N'), None);
        assert_eq!(encode(b'X'), None);
        assert_eq!(decode(0b00), b'A');
        assert_eq!(decode(0b01), b'C');
        assert_eq!(decode(0b10), b'G');
        assert_eq!(decode(0b11), b'T');
    }

    #[test]
    fn test_seq_to_u64_valid() {
        assert_eq!(seq_to_u64(b"A", 1), Ok(0b00));
        assert_eq!(seq_to_u64(b"ACG", 3), Ok(0b000110));
        assert_eq!(seq_to_u64(b"ACGT", 4), Ok(0b00011011));
        assert_eq!(seq_to_u64(b"acg", 3), Ok(0b000110));
        let k31_t = vec![b'T'; 31];
        assert_eq!(seq_to_u64(&k31_t, 31), Ok((1u64 << 62) - 1));
    }

    #[test]
    fn test_seq_to_u64_invalid() {
        assert!(seq_to_u64(b"ACN", 3).is_err());
        assert!(seq_to_u64(b"A", 0).is_err());
        assert!(seq_to_u64(b"A", 32).is_err());
        assert!(seq_to_u64(b"ACG", 2).is_err());
    }

    #[test]
    fn test_u64_to_seq_roundtrip() {
        for seq in [&b"ACG"[..], &b"ACGT"[..], &b"TTTTT"[..]] {
            let k = seq.len() as u8;
            let val = seq_to_u64(seq, k).unwrap();
            assert_eq!(u64_to_seq(val, k).unwrap(), seq.to_vec());
        }
    }

    #[test]
    fn test_reverse_complement_is_involution() {
        for seq in [&b"A"[..], &b"ACG"[..], &b"ATGC"[..], &b"ATTA"[..], &b"GTAC"[..]] {
            let k = seq.len() as u8;
            let v = seq_to_u64(seq, k).unwrap();
            let rc = reverse_complement_u64(v, k).unwrap();
            let rc2 = reverse_complement_u64(rc, k).unwrap();
            assert_eq!(v, rc2);
        }
        assert_eq!(
            reverse_complement_u64(seq_to_u64(b"ACG", 3).unwrap(), 3).unwrap(),
            seq_to_u64(b"CGT", 3).unwrap()
        );
        // self-complementary palindrome
        assert_eq!(
            reverse_complement_u64(seq_to_u64(b"GTAC", 4).unwrap(), 4).unwrap(),
            seq_to_u64(b"GTAC", 4).unwrap()
        );
    }

    #[test]
    fn test_canonical_matches_reverse_complement() {
        let k = 3;
        let kmer_acg = seq_to_u64(b"ACG", k).unwrap();
        assert_eq!(canonical_u64(kmer_acg, k).unwrap(), kmer_acg);
        let kmer_tgt = seq_to_u64(b"TGT", k).unwrap();
        let kmer_aca = seq_to_u64(b"ACA", k).unwrap();
        assert_eq!(canonical_u64(kmer_tgt, k).unwrap(), kmer_aca);
    }

    #[test]
    fn test_canonical_idempotent() {
        let k = Kmer::from_seq(b"GATTACA", 7).unwrap();
        let c1 = k.canonical();
        let c2 = c1.canonical();
        assert_eq!(c1, c2);
        assert_eq!(c1.canonical(), c1.reverse_complement().canonical());
    }

    #[test]
    fn test_shift_append() {
        let k = Kmer::from_seq(b"ACGT", 4).unwrap();
        let shifted = k.shift_append(b'A').unwrap();
        assert_eq!(shifted.to_seq(), b"CGTA");
    }

    #[test]
    fn test_base5_pack_roundtrip() {
        let bases = vec![Base::A, Base::C, Base::N, Base::T, Base::G];
        let packed = pack_base5(&bases);
        assert_eq!(packed.len(), 2);
        let unpacked = unpack_base5(&packed, bases.len()).unwrap();
        assert_eq!(unpacked, bases);
    }

    #[test]
    fn test_base_complement_involution() {
        for b in [Base::A, Base::C, Base::G, Base::T, Base::N] {
            assert_eq!(b.complement().complement(), b);
        }
        assert_eq!(Base::N.complement(), Base::N);
    }
}
