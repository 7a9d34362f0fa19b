//! Local-overlap chaining over a set of exact-match seed segments (§4.6).
//!
//! Segments are plane-swept by their end coordinate; three augmented AVL
//! trees (`elist`/`ilist`/`olist`, see [`avl`]) carry the best partial-chain
//! score reachable at each frontier position so every segment is examined in
//! `O(log n)`. The sweep builds a `Trace` array of per-segment best scores and
//! backlinks; the final overlap is recovered by picking the best-scoring
//! trace entry with enough aligned columns and walking its backlinks.
//!
//! All segment coordinates here are 0-indexed and half-open
//! (`a_begin <= a < a_end`), unlike the source material this sweep is
//! grounded on, which used 1-indexed inclusive coordinates. That convention
//! change is deliberate: it resolves the documented leading-gap off-by-one
//! (§9) without needing a compatibility flag, since `min(a_begin, b_begin)`
//! is already the correct leading gap once the origin is 0.

pub mod avl;

use crate::errors::{CoreError, CoreResult};
use avl::OstTree;

const COMPONENT: &str = "LocalOverlapChainer";

/// One exact (or near-exact) matching block between sequence A and B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a_begin: i64,
    pub a_end: i64,
    pub b_begin: i64,
    pub b_end: i64,
    /// Per-segment alignment score; higher is better. A negative value
    /// read back from a stored chain marks a segment [`convert_segs`] had
    /// to reorder (`score := -score-1`); [`restore_segs`] undoes it.
    pub score: i64,
    /// Fraction of mismatched bases in this segment, in `[0, 1)`.
    pub error_rate: f64,
}

impl Segment {
    fn a_len(&self) -> i64 {
        self.a_end - self.a_begin
    }

    fn b_len(&self) -> i64 {
        self.b_end - self.b_begin
    }
}

/// Classification of the space between two chained segments (§4.6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapType {
    /// Leading or trailing gap, before the first or after the last segment.
    Boundary,
    /// Both gaps small and of comparable size: ordinary divergence.
    Minor,
    /// Both gaps large and of comparable size: a repeat skipped in one copy.
    Repeat,
    /// One gap near zero, the other not: a clean insertion/deletion.
    Indel,
    /// Gaps of very different non-trivial size: the segments disagree.
    Disagree,
    /// Large, uneven gaps that look like both a repeat and an indel.
    RepeatAndIndel,
}

/// The gap immediately preceding a segment in a chain (or, for the final
/// entry, the trailing gap after the last segment).
#[derive(Debug, Clone, Copy)]
pub struct ChainLink {
    pub a_gap: i64,
    pub b_gap: i64,
    pub gap_type: GapType,
}

/// An ordered run of segments together with the gaps between (and around)
/// them. `gaps.len() == segments.len() + 1`: a leading boundary gap, one gap
/// per consecutive pair, and a trailing boundary gap.
#[derive(Debug, Clone)]
pub struct Chain {
    pub segments: Vec<Segment>,
    pub gaps: Vec<ChainLink>,
}

/// A complete local alignment assembled from a chain of segments.
#[derive(Debug, Clone)]
pub struct LocalOverlap {
    pub num_pieces: usize,
    pub score: i64,
    pub begin_offset: i64,
    pub end_offset: i64,
    pub differences: i64,
    pub aligned_indifference: f64,
    pub length: i64,
    pub is_complement: bool,
    pub chain: Chain,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainerConfig {
    /// Minimum residues a gap must span to be treated as a real alignable
    /// stretch rather than a boundary artifact; also the trailing window the
    /// elist scan looks back over.
    pub min_usable: i64,
    /// A candidate endpoint is only eligible for selection as the final
    /// overlap if its chain covers at least this many aligned columns.
    pub min_aligned_cols: i64,
    /// Gap-size threshold below which a difference between two gaps is
    /// "minor" rather than a true disagreement.
    pub minor_thresh: i64,
    pub a_len: i64,
    pub b_len: i64,
}

/// Where a re-entrant [`Chainer::next_best`] call should resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainerState {
    FirstRun,
    NextBest(usize),
}

#[derive(Debug, Clone, Copy)]
struct TraceEntry {
    value: i64,
    cols_aligned: i64,
    source: Option<usize>,
}

/// A chaining session over one fixed set of segments. Holds the sweep's
/// `Trace` array across calls so [`next_best`](Chainer::next_best) can pick
/// up where [`find_local_overlap`](Chainer::find_local_overlap) left off
/// without redoing the sweep.
#[derive(Debug)]
pub struct Chainer {
    config: ChainerConfig,
    segments: Vec<Segment>,
    order: Vec<usize>,
    trace: Vec<TraceEntry>,
    used: Vec<bool>,
    state: ChainerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Begin,
    End,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    pos: i64,
    kind: EventKind,
    segment: usize,
}

impl Chainer {
    pub fn new(config: ChainerConfig) -> Self {
        Chainer {
            config,
            segments: Vec::new(),
            order: Vec::new(),
            trace: Vec::new(),
            used: Vec::new(),
            state: ChainerState::FirstRun,
        }
    }

    /// Runs the sweep over `segments`. When `is_complement` is set, every
    /// segment's B interval is first reflected into the complement's
    /// coordinate frame; independently of that, any individual segment
    /// whose B interval comes in reversed (a seed on the opposite
    /// orientation from the rest) is normalized in place and marked with
    /// `score := -score-1` (§4.6.5), matching `convert_segs` in the
    /// original. Returns the best-scoring local overlap, if any chain
    /// clears `min_aligned_cols`.
    pub fn find_local_overlap(&mut self, segments: Vec<Segment>, is_complement: bool) -> CoreResult<Option<LocalOverlap>> {
        if segments.is_empty() {
            return Err(CoreError::invalid_input(COMPONENT, "find_local_overlap", "no segments supplied"));
        }
        self.segments = convert_segs(&segments, self.config.b_len, is_complement);
        self.run_sweep()?;
        self.state = ChainerState::FirstRun;
        self.used = vec![false; self.trace.len()];
        self.select_best(is_complement)
    }

    /// Returns the next-best chain disjoint from every chain already
    /// returned by this session (§4.6.6's re-entrant `NextBest` state).
    pub fn next_best(&mut self, is_complement: bool) -> CoreResult<Option<LocalOverlap>> {
        if self.trace.is_empty() {
            return Err(CoreError::invalid_input(COMPONENT, "next_best", "no prior find_local_overlap call in this session"));
        }
        self.select_best(is_complement)
    }

    fn run_sweep(&mut self) -> CoreResult<()> {
        let n = self.segments.len();
        let mut events = Vec::with_capacity(n * 2);
        for (i, s) in self.segments.iter().enumerate() {
            events.push(Event { pos: s.b_begin, kind: EventKind::Begin, segment: i });
            events.push(Event { pos: s.b_end, kind: EventKind::End, segment: i });
        }
        // Ties break begin-before-end, then by the B coordinate of the
        // underlying segment (§4.6.3).
        events.sort_by(|a, b| {
            a.pos.cmp(&b.pos).then_with(|| match (a.kind, b.kind) {
                (EventKind::Begin, EventKind::End) => std::cmp::Ordering::Less,
                (EventKind::End, EventKind::Begin) => std::cmp::Ordering::Greater,
                _ => std::cmp::Ordering::Equal,
            })
        });

        let mut elist = OstTree::new();
        let mut ilist = OstTree::new();
        let mut olist = OstTree::new();
        self.trace = vec![TraceEntry { value: 0, cols_aligned: 0, source: None }; n];

        let min_usable = self.config.min_usable;

        for ev in events {
            let s = self.segments[ev.segment];
            match ev.kind {
                EventKind::Begin => {
                    let boundary = s.a_begin + s.b_begin;
                    let mut best = boundary;
                    let mut source: Option<usize> = None;

                    // Predecessor in elist immediately before b_begin, plus a
                    // forward scan of elist entries within the min_usable
                    // window (the "dovetail" and "midpoint" cases).
                    let p0 = elist.rank((s.b_begin, u32::MAX));
                    if p0 > 0 {
                        if let Some(pred_key) = elist.select(p0 - 1) {
                            if let Some(pred_base) = elist.get_base(pred_key) {
                                let alt = pred_base + s.a_begin + s.b_begin;
                                if alt < best {
                                    best = alt;
                                    source = Some(pred_key.1 as usize);
                                }
                            }
                        }
                    }
                    let limit = s.b_end - min_usable;
                    let mut idx = p0;
                    while let Some(key) = elist.select(idx) {
                        if key.0 > limit {
                            break;
                        }
                        if let Some(base) = elist.get_base(key) {
                            let alt = base + 2 * key.0 + (s.a_begin - s.b_begin);
                            if alt < best {
                                best = alt;
                                source = Some(key.1 as usize);
                            }
                        }
                        idx += 1;
                    }

                    // ilist/olist hold candidates indexed by diagonal; probe
                    // the window of diagonals this segment could extend.
                    let bdiag = s.b_begin - s.a_begin;
                    let ldiag = bdiag + (s.a_len() - min_usable);
                    if let Some((_, base)) = ilist.min_range((bdiag, 0), (ldiag, u32::MAX)) {
                        let alt = base + s.a_begin + s.b_begin;
                        if alt < best {
                            best = alt;
                        }
                    }
                    let odiag = -bdiag;
                    let rdiag = odiag - (s.a_len() - min_usable);
                    if let Some((_, base)) = olist.min_range((rdiag, 0), (odiag, u32::MAX)) {
                        let alt = base + s.a_begin + s.b_begin;
                        if alt < best {
                            best = alt;
                        }
                    }

                    let cols_aligned = if let Some(src) = source {
                        self.trace[src].cols_aligned + aligned_cols(&s)
                    } else {
                        aligned_cols(&s)
                    };
                    self.trace[ev.segment] = TraceEntry { value: best, cols_aligned, source };

                    let d = s.b_begin - s.a_begin;
                    ilist.insert((d, ev.segment as u32), best - d);
                    olist.insert((-d, ev.segment as u32), best - d);
                }
                EventKind::End => {
                    let off = s.b_end + s.a_end;
                    let best = self.trace[ev.segment].value;

                    // Dominance eviction: drop any elist entry that this
                    // segment's endpoint strictly dominates (same or worse
                    // base at an earlier or equal position), then insert.
                    while let Some(pred_key) = {
                        let p = elist.rank((s.b_end, u32::MAX));
                        if p > 0 { elist.select(p - 1) } else { None }
                    } {
                        if let Some(pred_base) = elist.get_base(pred_key) {
                            if pred_base >= best - off {
                                elist.delete(pred_key);
                                continue;
                            }
                        }
                        break;
                    }
                    elist.insert((s.b_end, ev.segment as u32), best - off);

                    let d = s.b_begin - s.a_begin;
                    ilist.delete((d, ev.segment as u32));
                    olist.delete((-d, ev.segment as u32));
                }
            }
        }
        Ok(())
    }

    fn select_best(&mut self, is_complement: bool) -> CoreResult<Option<LocalOverlap>> {
        let n = self.trace.len();
        if self.used.len() != n {
            self.used = vec![false; n];
        }
        let mut best_i: Option<usize> = None;
        let mut best_value = i64::MAX;
        for i in 0..n {
            if self.used[i] {
                continue;
            }
            let entry = self.trace[i];
            if entry.cols_aligned < self.config.min_aligned_cols {
                continue;
            }
            let s = self.segments[i];
            let suffix_cost = (self.config.a_len - s.a_end) + (self.config.b_len - s.b_end);
            let total = entry.value - 2 * entry.cols_aligned + suffix_cost;
            if total < best_value {
                best_value = total;
                best_i = Some(i);
            }
        }
        let Some(end_idx) = best_i else {
            return Ok(None);
        };

        let mut path = Vec::new();
        let mut cur = Some(end_idx);
        while let Some(i) = cur {
            path.push(i);
            cur = self.trace[i].source;
        }
        path.reverse();
        for &i in &path {
            self.used[i] = true;
        }
        self.state = ChainerState::NextBest(end_idx);

        let segments: Vec<Segment> = path.iter().map(|&i| self.segments[i]).collect();
        let overlap = self.build_overlap(segments, is_complement)?;
        Ok(Some(overlap))
    }

    fn build_overlap(&self, mut segments: Vec<Segment>, is_complement: bool) -> CoreResult<LocalOverlap> {
        if segments.is_empty() {
            return Err(CoreError::corrupt_internal_state(COMPONENT, "build_overlap", "empty chain reconstructed"));
        }
        let a_len = self.config.a_len;
        let b_len = self.config.b_len;
        let n = segments.len();

        let mut gaps = Vec::with_capacity(n + 1);
        let lead = {
            let first = &segments[0];
            first.a_begin.min(first.b_begin)
        };
        gaps.push(ChainLink { a_gap: lead, b_gap: lead, gap_type: GapType::Boundary });

        for i in 1..n {
            let a_gap = segments[i].a_begin - segments[i - 1].a_end;
            let b_gap = segments[i].b_begin - segments[i - 1].b_end;
            let gap_type = classify_gap(a_gap, b_gap, self.config.minor_thresh);
            gaps.push(ChainLink { a_gap, b_gap, gap_type });
        }

        let trail = {
            let last = &segments[n - 1];
            (a_len - last.a_end).min(b_len - last.b_end)
        };
        gaps.push(ChainLink { a_gap: trail, b_gap: trail, gap_type: GapType::Boundary });

        let differences = compute_diffs(&segments, &gaps);

        let first = segments[0];
        let last = segments[n - 1];
        let overa = (last.a_end + trail) - (first.a_begin - lead);
        let overb = (last.b_end + trail) - (first.b_begin - lead);
        let length = (overa + overb) / 2;

        let aligned_cols: i64 = segments.iter().map(aligned_cols).sum();
        let aligned_indifference = if aligned_cols > 0 {
            differences as f64 / aligned_cols as f64
        } else {
            0.0
        };

        let begin_offset = first.a_begin - first.b_begin;
        let end_offset = (b_len - last.b_end) - (a_len - last.a_end);
        let score: i64 = segments.iter().map(|s| if s.score < 0 { -s.score - 1 } else { s.score }).sum();

        segments = restore_segs(&segments, b_len, is_complement);

        Ok(LocalOverlap {
            num_pieces: n,
            score,
            begin_offset,
            end_offset,
            differences,
            aligned_indifference,
            length,
            is_complement,
            chain: Chain { segments, gaps },
        })
    }
}

fn aligned_cols(s: &Segment) -> i64 {
    ((1.0 - s.error_rate) * s.a_len().min(s.b_len()) as f64).round() as i64
}

/// Difference count: an error-weighted per-segment mismatch estimate (which
/// favors the higher-error neighbor's length when a backtracking gap
/// overlaps it) plus the absolute gap-size difference at each boundary,
/// following `GF_ALN_overlap.C:773-818`. The first and last chain links are
/// always the non-negative leading/trailing boundary gaps (see
/// [`Chainer::build_overlap`]), so the "negative gap means a backtrack"
/// branch only ever fires for an interior link, which always has both a
/// preceding and a following segment to compare.
fn compute_diffs(segments: &[Segment], gaps: &[ChainLink]) -> i64 {
    let n = segments.len();
    let mut indif: i64 = 0;
    for i in 0..n {
        let sg = &segments[i];
        let mut ln = (sg.a_len() + sg.b_len()) / 2;
        if i > 0 && segments[i - 1].error_rate < sg.error_rate {
            let before = &gaps[i];
            if before.a_gap < before.b_gap {
                if before.a_gap < 0 {
                    ln += before.a_gap;
                }
            } else if before.b_gap < 0 {
                ln += before.b_gap;
            }
        }
        if i + 1 < n && segments[i + 1].error_rate <= sg.error_rate {
            let after = &gaps[i + 1];
            if after.a_gap < after.b_gap {
                if after.a_gap < 0 {
                    ln += after.a_gap;
                }
            } else if after.b_gap < 0 {
                ln += after.b_gap;
            }
        }
        if ln > 0 {
            indif += (ln as f64 * sg.error_rate) as i64;
        }
    }

    let mut diffs = indif;
    for (i, link) in gaps.iter().enumerate() {
        if (link.a_gap < 0 || link.b_gap < 0) && i > 0 && i < n {
            let cur = &segments[i];
            let prev = &segments[i - 1];
            diffs += ((cur.b_begin - cur.a_begin) - (prev.b_end - prev.a_end)).abs();
        } else {
            diffs += link.a_gap.max(link.b_gap);
        }
    }
    diffs
}

/// Gap classification table (§4.6.4, `GF_ALN_overlap.C:732-764`): the
/// three-way split on the sign/size of `a_gap` mirrors the original exactly,
/// including the asymmetric `4x` ratio thresholds between indel and
/// disagreement.
fn classify_gap(a_gap: i64, b_gap: i64, minor_thresh: i64) -> GapType {
    if a_gap.abs() <= minor_thresh {
        if b_gap.abs() <= minor_thresh {
            if a_gap != 0 || b_gap != 0 {
                GapType::Minor
            } else {
                GapType::Boundary
            }
        } else if b_gap < 0 {
            GapType::Repeat
        } else if b_gap > 4 * a_gap {
            GapType::Indel
        } else {
            GapType::Disagree
        }
    } else if a_gap < 0 {
        if b_gap < minor_thresh {
            GapType::Repeat
        } else {
            GapType::RepeatAndIndel
        }
    } else if b_gap.abs() < minor_thresh {
        if a_gap > 4 * b_gap {
            GapType::Indel
        } else {
            GapType::Disagree
        }
    } else if b_gap < 0 {
        GapType::RepeatAndIndel
    } else {
        GapType::Disagree
    }
}

/// Prepares segments for the sweep (`GF_ALN_overlap.C:330-347`). When `comp`
/// is set, every segment's B interval is first reflected into the
/// complement strand's coordinate frame. Independently of `comp`, any
/// segment whose B interval is reversed (its own `b_begin > b_end`, which
/// can happen when segments of mixed orientation are chained together) is
/// swapped back into order and marked with `score := -score-1` so
/// [`restore_segs`] can undo it later.
fn convert_segs(segments: &[Segment], b_len: i64, comp: bool) -> Vec<Segment> {
    let mut out: Vec<Segment> = segments.to_vec();
    if comp {
        for s in out.iter_mut() {
            let new_begin = b_len - s.b_end;
            let new_end = b_len - s.b_begin;
            s.b_begin = new_begin;
            s.b_end = new_end;
        }
    }
    for s in out.iter_mut() {
        if s.b_begin > s.b_end {
            std::mem::swap(&mut s.b_begin, &mut s.b_end);
            s.score = -s.score - 1;
        }
    }
    out
}

/// Inverse of [`convert_segs`] (`GF_ALN_overlap.C:349-367`): first undoes
/// any per-segment reorder marker, then (if `comp`) reflects B coordinates
/// back out of the complement frame.
fn restore_segs(segments: &[Segment], b_len: i64, comp: bool) -> Vec<Segment> {
    let mut out: Vec<Segment> = segments.to_vec();
    for s in out.iter_mut() {
        if s.score < 0 {
            std::mem::swap(&mut s.b_begin, &mut s.b_end);
            s.score = -s.score - 1;
        }
    }
    if comp {
        for s in out.iter_mut() {
            let new_begin = b_len - s.b_end;
            let new_end = b_len - s.b_begin;
            s.b_begin = new_begin;
            s.b_end = new_end;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChainerConfig {
        ChainerConfig { min_usable: 3, min_aligned_cols: 10, minor_thresh: 5, a_len: 1000, b_len: 1000 }
    }

    #[test]
    fn single_segment_chain() {
        let mut chainer = Chainer::new(cfg());
        let segs = vec![Segment { a_begin: 100, a_end: 150, b_begin: 100, b_end: 150, score: 50, error_rate: 0.0 }];
        let overlap = chainer.find_local_overlap(segs, false).unwrap().expect("should find an overlap");
        assert_eq!(overlap.num_pieces, 1);
        assert_eq!(overlap.chain.gaps.len(), 2);
        assert_eq!(overlap.chain.gaps[0].a_gap, 100);
        assert_eq!(overlap.chain.gaps[1].a_gap, 850);
    }

    #[test]
    fn two_colinear_segments_chain_together() {
        let mut chainer = Chainer::new(cfg());
        let segs = vec![
            Segment { a_begin: 0, a_end: 40, b_begin: 0, b_end: 40, score: 40, error_rate: 0.0 },
            Segment { a_begin: 45, a_end: 90, b_begin: 45, b_end: 90, score: 45, error_rate: 0.0 },
        ];
        let overlap = chainer.find_local_overlap(segs, false).unwrap().expect("should find an overlap");
        assert_eq!(overlap.num_pieces, 2);
        assert_eq!(overlap.chain.gaps[1].gap_type, GapType::Minor);
    }

    #[test]
    fn below_min_aligned_cols_is_rejected() {
        let mut config = cfg();
        config.min_aligned_cols = 1000;
        let mut chainer = Chainer::new(config);
        let segs = vec![Segment { a_begin: 0, a_end: 10, b_begin: 0, b_end: 10, score: 10, error_rate: 0.0 }];
        let overlap = chainer.find_local_overlap(segs, false).unwrap();
        assert!(overlap.is_none());
    }

    #[test]
    fn leading_boundary_gap_uses_zero_indexed_convention() {
        let mut chainer = Chainer::new(cfg());
        let segs = vec![Segment { a_begin: 0, a_end: 50, b_begin: 0, b_end: 50, score: 50, error_rate: 0.0 }];
        let overlap = chainer.find_local_overlap(segs, false).unwrap().unwrap();
        assert_eq!(overlap.chain.gaps[0].a_gap, 0);
    }

    #[test]
    fn trailing_boundary_gap_takes_the_smaller_overhang() {
        let mut chainer = Chainer::new(cfg());
        // A has 950 bases left after the segment, B only 900: trailing gap
        // must be the smaller of the two, not the larger.
        let segs = vec![Segment { a_begin: 0, a_end: 50, b_begin: 0, b_end: 100, score: 50, error_rate: 0.0 }];
        let overlap = chainer.find_local_overlap(segs, false).unwrap().unwrap();
        assert_eq!(overlap.chain.gaps[1].a_gap, 900);
    }

    #[test]
    fn next_best_returns_disjoint_chain() {
        let mut chainer = Chainer::new(cfg());
        let segs = vec![
            Segment { a_begin: 0, a_end: 40, b_begin: 0, b_end: 40, score: 40, error_rate: 0.0 },
            Segment { a_begin: 500, a_end: 540, b_begin: 500, b_end: 540, score: 40, error_rate: 0.0 },
        ];
        let first = chainer.find_local_overlap(segs, false).unwrap().unwrap();
        let second = chainer.next_best(false).unwrap();
        if let Some(second) = second {
            let first_segs: Vec<_> = first.chain.segments.iter().map(|s| s.a_begin).collect();
            let second_segs: Vec<_> = second.chain.segments.iter().map(|s| s.a_begin).collect();
            assert!(first_segs.iter().all(|a| !second_segs.contains(a)));
        }
    }

    #[test]
    fn complement_segments_round_trip_through_convert_restore() {
        let segs = vec![Segment { a_begin: 10, a_end: 20, b_begin: 30, b_end: 40, score: 10, error_rate: 0.0 }];
        let converted = convert_segs(&segs, 100, true);
        let restored = restore_segs(&converted, 100, true);
        assert_eq!(restored[0].b_begin, segs[0].b_begin);
        assert_eq!(restored[0].b_end, segs[0].b_end);
        assert_eq!(restored[0].score, segs[0].score);
    }

    #[test]
    fn mixed_orientation_segment_is_marked_and_restored_without_comp() {
        // A segment handed in with b_begin > b_end (reversed) even though
        // the overall call isn't complement: convert_segs must still
        // normalize it and mark the score, and restore_segs must undo it.
        let segs = vec![Segment { a_begin: 10, a_end: 20, b_begin: 40, b_end: 30, score: 10, error_rate: 0.0 }];
        let converted = convert_segs(&segs, 100, false);
        assert!(converted[0].b_begin < converted[0].b_end);
        assert!(converted[0].score < 0);
        let restored = restore_segs(&converted, 100, false);
        assert_eq!(restored[0].b_begin, segs[0].b_begin);
        assert_eq!(restored[0].b_end, segs[0].b_end);
        assert_eq!(restored[0].score, segs[0].score);
    }

    #[test]
    fn classify_gap_table() {
        assert_eq!(classify_gap(1, 1, 5), GapType::Minor);
        assert_eq!(classify_gap(0, 0, 5), GapType::Boundary);
        assert_eq!(classify_gap(0, 50, 5), GapType::Indel);
        assert_eq!(classify_gap(50, 52, 5), GapType::Disagree);
        assert_eq!(classify_gap(50, 200, 5), GapType::Disagree);
        assert_eq!(classify_gap(-10, -20, 5), GapType::Repeat);
        assert_eq!(classify_gap(-10, 50, 5), GapType::RepeatAndIndel);
        assert_eq!(classify_gap(50, -60, 5), GapType::RepeatAndIndel);
    }
}
