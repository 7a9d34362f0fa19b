//! A per-session, arena-backed augmented AVL tree (§4.6.2, §9). Keys are
//! `(position, segment_id)` pairs so otherwise-equal positions stay
//! distinguishable; each node additionally carries a `base` value and the
//! subtree annotates the minimum `base` (and the key that achieves it) so
//! the three predecessor queries `min_prefix`/`min_suffix`/`min_range` run
//! in `O(log n)`. Arena indices replace the original's refcounted,
//! free-list-shared nodes (§9's explicit redesign flag); `NIL` is a
//! per-tree sentinel, not a process global.

pub type Key = (i64, u32);
const NIL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Node {
    key: Key,
    base: i64,
    left: u32,
    right: u32,
    height: i32,
    size: u32,
    /// Minimum `base` over this node's own subtree, with the key achieving
    /// it (ties broken toward the smaller key, per §4.6.3's tie-break rule).
    min_base: i64,
    min_key: Key,
}

/// An order-statistic tree over `Key`, augmented with subtree-min `base`.
#[derive(Debug, Default)]
pub struct OstTree {
    nodes: Vec<Node>,
    root: u32,
}

fn height(nodes: &[Node], idx: u32) -> i32 {
    if idx == NIL { 0 } else { nodes[idx as usize].height }
}

fn size(nodes: &[Node], idx: u32) -> u32 {
    if idx == NIL { 0 } else { nodes[idx as usize].size }
}

fn min_base_of(nodes: &[Node], idx: u32) -> Option<(i64, Key)> {
    if idx == NIL { None } else { Some((nodes[idx as usize].min_base, nodes[idx as usize].min_key)) }
}

/// Picks the smaller-base candidate, breaking ties toward the smaller key.
fn better(a: Option<(i64, Key)>, b: Option<(i64, Key)>) -> Option<(i64, Key)> {
    match (a, b) {
        (None, x) => x,
        (x, None) => x,
        (Some(a), Some(b)) => {
            if a.0 < b.0 || (a.0 == b.0 && a.1 < b.1) {
                Some(a)
            } else {
                Some(b)
            }
        }
    }
}

impl OstTree {
    pub fn new() -> OstTree {
        OstTree { nodes: Vec::new(), root: NIL }
    }

    pub fn len(&self) -> usize {
        size(&self.nodes, self.root) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn recompute(&mut self, idx: u32) {
        let (l, r, key, base) = {
            let n = &self.nodes[idx as usize];
            (n.left, n.right, n.key, n.base)
        };
        let h = 1 + height(&self.nodes, l).max(height(&self.nodes, r));
        let sz = 1 + size(&self.nodes, l) + size(&self.nodes, r);
        let own = Some((base, key));
        let best = better(better(min_base_of(&self.nodes, l), own), min_base_of(&self.nodes, r));
        let n = &mut self.nodes[idx as usize];
        n.height = h;
        n.size = sz;
        let (mb, mk) = best.expect("a node always contributes its own base as a candidate");
        n.min_base = mb;
        n.min_key = mk;
    }

    fn balance_factor(&self, idx: u32) -> i32 {
        let n = &self.nodes[idx as usize];
        height(&self.nodes, n.left) - height(&self.nodes, n.right)
    }

    fn rotate_left(&mut self, idx: u32) -> u32 {
        let r = self.nodes[idx as usize].right;
        let rl = self.nodes[r as usize].left;
        self.nodes[r as usize].left = idx;
        self.nodes[idx as usize].right = rl;
        self.recompute(idx);
        self.recompute(r);
        r
    }

    fn rotate_right(&mut self, idx: u32) -> u32 {
        let l = self.nodes[idx as usize].left;
        let lr = self.nodes[l as usize].right;
        self.nodes[l as usize].right = idx;
        self.nodes[idx as usize].left = lr;
        self.recompute(idx);
        self.recompute(l);
        l
    }

    fn rebalance(&mut self, idx: u32) -> u32 {
        self.recompute(idx);
        let bf = self.balance_factor(idx);
        if bf > 1 {
            let l = self.nodes[idx as usize].left;
            if self.balance_factor(l) < 0 {
                let new_l = self.rotate_left(l);
                self.nodes[idx as usize].left = new_l;
                self.recompute(idx);
            }
            self.rotate_right(idx)
        } else if bf < -1 {
            let r = self.nodes[idx as usize].right;
            if self.balance_factor(r) > 0 {
                let new_r = self.rotate_right(r);
                self.nodes[idx as usize].right = new_r;
                self.recompute(idx);
            }
            self.rotate_left(idx)
        } else {
            idx
        }
    }

    pub fn insert(&mut self, key: Key, base: i64) {
        self.root = self.insert_at(self.root, key, base);
    }

    fn insert_at(&mut self, idx: u32, key: Key, base: i64) -> u32 {
        if idx == NIL {
            self.nodes.push(Node { key, base, left: NIL, right: NIL, height: 1, size: 1, min_base: base, min_key: key });
            return (self.nodes.len() - 1) as u32;
        }
        if key < self.nodes[idx as usize].key {
            let l = self.nodes[idx as usize].left;
            let new_l = self.insert_at(l, key, base);
            self.nodes[idx as usize].left = new_l;
        } else {
            let r = self.nodes[idx as usize].right;
            let new_r = self.insert_at(r, key, base);
            self.nodes[idx as usize].right = new_r;
        }
        self.rebalance(idx)
    }

    /// Removes the node with the given key, if present.
    pub fn delete(&mut self, key: Key) {
        self.root = self.delete_at(self.root, key);
    }

    fn delete_at(&mut self, idx: u32, key: Key) -> u32 {
        if idx == NIL {
            return NIL;
        }
        let node_key = self.nodes[idx as usize].key;
        if key < node_key {
            let l = self.nodes[idx as usize].left;
            let new_l = self.delete_at(l, key);
            self.nodes[idx as usize].left = new_l;
        } else if key > node_key {
            let r = self.nodes[idx as usize].right;
            let new_r = self.delete_at(r, key);
            self.nodes[idx as usize].right = new_r;
        } else {
            let l = self.nodes[idx as usize].left;
            let r = self.nodes[idx as usize].right;
            if l == NIL {
                return r;
            }
            if r == NIL {
                return l;
            }
            let (succ_key, succ_base) = self.min_node(r);
            let new_r = self.delete_at(r, succ_key);
            self.nodes[idx as usize].right = new_r;
            self.nodes[idx as usize].key = succ_key;
            self.nodes[idx as usize].base = succ_base;
        }
        self.rebalance(idx)
    }

    fn min_node(&self, mut idx: u32) -> (Key, i64) {
        loop {
            let l = self.nodes[idx as usize].left;
            if l == NIL {
                return (self.nodes[idx as usize].key, self.nodes[idx as usize].base);
            }
            idx = l;
        }
    }

    /// Looks up the `base` stored at an exact key, if present.
    pub fn get_base(&self, key: Key) -> Option<i64> {
        let mut idx = self.root;
        while idx != NIL {
            let n = &self.nodes[idx as usize];
            if key == n.key {
                return Some(n.base);
            } else if key < n.key {
                idx = n.left;
            } else {
                idx = n.right;
            }
        }
        None
    }

    /// 0-indexed count of keys strictly less than `key`.
    pub fn rank(&self, key: Key) -> usize {
        self.rank_at(self.root, key)
    }

    fn rank_at(&self, idx: u32, key: Key) -> usize {
        if idx == NIL {
            return 0;
        }
        let n = &self.nodes[idx as usize];
        if key <= n.key {
            self.rank_at(n.left, key)
        } else {
            size(&self.nodes, n.left) as usize + 1 + self.rank_at(n.right, key)
        }
    }

    /// 0-indexed order statistic: the k-th smallest key.
    pub fn select(&self, k: usize) -> Option<Key> {
        self.select_at(self.root, k)
    }

    fn select_at(&self, idx: u32, k: usize) -> Option<Key> {
        if idx == NIL {
            return None;
        }
        let n = &self.nodes[idx as usize];
        let left_size = size(&self.nodes, n.left) as usize;
        if k < left_size {
            self.select_at(n.left, k)
        } else if k == left_size {
            Some(n.key)
        } else {
            self.select_at(n.right, k - left_size - 1)
        }
    }

    /// Minimum `base` over all nodes with `key <= high`.
    pub fn min_prefix(&self, high: Key) -> Option<(Key, i64)> {
        self.min_prefix_at(self.root, high).map(|(b, k)| (k, b))
    }

    fn min_prefix_at(&self, idx: u32, high: Key) -> Option<(i64, Key)> {
        if idx == NIL {
            return None;
        }
        let n = &self.nodes[idx as usize];
        if n.key > high {
            self.min_prefix_at(n.left, high)
        } else {
            let whole_left = min_base_of(&self.nodes, n.left);
            let own = Some((n.base, n.key));
            let right = self.min_prefix_at(n.right, high);
            better(better(whole_left, own), right)
        }
    }

    /// Minimum `base` over all nodes with `key >= low`.
    pub fn min_suffix(&self, low: Key) -> Option<(Key, i64)> {
        self.min_suffix_at(self.root, low).map(|(b, k)| (k, b))
    }

    fn min_suffix_at(&self, idx: u32, low: Key) -> Option<(i64, Key)> {
        if idx == NIL {
            return None;
        }
        let n = &self.nodes[idx as usize];
        if n.key < low {
            self.min_suffix_at(n.right, low)
        } else {
            let whole_right = min_base_of(&self.nodes, n.right);
            let own = Some((n.base, n.key));
            let left = self.min_suffix_at(n.left, low);
            better(better(left, own), whole_right)
        }
    }

    /// Minimum `base` over all nodes with `low <= key <= high`.
    pub fn min_range(&self, low: Key, high: Key) -> Option<(Key, i64)> {
        self.min_range_at(self.root, low, high).map(|(b, k)| (k, b))
    }

    fn min_range_at(&self, idx: u32, low: Key, high: Key) -> Option<(i64, Key)> {
        if idx == NIL {
            return None;
        }
        let n = &self.nodes[idx as usize];
        if n.key < low {
            self.min_range_at(n.right, low, high)
        } else if n.key > high {
            self.min_range_at(n.left, low, high)
        } else {
            let own = Some((n.base, n.key));
            let left = self.min_suffix_at(n.left, low);
            let right = self.min_prefix_at(n.right, high);
            better(better(left, own), right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rank_select_roundtrip() {
        let mut t = OstTree::new();
        let keys: Vec<Key> = vec![(5, 0), (2, 1), (9, 2), (1, 3), (7, 4)];
        for (i, k) in keys.iter().enumerate() {
            t.insert(*k, i as i64);
        }
        let mut sorted = keys.clone();
        sorted.sort();
        for (i, k) in sorted.iter().enumerate() {
            assert_eq!(t.select(i), Some(*k));
            assert_eq!(t.rank(*k), i);
        }
    }

    #[test]
    fn min_prefix_suffix_range() {
        let mut t = OstTree::new();
        t.insert((1, 0), 100);
        t.insert((3, 0), 10);
        t.insert((5, 0), 50);
        t.insert((7, 0), 5);
        t.insert((9, 0), 200);

        assert_eq!(t.min_prefix((5, 0)), Some(((3, 0), 10)));
        assert_eq!(t.min_suffix((5, 0)), Some(((7, 0), 5)));
        assert_eq!(t.min_range((3, 0), (7, 0)), Some(((7, 0), 5)));
    }

    #[test]
    fn delete_removes_key() {
        let mut t = OstTree::new();
        for i in 0..20i64 {
            t.insert((i, 0), i);
        }
        t.delete((10, 0));
        assert_eq!(t.len(), 19);
        assert_eq!(t.rank((10, 0)), 10);
        assert_eq!(t.select(10), Some((11, 0)));
    }

    #[test]
    fn tie_break_prefers_smaller_key() {
        let mut t = OstTree::new();
        t.insert((1, 0), 5);
        t.insert((2, 0), 5);
        assert_eq!(t.min_prefix((10, 0)), Some(((1, 0), 5)));
    }
}
