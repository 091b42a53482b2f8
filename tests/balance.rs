//! Balance and invariant sweep across many seeded random decoration sets
//! rather than one fixed input — modeled on `diamond-types`'s habit of
//! driving structural invariants from a `SmallRng` seed printed on failure.

use decoration_set::{Decoration, DecorationSet, PointDescriptor, RangeDescriptor, BASE_NODE_SIZE};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq, Eq)]
struct NoWidget;
impl decoration_set::WidgetHandle for NoWidget {
    fn eq_spec(&self, _other: &Self) -> bool {
        true
    }
}

fn depth(set: &DecorationSet<NoWidget>) -> usize {
    1 + set.children.iter().map(|c| depth(c)).max().unwrap_or(0)
}

fn local_sizes(set: &DecorationSet<NoWidget>, out: &mut Vec<usize>) {
    out.push(set.local.len());
    for c in &set.children {
        local_sizes(c, out);
    }
}

/// Sums `local.len() + children.len()` across every node in the subtree,
/// alongside the node count, so callers can compute the average fill.
fn fill_sum(set: &DecorationSet<NoWidget>) -> (usize, usize) {
    let mut fill = set.local.len() + set.children.len();
    let mut count = 1;
    for child in &set.children {
        let (f, c) = fill_sum(child);
        fill += f;
        count += c;
    }
    (fill, count)
}

fn random_decorations(rng: &mut SmallRng, n: u32) -> Vec<Decoration<NoWidget>> {
    let mut pos = 0u32;
    let mut out = Vec::with_capacity(n as usize);
    for _ in 0..n {
        pos += rng.gen_range(0..3);
        if rng.gen_bool(0.15) {
            out.push(Decoration::point(pos, PointDescriptor::default()));
        } else {
            let len = rng.gen_range(1..5);
            out.push(Decoration::range(pos, pos + len, RangeDescriptor::default()).unwrap());
        }
    }
    out
}

#[test]
fn five_thousand_decorations_stay_balanced_across_seeds() {
    for seed in 0u64..8 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let decos = random_decorations(&mut rng, 5000);
        let set = DecorationSet::of(decos);
        assert_eq!(set.size, 5000, "seed {seed}");

        let d = depth(&set);
        assert!(d < 4, "seed {seed}: depth {d} too large");

        let mut sizes = Vec::new();
        local_sizes(&set, &mut sizes);
        let max_size = *sizes.iter().max().unwrap();
        assert!(max_size <= 2 * BASE_NODE_SIZE as usize, "seed {seed}: max local size {max_size}");

        let (fill, count) = fill_sum(&set);
        let avg = fill as f64 / count as f64;
        assert!(avg > 24.0, "seed {seed}: average local+children fill {avg} too low");
    }
}

#[test]
fn thousand_plus_decoration_sweep_holds_every_invariant() {
    for seed in 0u64..8 {
        let mut rng = SmallRng::seed_from_u64(seed + 1000);
        let n = rng.gen_range(1000..3000);
        let decos = random_decorations(&mut rng, n);
        let set = DecorationSet::of(decos);
        assert_eq!(set.size, n, "seed {seed}");

        let collected = set.collect();
        assert_eq!(collected.len(), n as usize, "seed {seed}: collect must yield every decoration");
        for w in collected.windows(2) {
            let a_key = (w[0].from, w[0].bias());
            let b_key = (w[1].from, w[1].bias());
            assert!(a_key <= b_key, "seed {seed}: collect must be sorted by (from, bias)");
        }
    }
}

#[test]
fn update_then_map_round_trip_preserves_size_bookkeeping() {
    for seed in 0u64..8 {
        let mut rng = SmallRng::seed_from_u64(seed + 2000);
        let decos = random_decorations(&mut rng, 2000);
        let set = DecorationSet::of(decos);

        let filter: &decoration_set::Filter<NoWidget> = &|from, _, _| from % 3 != 0;
        let filtered = set.update(Vec::new(), Some(filter), 0, set.length);
        assert!(filtered.size <= set.size, "seed {seed}");

        let changes = [decoration_set::Change::new(100, 100, 7), decoration_set::Change::new(500, 510, 2)];
        let mapped = filtered.map(&changes);
        assert!(mapped.size <= filtered.size, "seed {seed}: map never creates decorations");
    }
}
