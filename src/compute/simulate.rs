//! Chaos-game point simulator.
//!
//! Every step, each point hashes its own state to pick a map and moves to the
//! image of that map. Points are independent, so the update is a plain
//! data-parallel map over the buffer.

use rayon::prelude::*;

use super::points::Point;
use crate::schema::{MapSelection, MapSet, MapSetError};

/// 32-bit avalanche finalizer.
#[inline]
pub fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

/// Map selection hash of a point's state.
///
/// Mixes the coordinate bits with the point's buffer index and the step, so
/// points sharing a seed still diverge and a map's fixed point does not lock
/// the selection. The shader computes the same function.
#[inline]
pub fn selection_hash(point: Point, index: u32, step: u32) -> u32 {
    mix32(point.x.to_bits() ^ mix32(point.y.to_bits() ^ mix32(index ^ mix32(step))))
}

/// Apportion `len` table slots to maps by weight (largest remainder).
///
/// Zero or missing weights fall back to an even split.
pub fn build_index_table(map_set: &MapSet, len: u32) -> Vec<u32> {
    let count = map_set.len();
    if count == 0 || len == 0 {
        return Vec::new();
    }

    let weights: Vec<f64> = (0..count).map(|i| map_set.weight(i).max(0.0) as f64).collect();
    let total: f64 = weights.iter().sum();
    let weights = if total > 0.0 {
        weights.iter().map(|w| w / total).collect::<Vec<_>>()
    } else {
        vec![1.0 / count as f64; count]
    };

    let quotas: Vec<f64> = weights.iter().map(|w| w * len as f64).collect();
    let mut slots: Vec<u32> = quotas.iter().map(|q| q.floor() as u32).collect();
    let assigned: u32 = slots.iter().sum();

    let mut by_remainder: Vec<usize> = (0..count).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in by_remainder.iter().cycle().take(len.saturating_sub(assigned) as usize) {
        slots[i] += 1;
    }

    slots
        .iter()
        .enumerate()
        .flat_map(|(map, &n)| std::iter::repeat_n(map as u32, n as usize))
        .collect()
}

/// Resolved map selection for one map set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapSelector {
    /// `hash % map_count`.
    Hash { map_count: u32 },
    /// `table[hash % table.len()]`.
    Table(Vec<u32>),
}

impl MapSelector {
    /// Resolve `selection` against `map_set`, failing on an unusable set.
    pub fn new(selection: MapSelection, map_set: &MapSet) -> Result<Self, MapSetError> {
        map_set.validate()?;
        Ok(match selection {
            MapSelection::Hash => Self::Hash {
                map_count: map_set.len() as u32,
            },
            MapSelection::IndexTable { len } => Self::Table(build_index_table(map_set, len.max(1))),
        })
    }

    #[inline]
    pub fn select(&self, hash: u32) -> usize {
        match self {
            Self::Hash { map_count } => (hash % map_count) as usize,
            Self::Table(table) => table[hash as usize % table.len()] as usize,
        }
    }
}

/// Advance `points` by `iterations` chaos-game steps in place.
///
/// Fails before touching any point if the map set is empty or malformed.
pub fn simulate(
    points: &mut [Point],
    map_set: &MapSet,
    selection: MapSelection,
    iterations: u32,
) -> Result<(), MapSetError> {
    let selector = MapSelector::new(selection, map_set)?;
    let maps = &map_set.maps;

    points.par_iter_mut().enumerate().for_each(|(index, point)| {
        let mut p = *point;
        for iteration in 0..iterations {
            let map = selector.select(selection_hash(p, index as u32, iteration));
            p = maps[map].apply(p);
        }
        *point = p;
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AffineDecomposition, Preset};
    use glam::Vec2;

    #[test]
    fn test_empty_map_set_fails_fast() {
        let mut points = vec![Vec2::ZERO; 8];
        let err = simulate(&mut points, &MapSet::default(), MapSelection::Hash, 10);
        assert_eq!(err, Err(MapSetError::Empty));
        assert!(points.iter().all(|&p| p == Vec2::ZERO));
    }

    #[test]
    fn test_selection_is_uniform() {
        let map_count = 6u32;
        let selector = MapSelector::Hash { map_count };
        let mut counts = [0usize; 6];
        let samples = 60_000u32;

        for i in 0..samples {
            let p = Vec2::new((i % 251) as f32 * 0.01 - 1.0, (i % 241) as f32 * 0.013 - 1.5);
            counts[selector.select(selection_hash(p, i, i % 15))] += 1;
        }

        let expected = samples as f64 / map_count as f64;
        for &c in &counts {
            let deviation = (c as f64 - expected).abs() / expected;
            assert!(deviation < 0.05, "{counts:?}");
        }
    }

    #[test]
    fn test_identical_seeds_diverge() {
        let set = Preset::Sierpinski.map_set();
        let mut points = vec![Vec2::ZERO; 64];
        simulate(&mut points, &set, MapSelection::Hash, 10).unwrap();

        let first = points[0];
        assert!(points.iter().any(|&p| p != first));
    }

    #[test]
    fn test_contractive_set_stays_bounded() {
        let set = Preset::Sierpinski.map_set();
        let mut points: Vec<Vec2> = (0..1000)
            .map(|i| Vec2::new((i as f32).sin(), (i as f32).cos()))
            .collect();
        simulate(&mut points, &set, MapSelection::Hash, 20).unwrap();

        // Attractor lies in the [-1, 1] square.
        assert!(points.iter().all(|p| p.abs().max_element() <= 1.0 + 1e-4));
    }

    #[test]
    fn test_index_table_apportionment() {
        let set = Preset::Barnsley.map_set();
        let table = build_index_table(&set, 100);
        assert_eq!(table.len(), 100);

        let count = |m: u32| table.iter().filter(|&&t| t == m).count();
        assert_eq!(count(0), 1);
        assert_eq!(count(1), 85);
        assert_eq!(count(2), 7);
        assert_eq!(count(3), 7);
    }

    #[test]
    fn test_index_table_uniform_without_weights() {
        let set = MapSet::from_decompositions([AffineDecomposition::IDENTITY; 3]);
        let table = build_index_table(&set, 8);
        assert_eq!(table, vec![0, 0, 0, 1, 1, 1, 2, 2]);
    }

    #[test]
    fn test_index_table_selection_matches_weights() {
        let set = Preset::Barnsley.map_set();
        let selector = MapSelector::new(MapSelection::IndexTable { len: 100 }, &set).unwrap();
        let mut counts = [0usize; 4];
        for i in 0..100_000u32 {
            counts[selector.select(mix32(i))] += 1;
        }
        assert!(counts[1] > 80_000, "{counts:?}");
        assert!(counts[0] < 2_000, "{counts:?}");
    }
}
