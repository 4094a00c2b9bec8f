//! Map set manipulation for evolutionary search.
//!
//! Provides random generation, crossover, and mutation operations. Every edit
//! goes through [`Affine::set_decomposition`] so cached matrices never go stale.

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use rand::prelude::*;

use crate::schema::{Affine, AffineDecomposition, MapConstraints, MapSet};

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Mutation settings for one generation.
#[derive(Debug, Clone, Copy)]
pub struct MutationParams {
    /// Probability that each parameter is perturbed.
    pub rate: f32,
    /// Noise scale relative to the parameter's bounds (already damped).
    pub strength: f32,
    /// Probability of adding or removing one map.
    pub structural_rate: f32,
    /// Allowed map count.
    pub min_maps: usize,
    pub max_maps: usize,
}

/// Random number generator wrapper for map set operations.
pub struct MapSetRng {
    rng: StdRng,
}

impl MapSetRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a fresh `u64`, e.g. to seed another generator deterministically.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// Uniform integer in `0..n`.
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f32 {
        self.rng.r#gen::<f32>()
    }

    pub fn chance(&mut self, probability: f32) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0) as f64)
    }

    /// Random decomposition within constraints.
    pub fn random_map(&mut self, constraints: &MapConstraints) -> AffineDecomposition {
        AffineDecomposition {
            angle: wrap_angle(self.rng.gen_range(-PI..PI)),
            shear: self.uniform(constraints.shear_bounds),
            scale: Vec2::new(
                self.uniform(constraints.scale_bounds),
                self.uniform(constraints.scale_bounds),
            ),
            translation: Vec2::new(
                self.uniform(constraints.translation_bounds),
                self.uniform(constraints.translation_bounds),
            ),
        }
    }

    /// Random map set with a map count in `min_maps..=max_maps`.
    pub fn random_map_set(
        &mut self,
        min_maps: usize,
        max_maps: usize,
        constraints: &MapConstraints,
    ) -> MapSet {
        let count = self.rng.gen_range(min_maps..=max_maps.max(min_maps));
        let maps: Vec<_> = (0..count).map(|_| self.random_map(constraints)).collect();
        MapSet::from_decompositions(maps)
    }

    /// Uniform sample within bounds.
    fn uniform(&mut self, bounds: (f32, f32)) -> f32 {
        if bounds.0 >= bounds.1 {
            return bounds.0;
        }
        self.rng.gen_range(bounds.0..bounds.1)
    }

    /// Gaussian mutation with bounds.
    pub fn gaussian_mutate(&mut self, value: f32, strength: f32, bounds: (f32, f32)) -> f32 {
        let noise: f32 = self.rng.sample(rand_distr::StandardNormal);
        let mutated = value + noise * strength * (bounds.1 - bounds.0);
        mutated.clamp(bounds.0, bounds.1)
    }

    /// Gaussian mutation of an angle; noise is scaled by a full turn and wrapped.
    pub fn mutate_angle(&mut self, angle: f32, strength: f32) -> f32 {
        let noise: f32 = self.rng.sample(rand_distr::StandardNormal);
        wrap_angle(angle + noise * strength * TAU)
    }

    /// Slot-wise crossover: each shared slot comes from either parent.
    ///
    /// The child keeps the first parent's length and any maps past the second
    /// parent's end.
    pub fn crossover(&mut self, parent1: &MapSet, parent2: &MapSet) -> MapSet {
        let maps: Vec<Affine> = parent1
            .maps
            .iter()
            .enumerate()
            .map(|(i, &map)| match parent2.maps.get(i) {
                Some(&other) if self.rng.gen_bool(0.5) => other,
                _ => map,
            })
            .collect();

        MapSet {
            maps,
            weights: parent1.weights.clone(),
        }
    }

    /// Mutate a map set in place.
    pub fn mutate(
        &mut self,
        map_set: &mut MapSet,
        params: &MutationParams,
        constraints: &MapConstraints,
    ) {
        for map in &mut map_set.maps {
            self.mutate_map(map, params, constraints);
        }

        if self.chance(params.structural_rate) {
            self.mutate_structure(map_set, params, constraints);
        }
    }

    fn mutate_map(
        &mut self,
        map: &mut Affine,
        params: &MutationParams,
        constraints: &MapConstraints,
    ) {
        let mut d = *map.decomposition();
        let strength = params.strength;
        let mut changed = false;

        if self.chance(params.rate) {
            d.angle = self.mutate_angle(d.angle, strength);
            changed = true;
        }
        if self.chance(params.rate) {
            d.shear = self.gaussian_mutate(d.shear, strength, constraints.shear_bounds);
            changed = true;
        }
        if self.chance(params.rate) {
            d.scale.x = self.gaussian_mutate(d.scale.x, strength, constraints.scale_bounds);
            changed = true;
        }
        if self.chance(params.rate) {
            d.scale.y = self.gaussian_mutate(d.scale.y, strength, constraints.scale_bounds);
            changed = true;
        }
        if self.chance(params.rate) {
            d.translation.x =
                self.gaussian_mutate(d.translation.x, strength, constraints.translation_bounds);
            changed = true;
        }
        if self.chance(params.rate) {
            d.translation.y =
                self.gaussian_mutate(d.translation.y, strength, constraints.translation_bounds);
            changed = true;
        }

        if changed {
            map.set_decomposition(d);
        }
    }

    /// Add or remove one map, staying within the allowed count.
    fn mutate_structure(
        &mut self,
        map_set: &mut MapSet,
        params: &MutationParams,
        constraints: &MapConstraints,
    ) {
        let len = map_set.len();
        let can_add = len < params.max_maps;
        let can_remove = len > params.min_maps.max(1);

        let add = match (can_add, can_remove) {
            (false, false) => return,
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.rng.gen_bool(0.5),
        };

        if add {
            let map = self.random_map(constraints).compose();
            let index = self.rng.gen_range(0..=len);
            map_set.maps.insert(index, map);
            if !map_set.weights.is_empty() {
                let mean = map_set.weights.iter().sum::<f32>() / map_set.weights.len() as f32;
                map_set.weights.insert(index, mean);
            }
        } else {
            let index = self.rng.gen_range(0..len);
            map_set.maps.remove(index);
            if index < map_set.weights.len() {
                map_set.weights.remove(index);
            }
        }
    }
}

/// Distance between two map sets for diversity tracking.
///
/// Mean absolute parameter difference over aligned slots, plus a fixed
/// penalty per unmatched map.
pub fn map_set_distance(a: &MapSet, b: &MapSet) -> f32 {
    let mut distance = 0.0f32;
    let mut count = 0;

    for (m1, m2) in a.decompositions().zip(b.decompositions()) {
        distance += wrap_angle(m1.angle - m2.angle).abs() / PI;
        let (p1, p2) = (m1.parameters(), m2.parameters());
        for (x, y) in p1[1..].iter().zip(p2[1..].iter()) {
            distance += (x - y).abs();
        }
        count += 6;
    }

    let unmatched = a.len().abs_diff(b.len());
    distance += unmatched as f32;
    count += unmatched;

    if count > 0 {
        distance / count as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Preset;

    fn params(min_maps: usize, max_maps: usize) -> MutationParams {
        MutationParams {
            rate: 1.0,
            strength: 0.2,
            structural_rate: 0.0,
            min_maps,
            max_maps,
        }
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(-TAU - 0.5) + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_random_map_set_within_constraints() {
        let mut rng = MapSetRng::new(42);
        let constraints = MapConstraints::default();

        for _ in 0..20 {
            let set = rng.random_map_set(2, 5, &constraints);
            assert!((2..=5).contains(&set.len()));
            for d in set.decompositions() {
                assert!(d.angle > -PI && d.angle <= PI);
                let (lo, hi) = constraints.scale_bounds;
                assert!(d.scale.x >= lo && d.scale.x <= hi);
                let (lo, hi) = constraints.shear_bounds;
                assert!(d.shear >= lo && d.shear <= hi);
            }
        }
    }

    #[test]
    fn test_mutation_recomputes_matrices() {
        let mut rng = MapSetRng::new(7);
        let constraints = MapConstraints::default();
        let mut set = rng.random_map_set(4, 4, &constraints);
        let before = set.clone();

        rng.mutate(&mut set, &params(4, 4), &constraints);

        assert_ne!(set, before);
        for map in &set.maps {
            assert_eq!(*map.matrix(), map.decomposition().to_matrix());
            let d = map.decomposition();
            assert!(d.translation.x >= -1.0 && d.translation.x <= 1.0);
        }
    }

    #[test]
    fn test_structural_mutation_respects_range() {
        let mut rng = MapSetRng::new(3);
        let constraints = MapConstraints::default();
        let structural = MutationParams {
            structural_rate: 1.0,
            ..params(2, 4)
        };

        let mut set = rng.random_map_set(3, 3, &constraints);
        for _ in 0..50 {
            rng.mutate(&mut set, &structural, &constraints);
            assert!((2..=4).contains(&set.len()));
        }
    }

    #[test]
    fn test_structural_mutation_keeps_weights_aligned() {
        let mut rng = MapSetRng::new(11);
        let constraints = MapConstraints::default();
        let structural = MutationParams {
            rate: 0.0,
            structural_rate: 1.0,
            ..params(2, 6)
        };

        let mut set = Preset::Barnsley.map_set();
        for _ in 0..20 {
            rng.mutate(&mut set, &structural, &constraints);
            assert_eq!(set.weights.len(), set.len());
            assert!(set.validate().is_ok());
        }
    }

    #[test]
    fn test_crossover() {
        let mut rng = MapSetRng::new(42);
        let constraints = MapConstraints::default();
        let p1 = rng.random_map_set(5, 5, &constraints);
        let p2 = rng.random_map_set(3, 3, &constraints);

        let child = rng.crossover(&p1, &p2);
        assert_eq!(child.len(), p1.len());
        for (i, map) in child.maps.iter().enumerate() {
            assert!(*map == p1.maps[i] || p2.maps.get(i) == Some(map));
        }
        assert_eq!(&child.maps[3..], &p1.maps[3..]);
    }

    #[test]
    fn test_map_set_distance() {
        let mut rng = MapSetRng::new(42);
        let constraints = MapConstraints::default();
        let a = rng.random_map_set(4, 4, &constraints);
        let b = rng.random_map_set(4, 4, &constraints);

        assert!(map_set_distance(&a, &a.clone()).abs() < 1e-6);
        assert!(map_set_distance(&a, &b) > 0.0);

        let mut shorter = a.clone();
        shorter.maps.pop();
        assert!(map_set_distance(&a, &shorter) > 0.0);
    }

    #[test]
    fn test_determinism() {
        let constraints = MapConstraints::default();
        let a = MapSetRng::new(9).random_map_set(3, 6, &constraints);
        let b = MapSetRng::new(9).random_map_set(3, 6, &constraints);
        assert_eq!(a, b);
    }
}
