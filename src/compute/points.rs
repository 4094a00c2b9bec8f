//! Point buffers for the chaos game.

use glam::Vec2;
use rand::Rng;

use crate::schema::SeedDistribution;

/// A simulated point. `Vec2` is `Pod`, so buffers upload to the GPU as-is.
pub type Point = Vec2;

/// Draw `count` starting points from `distribution`.
pub fn generate_seed<R: Rng>(
    distribution: &SeedDistribution,
    count: usize,
    rng: &mut R,
) -> Vec<Point> {
    match *distribution {
        SeedDistribution::Uniform { min, max } => (0..count)
            .map(|_| {
                let t = Vec2::new(rng.r#gen::<f32>(), rng.r#gen::<f32>());
                min + (max - min) * t
            })
            .collect(),
        SeedDistribution::Fixed { x, y } => vec![Vec2::new(x, y); count],
    }
}

/// Working points plus the seed they are reset to before each evaluation.
///
/// The seed is drawn once, so every candidate starts from identical points.
#[derive(Debug, Clone)]
pub struct PointBuffer {
    seed: Vec<Point>,
    points: Vec<Point>,
}

impl PointBuffer {
    pub fn new(seed: Vec<Point>) -> Self {
        let points = seed.clone();
        Self { seed, points }
    }

    pub fn from_distribution<R: Rng>(
        distribution: &SeedDistribution,
        count: usize,
        rng: &mut R,
    ) -> Self {
        Self::new(generate_seed(distribution, count, rng))
    }

    /// Restore every point to its seed position.
    pub fn reset(&mut self) {
        self.points.copy_from_slice(&self.seed);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn seed(&self) -> &[Point] {
        &self.seed
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }
}
