//! Presence-only rasterizer.
//!
//! Points are taken into clip space by the inverse-camera matrix and every
//! pixel hit by at least one point is set to 255. Density is ignored.
//!
//! ```text
//! clip (-1, +1) ──────── (+1, +1)      pixel (0, 0) ──── (w-1, 0)
//!       │                    │    ->        │                │
//! clip (-1, -1) ──────── (+1, -1)      pixel (0, h-1) ── (w-1, h-1)
//! ```

use glam::{Mat3, Vec2};
use rayon::prelude::*;

use super::bitmap::Bitmap;
use super::points::Point;
use crate::schema::ViewRegion;

/// Model-space to clip-space transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    inverse: Mat3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_inverse(Mat3::IDENTITY)
    }
}

impl Camera {
    /// Camera from a view matrix (clip to model space).
    pub fn new(view: Mat3) -> Self {
        Self::from_inverse(view.inverse())
    }

    /// Camera from an inverse-camera matrix (model to clip space).
    pub fn from_inverse(inverse: Mat3) -> Self {
        Self { inverse }
    }

    /// Camera framing `region`.
    pub fn from_region(region: &ViewRegion) -> Self {
        Self::from_inverse(region.to_clip_transform())
    }

    #[inline]
    pub fn inverse(&self) -> &Mat3 {
        &self.inverse
    }

    #[inline]
    pub fn to_clip(&self, point: Point) -> Vec2 {
        self.inverse.transform_point2(point)
    }

    /// Pixel cell of `point`, or `None` when it falls outside the bitmap
    /// or is not finite.
    #[inline]
    pub fn project(&self, point: Point, width: u32, height: u32) -> Option<(u32, u32)> {
        let clip = self.to_clip(point);
        let px = ((clip.x + 1.0) * 0.5 * width as f32).floor();
        let py = ((1.0 - clip.y) * 0.5 * height as f32).floor();
        // NaN fails both comparisons.
        if px >= 0.0 && px < width as f32 && py >= 0.0 && py < height as f32 {
            Some((px as u32, py as u32))
        } else {
            None
        }
    }
}

/// Rasterize `points` into `target`, which is cleared first.
///
/// Returns the number of finite points, so callers can detect a candidate
/// whose points all diverged.
pub fn rasterize(points: &[Point], camera: &Camera, target: &mut Bitmap) -> usize {
    let (width, height) = (target.width(), target.height());
    target.clear();

    let (finite, hits): (usize, Vec<usize>) = points
        .par_iter()
        .filter(|p| p.is_finite())
        .fold(
            || (0usize, Vec::new()),
            |(count, mut hits), &p| {
                if let Some((x, y)) = camera.project(p, width, height) {
                    hits.push(y as usize * width as usize + x as usize);
                }
                (count + 1, hits)
            },
        )
        .reduce(
            || (0, Vec::new()),
            |(a, mut hits_a), (b, hits_b)| {
                hits_a.extend(hits_b);
                (a + b, hits_a)
            },
        );

    for index in hits {
        target.cover_index(index);
    }
    finite
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    #[test]
    fn test_projection_corners() {
        let camera = Camera::default();
        assert_eq!(camera.project(vec2(-1.0, 1.0), 4, 4), Some((0, 0)));
        assert_eq!(camera.project(vec2(0.99, -0.99), 4, 4), Some((3, 3)));
        assert_eq!(camera.project(vec2(1.0, 0.0), 4, 4), None);
        assert_eq!(camera.project(vec2(f32::NAN, 0.0), 4, 4), None);
    }

    #[test]
    fn test_rasterize_presence_only() {
        let camera = Camera::default();
        let mut bitmap = Bitmap::new(4, 4);
        let points = vec![vec2(-0.9, 0.9); 10];

        let finite = rasterize(&points, &camera, &mut bitmap);
        assert_eq!(finite, 10);
        assert_eq!(bitmap.coverage(), 1);
        assert_eq!(bitmap.get(0, 0), 255);
    }

    #[test]
    fn test_rasterize_clears_and_counts_finite() {
        let camera = Camera::default();
        let mut bitmap = Bitmap::filled(4, 4, true);
        let points = vec![vec2(f32::INFINITY, 0.0), vec2(f32::NAN, 1.0), vec2(5.0, 5.0)];

        let finite = rasterize(&points, &camera, &mut bitmap);
        assert_eq!(finite, 1);
        assert_eq!(bitmap.coverage(), 0);
    }

    #[test]
    fn test_region_camera() {
        let camera = Camera::from_region(&ViewRegion::new(vec2(-5.0, 0.0), vec2(5.0, 10.0)));
        assert_eq!(camera.project(vec2(-4.9, 9.9), 10, 10), Some((0, 0)));
        assert_eq!(camera.project(vec2(0.1, 0.1), 10, 10), Some((5, 9)));

        let view = ViewRegion::new(vec2(-5.0, 0.0), vec2(5.0, 10.0)).to_clip_transform().inverse();
        let same = Camera::new(view);
        assert_eq!(same.project(vec2(0.1, 0.1), 10, 10), Some((5, 9)));
    }
}
