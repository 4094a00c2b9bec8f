//! Well-known iterated function systems.
//!
//! Each preset yields a [`MapSet`] and the [`ViewRegion`] its attractor fits in.
//! They serve as render targets for reconvergence runs and as CLI demos.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use glam::{Mat2, Mat3, Vec2, vec2};
use serde::{Deserialize, Serialize};

use super::{Affine, MapSet, ViewRegion};

/// Row-major 2×2 constructor.
fn rows(m00: f32, m01: f32, m10: f32, m11: f32) -> Mat2 {
    Mat2::from_cols(vec2(m00, m10), vec2(m01, m11))
}

fn linear(m: Mat2, translation: Vec2) -> Mat3 {
    Mat3::from_cols(
        m.x_axis.extend(0.0),
        m.y_axis.extend(0.0),
        translation.extend(1.0),
    )
}

fn similarity(scale: Vec2, angle: f32, translation: Vec2) -> Mat3 {
    Mat3::from_scale_angle_translation(scale, angle, translation)
}

/// Same linear part, with `center` as the fixed point.
fn about(m: Mat2, center: Vec2) -> Mat3 {
    linear(m, center - m * center)
}

/// Named IFS presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    Sierpinski,
    Barnsley,
    Yang,
    Pentagon,
    Tunnel,
    FleurAstrale,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Sierpinski,
        Preset::Barnsley,
        Preset::Yang,
        Preset::Pentagon,
        Preset::Tunnel,
        Preset::FleurAstrale,
    ];

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Sierpinski => "sierpinski",
            Preset::Barnsley => "barnsley",
            Preset::Yang => "yang",
            Preset::Pentagon => "pentagon",
            Preset::Tunnel => "tunnel",
            Preset::FleurAstrale => "fleur-astrale",
        }
    }

    /// Region the attractor is drawn in.
    pub fn view(&self) -> ViewRegion {
        match self {
            Preset::Barnsley => ViewRegion::new(vec2(-5.0, 0.0), vec2(5.0, 10.0)),
            _ => ViewRegion::default(),
        }
    }

    pub fn map_set(&self) -> MapSet {
        match self {
            Preset::Sierpinski => from_matrices([
                similarity(Vec2::splat(0.5), 0.0, vec2(0.0, 0.5)),
                similarity(Vec2::splat(0.5), 0.0, Vec2::splat(-0.5)),
                similarity(Vec2::splat(0.5), 0.0, vec2(0.5, -0.5)),
            ]),
            Preset::Barnsley => from_matrices([
                linear(rows(0.0, 0.0, 0.0, 0.16), Vec2::ZERO),
                linear(rows(0.85, 0.04, -0.04, 0.85), vec2(0.0, 1.6)),
                linear(rows(0.2, -0.26, 0.23, 0.22), vec2(0.0, 1.6)),
                linear(rows(-0.15, 0.28, 0.26, 0.24), vec2(0.0, 0.44)),
            ])
            .with_weights(vec![0.01, 0.85, 0.07, 0.07]),
            Preset::Yang => from_matrices([
                similarity(Vec2::splat(0.9), -0.5, vec2(0.0, 0.1)),
                similarity(Vec2::splat(0.9), 0.2, vec2(0.0, 0.1)),
            ]),
            Preset::Pentagon => from_matrices((0..5).map(|i| {
                let center = Mat2::from_angle(TAU / 5.0 * i as f32) * vec2(0.0, 0.8);
                about(Mat2::from_diagonal(Vec2::splat(0.5)), center)
            })),
            Preset::Tunnel => {
                let side = similarity(vec2(0.25, 0.5), 0.0, vec2(0.75, 0.0));
                from_matrices([
                    linear(rows(0.5, -0.5, 0.5, 0.5), Vec2::ZERO),
                    side,
                    Mat3::from_angle(FRAC_PI_2) * side,
                    Mat3::from_angle(PI) * side,
                    Mat3::from_angle(-FRAC_PI_2) * side,
                ])
            }
            Preset::FleurAstrale => {
                let corner = linear(Mat2::from_diagonal(Vec2::splat(0.3)), vec2(0.67, 0.67));
                let mirrored = Mat3::from_scale(vec2(-1.0, 1.0)) * corner;
                let flip = Mat3::from_scale(Vec2::splat(-1.0));
                from_matrices([
                    similarity(Vec2::splat(0.67), FRAC_PI_4, Vec2::ZERO),
                    corner,
                    mirrored,
                    flip * corner,
                    flip * mirrored,
                ])
            }
        }
    }
}

fn from_matrices(matrices: impl IntoIterator<Item = Mat3>) -> MapSet {
    MapSet::new(matrices.into_iter().map(Affine::from_mat3).collect())
}
