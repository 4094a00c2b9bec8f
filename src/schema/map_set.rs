//! Affine map encoding and map sets.
//!
//! An [`AffineDecomposition`] is the parameterization the evolution mutates;
//! [`Affine`] pairs it with the 3×3 homogeneous matrix the simulator applies.
//!
//! # Composition order
//!
//! ```text
//! M · (x, y, 1) = R(angle) · Sh(shear) · S(scale) · (x, y) + translation
//!
//! R(a)  = | cos a  -sin a |   Sh(s) = | 1  s |   S(sx, sy) = | sx  0  |
//!         | sin a   cos a |           | 0  1 |               | 0   sy |
//! ```
//!
//! Translation is applied last. Every matrix entry is a smooth function of the
//! decomposition fields, so small parameter changes give small matrix changes.

use glam::{Mat2, Mat3, Vec2};
use serde::{Deserialize, Serialize};

/// Columns shorter than this are treated as collapsed when decomposing.
const DECOMPOSE_EPSILON: f32 = 1e-7;

/// Compact parameterization of a 2D affine map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineDecomposition {
    /// Rotation angle in radians.
    pub angle: f32,
    /// Horizontal shear factor.
    pub shear: f32,
    /// Non-uniform scale (may be negative for reflections).
    pub scale: Vec2,
    /// Translation applied after the linear part.
    pub translation: Vec2,
}

impl Default for AffineDecomposition {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineDecomposition {
    /// The identity map.
    pub const IDENTITY: Self = Self {
        angle: 0.0,
        shear: 0.0,
        scale: Vec2::ONE,
        translation: Vec2::ZERO,
    };

    /// Uniform scale + rotation + translation, the common IFS building block.
    pub fn from_scale_angle_translation(scale: Vec2, angle: f32, translation: Vec2) -> Self {
        Self {
            angle,
            shear: 0.0,
            scale,
            translation,
        }
    }

    /// Homogeneous matrix of this decomposition.
    pub fn to_matrix(&self) -> Mat3 {
        let rotation = Mat2::from_angle(self.angle);
        let shear = Mat2::from_cols(Vec2::X, Vec2::new(self.shear, 1.0));
        let scale = Mat2::from_diagonal(self.scale);
        let linear = rotation * shear * scale;

        Mat3::from_cols(
            linear.x_axis.extend(0.0),
            linear.y_axis.extend(0.0),
            self.translation.extend(1.0),
        )
    }

    /// Split an arbitrary linear part + translation into a decomposition.
    ///
    /// The linear part is factored as `R · U` with `U` upper triangular
    /// (`U = Sh · S`). Reflections end up as a negative `scale.y`.
    pub fn from_matrix(linear: Mat2, translation: Vec2) -> Self {
        let first = linear.x_axis;
        let scale_x = first.length();

        if scale_x <= DECOMPOSE_EPSILON {
            // First column collapsed: rotate the second column onto +y.
            let second = linear.y_axis;
            return Self {
                angle: (-second.x).atan2(second.y),
                shear: 0.0,
                scale: Vec2::new(0.0, second.length()),
                translation,
            };
        }

        let angle = first.y.atan2(first.x);
        let upper = Mat2::from_angle(-angle) * linear;
        let scale_y = upper.y_axis.y;
        let shear = if scale_y.abs() > DECOMPOSE_EPSILON {
            upper.y_axis.x / scale_y
        } else {
            0.0
        };

        Self {
            angle,
            shear,
            scale: Vec2::new(scale_x, scale_y),
            translation,
        }
    }

    /// Decompose a homogeneous affine matrix (bottom row assumed `0 0 1`).
    pub fn from_mat3(matrix: Mat3) -> Self {
        let linear = Mat2::from_cols(matrix.x_axis.truncate(), matrix.y_axis.truncate());
        Self::from_matrix(linear, matrix.z_axis.truncate())
    }

    /// Compose into an [`Affine`].
    pub fn compose(self) -> Affine {
        Affine::new(self)
    }

    /// Flat parameter vector (angle, shear, sx, sy, tx, ty).
    pub fn parameters(&self) -> [f32; 6] {
        [
            self.angle,
            self.shear,
            self.scale.x,
            self.scale.y,
            self.translation.x,
            self.translation.y,
        ]
    }
}

/// An affine map: decomposition plus its cached matrix.
///
/// The matrix is recomputed whenever the decomposition changes, so the two
/// never disagree. Serialized as the decomposition only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "AffineDecomposition", into = "AffineDecomposition")]
pub struct Affine {
    decomposition: AffineDecomposition,
    computed: Mat3,
}

impl Affine {
    /// Build from a decomposition.
    pub fn new(decomposition: AffineDecomposition) -> Self {
        Self {
            decomposition,
            computed: decomposition.to_matrix(),
        }
    }

    /// Build from a homogeneous matrix via [`AffineDecomposition::from_mat3`].
    pub fn from_mat3(matrix: Mat3) -> Self {
        Self::new(AffineDecomposition::from_mat3(matrix))
    }

    #[inline]
    pub fn decomposition(&self) -> &AffineDecomposition {
        &self.decomposition
    }

    #[inline]
    pub fn matrix(&self) -> &Mat3 {
        &self.computed
    }

    /// Replace the decomposition and recompute the matrix.
    pub fn set_decomposition(&mut self, decomposition: AffineDecomposition) {
        self.decomposition = decomposition;
        self.computed = decomposition.to_matrix();
    }

    /// Edit the decomposition in place; the matrix is recomputed afterwards.
    pub fn update(&mut self, edit: impl FnOnce(&mut AffineDecomposition)) {
        let mut decomposition = self.decomposition;
        edit(&mut decomposition);
        self.set_decomposition(decomposition);
    }

    /// Apply to a 2D point.
    #[inline]
    pub fn apply(&self, point: Vec2) -> Vec2 {
        self.computed.transform_point2(point)
    }

    /// Column-major matrix padded to the `mat3x3<f32>` storage layout (16-byte columns).
    pub fn gpu_columns(&self) -> [[f32; 4]; 3] {
        let m = &self.computed;
        [
            m.x_axis.extend(0.0).to_array(),
            m.y_axis.extend(0.0).to_array(),
            m.z_axis.extend(0.0).to_array(),
        ]
    }
}

impl From<AffineDecomposition> for Affine {
    fn from(decomposition: AffineDecomposition) -> Self {
        Self::new(decomposition)
    }
}

impl From<Affine> for AffineDecomposition {
    fn from(affine: Affine) -> Self {
        affine.decomposition
    }
}

/// Invalid map set.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapSetError {
    #[error("Map set contains no maps")]
    Empty,
    #[error("Map set has {maps} maps but {weights} weights")]
    WeightCount { maps: usize, weights: usize },
    #[error("Map {index} has invalid weight {weight}")]
    InvalidWeight { index: usize, weight: f32 },
}

/// One IFS candidate: an ordered set of affine maps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapSet {
    /// The maps, in selection order.
    pub maps: Vec<Affine>,
    /// Optional selection weights (empty = uniform).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<f32>,
}

impl MapSet {
    pub fn new(maps: Vec<Affine>) -> Self {
        Self {
            maps,
            weights: Vec::new(),
        }
    }

    pub fn from_decompositions(
        decompositions: impl IntoIterator<Item = AffineDecomposition>,
    ) -> Self {
        Self::new(decompositions.into_iter().map(Affine::new).collect())
    }

    /// Attach per-map selection weights.
    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        self.weights = weights;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Selection weight of map `index` (1.0 when unweighted).
    pub fn weight(&self, index: usize) -> f32 {
        self.weights.get(index).copied().unwrap_or(1.0)
    }

    pub fn decompositions(&self) -> impl Iterator<Item = &AffineDecomposition> + '_ {
        self.maps.iter().map(Affine::decomposition)
    }

    /// Check the set can drive a simulation.
    pub fn validate(&self) -> Result<(), MapSetError> {
        if self.maps.is_empty() {
            return Err(MapSetError::Empty);
        }
        if !self.weights.is_empty() {
            if self.weights.len() != self.maps.len() {
                return Err(MapSetError::WeightCount {
                    maps: self.maps.len(),
                    weights: self.weights.len(),
                });
            }
            for (index, &weight) in self.weights.iter().enumerate() {
                if !weight.is_finite() || weight < 0.0 {
                    return Err(MapSetError::InvalidWeight { index, weight });
                }
            }
        }
        Ok(())
    }
}
