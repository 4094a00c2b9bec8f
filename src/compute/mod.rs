//! Compute module - Simulation, rendering, scoring and evolution.
//!
//! Candidate evaluation runs four stages in strict order:
//!
//! 1. [`simulate`]: chaos-game iteration over a point buffer
//! 2. [`rasterize`]: presence-only projection into a bitmap
//! 3. [`compare`]: per-cell match flags against the target
//! 4. [`Reducer`]: pairwise tree sum of the flags
//!
//! [`CpuPipeline`] and [`GpuPipeline`] both implement [`Evaluator`].

pub mod bitmap;
pub mod compare;
pub mod evolution;
pub mod gpu;
pub mod pipeline;
pub mod points;
pub mod raster;
pub mod reduce;
pub mod simulate;

pub use bitmap::{Bitmap, BitmapError};
pub use compare::compare;
pub use gpu::{GpuError, GpuPipeline};
pub use pipeline::{CpuPipeline, CpuRenderer, Evaluation, Evaluator, PipelineError};
pub use points::{Point, PointBuffer, generate_seed};
pub use raster::{Camera, rasterize};
pub use reduce::{Reducer, padded_len, reduce_pass, reduce_sum};
pub use simulate::{MapSelector, build_index_table, selection_hash, simulate};
