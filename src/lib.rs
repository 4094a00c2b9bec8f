//! Nephos - Evolving iterated function systems toward a target image.
//!
//! A candidate is a set of 2D affine maps. Its attractor is approximated by
//! the chaos game over many points at once, rasterized into a bitmap and
//! scored by the fraction of grid cells that agree with a binary target. A
//! generational search mutates and recombines map sets to raise that score.
//!
//! # Architecture
//!
//! - `schema`: Map encoding, configuration, presets and result types
//! - `compute`: Simulation, rasterization, scoring (CPU and GPU) and evolution
//!
//! # Example
//!
//! ```rust,no_run
//! use nephos::{Bitmap, CpuPipeline, EvaluationConfig, Evaluator, Preset};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let config = EvaluationConfig::default();
//! let target = Bitmap::load("target.png", 128).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let mut pipeline = CpuPipeline::from_config(&config, target, &mut rng).unwrap();
//! let score = pipeline.evaluate(&Preset::Sierpinski.map_set()).unwrap();
//!
//! println!("{} of {} cells match", score.matches, score.cells);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolutionEngine, EvolutionError};
pub use compute::{Bitmap, CpuPipeline, Evaluation, Evaluator, GpuPipeline, PipelineError};
pub use schema::{Affine, AffineDecomposition, EvaluationConfig, EvolutionConfig, MapSet, Preset};
