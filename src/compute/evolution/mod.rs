//! Evolutionary search over IFS map sets.
//!
//! - **Genome operations** (`genome`): random map sets, crossover, mutation
//!   and the distance used for diversity tracking
//! - **Search** (`search`): the generational loop driving an [`Evaluator`]
//!
//! # Example
//!
//! ```rust,no_run
//! use nephos::compute::Bitmap;
//! use nephos::compute::evolution::EvolutionEngine;
//! use nephos::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig::default();
//! let target = Bitmap::load("target.png", 128).unwrap();
//!
//! let mut engine = EvolutionEngine::new(config, target).unwrap();
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!("Generation {}: best fitness = {:.3}",
//!             progress.generation, progress.best_fitness);
//!     })
//!     .unwrap();
//!
//! println!("Best fitness: {:.3}", result.best.fitness);
//! ```
//!
//! [`Evaluator`]: crate::compute::Evaluator

mod genome;
mod search;

pub use genome::{MapSetRng, MutationParams, map_set_distance, wrap_angle};
pub use search::{Candidate, EvolutionEngine, EvolutionError, ProgressCallback};
