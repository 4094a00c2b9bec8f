//! Progress and result types reported by the evolution controller.

use serde::{Deserialize, Serialize};

use super::{AffineDecomposition, MapSet};

/// Progress update for callbacks and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Current generation number.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Number of evaluations completed this generation.
    pub evaluations_completed: usize,
    /// Total evaluations this generation.
    pub evaluations_total: usize,
    /// Best fitness seen so far.
    pub best_fitness: f32,
    /// Average fitness of the current population.
    pub avg_fitness: f32,
    /// Best fitness this generation.
    pub generation_best: f32,
    /// Current best candidate.
    pub best_candidate: Option<CandidateSnapshot>,
    /// Statistics history for plotting.
    pub history: EvolutionHistory,
    /// Current phase of the controller.
    pub phase: EvolutionPhase,
}

/// Snapshot of one evaluated map set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    /// Unique identifier.
    pub id: u64,
    /// Fraction of matching grid cells.
    pub fitness: f32,
    /// Raw number of matching cells.
    pub matches: u32,
    /// Generation this candidate was created in.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
    /// The maps as decompositions.
    pub maps: Vec<AffineDecomposition>,
    /// Selection weights, empty when uniform.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<f32>,
}

impl CandidateSnapshot {
    /// Rebuild the map set this snapshot describes.
    pub fn map_set(&self) -> MapSet {
        MapSet::from_decompositions(self.maps.iter().copied()).with_weights(self.weights.clone())
    }
}

/// Per-generation statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f32>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f32>,
    /// Standard deviation per generation.
    pub fitness_std: Vec<f32>,
    /// Mean pairwise map-set distance per generation.
    pub diversity: Vec<f32>,
}

/// Controller state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Waiting for the next generation.
    #[default]
    Idle,
    /// Scoring candidate `candidate` of the population.
    Evaluating { candidate: usize },
    /// Sorting by fitness.
    Ranking,
    /// Selecting parents and producing offspring.
    Reproducing,
    /// Evolution complete.
    Complete,
    /// Evolution stopped early.
    Stopped,
}

/// Final result of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate found.
    pub best: CandidateSnapshot,
    /// Generation in which `best` was first evaluated.
    pub found_in_generation: usize,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Total generations run.
    pub generations: usize,
    /// Total evaluations performed.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f32,
    /// Average fitness of the final population.
    pub final_avg_fitness: f32,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Which backend scored candidates.
    pub evaluator: String,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Reached target fitness.
    TargetReached,
    /// Cancelled through the handle.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Preset;

    #[test]
    fn test_snapshot_rebuilds_map_set() {
        let set = Preset::Barnsley.map_set();
        let snapshot = CandidateSnapshot {
            id: 1,
            fitness: 0.5,
            matches: 10,
            generation: 0,
            parents: vec![],
            maps: set.decompositions().copied().collect(),
            weights: set.weights.clone(),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: CandidateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.map_set(), set);
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&EvolutionPhase::Evaluating { candidate: 3 }).unwrap();
        let parsed: EvolutionPhase = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EvolutionPhase::Evaluating { candidate: 3 });
    }
}
