//! Evolution controller.
//!
//! Per generation: evaluate every candidate through the [`Evaluator`], rank by
//! fitness, record statistics, then build the next population from elites and
//! mutated offspring of selected parents.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::compute::bitmap::Bitmap;
use crate::compute::gpu::{GpuError, GpuPipeline};
use crate::compute::pipeline::{CpuPipeline, Evaluator, PipelineError};
use crate::compute::points::generate_seed;
use crate::schema::{
    CandidateSnapshot, ConfigError, EvolutionConfig, EvolutionHistory, EvolutionPhase,
    EvolutionProgress, EvolutionResult, EvolutionStats, MapSet, SelectionStrategy, StopReason,
};

use super::genome::{MapSetRng, MutationParams, map_set_distance};

/// Errors that abort an evolution run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Evaluation failed: {0}")]
    Pipeline(#[from] PipelineError),
}

/// A candidate individual in the population.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Unique identifier.
    pub id: u64,
    /// The maps.
    pub map_set: MapSet,
    /// Fitness score (0 until evaluated).
    pub fitness: f32,
    /// Matching grid cells.
    pub matches: u32,
    /// Whether `fitness` is current.
    pub evaluated: bool,
    /// Generation created.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
}

impl Candidate {
    /// Convert to snapshot for serialization.
    pub fn to_snapshot(&self) -> CandidateSnapshot {
        CandidateSnapshot {
            id: self.id,
            fitness: self.fitness,
            matches: self.matches,
            generation: self.generation,
            parents: self.parents.clone(),
            maps: self.map_set.decompositions().copied().collect(),
            weights: self.map_set.weights.clone(),
        }
    }
}

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(&EvolutionProgress) + Send + Sync>;

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: MapSetRng,
    evaluator: Box<dyn Evaluator>,
    population: Vec<Candidate>,
    initial_population: Vec<MapSet>,
    history: EvolutionHistory,
    generation: usize,
    best: Option<Candidate>,
    best_fitness: f32,
    total_evaluations: u64,
    next_id: u64,
    phase: EvolutionPhase,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create an engine scoring against `target`.
    ///
    /// Uses the GPU when `evaluation.use_gpu` is set and an adapter exists,
    /// falling back to the CPU otherwise.
    pub fn new(config: EvolutionConfig, target: Bitmap) -> Result<Self, EvolutionError> {
        config.validate()?;
        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut rng = MapSetRng::new(seed);

        // Seed points come from their own stream so they are fixed per run.
        let mut point_rng = StdRng::seed_from_u64(rng.next_seed());
        let evaluation = &config.evaluation;
        let points =
            generate_seed(&evaluation.seed_distribution, evaluation.points, &mut point_rng);

        let evaluator: Box<dyn Evaluator> = if evaluation.use_gpu {
            match GpuPipeline::blocking(evaluation, config.population.max_maps, &target, &points) {
                Ok(gpu) => Box::new(gpu),
                Err(PipelineError::Gpu(GpuError::NoAdapter)) => {
                    warn!("No GPU adapter available, evaluating on the CPU");
                    Box::new(CpuPipeline::new(evaluation, target, points)?)
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            Box::new(CpuPipeline::new(evaluation, target, points)?)
        };

        Ok(Self::from_parts(config, rng, evaluator))
    }

    /// Create an engine around a custom evaluator.
    pub fn with_evaluator(
        config: EvolutionConfig,
        evaluator: Box<dyn Evaluator>,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut rng = MapSetRng::new(seed);
        // Keep the stream aligned with `new`, which draws a point seed first.
        rng.next_seed();
        Ok(Self::from_parts(config, rng, evaluator))
    }

    fn from_parts(config: EvolutionConfig, rng: MapSetRng, evaluator: Box<dyn Evaluator>) -> Self {
        info!(
            "Evolution engine: population {}, {} evaluator",
            config.population.size,
            evaluator.name()
        );
        Self {
            config,
            rng,
            evaluator,
            population: Vec::new(),
            initial_population: Vec::new(),
            history: EvolutionHistory::default(),
            generation: 0,
            best: None,
            best_fitness: f32::NEG_INFINITY,
            total_evaluations: 0,
            next_id: 0,
            phase: EvolutionPhase::Idle,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start from these map sets instead of random ones.
    ///
    /// Sets beyond the population size are dropped; the rest of the population
    /// is filled randomly. Sets with more than `max_maps` maps are truncated.
    /// Sets that fail [`MapSet::validate`] are skipped with a warning.
    pub fn with_initial_population(mut self, map_sets: Vec<MapSet>) -> Self {
        let max_maps = self.config.population.max_maps;
        self.initial_population = map_sets
            .into_iter()
            .enumerate()
            .filter_map(|(i, mut set)| {
                if set.len() > max_maps {
                    warn!("Truncating initial map set from {} to {} maps", set.len(), max_maps);
                    set.maps.truncate(max_maps);
                    set.weights.truncate(max_maps);
                }
                match set.validate() {
                    Ok(()) => Some(set),
                    Err(e) => {
                        warn!("Skipping initial map set {}: {}", i, e);
                        None
                    }
                }
            })
            .collect();
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn population(&self) -> &[Candidate] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    pub fn evaluator_name(&self) -> &str {
        self.evaluator.name()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Initialize the population.
    pub fn initialize(&mut self) {
        let population = &self.config.population;
        let (size, min_maps, max_maps) =
            (population.size, population.min_maps, population.max_maps);

        self.population.clear();
        self.history = EvolutionHistory::default();
        self.generation = 0;
        self.best = None;
        self.best_fitness = f32::NEG_INFINITY;
        self.phase = EvolutionPhase::Idle;

        let seeded: Vec<MapSet> = self.initial_population.iter().take(size).cloned().collect();
        for map_set in seeded {
            let id = self.next_id();
            self.population.push(new_candidate(id, map_set, 0, Vec::new()));
        }
        while self.population.len() < size {
            let map_set = self
                .rng
                .random_map_set(min_maps, max_maps, &self.config.constraints);
            let id = self.next_id();
            self.population.push(new_candidate(id, map_set, 0, Vec::new()));
        }
    }

    /// Evaluate every candidate without a current score, one at a time.
    ///
    /// Returns `false` if cancelled between candidates.
    pub fn evaluate_population(&mut self) -> Result<bool, EvolutionError> {
        for i in 0..self.population.len() {
            if self.is_cancelled() {
                return Ok(false);
            }
            if self.population[i].evaluated {
                continue;
            }
            self.phase = EvolutionPhase::Evaluating { candidate: i };

            let candidate = &mut self.population[i];
            match self.evaluator.evaluate(&candidate.map_set) {
                Ok(evaluation) => {
                    candidate.fitness = evaluation.fitness;
                    candidate.matches = evaluation.matches;
                }
                Err(PipelineError::Degenerate) => {
                    warn!("Candidate {} diverged; assigning fitness 0", candidate.id);
                    candidate.fitness = 0.0;
                    candidate.matches = 0;
                }
                Err(e) => return Err(e.into()),
            }
            candidate.evaluated = true;
            self.total_evaluations += 1;
            debug!(
                "Generation {} candidate {} (id {}): fitness {:.4}",
                self.generation, i, candidate.id, candidate.fitness
            );

            if candidate.fitness > self.best_fitness {
                self.best_fitness = candidate.fitness;
                self.best = Some(candidate.clone());
            }
        }
        Ok(true)
    }

    /// Sort by fitness (descending) and record this generation's statistics.
    pub fn rank_population(&mut self) {
        self.phase = EvolutionPhase::Ranking;
        self.population
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let n = self.population.len().max(1) as f32;
        let gen_best = self.population.first().map_or(0.0, |c| c.fitness);
        let avg_fitness: f32 = self.population.iter().map(|c| c.fitness).sum::<f32>() / n;
        let variance: f32 = self
            .population
            .iter()
            .map(|c| (c.fitness - avg_fitness).powi(2))
            .sum::<f32>()
            / n;
        let diversity = self.compute_diversity();

        self.history.best_fitness.push(gen_best);
        self.history.avg_fitness.push(avg_fitness);
        self.history.fitness_std.push(variance.sqrt());
        self.history.diversity.push(diversity);

        info!(
            "Generation {}: best {:.4}, avg {:.4}, std {:.4}, diversity {:.4}",
            self.generation,
            gen_best,
            avg_fitness,
            variance.sqrt(),
            diversity
        );
    }

    /// Replace the ranked population with the next generation.
    pub fn reproduce(&mut self) {
        self.phase = EvolutionPhase::Reproducing;
        let reproduction = self.config.reproduction.clone();
        let population = &self.config.population;
        let size = population.size;
        let mutation = MutationParams {
            rate: reproduction.mutation_rate,
            strength: reproduction.strength_at(self.generation),
            structural_rate: reproduction.structural_rate,
            min_maps: population.min_maps,
            max_maps: population.max_maps,
        };
        let next_generation = self.generation + 1;

        let mut next_gen = Vec::with_capacity(size);

        // Elitism: keep best individuals unchanged (scores stay valid)
        for elite in self.population.iter().take(reproduction.elitism) {
            next_gen.push(elite.clone());
        }

        // Fill rest with offspring
        while next_gen.len() < size {
            let idx1 = self.select_index(&reproduction.selection);
            let mut parents = vec![self.population[idx1].id];

            let mut child = if self.rng.chance(reproduction.crossover_rate) {
                let idx2 = self.select_index(&reproduction.selection);
                parents.push(self.population[idx2].id);
                let (p1, p2) = (&self.population[idx1], &self.population[idx2]);
                self.rng.crossover(&p1.map_set, &p2.map_set)
            } else {
                self.population[idx1].map_set.clone()
            };

            self.rng
                .mutate(&mut child, &mutation, &self.config.constraints);

            let id = self.next_id();
            next_gen.push(new_candidate(id, child, next_generation, parents));
        }

        self.population = next_gen;
        self.generation = next_generation;
        self.phase = EvolutionPhase::Idle;
    }

    /// Evaluate and rank the current population, then reproduce unless a stop
    /// condition holds.
    pub fn step_generation(&mut self) -> Result<Option<StopReason>, EvolutionError> {
        if self.population.is_empty() {
            self.initialize();
        }
        if !self.evaluate_population()? {
            self.phase = EvolutionPhase::Stopped;
            return Ok(Some(StopReason::Cancelled));
        }
        self.rank_population();

        if let Some(reason) = self.should_stop() {
            self.phase = match reason {
                StopReason::Cancelled => EvolutionPhase::Stopped,
                _ => EvolutionPhase::Complete,
            };
            return Ok(Some(reason));
        }

        self.reproduce();
        Ok(None)
    }

    /// Select a parent index from the ranked population.
    fn select_index(&mut self, strategy: &SelectionStrategy) -> usize {
        let len = self.population.len();
        match *strategy {
            SelectionStrategy::TopK { k } => self.rng.index(k.clamp(1, len)),
            SelectionStrategy::Tournament { size } => {
                let mut best_idx = self.rng.index(len);
                for _ in 1..size {
                    let idx = self.rng.index(len);
                    if self.population[idx].fitness > self.population[best_idx].fitness {
                        best_idx = idx;
                    }
                }
                best_idx
            }
            SelectionStrategy::RouletteWheel => {
                // Fitness proportionate
                let total_fitness: f32 = self.population.iter().map(|c| c.fitness.max(0.0)).sum();
                if total_fitness <= 0.0 {
                    return self.rng.index(len);
                }

                let target = self.rng.unit() * total_fitness;
                let mut cumulative = 0.0;
                for (i, candidate) in self.population.iter().enumerate() {
                    cumulative += candidate.fitness.max(0.0);
                    if cumulative > target {
                        return i;
                    }
                }
                len - 1
            }
        }
    }

    /// Mean pairwise map set distance.
    fn compute_diversity(&self) -> f32 {
        let n = self.population.len();
        if n < 2 {
            return 0.0;
        }

        let mut total_distance = 0.0f32;
        for i in 0..n {
            for j in (i + 1)..n {
                total_distance +=
                    map_set_distance(&self.population[i].map_set, &self.population[j].map_set);
            }
        }
        total_distance / (n * (n - 1) / 2) as f32
    }

    /// Best candidate seen so far, or the first candidate if none was scored.
    fn best_snapshot(&self) -> Option<CandidateSnapshot> {
        self.best
            .as_ref()
            .or_else(|| self.population.first())
            .map(Candidate::to_snapshot)
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let scored: Vec<f32> = self
            .population
            .iter()
            .filter(|c| c.evaluated)
            .map(|c| c.fitness)
            .collect();
        let avg_fitness = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f32>() / scored.len() as f32
        };
        let generation_best = scored.iter().copied().fold(0.0, f32::max);

        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            evaluations_completed: scored.len(),
            evaluations_total: self.population.len(),
            best_fitness: self.best_fitness.max(0.0),
            avg_fitness,
            generation_best,
            best_candidate: self.best.as_ref().map(Candidate::to_snapshot),
            history: self.history.clone(),
            phase: self.phase,
        }
    }

    /// Check if evolution should stop.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self.is_cancelled() {
            return Some(StopReason::Cancelled);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best_fitness >= target
        {
            return Some(StopReason::TargetReached);
        }

        if self.generation + 1 >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        None
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(&mut self, callback: F) -> Result<EvolutionResult, EvolutionError>
    where
        F: Fn(&EvolutionProgress),
    {
        let start_time = std::time::Instant::now();

        self.initialize();
        callback(&self.progress());

        let stop_reason = loop {
            let stop = self.step_generation()?;
            callback(&self.progress());
            if let Some(reason) = stop {
                break reason;
            }
        };

        let elapsed = start_time.elapsed().as_secs_f64();
        info!(
            "Evolution stopped ({:?}) after {} generations, best fitness {:.4}",
            stop_reason,
            self.history.best_fitness.len(),
            self.best_fitness.max(0.0)
        );

        let best = match self.best_snapshot() {
            Some(best) => best,
            None => {
                return Err(EvolutionError::Config(ConfigError::EmptyPopulation));
            }
        };
        let found_in_generation = best.generation;

        let scored: Vec<f32> = self
            .population
            .iter()
            .filter(|c| c.evaluated)
            .map(|c| c.fitness)
            .collect();
        let final_avg_fitness = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f32>() / scored.len() as f32
        };

        Ok(EvolutionResult {
            best,
            found_in_generation,
            stats: EvolutionStats {
                generations: self.history.best_fitness.len(),
                total_evaluations: self.total_evaluations,
                best_fitness: self.best_fitness.max(0.0),
                final_avg_fitness,
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                evaluator: self.evaluator.name().to_string(),
                stop_reason,
            },
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }

    /// Render the best map set found so far.
    pub fn render_best(&mut self) -> Result<Option<Bitmap>, EvolutionError> {
        match &self.best {
            Some(best) => {
                let map_set = best.map_set.clone();
                Ok(Some(self.evaluator.render(&map_set)?))
            }
            None => Ok(None),
        }
    }
}

fn new_candidate(id: u64, map_set: MapSet, generation: usize, parents: Vec<u64>) -> Candidate {
    Candidate {
        id,
        map_set,
        fitness: 0.0,
        matches: 0,
        evaluated: false,
        generation,
        parents,
    }
}
