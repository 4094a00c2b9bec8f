//! Configuration types for evolving map sets against a target image.

use glam::{Mat3, Vec2};
use serde::{Deserialize, Serialize};

/// Top-level configuration for an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and termination settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// How each candidate is simulated, rendered and scored.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Selection, crossover and mutation settings.
    #[serde(default)]
    pub reproduction: ReproductionConfig,
    /// Parameter bounds for initialization and mutation.
    #[serde(default)]
    pub constraints: MapConstraints,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            evaluation: EvaluationConfig::default(),
            reproduction: ReproductionConfig::default(),
            constraints: MapConstraints::default(),
            random_seed: None,
        }
    }
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of map sets per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Fewest maps a candidate may carry.
    #[serde(default = "default_maps_per_set")]
    pub min_maps: usize,
    /// Most maps a candidate may carry.
    #[serde(default = "default_maps_per_set")]
    pub max_maps: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Stop as soon as the best fitness reaches this value.
    #[serde(default)]
    pub target_fitness: Option<f32>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            min_maps: default_maps_per_set(),
            max_maps: default_maps_per_set(),
            max_generations: default_max_generations(),
            target_fitness: None,
        }
    }
}

fn default_population_size() -> usize {
    64
}
fn default_maps_per_set() -> usize {
    6
}
fn default_max_generations() -> usize {
    1000
}

/// Per-candidate evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of simulated points.
    #[serde(default = "default_points")]
    pub points: usize,
    /// Chaos-game iterations whose final positions are rasterized.
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Extra iterations run before `steps`.
    #[serde(default)]
    pub burn_in: u32,
    /// Side length of the rendered bitmap (must match the target).
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Side length of the comparison grid.
    #[serde(default = "default_grid")]
    pub grid: u32,
    /// Where points start for every evaluation.
    #[serde(default)]
    pub seed_distribution: SeedDistribution,
    /// How each point picks its map per step.
    #[serde(default)]
    pub map_selection: MapSelection,
    /// Model-space region mapped onto the bitmap.
    #[serde(default)]
    pub view: ViewRegion,
    /// Whether to evaluate on the GPU when an adapter is available.
    #[serde(default)]
    pub use_gpu: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            points: default_points(),
            steps: default_steps(),
            burn_in: 0,
            resolution: default_resolution(),
            grid: default_grid(),
            seed_distribution: SeedDistribution::default(),
            map_selection: MapSelection::default(),
            view: ViewRegion::default(),
            use_gpu: false,
        }
    }
}

impl EvaluationConfig {
    /// Total iterations run per point.
    #[inline]
    pub fn iterations(&self) -> u32 {
        self.burn_in.saturating_add(self.steps)
    }

    /// Number of cells in the comparison grid.
    #[inline]
    pub fn cells(&self) -> usize {
        self.grid as usize * self.grid as usize
    }
}

fn default_points() -> usize {
    50_000
}
fn default_steps() -> u32 {
    15
}
fn default_resolution() -> u32 {
    256
}
fn default_grid() -> u32 {
    256
}

/// Initial point distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SeedDistribution {
    /// Uniform over the rectangle `[min, max]`.
    Uniform { min: Vec2, max: Vec2 },
    /// Every point starts at the same position.
    Fixed { x: f32, y: f32 },
}

impl Default for SeedDistribution {
    fn default() -> Self {
        Self::Uniform {
            min: Vec2::splat(-1.0),
            max: Vec2::ONE,
        }
    }
}

/// Chaos-game map selection variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum MapSelection {
    /// `hash % map_count`.
    #[default]
    Hash,
    /// `table[hash % len]`, with the table apportioned by map weight.
    IndexTable {
        #[serde(default = "default_index_table_len")]
        len: u32,
    },
}

fn default_index_table_len() -> u32 {
    64
}

/// Axis-aligned model-space region shown in the bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewRegion {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for ViewRegion {
    fn default() -> Self {
        Self {
            min: Vec2::splat(-1.0),
            max: Vec2::ONE,
        }
    }
}

impl ViewRegion {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Whether the region has positive finite extent on both axes.
    pub fn is_valid(&self) -> bool {
        let size = self.max - self.min;
        size.is_finite() && size.x > 0.0 && size.y > 0.0
    }

    /// Inverse-camera matrix taking this region onto the `[-1, 1]²` clip square.
    pub fn to_clip_transform(&self) -> Mat3 {
        let size = self.max - self.min;
        let scale = Vec2::splat(2.0) / size;
        let center = (self.min + self.max) * 0.5;
        Mat3::from_scale(scale) * Mat3::from_translation(-center)
    }
}

/// Reproduction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproductionConfig {
    /// Parent selection strategy.
    #[serde(default)]
    pub selection: SelectionStrategy,
    /// Best candidates copied unchanged into the next generation.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    /// Probability of crossing two parents (0.0 disables crossover).
    #[serde(default)]
    pub crossover_rate: f32,
    /// Probability that any single parameter is perturbed.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Noise scale relative to each parameter's bounds.
    #[serde(default = "default_mutation_strength")]
    pub mutation_strength: f32,
    /// Strength decays as `exp(-generation * damping)`.
    #[serde(default = "default_mutation_damping")]
    pub mutation_damping: f32,
    /// Probability of adding or removing one map.
    #[serde(default = "default_structural_rate")]
    pub structural_rate: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            selection: SelectionStrategy::default(),
            elitism: default_elitism(),
            crossover_rate: 0.0,
            mutation_rate: default_mutation_rate(),
            mutation_strength: default_mutation_strength(),
            mutation_damping: default_mutation_damping(),
            structural_rate: default_structural_rate(),
        }
    }
}

impl ReproductionConfig {
    /// Mutation strength after damping for `generation`.
    pub fn strength_at(&self, generation: usize) -> f32 {
        self.mutation_strength * (-(generation as f32) * self.mutation_damping).exp()
    }
}

fn default_elitism() -> usize {
    3
}
fn default_mutation_rate() -> f32 {
    0.5
}
fn default_mutation_strength() -> f32 {
    0.1
}
fn default_mutation_damping() -> f32 {
    0.01
}
fn default_structural_rate() -> f32 {
    0.05
}

/// Parent selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum SelectionStrategy {
    /// Uniform pick among the `k` fittest.
    TopK {
        #[serde(default = "default_top_k")]
        k: usize,
    },
    /// Best of `size` uniformly drawn candidates.
    Tournament {
        #[serde(default = "default_tournament_size")]
        size: usize,
    },
    /// Fitness-proportional.
    RouletteWheel,
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::TopK { k: default_top_k() }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_tournament_size() -> usize {
    3
}

/// Parameter bounds. Angles are unbounded and wrap to `(-π, π]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConstraints {
    #[serde(default = "default_shear_bounds")]
    pub shear_bounds: (f32, f32),
    #[serde(default = "default_scale_bounds")]
    pub scale_bounds: (f32, f32),
    #[serde(default = "default_translation_bounds")]
    pub translation_bounds: (f32, f32),
}

impl Default for MapConstraints {
    fn default() -> Self {
        Self {
            shear_bounds: default_shear_bounds(),
            scale_bounds: default_scale_bounds(),
            translation_bounds: default_translation_bounds(),
        }
    }
}

fn default_shear_bounds() -> (f32, f32) {
    (-1.0, 1.0)
}
fn default_scale_bounds() -> (f32, f32) {
    (-1.0, 1.0)
}
fn default_translation_bounds() -> (f32, f32) {
    (-1.0, 1.0)
}

impl EvolutionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let population = &self.population;
        if population.size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if population.min_maps == 0 {
            return Err(ConfigError::NoMaps);
        }
        if population.min_maps > population.max_maps {
            return Err(ConfigError::InvalidMapRange {
                min: population.min_maps,
                max: population.max_maps,
            });
        }
        if population.max_generations == 0 {
            return Err(ConfigError::NoGenerations);
        }

        let evaluation = &self.evaluation;
        if evaluation.steps == 0 {
            return Err(ConfigError::InvalidSteps);
        }
        if evaluation.points == 0 {
            return Err(ConfigError::NoPoints);
        }
        if evaluation.resolution == 0 || evaluation.grid == 0 {
            return Err(ConfigError::InvalidResolution);
        }
        if !evaluation.view.is_valid() {
            return Err(ConfigError::InvalidView);
        }
        if let MapSelection::IndexTable { len: 0 } = evaluation.map_selection {
            return Err(ConfigError::InvalidIndexTable);
        }
        if let SeedDistribution::Uniform { min, max } = evaluation.seed_distribution
            && (min.cmpgt(max).any() || !(max - min).is_finite())
        {
            return Err(ConfigError::InvalidBounds(format!(
                "seed distribution min {min} > max {max}"
            )));
        }

        let reproduction = &self.reproduction;
        if reproduction.elitism > population.size {
            return Err(ConfigError::ElitismTooLarge {
                elitism: reproduction.elitism,
                population: population.size,
            });
        }
        match reproduction.selection {
            SelectionStrategy::TopK { k: 0 } | SelectionStrategy::Tournament { size: 0 } => {
                return Err(ConfigError::InvalidSelection);
            }
            _ => {}
        }
        for (name, rate) in [
            ("crossover_rate", reproduction.crossover_rate),
            ("mutation_rate", reproduction.mutation_rate),
            ("structural_rate", reproduction.structural_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidRate { name, value: rate });
            }
        }
        if !(reproduction.mutation_strength >= 0.0) || !(reproduction.mutation_damping >= 0.0) {
            return Err(ConfigError::InvalidStrength);
        }

        let check_bounds = |bounds: (f32, f32), name: &str| {
            if bounds.0 > bounds.1 || !bounds.0.is_finite() || !bounds.1.is_finite() {
                Err(ConfigError::InvalidBounds(format!(
                    "{} min ({}) > max ({})",
                    name, bounds.0, bounds.1
                )))
            } else {
                Ok(())
            }
        };
        check_bounds(self.constraints.shear_bounds, "shear")?;
        check_bounds(self.constraints.scale_bounds, "scale")?;
        check_bounds(self.constraints.translation_bounds, "translation")?;

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Candidates must carry at least one map")]
    NoMaps,
    #[error("Map count range {min}..={max} is empty")]
    InvalidMapRange { min: usize, max: usize },
    #[error("At least one generation must be evaluated")]
    NoGenerations,
    #[error("Simulation steps must be positive")]
    InvalidSteps,
    #[error("Point count must be non-zero")]
    NoPoints,
    #[error("Resolution and comparison grid must be non-zero")]
    InvalidResolution,
    #[error("View region must have positive extent")]
    InvalidView,
    #[error("Index table length must be non-zero")]
    InvalidIndexTable,
    #[error("Elitism ({elitism}) exceeds population size ({population})")]
    ElitismTooLarge { elitism: usize, population: usize },
    #[error("Selection size must be non-zero")]
    InvalidSelection,
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f32 },
    #[error("Mutation strength and damping must be non-negative")]
    InvalidStrength,
    #[error("Invalid parameter bounds: {0}")]
    InvalidBounds(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EvolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_population() {
        let mut config = EvolutionConfig::default();
        config.population.size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPopulation)));
    }

    #[test]
    fn test_rejects_zero_maps_and_steps() {
        let mut config = EvolutionConfig::default();
        config.population.min_maps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoMaps)));

        let mut config = EvolutionConfig::default();
        config.population.min_maps = 4;
        config.population.max_maps = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMapRange { min: 4, max: 3 })
        ));

        let mut config = EvolutionConfig::default();
        config.evaluation.steps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSteps)));
    }

    #[test]
    fn test_rejects_zero_generations() {
        let mut config = EvolutionConfig::default();
        config.population.max_generations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoGenerations)));

        config.population.max_generations = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_reproduction() {
        let mut config = EvolutionConfig::default();
        config.reproduction.mutation_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRate { name: "mutation_rate", .. })
        ));

        let mut config = EvolutionConfig::default();
        config.reproduction.elitism = config.population.size + 1;
        assert!(matches!(config.validate(), Err(ConfigError::ElitismTooLarge { .. })));

        let mut config = EvolutionConfig::default();
        config.reproduction.selection = SelectionStrategy::Tournament { size: 0 };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSelection)));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut config = EvolutionConfig::default();
        config.constraints.scale_bounds = (1.0, -1.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBounds(_))));

        let mut config = EvolutionConfig::default();
        config.evaluation.view = ViewRegion::new(Vec2::ONE, Vec2::ONE);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidView)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "population": { "size": 8, "max_generations": 5 },
            "reproduction": { "selection": { "method": "Tournament" } },
            "random_seed": 7
        }"#;
        let config: EvolutionConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.population.size, 8);
        assert_eq!(config.population.min_maps, 6);
        assert_eq!(config.evaluation.grid, 256);
        assert_eq!(
            config.reproduction.selection,
            SelectionStrategy::Tournament { size: 3 }
        );
        assert_eq!(config.random_seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialization() {
        let mut config = EvolutionConfig::default();
        config.evaluation.map_selection = MapSelection::IndexTable { len: 32 };
        config.evaluation.seed_distribution = SeedDistribution::Fixed { x: 0.0, y: 0.5 };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.evaluation.map_selection, config.evaluation.map_selection);
        assert_eq!(
            parsed.evaluation.seed_distribution,
            config.evaluation.seed_distribution
        );
    }

    #[test]
    fn test_view_clip_transform() {
        let view = ViewRegion::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 10.0));
        let m = view.to_clip_transform();
        assert!((m.transform_point2(Vec2::new(-5.0, 0.0)) - Vec2::splat(-1.0)).length() < 1e-6);
        assert!((m.transform_point2(Vec2::new(5.0, 10.0)) - Vec2::ONE).length() < 1e-6);
        assert_eq!(ViewRegion::default().to_clip_transform(), Mat3::IDENTITY);
    }

    #[test]
    fn test_strength_decays() {
        let reproduction = ReproductionConfig {
            mutation_strength: 1.0,
            mutation_damping: 0.02,
            ..Default::default()
        };
        assert_eq!(reproduction.strength_at(0), 1.0);
        assert!((reproduction.strength_at(50) - (-1.0f32).exp()).abs() < 1e-6);
    }
}
