//! Candidate evaluation: simulate → rasterize → compare → reduce.
//!
//! [`Evaluator`] is the seam between the evolution controller and a compute
//! backend. [`CpuPipeline`] runs every stage as a rayon parallel map; the GPU
//! backend lives in [`super::gpu`]. Stages run strictly in order, each
//! consuming the previous stage's full output.

use rand::Rng;

use super::bitmap::{Bitmap, BitmapError};
use super::compare::compare;
use super::gpu::GpuError;
use super::points::{Point, PointBuffer};
use super::raster::{Camera, rasterize};
use super::reduce::Reducer;
use super::simulate::simulate;
use crate::schema::{EvaluationConfig, MapSelection, MapSet, MapSetError};

/// Evaluation errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Resolution mismatch: target is {expected:?}, render is {actual:?}")]
    ResolutionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Result buffer holds {actual} flags, {required} required")]
    ResultBuffer { required: usize, actual: usize },
    #[error("Invalid map set: {0}")]
    MapSet(#[from] MapSetError),
    #[error("Map set has {maps} maps, backend capacity is {capacity}")]
    TooManyMaps { maps: usize, capacity: usize },
    #[error("Every simulated point diverged")]
    Degenerate,
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Bitmap error: {0}")]
    Bitmap(#[from] BitmapError),
}

/// Score of one map set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Grid cells where render and target agree.
    pub matches: u32,
    /// Total grid cells.
    pub cells: u32,
    /// `matches / cells`.
    pub fitness: f32,
}

impl Evaluation {
    pub fn new(matches: u32, cells: u32) -> Self {
        let fitness = if cells == 0 {
            0.0
        } else {
            matches as f32 / cells as f32
        };
        Self {
            matches,
            cells,
            fitness,
        }
    }
}

/// A backend that scores map sets against a fixed target.
pub trait Evaluator: Send {
    /// Score `map_set`. Fails with [`PipelineError::Degenerate`] when no
    /// point stays finite.
    fn evaluate(&mut self, map_set: &MapSet) -> Result<Evaluation, PipelineError>;

    /// Render `map_set` with the same settings used for scoring.
    fn render(&mut self, map_set: &MapSet) -> Result<Bitmap, PipelineError>;

    /// Backend name for logs and results.
    fn name(&self) -> &str;
}

/// Simulation and rasterization on the CPU.
#[derive(Debug, Clone)]
pub struct CpuRenderer {
    points: PointBuffer,
    camera: Camera,
    selection: MapSelection,
    iterations: u32,
    rendered: Bitmap,
}

impl CpuRenderer {
    pub fn new(evaluation: &EvaluationConfig, seed: Vec<Point>) -> Self {
        Self {
            points: PointBuffer::new(seed),
            camera: Camera::from_region(&evaluation.view),
            selection: evaluation.map_selection,
            iterations: evaluation.iterations(),
            rendered: Bitmap::new(evaluation.resolution, evaluation.resolution),
        }
    }

    /// Reset, simulate and rasterize. Returns the finite point count.
    pub fn render(&mut self, map_set: &MapSet) -> Result<usize, MapSetError> {
        self.points.reset();
        simulate(self.points.points_mut(), map_set, self.selection, self.iterations)?;
        Ok(rasterize(self.points.points(), &self.camera, &mut self.rendered))
    }

    pub fn rendered(&self) -> &Bitmap {
        &self.rendered
    }

    pub fn points(&self) -> &[Point] {
        self.points.points()
    }
}

/// Full evaluation pipeline on the CPU.
#[derive(Debug, Clone)]
pub struct CpuPipeline {
    renderer: CpuRenderer,
    target: Bitmap,
    reducer: Reducer,
    grid: u32,
}

impl CpuPipeline {
    /// Build a pipeline scoring against `target`.
    ///
    /// The target must match the configured render resolution.
    pub fn new(
        evaluation: &EvaluationConfig,
        target: Bitmap,
        seed: Vec<Point>,
    ) -> Result<Self, PipelineError> {
        check_target(evaluation, &target)?;
        let cells = evaluation.cells();
        Ok(Self {
            renderer: CpuRenderer::new(evaluation, seed),
            target,
            reducer: Reducer::new(cells),
            grid: evaluation.grid,
        })
    }

    /// Build with seed points drawn from the configured distribution.
    pub fn from_config<R: Rng>(
        evaluation: &EvaluationConfig,
        target: Bitmap,
        rng: &mut R,
    ) -> Result<Self, PipelineError> {
        let seed =
            super::points::generate_seed(&evaluation.seed_distribution, evaluation.points, rng);
        Self::new(evaluation, target, seed)
    }

    pub fn target(&self) -> &Bitmap {
        &self.target
    }
}

/// Reject targets whose size differs from the render resolution.
pub(crate) fn check_target(
    evaluation: &EvaluationConfig,
    target: &Bitmap,
) -> Result<(), PipelineError> {
    let expected = (evaluation.resolution, evaluation.resolution);
    let actual = (target.width(), target.height());
    if expected != actual {
        return Err(PipelineError::ResolutionMismatch { expected, actual });
    }
    Ok(())
}

impl Evaluator for CpuPipeline {
    fn evaluate(&mut self, map_set: &MapSet) -> Result<Evaluation, PipelineError> {
        let finite = self.renderer.render(map_set)?;
        if finite == 0 {
            return Err(PipelineError::Degenerate);
        }

        let cells = self.grid as usize * self.grid as usize;
        compare(
            &self.target,
            self.renderer.rendered(),
            self.grid,
            self.reducer.input(cells),
        )?;
        let matches = self.reducer.reduce();

        Ok(Evaluation::new(matches, cells as u32))
    }

    fn render(&mut self, map_set: &MapSet) -> Result<Bitmap, PipelineError> {
        self.renderer.render(map_set)?;
        Ok(self.renderer.rendered().clone())
    }

    fn name(&self) -> &str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::generate_seed;
    use crate::schema::{AffineDecomposition, Preset, SeedDistribution};
    use glam::Vec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small_config() -> EvaluationConfig {
        EvaluationConfig {
            points: 20_000,
            steps: 20,
            resolution: 64,
            grid: 64,
            ..Default::default()
        }
    }

    fn render_target(config: &EvaluationConfig, set: &MapSet) -> Bitmap {
        let mut rng = StdRng::seed_from_u64(9);
        let blank = Bitmap::new(config.resolution, config.resolution);
        let mut pipeline = CpuPipeline::from_config(config, blank, &mut rng).unwrap();
        pipeline.render(set).unwrap()
    }

    #[test]
    fn test_self_render_scores_perfectly() {
        let config = small_config();
        let set = Preset::Sierpinski.map_set();
        let target = render_target(&config, &set);
        assert!(target.coverage() > 0);

        let mut rng = StdRng::seed_from_u64(9);
        let mut pipeline = CpuPipeline::from_config(&config, target, &mut rng).unwrap();
        let evaluation = pipeline.evaluate(&set).unwrap();

        assert_eq!(evaluation.matches, 64 * 64);
        assert_eq!(evaluation.fitness, 1.0);
    }

    #[test]
    fn test_different_set_scores_lower() {
        let config = small_config();
        let target = render_target(&config, &Preset::Sierpinski.map_set());

        let mut rng = StdRng::seed_from_u64(9);
        let mut pipeline = CpuPipeline::from_config(&config, target, &mut rng).unwrap();
        let evaluation = pipeline.evaluate(&Preset::Pentagon.map_set()).unwrap();
        assert!(evaluation.fitness < 1.0);
        assert!(evaluation.fitness > 0.0);
    }

    #[test]
    fn test_diverging_set_is_degenerate() {
        let config = EvaluationConfig {
            steps: 200,
            seed_distribution: SeedDistribution::Fixed { x: 0.5, y: 0.5 },
            ..small_config()
        };
        let exploding = MapSet::from_decompositions([AffineDecomposition {
            scale: Vec2::splat(10.0),
            ..AffineDecomposition::IDENTITY
        }]);

        let mut rng = StdRng::seed_from_u64(1);
        let mut pipeline =
            CpuPipeline::from_config(&config, Bitmap::new(64, 64), &mut rng).unwrap();
        assert!(matches!(
            pipeline.evaluate(&exploding),
            Err(PipelineError::Degenerate)
        ));
    }

    #[test]
    fn test_target_size_checked() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(1);
        let err = CpuPipeline::from_config(&config, Bitmap::new(32, 32), &mut rng).unwrap_err();
        assert!(matches!(err, PipelineError::ResolutionMismatch { .. }));
    }

    #[test]
    fn test_empty_map_set_rejected() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(1);
        let mut pipeline =
            CpuPipeline::from_config(&config, Bitmap::new(64, 64), &mut rng).unwrap();
        assert!(matches!(
            pipeline.evaluate(&MapSet::default()),
            Err(PipelineError::MapSet(MapSetError::Empty))
        ));
    }

    #[test]
    fn test_burn_in_extends_iterations() {
        let mut rng = StdRng::seed_from_u64(5);
        let seed = generate_seed(&SeedDistribution::default(), 4_000, &mut rng);
        let set = Preset::Barnsley.map_set();
        let render = |burn_in, steps| {
            let config = EvaluationConfig {
                burn_in,
                steps,
                ..small_config()
            };
            let mut renderer = CpuRenderer::new(&config, seed.clone());
            renderer.render(&set).unwrap();
            renderer
        };

        let burned = render(7, 5);
        let long = render(0, 12);
        let short = render(0, 5);

        assert_eq!(burned.points(), long.points());
        assert_eq!(burned.rendered(), long.rendered());
        assert_ne!(burned.points(), short.points());
    }
}
