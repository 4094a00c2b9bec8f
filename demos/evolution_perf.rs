//! Quick evolution performance test

use nephos::{
    EvolutionConfig, EvolutionEngine,
    compute::{Bitmap, CpuRenderer, generate_seed},
    schema::{EvaluationConfig, PopulationConfig, Preset, ReproductionConfig, SelectionStrategy},
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;

/// Render a preset to use as the target.
fn preset_target(preset: Preset, evaluation: &EvaluationConfig) -> Bitmap {
    let mut rng = StdRng::seed_from_u64(0);
    let seed = generate_seed(&evaluation.seed_distribution, evaluation.points, &mut rng);
    let mut renderer = CpuRenderer::new(evaluation, seed);
    renderer
        .render(&preset.map_set())
        .expect("preset map sets are valid");
    renderer.rendered().clone()
}

fn main() {
    env_logger::init();
    println!("=== Evolution Performance Test ===\n");

    // Test different resolutions
    for resolution in [64, 128, 256] {
        println!("Resolution: {}x{}", resolution, resolution);

        let evaluation = EvaluationConfig {
            points: 20_000,
            resolution,
            grid: resolution,
            ..Default::default()
        };
        let config = EvolutionConfig {
            population: PopulationConfig {
                size: 20,
                min_maps: 3,
                max_maps: 3,
                max_generations: 10,
                ..Default::default()
            },
            evaluation: evaluation.clone(),
            reproduction: ReproductionConfig {
                mutation_rate: 0.3,
                mutation_strength: 0.2,
                crossover_rate: 0.5,
                elitism: 2,
                selection: SelectionStrategy::Tournament { size: 3 },
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        };

        let target = preset_target(Preset::Sierpinski, &evaluation);
        let start = Instant::now();
        let mut engine = EvolutionEngine::new(config, target).expect("valid configuration");
        let result = engine.run().expect("evolution failed");
        let elapsed = start.elapsed();

        let total_evals = result.stats.total_evaluations;
        let evals_per_sec = total_evals as f64 / elapsed.as_secs_f64();

        println!("  Evaluator:      {}", result.stats.evaluator);
        println!("  Generations:    {}", result.stats.generations);
        println!("  Evaluations:    {}", total_evals);
        println!("  Elapsed:        {:.2}s", elapsed.as_secs_f64());
        println!("  Evals/sec:      {:.1}", evals_per_sec);
        println!("  Best fitness:   {:.4}", result.stats.best_fitness);
        println!();
    }

    println!("=== Point Count Scaling (128x128) ===\n");

    for points in [10_000, 50_000, 200_000] {
        let evaluation = EvaluationConfig {
            points,
            resolution: 128,
            grid: 128,
            ..Default::default()
        };
        let config = EvolutionConfig {
            population: PopulationConfig {
                size: 20,
                max_generations: 5,
                ..Default::default()
            },
            evaluation: evaluation.clone(),
            random_seed: Some(42),
            ..Default::default()
        };

        let target = preset_target(Preset::Pentagon, &evaluation);
        let start = Instant::now();
        let mut engine = EvolutionEngine::new(config, target).expect("valid configuration");
        let result = engine.run().expect("evolution failed");
        let elapsed = start.elapsed();

        let total_evals = result.stats.total_evaluations;
        println!(
            "Points {}: {} evals in {:.2}s ({:.1} evals/sec)",
            points,
            total_evals,
            elapsed.as_secs_f64(),
            total_evals as f64 / elapsed.as_secs_f64()
        );
    }
}
