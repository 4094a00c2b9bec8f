//! Nephos CLI - Evolve a map set toward a target image from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;

use nephos::{
    EvolutionEngine,
    compute::{Bitmap, CpuRenderer, generate_seed},
    schema::{EvolutionConfig, Preset},
};

/// Gray level at or above which a target pixel counts as covered.
const TARGET_THRESHOLD: u8 = 128;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--example") => print_example_config(),
        Some("--preset") if args.len() >= 4 => {
            render_preset(&args[2], Path::new(&args[3]), args.get(4).map(PathBuf::from))
        }
        Some(_) if args.len() >= 3 => {
            let output = args
                .get(3)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("result.json"));
            evolve(Path::new(&args[1]), Path::new(&args[2]), &output);
        }
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <config.json> <target.png> [result.json]", program);
    eprintln!("       {} --preset <name> <out.png> [config.json]", program);
    eprintln!("       {} --example", program);
    eprintln!();
    eprintln!("Evolve an IFS map set toward a binary target image.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json  Evolution configuration (print the defaults with --example)");
    eprintln!("  target.png   Target image; pixels >= {} are covered", TARGET_THRESHOLD);
    eprintln!("  result.json  Output path (default: result.json); the best render is");
    eprintln!("               written next to it as PNG");
    eprintln!();
    let names: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
    eprintln!("Presets: {}", names.join(", "));
}

fn load_config(path: &Path) -> EvolutionConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn evolve(config_path: &Path, target_path: &Path, output: &Path) {
    let config = load_config(config_path);

    let target = Bitmap::load(target_path, TARGET_THRESHOLD).unwrap_or_else(|e| {
        eprintln!("Error loading target image: {}", e);
        std::process::exit(1);
    });

    println!("Nephos Evolution");
    println!("================");
    println!(
        "Population: {} ({}..={} maps per set)",
        config.population.size, config.population.min_maps, config.population.max_maps
    );
    println!(
        "Points: {}, steps: {} (+{} burn-in)",
        config.evaluation.points, config.evaluation.steps, config.evaluation.burn_in
    );
    println!(
        "Resolution: {}x{}, grid: {}x{}",
        config.evaluation.resolution,
        config.evaluation.resolution,
        config.evaluation.grid,
        config.evaluation.grid
    );
    println!("Generations: {}", config.population.max_generations);
    println!();

    let mut engine = EvolutionEngine::new(config, target).unwrap_or_else(|e| {
        eprintln!("Error creating evolution engine: {}", e);
        std::process::exit(1);
    });
    println!("Evaluator: {}", engine.evaluator_name());

    let start = Instant::now();
    let result = engine
        .run_with_callback(|progress| {
            // Called once before the first generation, then once per generation.
            let history = &progress.history;
            if let Some(&avg) = history.avg_fitness.last() {
                println!(
                    "  Generation {}/{}: best={:.4}, avg={:.4}, diversity={:.4}, {:.1}s",
                    history.best_fitness.len(),
                    progress.total_generations,
                    progress.best_fitness,
                    avg,
                    history.diversity.last().copied().unwrap_or(0.0),
                    start.elapsed().as_secs_f32()
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Stopped: {:?}", result.stats.stop_reason);
    println!(
        "Best fitness: {:.4} ({} matching cells, generation {})",
        result.best.fitness, result.best.matches, result.found_in_generation
    );
    println!(
        "Evaluations: {} ({:.1}/s)",
        result.stats.total_evaluations, result.stats.evaluations_per_second
    );

    let json = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
        eprintln!("Error serializing result: {}", e);
        std::process::exit(1);
    });
    fs::write(output, json).unwrap_or_else(|e| {
        eprintln!("Error writing result: {}", e);
        std::process::exit(1);
    });
    println!("Result: {}", output.display());

    match engine.render_best() {
        Ok(Some(bitmap)) => {
            let image_path = output.with_extension("png");
            match bitmap.save(&image_path) {
                Ok(()) => println!("Best render: {}", image_path.display()),
                Err(e) => eprintln!("Error writing best render: {}", e),
            }
        }
        Ok(None) => {}
        Err(e) => eprintln!("Error rendering best candidate: {}", e),
    }
}

fn render_preset(name: &str, output: &Path, config_path: Option<PathBuf>) {
    let preset = Preset::from_name(name).unwrap_or_else(|| {
        eprintln!("Unknown preset: {}", name);
        std::process::exit(1);
    });

    let mut evaluation = config_path
        .map(|path| load_config(&path).evaluation)
        .unwrap_or_default();
    evaluation.view = preset.view();

    let mut rng = StdRng::seed_from_u64(0);
    let seed = generate_seed(&evaluation.seed_distribution, evaluation.points, &mut rng);
    let mut renderer = CpuRenderer::new(&evaluation, seed);

    let finite = renderer.render(&preset.map_set()).unwrap_or_else(|e| {
        eprintln!("Error rendering preset: {}", e);
        std::process::exit(1);
    });
    renderer.rendered().save(output).unwrap_or_else(|e| {
        eprintln!("Error writing image: {}", e);
        std::process::exit(1);
    });

    println!(
        "{}: {} points, {} pixels covered -> {}",
        preset.name(),
        finite,
        renderer.rendered().coverage(),
        output.display()
    );
}

fn print_example_config() {
    let config = EvolutionConfig {
        random_seed: Some(42),
        ..Default::default()
    };
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            std::process::exit(1);
        }
    }
}
