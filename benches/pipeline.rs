//! Benchmarks for the candidate evaluation pipeline.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use nephos::{
    compute::{Bitmap, CpuPipeline, Evaluator, Reducer, generate_seed, simulate},
    schema::{EvaluationConfig, MapSelection, Preset},
};

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce");

    for grid in [64u32, 128, 256, 512] {
        let cells = (grid * grid) as usize;
        let mut reducer = Reducer::new(cells);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", grid, grid)),
            &cells,
            |b, &cells| {
                b.iter(|| {
                    reducer.input(cells).fill(1);
                    black_box(reducer.reduce())
                });
            },
        );
    }

    group.finish();
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    let map_set = Preset::Barnsley.map_set();
    let config = EvaluationConfig::default();

    for selection in [MapSelection::Hash, MapSelection::IndexTable { len: 64 }] {
        let mut rng = StdRng::seed_from_u64(1);
        let seed = generate_seed(&config.seed_distribution, 50_000, &mut rng);
        let mut points = seed.clone();

        let label = match selection {
            MapSelection::Hash => "hash",
            MapSelection::IndexTable { .. } => "index_table",
        };
        group.bench_function(label, |b| {
            b.iter(|| {
                points.copy_from_slice(&seed);
                simulate(black_box(&mut points), &map_set, selection, 15).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_cpu_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_evaluate");
    group.sample_size(20);

    for resolution in [64u32, 128, 256] {
        let config = EvaluationConfig {
            resolution,
            grid: resolution,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let target = Bitmap::new(resolution, resolution);
        let mut pipeline = CpuPipeline::from_config(&config, target, &mut rng).unwrap();
        let map_set = Preset::Sierpinski.map_set();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", resolution, resolution)),
            &resolution,
            |b, _| {
                b.iter(|| black_box(pipeline.evaluate(&map_set).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_reduce, bench_simulate, bench_cpu_evaluate);
criterion_main!(benches);
