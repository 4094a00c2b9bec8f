//! GPU evaluation pipeline.
//!
//! All buffers and bind groups are created once. Each evaluation uploads the
//! candidate's maps, then encodes every stage into one command buffer:
//!
//! ```text
//! seed ──copy──> points ──simulate──> points ──raster──> coverage
//!                                                          │
//!                          target ──────────compare────────┘
//!                                              │
//!                              reduce[0] <──> reduce[1]  (ping-pong passes)
//!                                              │
//!                                  staging <───┴─── finite_count
//! ```
//!
//! Passes within one encoder execute in submission order, which provides the
//! barrier between stages.

use glam::Mat3;
use log::{debug, info};

use super::GpuError;
use crate::compute::bitmap::Bitmap;
use crate::compute::pipeline::{Evaluation, Evaluator, PipelineError, check_target};
use crate::compute::points::Point;
use crate::compute::raster::Camera;
use crate::compute::reduce::padded_len;
use crate::compute::simulate::build_index_table;
use crate::schema::{Affine, EvaluationConfig, MapSelection, MapSet};

// Embed shader sources at compile time
const SIMULATE_SHADER: &str = include_str!("shaders/simulate.wgsl");
const RASTER_SHADER: &str = include_str!("shaders/raster.wgsl");
const COMPARE_SHADER: &str = include_str!("shaders/compare.wgsl");
const REDUCE_SHADER: &str = include_str!("shaders/reduce.wgsl");

const LINEAR_WORKGROUP: u32 = 64;
const COMPARE_WORKGROUP: u32 = 8;
const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// Bytes per map: `mat3x3<f32>` with 16-byte columns.
const MAP_STRIDE: u64 = std::mem::size_of::<[[f32; 4]; 3]>() as u64;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SimParams {
    point_count: u32,
    map_count: u32,
    iterations: u32,
    table_len: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct RasterParams {
    inverse: [[f32; 4]; 3],
    point_count: u32,
    width: u32,
    height: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CompareParams {
    width: u32,
    height: u32,
    grid: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ReduceParams {
    len: u32,
    _pad: [u32; 3],
}

/// Workgroup counts for a 1D dispatch, folded into y when x overflows.
fn linear_dispatch(invocations: u32) -> Result<(u32, u32), GpuError> {
    let groups = invocations.div_ceil(LINEAR_WORKGROUP).max(1);
    if groups <= MAX_WORKGROUPS_PER_DIMENSION {
        return Ok((groups, 1));
    }
    let rows = groups.div_ceil(MAX_WORKGROUPS_PER_DIMENSION);
    if rows > MAX_WORKGROUPS_PER_DIMENSION {
        return Err(GpuError::DispatchTooLarge {
            invocations: invocations as u64,
        });
    }
    Ok((MAX_WORKGROUPS_PER_DIMENSION, rows))
}

struct ReducePass {
    bind_group: wgpu::BindGroup,
    groups: (u32, u32),
    // Kept alive for the bind group.
    _params: wgpu::Buffer,
}

/// GPU-backed [`Evaluator`].
pub struct GpuPipeline {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Compute pipelines
    simulate_pipeline: wgpu::ComputePipeline,
    raster_pipeline: wgpu::ComputePipeline,
    compare_pipeline: wgpu::ComputePipeline,
    reduce_pipeline: wgpu::ComputePipeline,

    // GPU buffers
    sim_params_buffer: wgpu::Buffer,
    maps_buffer: wgpu::Buffer,
    table_buffer: wgpu::Buffer,
    seed_buffer: wgpu::Buffer,
    points_buffer: wgpu::Buffer,
    coverage_buffer: wgpu::Buffer,
    finite_buffer: wgpu::Buffer,
    reduce_buffers: [wgpu::Buffer; 2],
    staging_buffer: wgpu::Buffer,
    coverage_staging_buffer: wgpu::Buffer,

    // Bind groups (buffers never change, so these are built once)
    simulate_bind_group: wgpu::BindGroup,
    raster_bind_group: wgpu::BindGroup,
    compare_bind_group: wgpu::BindGroup,
    reduce_passes: Vec<ReducePass>,

    point_groups: (u32, u32),
    point_count: u32,
    resolution: u32,
    grid: u32,
    iterations: u32,
    selection: MapSelection,
    map_capacity: usize,
    /// Reduce buffer holding the final sum.
    result_buffer: usize,
}

impl GpuPipeline {
    /// Create a pipeline scoring against `target`, holding up to `max_maps`
    /// maps per candidate.
    pub async fn new(
        evaluation: &EvaluationConfig,
        max_maps: usize,
        target: &Bitmap,
        seed: &[Point],
    ) -> Result<Self, PipelineError> {
        check_target(evaluation, target)?;

        // 1. Create wgpu instance
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // 2. Request adapter
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;
        info!("GPU adapter: {}", adapter.get_info().name);

        // 3. Request device and queue
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Nephos GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(GpuError::from)?;

        // 4. Bind group layouts
        let simulate_layout = create_bind_group_layout(
            &device,
            "Simulate Bind Group Layout",
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        );
        let raster_layout = create_bind_group_layout(
            &device,
            "Raster Bind Group Layout",
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        );
        let compare_layout = create_bind_group_layout(
            &device,
            "Compare Bind Group Layout",
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        );
        let reduce_layout = create_bind_group_layout(
            &device,
            "Reduce Bind Group Layout",
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
        );

        // 5. Compute pipelines
        let simulate_pipeline =
            create_compute_pipeline(&device, "Simulate", SIMULATE_SHADER, &simulate_layout);
        let raster_pipeline =
            create_compute_pipeline(&device, "Raster", RASTER_SHADER, &raster_layout);
        let compare_pipeline =
            create_compute_pipeline(&device, "Compare", COMPARE_SHADER, &compare_layout);
        let reduce_pipeline =
            create_compute_pipeline(&device, "Reduce", REDUCE_SHADER, &reduce_layout);

        // 6. Buffers
        let point_count = seed.len() as u32;
        let resolution = evaluation.resolution;
        let grid = evaluation.grid;
        let pixels = resolution as u64 * resolution as u64;
        let padded = padded_len(evaluation.cells()) as u64;
        let map_capacity = max_maps.max(1);
        let table_capacity = match evaluation.map_selection {
            MapSelection::Hash => 1,
            MapSelection::IndexTable { len } => len.max(1) as u64,
        };

        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let word = std::mem::size_of::<u32>() as u64;
        let point_bytes = (seed.len().max(1) * std::mem::size_of::<Point>()) as u64;

        let sim_params_buffer = create_buffer(
            &device,
            "Sim Params",
            std::mem::size_of::<SimParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let maps_buffer = create_buffer(&device, "Maps", map_capacity as u64 * MAP_STRIDE, storage);
        let table_buffer = create_buffer(&device, "Index Table", table_capacity * word, storage);
        let seed_buffer = create_buffer(
            &device,
            "Seed Points",
            point_bytes,
            wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        );
        let points_buffer = create_buffer(&device, "Points", point_bytes, storage);
        let coverage_buffer = create_buffer(
            &device,
            "Coverage",
            pixels * word,
            storage | wgpu::BufferUsages::COPY_SRC,
        );
        let target_buffer = create_buffer(&device, "Target", pixels * word, storage);
        let finite_buffer = create_buffer(
            &device,
            "Finite Count",
            word,
            storage | wgpu::BufferUsages::COPY_SRC,
        );
        let reduce_buffers = [
            create_buffer(
                &device,
                "Reduce A",
                padded * word,
                storage | wgpu::BufferUsages::COPY_SRC,
            ),
            create_buffer(
                &device,
                "Reduce B",
                (padded / 2).max(1) * word,
                storage | wgpu::BufferUsages::COPY_SRC,
            ),
        ];
        let readback = wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
        let staging_buffer = create_buffer(&device, "Staging", 2 * word, readback);
        let coverage_staging_buffer =
            create_buffer(&device, "Coverage Staging", pixels * word, readback);

        queue.write_buffer(&seed_buffer, 0, bytemuck::cast_slice(seed));
        queue.write_buffer(&target_buffer, 0, bytemuck::cast_slice(&target.to_words()));

        let raster_params = RasterParams {
            inverse: mat3_columns(Camera::from_region(&evaluation.view).inverse()),
            point_count,
            width: resolution,
            height: resolution,
            _pad: 0,
        };
        let raster_params_buffer = create_uniform(&device, &queue, "Raster Params", &raster_params);
        let compare_params = CompareParams {
            width: resolution,
            height: resolution,
            grid,
            _pad: 0,
        };
        let compare_params_buffer =
            create_uniform(&device, &queue, "Compare Params", &compare_params);

        // 7. Bind groups
        let simulate_bind_group = create_bind_group(
            &device,
            "Simulate Bind Group",
            &simulate_layout,
            &[&sim_params_buffer, &maps_buffer, &table_buffer, &points_buffer],
        );
        let raster_bind_group = create_bind_group(
            &device,
            "Raster Bind Group",
            &raster_layout,
            &[&raster_params_buffer, &points_buffer, &coverage_buffer, &finite_buffer],
        );
        let compare_bind_group = create_bind_group(
            &device,
            "Compare Bind Group",
            &compare_layout,
            &[&compare_params_buffer, &target_buffer, &coverage_buffer, &reduce_buffers[0]],
        );

        let mut reduce_passes = Vec::new();
        let mut len = padded;
        let mut src = 0;
        while len > 1 {
            let out = (len / 2) as u32;
            let params = create_uniform(
                &device,
                &queue,
                "Reduce Params",
                &ReduceParams {
                    len: out,
                    _pad: [0; 3],
                },
            );
            let bind_group = create_bind_group(
                &device,
                "Reduce Bind Group",
                &reduce_layout,
                &[&params, &reduce_buffers[src], &reduce_buffers[1 - src]],
            );
            reduce_passes.push(ReducePass {
                bind_group,
                groups: linear_dispatch(out)?,
                _params: params,
            });
            len /= 2;
            src = 1 - src;
        }
        debug!(
            "GPU pipeline: {} points, {}x{} render, {} reduce passes",
            point_count,
            resolution,
            resolution,
            reduce_passes.len()
        );

        Ok(Self {
            point_groups: linear_dispatch(point_count)?,
            device,
            queue,
            simulate_pipeline,
            raster_pipeline,
            compare_pipeline,
            reduce_pipeline,
            sim_params_buffer,
            maps_buffer,
            table_buffer,
            seed_buffer,
            points_buffer,
            coverage_buffer,
            finite_buffer,
            reduce_buffers,
            staging_buffer,
            coverage_staging_buffer,
            simulate_bind_group,
            raster_bind_group,
            compare_bind_group,
            reduce_passes,
            point_count,
            resolution,
            grid,
            iterations: evaluation.iterations(),
            selection: evaluation.map_selection,
            map_capacity,
            result_buffer: src,
        })
    }

    /// Blocking constructor.
    pub fn blocking(
        evaluation: &EvaluationConfig,
        max_maps: usize,
        target: &Bitmap,
        seed: &[Point],
    ) -> Result<Self, PipelineError> {
        pollster::block_on(Self::new(evaluation, max_maps, target, seed))
    }

    /// Upload the candidate's maps and selection table.
    fn upload(&self, map_set: &MapSet) -> Result<(), PipelineError> {
        map_set.validate()?;
        if map_set.len() > self.map_capacity {
            return Err(PipelineError::TooManyMaps {
                maps: map_set.len(),
                capacity: self.map_capacity,
            });
        }

        let columns: Vec<[[f32; 4]; 3]> = map_set.maps.iter().map(Affine::gpu_columns).collect();
        self.queue
            .write_buffer(&self.maps_buffer, 0, bytemuck::cast_slice(&columns));

        let table_len = match self.selection {
            MapSelection::Hash => 0,
            MapSelection::IndexTable { len } => {
                let table = build_index_table(map_set, len.max(1));
                self.queue
                    .write_buffer(&self.table_buffer, 0, bytemuck::cast_slice(&table));
                table.len() as u32
            }
        };

        let params = SimParams {
            point_count: self.point_count,
            map_count: map_set.len() as u32,
            iterations: self.iterations,
            table_len,
        };
        self.queue
            .write_buffer(&self.sim_params_buffer, 0, bytemuck::bytes_of(&params));
        Ok(())
    }

    /// Encode seed reset, simulation and rasterization.
    fn encode_render(&self, encoder: &mut wgpu::CommandEncoder) {
        let point_bytes = self.point_count as u64 * std::mem::size_of::<Point>() as u64;
        if point_bytes > 0 {
            encoder.copy_buffer_to_buffer(
                &self.seed_buffer,
                0,
                &self.points_buffer,
                0,
                point_bytes,
            );
        }
        encoder.clear_buffer(&self.coverage_buffer, 0, None);
        encoder.clear_buffer(&self.finite_buffer, 0, None);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Simulate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.simulate_pipeline);
            pass.set_bind_group(0, &self.simulate_bind_group, &[]);
            pass.dispatch_workgroups(self.point_groups.0, self.point_groups.1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Raster Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.raster_pipeline);
            pass.set_bind_group(0, &self.raster_bind_group, &[]);
            pass.dispatch_workgroups(self.point_groups.0, self.point_groups.1, 1);
        }
    }

    /// Encode comparison and every reduction pass.
    fn encode_score(&self, encoder: &mut wgpu::CommandEncoder) {
        // Padding past grid² must read as zero.
        encoder.clear_buffer(&self.reduce_buffers[0], 0, None);

        {
            let groups = self.grid.div_ceil(COMPARE_WORKGROUP);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Compare Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.compare_pipeline);
            pass.set_bind_group(0, &self.compare_bind_group, &[]);
            pass.dispatch_workgroups(groups, groups, 1);
        }

        for reduce in &self.reduce_passes {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Reduce Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.reduce_pipeline);
            pass.set_bind_group(0, &reduce.bind_group, &[]);
            pass.dispatch_workgroups(reduce.groups.0, reduce.groups.1, 1);
        }

        let word = std::mem::size_of::<u32>() as u64;
        encoder.copy_buffer_to_buffer(
            &self.reduce_buffers[self.result_buffer],
            0,
            &self.staging_buffer,
            0,
            word,
        );
        encoder.copy_buffer_to_buffer(&self.finite_buffer, 0, &self.staging_buffer, word, word);
    }

    /// Map `buffer`, copy its words out and unmap.
    fn read_words(&self, buffer: &wgpu::Buffer) -> Result<Vec<u32>, GpuError> {
        let buffer_slice = buffer.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv().map_err(|_| GpuError::ReadbackClosed)??;

        let words = {
            let data = buffer_slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&data).to_vec()
        };
        buffer.unmap();
        Ok(words)
    }
}

impl Evaluator for GpuPipeline {
    fn evaluate(&mut self, map_set: &MapSet) -> Result<Evaluation, PipelineError> {
        self.upload(map_set)?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Evaluate Encoder"),
            });
        self.encode_render(&mut encoder);
        self.encode_score(&mut encoder);
        self.queue.submit(std::iter::once(encoder.finish()));

        let words = self.read_words(&self.staging_buffer)?;
        let (matches, finite) = (words[0], words[1]);
        if finite == 0 {
            return Err(PipelineError::Degenerate);
        }
        Ok(Evaluation::new(matches, self.grid * self.grid))
    }

    fn render(&mut self, map_set: &MapSet) -> Result<Bitmap, PipelineError> {
        self.upload(map_set)?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.encode_render(&mut encoder);
        encoder.copy_buffer_to_buffer(
            &self.coverage_buffer,
            0,
            &self.coverage_staging_buffer,
            0,
            self.coverage_buffer.size(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let words = self.read_words(&self.coverage_staging_buffer)?;
        let data = words.into_iter().map(|w| w.min(255) as u8).collect();
        Ok(Bitmap::from_mask(self.resolution, self.resolution, data)?)
    }

    fn name(&self) -> &str {
        "gpu"
    }
}

/// Column-major `mat3x3<f32>` layout (16-byte columns).
fn mat3_columns(m: &Mat3) -> [[f32; 4]; 3] {
    [
        m.x_axis.extend(0.0).to_array(),
        m.y_axis.extend(0.0).to_array(),
        m.z_axis.extend(0.0).to_array(),
    ]
}

fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    size: u64,
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(4),
        usage,
        mapped_at_creation: false,
    })
}

fn create_uniform<T: bytemuck::Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    value: &T,
) -> wgpu::Buffer {
    let buffer = create_buffer(
        device,
        label,
        std::mem::size_of::<T>() as u64,
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    );
    queue.write_buffer(&buffer, 0, bytemuck::bytes_of(value));
    buffer
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    })
}

/// Bind `buffers` in order to bindings 0..n.
fn create_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffers: &[&wgpu::Buffer],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = buffers
        .iter()
        .enumerate()
        .map(|(binding, buffer)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: buffer.as_entire_binding(),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    name: &str,
    source: &str,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::ComputePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{name} Shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name} Pipeline Layout")),
        bind_group_layouts: &[layout],
        ..Default::default()
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name} Pipeline")),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::pipeline::CpuPipeline;
    use crate::compute::points::generate_seed;
    use crate::schema::Preset;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_config() -> EvaluationConfig {
        EvaluationConfig {
            points: 20_000,
            steps: 20,
            resolution: 64,
            grid: 64,
            ..Default::default()
        }
    }

    #[test]
    fn test_linear_dispatch() {
        assert_eq!(linear_dispatch(0).unwrap(), (1, 1));
        assert_eq!(linear_dispatch(64).unwrap(), (1, 1));
        assert_eq!(linear_dispatch(65).unwrap(), (2, 1));
        let (x, y) = linear_dispatch(64 * 70_000).unwrap();
        assert_eq!(x, MAX_WORKGROUPS_PER_DIMENSION);
        assert!(x as u64 * y as u64 * 64 >= 64 * 70_000);
    }

    #[test]
    fn test_param_layouts() {
        assert_eq!(std::mem::size_of::<SimParams>(), 16);
        assert_eq!(std::mem::size_of::<RasterParams>(), 64);
        assert_eq!(std::mem::size_of::<CompareParams>(), 16);
        assert_eq!(std::mem::size_of::<ReduceParams>(), 16);
        assert_eq!(MAP_STRIDE, 48);
    }

    #[test]
    fn test_gpu_pipeline_creation() {
        let config = test_config();
        let seed = vec![Point::ZERO; 16];
        let result = GpuPipeline::blocking(&config, 6, &Bitmap::new(64, 64), &seed);

        // Skip test if no GPU available
        if let Err(PipelineError::Gpu(GpuError::NoAdapter)) = &result {
            eprintln!("Skipping GPU test: no adapter available");
            return;
        }

        assert!(result.is_ok(), "Failed to create GPU pipeline");
    }

    /// Self-render on the GPU must score perfectly, and agree with the CPU
    /// on a different candidate up to floating point drift.
    #[test]
    fn test_gpu_cpu_equivalence() {
        let config = test_config();
        let mut rng = StdRng::seed_from_u64(5);
        let seed = generate_seed(&config.seed_distribution, config.points, &mut rng);
        let sierpinski = Preset::Sierpinski.map_set();

        let mut cpu = CpuPipeline::new(&config, Bitmap::new(64, 64), seed.clone()).unwrap();
        let target = cpu.render(&sierpinski).unwrap();

        let mut gpu = match GpuPipeline::blocking(&config, 6, &target, &seed) {
            Ok(p) => p,
            Err(PipelineError::Gpu(GpuError::NoAdapter)) => {
                eprintln!("Skipping GPU test: no adapter available");
                return;
            }
            Err(e) => panic!("Failed to create GPU pipeline: {:?}", e),
        };

        let gpu_render = gpu.render(&sierpinski).unwrap();
        let self_score = CpuPipeline::new(&config, gpu_render, seed.clone())
            .unwrap()
            .evaluate(&sierpinski)
            .unwrap();
        assert!(self_score.fitness > 0.95, "GPU render diverged: {:?}", self_score);

        let mut cpu = CpuPipeline::new(&config, target, seed).unwrap();
        let other = Preset::Pentagon.map_set();
        let cpu_eval = cpu.evaluate(&other).unwrap();
        let gpu_eval = gpu.evaluate(&other).unwrap();
        assert!(
            (cpu_eval.fitness - gpu_eval.fitness).abs() < 0.05,
            "CPU {} vs GPU {}",
            cpu_eval.fitness,
            gpu_eval.fitness
        );
    }
}
