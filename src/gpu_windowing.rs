use std::borrow::Cow;

use tracing::debug;
use wgpu::{PollType, util::DeviceExt};

use crate::{
    enums::Processor,
    error::DicomError,
    metadata::WindowSettings,
    windowing::{Samples, WindowBackend},
};

const WORKGROUP_SIZE: u32 = 256;
const MAX_DISPATCH: u32 = 65_535;

pub struct WGPU {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl WGPU {
    /// Open the default adapter. Fails when no adapter or device is available.
    pub async fn request() -> Result<Self, DicomError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .map_err(|err| DicomError::Unknown(format!("no GPU adapter: {err}")))?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Window Level Device"),
                ..Default::default()
            })
            .await
            .map_err(|err| DicomError::Unknown(format!("no GPU device: {err}")))?;
        debug!(adapter = ?adapter.get_info().name, "GPU device ready");
        Ok(Self { device, queue })
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    low: f32,
    width: f32,
    count: u32,
    row_stride: u32,
}

/// Window/level on a wgpu compute pipeline. Samples are widened to `i32` on
/// upload and one `u32` per output byte is read back.
pub struct GpuWindowBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl GpuWindowBackend {
    pub fn new(wgpu: WGPU) -> Self {
        let WGPU { device, queue } = wgpu;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Window Level Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "shaders/window_level.wgsl"
            ))),
        });

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Window Level Bind Group Layout"),
            entries: &[
                // Input samples
                storage_entry(0, true),
                // Output samples
                storage_entry(1, false),
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Window Level Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Window Level Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
        }
    }

    fn widen(pixels: Samples<'_>) -> Vec<i32> {
        match pixels {
            Samples::U8(p) => p.iter().map(|&v| v as i32).collect(),
            Samples::U16(p) => p.iter().map(|&v| v as i32).collect(),
            Samples::I16(p) => p.iter().map(|&v| v as i32).collect(),
        }
    }

    fn run(&self, input: &[i32], window: WindowSettings, out: &mut [u8]) -> Result<(), DicomError> {
        let count = input.len() as u32;
        let groups = count.div_ceil(WORKGROUP_SIZE);
        let dispatch_x = groups.min(MAX_DISPATCH);
        let dispatch_y = groups.div_ceil(dispatch_x);

        let uniforms = Uniforms {
            low: window.lower_bound() as f32,
            width: window.width as f32,
            count,
            row_stride: dispatch_x * WORKGROUP_SIZE,
        };
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let input_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sample Buffer"),
                contents: bytemuck::cast_slice(input),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let output_size = (input.len() * std::mem::size_of::<u32>()) as u64;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: output_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Window Level Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Window Level Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Window Level Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(dispatch_x, dispatch_y, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &staging_buffer, 0, output_size);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|err| DicomError::Unknown(format!("GPU poll failed: {err}")))?;
        futures::executor::block_on(receiver)
            .map_err(|_| DicomError::Unknown("GPU readback was cancelled".to_string()))?
            .map_err(|err| DicomError::Unknown(format!("GPU readback failed: {err}")))?;

        {
            let data = buffer_slice.get_mapped_range();
            let u32_data: &[u32] = bytemuck::cast_slice(&data);
            for (o, &v) in out.iter_mut().zip(u32_data) {
                *o = v as u8;
            }
        }
        staging_buffer.unmap();
        Ok(())
    }
}

impl WindowBackend for GpuWindowBackend {
    fn processor(&self) -> Processor {
        Processor::Gpu
    }

    fn apply(
        &self,
        pixels: Samples<'_>,
        window: WindowSettings,
        out: &mut [u8],
    ) -> Result<(), DicomError> {
        if pixels.is_empty() {
            return Ok(());
        }
        if pixels.len() > (u32::MAX / WORKGROUP_SIZE) as usize {
            return Err(DicomError::Unknown(format!(
                "{} samples exceed a single GPU dispatch",
                pixels.len()
            )));
        }
        let input = Self::widen(pixels);
        self.run(&input, window, out)
    }
}
