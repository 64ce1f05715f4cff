//! GPU segment renderer.
//!
//! A compute kernel evaluates the fill and outline segment passes for every
//! pixel and writes color plus depth; the painter composites the result onto
//! the frame with the frame's depth test. Segments are binned into 16×16
//! pixel tiles on the CPU so each invocation only visits nearby capsules.

use std::rc::Rc;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::camera::ViewTransform;
use super::context::{Frame, Painter};
use super::painters::{light_dir, screen_bounds, SegmentStyle, MIN_PIXEL_RADIUS};
use super::palette::{DISTANCE_RAMP, SECTION_PALETTE};
use crate::config::Coloring;
use crate::geometry::SegmentsData;
use crate::swc::PALETTE_SLOTS;

const TILE: u32 = 16;

// ── Uniform structs (must match WGSL layout exactly) ──

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_center: [f32; 3],
    pixel_scale: f32,
    view_right: [f32; 3],
    outline_multiplier: f32,
    view_up: [f32; 3],
    outline_depth_shift: f32,
    view_back: [f32; 3],
    min_pixel_radius: f32,
    width: u32,
    height: u32,
    tiles_x: u32,
    coloring: u32,
    light_dir: [f32; 3],
    _pad0: f32,
    outline_color: [f32; 4],
    palette: [[f32; 4]; PALETTE_SLOTS],
    ramp: [[f32; 4]; 4],
}

/// Per-pixel result of one dispatch.
#[derive(Debug, Clone)]
pub struct GpuLayer {
    pub width: u32,
    pub height: u32,
    /// RGBA8 packed little-endian; alpha 0 where nothing was hit
    pub color: Vec<u32>,
    pub depth: Vec<f32>,
}

// ── GPU Renderer ──

/// Device, queue and the compiled segment kernel.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// Segment instances uploaded once per loaded morphology.
pub struct GpuSegments {
    buffer: wgpu::Buffer,
    count: u32,
}

impl GpuRenderer {
    /// Try to initialise the GPU renderer. Returns None if no GPU is available.
    pub fn new() -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("morpho-viewer GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .ok()?;

        let (pipeline, bind_group_layout) = build_pipeline(&device);

        log::info!("GPU renderer initialised: {:?}", adapter.get_info().name);

        Some(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
        })
    }

    pub fn upload(&self, data: &SegmentsData) -> Option<GpuSegments> {
        if data.is_empty() {
            return None;
        }
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Segments"),
                contents: bytemuck::cast_slice(data.instances()),
                usage: wgpu::BufferUsages::STORAGE,
            });
        Some(GpuSegments {
            buffer,
            count: data.len() as u32,
        })
    }

    /// Evaluate both segment passes for `view`. `data` must be the buffer
    /// `segments` was uploaded from.
    pub fn render(
        &self,
        data: &SegmentsData,
        segments: &GpuSegments,
        view: &ViewTransform,
        style: &SegmentStyle,
    ) -> Option<GpuLayer> {
        if segments.count == 0 {
            return None;
        }
        let (width, height) = (view.width, view.height);
        let pixel_count = width as usize * height as usize;
        let (ranges, items) = bin_segments(data, view, style.outline_radius_multiplier);

        let uniforms = Uniforms {
            view_center: view.target.into(),
            pixel_scale: view.pixel_scale,
            view_right: view.right.into(),
            outline_multiplier: style.outline_radius_multiplier,
            view_up: view.up.into(),
            outline_depth_shift: style.outline_depth_shift,
            view_back: view.back.into(),
            min_pixel_radius: MIN_PIXEL_RADIUS,
            width,
            height,
            tiles_x: width.div_ceil(TILE),
            coloring: match style.coloring {
                Coloring::Section => 0,
                Coloring::Distance => 1,
            },
            light_dir: light_dir().into(),
            _pad0: 0.0,
            outline_color: rgba(style.outline_color),
            palette: SECTION_PALETTE.map(|e| rgba(e.color)),
            ramp: DISTANCE_RAMP.map(rgba),
        };

        // Create buffers
        let uniform_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let ranges_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Tile Ranges"),
                contents: bytemuck::cast_slice(&ranges),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let items_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Tile Items"),
                contents: bytemuck::cast_slice(&items),
                usage: wgpu::BufferUsages::STORAGE,
            });

        // Color and depth bits per pixel
        let output_size = (pixel_count * 8) as u64;
        let output_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Pixels"),
            size: output_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Segments Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: segments.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: ranges_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: items_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: output_buf.as_entire_binding(),
                },
            ],
        });

        // Dispatch
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Segments Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Segments Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(width.div_ceil(TILE), height.div_ceil(TILE), 1);
        }
        encoder.copy_buffer_to_buffer(&output_buf, 0, &staging_buf, 0, output_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        // Read back
        let buffer_slice = staging_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);
        if rx.recv().ok()?.is_err() {
            log::warn!("GPU readback failed");
            return None;
        }

        let data = buffer_slice.get_mapped_range();
        let packed: &[u32] = bytemuck::cast_slice(&data);
        let mut color = Vec::with_capacity(pixel_count);
        let mut depth = Vec::with_capacity(pixel_count);
        for px in packed.chunks_exact(2) {
            color.push(px[0]);
            depth.push(f32::from_bits(px[1]));
        }
        drop(data);
        staging_buf.unmap();

        Some(GpuLayer {
            width,
            height,
            color,
            depth,
        })
    }
}

fn rgba(c: [f32; 3]) -> [f32; 4] {
    [c[0], c[1], c[2], 1.0]
}

/// Tile → (offset, count) into a flat list of segment indices. Never
/// returns an empty item list, since zero-sized storage bindings are invalid.
fn bin_segments(data: &SegmentsData, view: &ViewTransform, reach: f32) -> (Vec<[u32; 2]>, Vec<u32>) {
    let tiles_x = view.width.div_ceil(TILE) as usize;
    let tiles_y = view.height.div_ceil(TILE) as usize;
    let mut lists: Vec<Vec<u32>> = vec![Vec::new(); tiles_x * tiles_y];
    for (i, seg) in data.instances().iter().enumerate() {
        let Some((min, max)) = screen_bounds(seg, view, reach) else {
            continue;
        };
        let tile_of = |v: f32, tiles: usize| {
            ((v / TILE as f32).floor().clamp(0.0, (tiles - 1) as f32)) as usize
        };
        let tx0 = tile_of(min.x, tiles_x);
        let ty0 = tile_of(min.y, tiles_y);
        let tx1 = tile_of(max.x, tiles_x);
        let ty1 = tile_of(max.y, tiles_y);
        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                lists[ty * tiles_x + tx].push(i as u32);
            }
        }
    }
    let mut ranges = Vec::with_capacity(lists.len());
    let mut items = Vec::new();
    for list in &lists {
        ranges.push([items.len() as u32, list.len() as u32]);
        items.extend_from_slice(list);
    }
    if items.is_empty() {
        items.push(0);
    }
    (ranges, items)
}

// ── Painter ──

/// Fill and outline segment passes on the GPU, composited onto the frame.
pub struct GpuSegmentsPainter {
    renderer: Rc<GpuRenderer>,
    data: Arc<SegmentsData>,
    segments: Option<GpuSegments>,
    style: SegmentStyle,
}

impl GpuSegmentsPainter {
    pub fn new(renderer: Rc<GpuRenderer>, data: Arc<SegmentsData>, style: SegmentStyle) -> Self {
        let segments = renderer.upload(&data);
        Self {
            renderer,
            data,
            segments,
            style,
        }
    }
}

impl Painter for GpuSegmentsPainter {
    fn name(&self) -> &'static str {
        "gpu-segments"
    }

    fn paint(&mut self, frame: &mut Frame, view: &ViewTransform) {
        let Some(segments) = &self.segments else {
            return;
        };
        let Some(layer) = self.renderer.render(&self.data, segments, view, &self.style) else {
            return;
        };
        let state = frame.depth_state;
        for (i, (&packed, &d)) in layer.color.iter().zip(&layer.depth).enumerate() {
            if packed >> 24 == 0 || !state.passes(d, frame.depth[i]) {
                continue;
            }
            if state.writes() {
                frame.depth[i] = d;
            }
            frame.color[i * 4..i * 4 + 4].copy_from_slice(&packed.to_le_bytes());
        }
    }
}

// ── Pipeline construction ──

fn build_pipeline(device: &wgpu::Device) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Segments Shader"),
        source: wgpu::ShaderSource::Wgsl(SEGMENTS_WGSL.into()),
    });

    let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
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
        label: Some("Segments BGL"),
        entries: &[
            // Uniforms
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            storage(1, true),
            storage(2, true),
            storage(3, true),
            // Output pixels
            storage(4, false),
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Segments PL"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Segments Pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader_module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    (pipeline, bind_group_layout)
}

const SEGMENTS_WGSL: &str = r#"
struct Uniforms {
    view_center: vec3<f32>,
    pixel_scale: f32,
    view_right: vec3<f32>,
    outline_multiplier: f32,
    view_up: vec3<f32>,
    outline_depth_shift: f32,
    view_back: vec3<f32>,
    min_pixel_radius: f32,
    width: u32,
    height: u32,
    tiles_x: u32,
    coloring: u32,
    light_dir: vec3<f32>,
    _pad0: f32,
    outline_color: vec4<f32>,
    palette: array<vec4<f32>, 5>,
    ramp: array<vec4<f32>, 4>,
};

struct Segment {
    a: vec4<f32>,
    b: vec4<f32>,
    uv: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var<storage, read> segments: array<Segment>;
@group(0) @binding(2) var<storage, read> tile_ranges: array<vec2<u32>>;
@group(0) @binding(3) var<storage, read> tile_items: array<u32>;
@group(0) @binding(4) var<storage, read_write> out_px: array<u32>;

fn project(p: vec3<f32>) -> vec3<f32> {
    let rel = p - u.view_center;
    return vec3<f32>(
        dot(rel, u.view_right) / u.pixel_scale + f32(u.width) * 0.5,
        f32(u.height) * 0.5 - dot(rel, u.view_up) / u.pixel_scale,
        -dot(rel, u.view_back),
    );
}

fn base_color(uv: vec2<f32>) -> vec3<f32> {
    if (u.coloring == 1u) {
        let t = clamp(uv.x, 0.0, 1.0) * 3.0;
        let i = min(u32(t), 2u);
        return mix(u.ramp[i].rgb, u.ramp[i + 1u].rgb, t - f32(i));
    }
    let slot = min(u32(clamp(uv.y, 0.0, 1.0) * 5.0), 4u);
    return u.palette[slot].rgb;
}

fn toon_shade(base: vec3<f32>, n: vec3<f32>) -> vec3<f32> {
    let n_dot_l = max(dot(n, u.light_dir), 0.0);
    let toon = select(0.0, 1.0, n_dot_l > 0.5);
    let shadow_col = base * 0.35 + vec3<f32>(0.05, 0.03, 0.08);
    let col = base * toon + shadow_col * (1.0 - toon);
    let rim = pow(1.0 - max(n.z, 0.0), 3.0) * 0.6;
    let rim_col = base * 0.5 + vec3<f32>(0.5);
    return col + rim_col * rim;
}

fn pack_rgba(c: vec3<f32>) -> u32 {
    let q = vec3<u32>(clamp(c, vec3<f32>(0.0), vec3<f32>(1.0)) * 255.0);
    return q.x | (q.y << 8u) | (q.z << 16u) | (255u << 24u);
}

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= u.width || gid.y >= u.height) {
        return;
    }
    let p = vec2<f32>(f32(gid.x) + 0.5, f32(gid.y) + 0.5);
    let bin_range = tile_ranges[(gid.y / 16u) * u.tiles_x + gid.x / 16u];

    var fill_depth = 1e30;
    var fill_col = 0u;
    var line_depth = 1e30;

    for (var k = 0u; k < bin_range.y; k = k + 1u) {
        let s = segments[tile_items[bin_range.x + k]];
        let pa = project(s.a.xyz);
        let pb = project(s.b.xyz);
        let ra = max(s.a.w / u.pixel_scale, u.min_pixel_radius);
        let rb = max(s.b.w / u.pixel_scale, u.min_pixel_radius);

        let ab = pb.xy - pa.xy;
        let len2 = dot(ab, ab);
        var t = 0.0;
        if (len2 > 1e-12) {
            t = clamp(dot(p - pa.xy, ab) / len2, 0.0, 1.0);
        }
        let off = p - (pa.xy + ab * t);
        let r = mix(ra, rb, t);
        let d2 = dot(off, off);
        let reach = r * u.outline_multiplier;
        if (d2 > reach * reach) {
            continue;
        }
        let axis = mix(pa.z, pb.z, t);

        let od = axis - u.outline_depth_shift * r * u.pixel_scale;
        if (od <= line_depth) {
            line_depth = od;
        }

        if (d2 <= r * r) {
            let h = sqrt(r * r - d2);
            let fd = axis - h * u.pixel_scale;
            if (fd <= fill_depth) {
                fill_depth = fd;
                let n = vec3<f32>(off.x / r, -off.y / r, h / r);
                let uv = mix(s.uv.xy, s.uv.zw, t);
                fill_col = pack_rgba(toon_shade(base_color(uv), n));
            }
        }
    }

    let idx = (gid.y * u.width + gid.x) * 2u;
    if (line_depth <= fill_depth && line_depth < 1e30) {
        out_px[idx] = pack_rgba(u.outline_color.rgb);
        out_px[idx + 1u] = bitcast<u32>(line_depth);
    } else if (fill_depth < 1e30) {
        out_px[idx] = fill_col;
        out_px[idx + 1u] = bitcast<u32>(fill_depth);
    } else {
        out_px[idx] = 0u;
        out_px[idx + 1u] = bitcast<u32>(1e30);
    }
}
"#;
