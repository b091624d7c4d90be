use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Vec3};
use log::{debug, warn};
use wgpu::util::DeviceExt;
use winit::window::{Window, WindowId};

use crate::app::{DrawItem, Frame, LightKind, LightParams, RenderTarget};
use crate::camera::Viewport;
use crate::mesh::{MeshData, MeshLibrary, Vertex};

/// Lights beyond this count are ignored by the shader.
pub const MAX_LIGHTS: usize = 8;

/// egui output to composite over the next frame.
pub struct OverlayFrame {
    pub paint_jobs: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub screen: egui_wgpu::ScreenDescriptor,
}

/// GPU renderer backed by wgpu that draws scene frames into a window.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    /// Per-draw uniforms, indexed by position in the frame's draw list.
    object_slots: Vec<ObjectSlot>,
    mesh_cache: HashMap<String, (u64, MeshBuffers)>,
    egui: egui_wgpu::Renderer,
    overlay: Option<OverlayFrame>,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("scene-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: Default::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            // vsync keeps the frame rate, and so the fps monitor, tied to the display
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout =
            uniform_layout::<GlobalUniform>(&device, "global-bind-layout");
        let object_layout =
            uniform_layout::<ObjectConstants>(&device, "object-bind-layout");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                // planes are visible from both sides
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let egui = egui_wgpu::Renderer::new(
            &device,
            surface_format,
            egui_wgpu::RendererOptions {
                msaa_samples: 1,
                depth_stencil_format: None,
                dithering: true,
                ..Default::default()
            },
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            object_slots: Vec::new(),
            mesh_cache: HashMap::new(),
            egui,
            overlay: None,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Queues egui output to be drawn on top of the next frame.
    pub fn set_overlay(&mut self, overlay: OverlayFrame) {
        self.overlay = Some(overlay);
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, self.config.width, self.config.height);
    }

    /// Uploads `key` if it is new or was replaced since the last upload.
    fn sync_mesh(&mut self, key: &str, meshes: &MeshLibrary) -> bool {
        let Some(generation) = meshes.generation_of(key) else {
            return false;
        };
        if matches!(self.mesh_cache.get(key), Some((cached, _)) if *cached == generation) {
            return true;
        }
        let Some(mesh) = meshes.get(key) else {
            return false;
        };
        if mesh.indices.is_empty() {
            return false;
        }
        debug!("uploading mesh {key} ({} triangles)", mesh.triangle_count());
        let buffers = MeshBuffers::from_mesh(&self.device, mesh, key);
        self.mesh_cache.insert(key.to_string(), (generation, buffers));
        true
    }

    fn write_globals(&self, frame: &Frame<'_>) {
        let mut uniform = GlobalUniform::zeroed();
        uniform.view_proj = frame.camera.view_proj().to_cols_array_2d();
        uniform.camera_position = frame.camera.position.extend(1.0).into();
        uniform.ambient = srgb_to_linear(frame.lights.ambient).extend(1.0).into();

        if frame.lights.lights.len() > MAX_LIGHTS {
            warn!(
                "{} lights in scene; only the first {MAX_LIGHTS} are drawn",
                frame.lights.lights.len()
            );
        }
        let count = frame.lights.lights.len().min(MAX_LIGHTS);
        for (slot, light) in uniform.lights.iter_mut().zip(&frame.lights.lights) {
            *slot = GpuLight::from_params(light);
        }
        uniform.light_count = [count as u32, 0, 0, 0];

        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }
}

impl RenderTarget for Renderer {
    fn resize(&mut self, viewport: Viewport) {
        self.config.width = viewport.width();
        self.config.height = viewport.height();
        self.reconfigure();
    }

    fn draw(&mut self, frame: &Frame<'_>) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => bail!("GPU is out of memory"),
            Err(err) => {
                warn!("skipping frame: {err}");
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_globals(frame);

        let mut draw_list = Vec::with_capacity(frame.draws.len());
        for item in &frame.draws {
            if !self.sync_mesh(&item.mesh, frame.meshes) {
                continue;
            }
            let constants = ObjectConstants::from_item(item);
            let slot = draw_list.len();
            if slot == self.object_slots.len() {
                self.object_slots
                    .push(ObjectSlot::create(&self.device, &self.object_layout));
            }
            self.queue
                .write_buffer(&self.object_slots[slot].buffer, 0, bytes_of(&constants));
            draw_list.push((item.mesh.as_str(), slot));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene-encoder"),
            });

        let clear = srgb_to_linear(frame.clear_color);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.x as f64,
                            g: clear.y as f64,
                            b: clear.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);
            for &(mesh, slot) in &draw_list {
                let Some((_, buffers)) = self.mesh_cache.get(mesh) else {
                    continue;
                };
                pass.set_vertex_buffer(0, buffers.vertex.slice(..));
                pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(1, &self.object_slots[slot].bind_group, &[]);
                pass.draw_indexed(0..buffers.index_count, 0, 0..1);
            }
        }

        let mut command_buffers = Vec::new();
        let overlay = self.overlay.take();
        if let Some(overlay) = &overlay {
            for (id, delta) in &overlay.textures_delta.set {
                self.egui
                    .update_texture(&self.device, &self.queue, *id, delta);
            }
            command_buffers = self.egui.update_buffers(
                &self.device,
                &self.queue,
                &mut encoder,
                &overlay.paint_jobs,
                &overlay.screen,
            );
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("overlay-pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.egui
                .render(&mut pass, &overlay.paint_jobs, &overlay.screen);
        }

        command_buffers.push(encoder.finish());
        self.queue.submit(command_buffers);
        output.present();

        if let Some(overlay) = overlay {
            for id in &overlay.textures_delta.free {
                self.egui.free_texture(id);
            }
        }
        Ok(())
    }
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

/// Scene colors are authored in sRGB; the shader works in linear space.
fn srgb_to_linear(color: Vec3) -> Vec3 {
    let channel = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(color.x), channel(color.y), channel(color.z))
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct ObjectSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ObjectSlot {
    fn create(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("object-uniform"),
            size: std::mem::size_of::<ObjectConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct GpuLight {
    /// `w` holds the light kind: 0 directional, 1 point, 2 spot.
    position: [f32; 4],
    direction: [f32; 4],
    /// `w` holds the intensity.
    color: [f32; 4],
    /// `x` outer cone cosine, `y` inner cone cosine.
    cone: [f32; 4],
}

impl GpuLight {
    fn from_params(light: &LightParams) -> Self {
        let kind = match light.kind {
            LightKind::Directional => 0.0,
            LightKind::Point => 1.0,
            LightKind::Spot => 2.0,
        };
        Self {
            position: light.position.extend(kind).into(),
            direction: light.direction.extend(0.0).into(),
            color: srgb_to_linear(light.color).extend(light.intensity).into(),
            cone: [light.cos_outer, light.cos_inner, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    light_count: [u32; 4],
    lights: [GpuLight; MAX_LIGHTS],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    /// `x` is 1 for lit draws.
    flags: [f32; 4],
}

impl ObjectConstants {
    fn from_item(item: &DrawItem) -> Self {
        let normal = Mat3::from_mat4(item.model).inverse().transpose();
        Self {
            model: item.model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            color: srgb_to_linear(item.color).extend(1.0).into(),
            flags: [if item.lit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

const SHADER: &str = r#"
const MAX_LIGHTS: u32 = 8u;

struct Light {
    position: vec4<f32>,
    direction: vec4<f32>,
    color: vec4<f32>,
    cone: vec4<f32>,
}

struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    light_count: vec4<u32>,
    lights: array<Light, MAX_LIGHTS>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    flags: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> draw_item: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = draw_item.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        draw_item.normal[0].xyz,
        draw_item.normal[1].xyz,
        draw_item.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

fn diffuse_from(light: Light, world_pos: vec3<f32>, normal: vec3<f32>) -> vec3<f32> {
    let kind = u32(light.position.w);
    var to_light = -light.direction.xyz;
    var falloff = 1.0;
    if (kind != 0u) {
        to_light = normalize(light.position.xyz - world_pos);
    }
    if (kind == 2u) {
        let cos_angle = dot(-to_light, light.direction.xyz);
        let hard = select(0.0, 1.0, cos_angle >= light.cone.x);
        let soft = smoothstep(light.cone.x, light.cone.y, cos_angle);
        falloff = select(soft, hard, light.cone.y - light.cone.x < 1e-4);
    }
    let lambert = max(dot(normal, to_light), 0.0);
    return light.color.rgb * light.color.w * lambert * falloff;
}

@fragment
fn fs_main(input: VertexOutput, @builtin(front_facing) front: bool) -> @location(0) vec4<f32> {
    if (draw_item.flags.x < 0.5) {
        return vec4<f32>(draw_item.color.rgb, 1.0);
    }
    var normal = normalize(input.normal);
    if (!front) {
        normal = -normal;
    }
    var light = globals.ambient.rgb;
    let count = min(globals.light_count.x, MAX_LIGHTS);
    for (var i = 0u; i < count; i = i + 1u) {
        light = light + diffuse_from(globals.lights[i], input.world_pos, normal);
    }
    return vec4<f32>(draw_item.color.rgb * light, draw_item.color.a);
}
"#;
