//! 着色器后端抽象
//!
//! 两个后端实现同一契约：`upload` 接收粒子存储的只读快照，
//! `render` 录制一遍渲染通道。物理与采样逻辑与后端无关，
//! 替换后端不触碰任何仿真代码。

use crate::core::error::RenderError;
use crate::overlay::RouteVertex;
use crate::render::camera::SceneUniforms;
use crate::sim::store::GpuParticleInstance;

/// 着色器后端能力
pub trait ShaderBackend {
    /// 上传一帧数据（粒子实例、航线顶点、场景 Uniform）
    fn upload(
        &mut self,
        queue: &wgpu::Queue,
        particles: &[GpuParticleInstance],
        routes: &[RouteVertex],
        uniforms: &SceneUniforms,
    );

    /// 录制渲染通道
    fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<(), RenderError>;

    /// 后端名（日志用）
    fn name(&self) -> &'static str;
}

/// GPU 能力探测
///
/// 宿主在 `init` 之前调用：运行时无可用适配器时回退到备用后端
/// 或静态占位图，而不是在 `init` 内抛出。
pub fn probe_backend() -> bool {
    let instance = wgpu::Instance::default();
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .is_some()
}

/// 清屏颜色：接近纯黑的深蓝，衬托加法混合的辉光
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.004,
    g: 0.006,
    b: 0.012,
    a: 1.0,
};

/// 两后端共用的管线与缓冲资源
///
/// 后端只在着色器源上分歧：经典后端使用手写 WGSL，表达式图后端
/// 使用由表达式节点降低出的 WGSL。其余管线状态完全一致。
pub struct BackendResources {
    pub(crate) particle_pipeline: wgpu::RenderPipeline,
    pub(crate) route_pipeline: wgpu::RenderPipeline,
    pub(crate) quad_buffer: wgpu::Buffer,
    pub(crate) instance_buffer: wgpu::Buffer,
    pub(crate) route_buffer: wgpu::Buffer,
    pub(crate) uniform_buffer: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
    pub(crate) instance_capacity: u32,
    pub(crate) route_capacity: u32,
    pub(crate) instance_count: u32,
    pub(crate) route_count: u32,
}

/// 单位四边形（triangle strip），着色器内扩展为点精灵
const QUAD_VERTICES: [[f32; 2]; 4] = [[-0.5, -0.5], [0.5, -0.5], [-0.5, 0.5], [0.5, 0.5]];

/// 航线线条 WGSL：透明度与虚线在 CPU 侧算好，此处只做变换与混合
const ROUTE_SHADER: &str = r#"
struct SceneUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    model: mat4x4<f32>,
    camera_pos: vec3<f32>,
    time: f32,
    base_size: f32,
    fade_lo: f32,
    fade_hi: f32,
    _pad0: f32,
    viewport: vec2<f32>,
    _pad1: vec2<f32>,
};
@group(0) @binding(0) var<uniform> uniforms: SceneUniforms;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) alpha: f32,
};

@vertex
fn vs(
    @location(0) v_pos: vec3<f32>,
    @location(1) v_alpha: f32,
    @location(2) v_color: vec3<f32>,
) -> VsOut {
    let world = uniforms.model * vec4<f32>(v_pos, 1.0);
    let clip = uniforms.proj * uniforms.view * world;
    return VsOut(clip, v_color, v_alpha);
}

@fragment
fn fs(@location(0) color: vec3<f32>, @location(1) alpha: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(color * alpha, alpha);
}
"#;

impl BackendResources {
    /// 由粒子着色器源构建全部 GPU 资源
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        particle_shader_src: &str,
        instance_capacity: u32,
        route_capacity: u32,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Quad Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Instance Buffer"),
            size: instance_capacity as u64 * std::mem::size_of::<GpuParticleInstance>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let route_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Route Vertex Buffer"),
            size: route_capacity as u64 * std::mem::size_of::<RouteVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniform Buffer"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene BG"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // 加法混合：重叠粒子叠亮而不是遮挡
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let particle_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(particle_shader_src.into()),
        });

        let particle_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &particle_shader,
                entry_point: "vs",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: (std::mem::size_of::<f32>() * 2) as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<GpuParticleInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &[
                            wgpu::VertexAttribute {
                                offset: 0,
                                shader_location: 1,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                            wgpu::VertexAttribute {
                                offset: 12,
                                shader_location: 2,
                                format: wgpu::VertexFormat::Float32,
                            },
                            wgpu::VertexAttribute {
                                offset: 16,
                                shader_location: 3,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                        ],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &particle_shader,
                entry_point: "fs",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let route_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Route Shader"),
            source: wgpu::ShaderSource::Wgsl(ROUTE_SHADER.into()),
        });

        let route_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Route Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &route_shader,
                entry_point: "vs",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<RouteVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: 12,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32,
                        },
                        wgpu::VertexAttribute {
                            offset: 16,
                            shader_location: 2,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &route_shader,
                entry_point: "fs",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            particle_pipeline,
            route_pipeline,
            quad_buffer,
            instance_buffer,
            route_buffer,
            uniform_buffer,
            bind_group,
            instance_capacity,
            route_capacity,
            instance_count: 0,
            route_count: 0,
        }
    }

    /// 上传一帧数据
    pub fn upload(
        &mut self,
        queue: &wgpu::Queue,
        particles: &[GpuParticleInstance],
        routes: &[RouteVertex],
        uniforms: &SceneUniforms,
    ) {
        let instance_count = particles.len().min(self.instance_capacity as usize);
        if instance_count < particles.len() {
            tracing::warn!(
                target: "render",
                "Instance buffer capacity exceeded: {} > {}",
                particles.len(),
                self.instance_capacity
            );
        }
        if instance_count > 0 {
            queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(&particles[..instance_count]),
            );
        }
        self.instance_count = instance_count as u32;

        let route_count = routes.len().min(self.route_capacity as usize);
        if route_count > 0 {
            queue.write_buffer(
                &self.route_buffer,
                0,
                bytemuck::cast_slice(&routes[..route_count]),
            );
        }
        self.route_count = route_count as u32;

        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// 录制渲染通道
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Field Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_bind_group(0, &self.bind_group, &[]);

        if self.instance_count > 0 {
            pass.set_pipeline(&self.particle_pipeline);
            pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            pass.draw(0..4, 0..self.instance_count);
        }

        if self.route_count > 0 {
            pass.set_pipeline(&self.route_pipeline);
            pass.set_vertex_buffer(0, self.route_buffer.slice(..));
            pass.draw(0..self.route_count, 0..1);
        }
    }
}
