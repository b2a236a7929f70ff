//! 经典着色器后端
//!
//! 传统顶点/片元程序，直接操作原始实例缓冲区。着色契约：
//! - 点大小 = `base_size / max(eps, -视空间深度)`，远粒子透视收缩
//! - 朝向渐隐：`smoothstep(fade_lo, fade_hi, dot(法线, 相机方向))`
//!   平滑压暗背面粒子而非剔除（剔除会在旋转时突然消失/出现）
//! - 片元按圆形足迹丢弃，软边衰减，加法混合叠亮

use crate::core::error::RenderError;
use crate::overlay::RouteVertex;
use crate::render::backend::{BackendResources, ShaderBackend};
use crate::render::camera::SceneUniforms;
use crate::sim::store::GpuParticleInstance;

/// 粒子点精灵 WGSL
///
/// uniform 名称与语义和表达式图后端共享（`base_size`、`fade_lo`、
/// `fade_hi`、`camera_pos`、`viewport`）。
pub const PARTICLE_SHADER: &str = r#"
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
    @location(1) uv: vec2<f32>,
    @location(2) fade: f32,
};

@vertex
fn vs(
    @location(0) v_pos: vec2<f32>,
    @location(1) i_pos: vec3<f32>,
    @location(2) i_size: f32,
    @location(3) i_color: vec3<f32>,
) -> VsOut {
    let world = uniforms.model * vec4<f32>(i_pos, 1.0);
    let view_pos = uniforms.view * world;
    let point_size = uniforms.base_size * i_size / max(0.0001, -view_pos.z);
    let facing = dot(normalize(world.xyz), normalize(uniforms.camera_pos));
    let fade = smoothstep(uniforms.fade_lo, uniforms.fade_hi, facing);
    var clip = uniforms.proj * view_pos;
    clip = vec4<f32>(
        clip.xy + v_pos * point_size / uniforms.viewport * 2.0 * clip.w,
        clip.zw
    );
    return VsOut(clip, i_color, v_pos + vec2<f32>(0.5, 0.5), fade);
}

@fragment
fn fs(
    @location(0) color: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) fade: f32,
) -> @location(0) vec4<f32> {
    let d = distance(uv, vec2<f32>(0.5, 0.5));
    if (d > 0.5) {
        discard;
    }
    let soft = smoothstep(0.5, 0.35, d);
    return vec4<f32>(color * fade * soft, soft);
}
"#;

/// 经典后端
pub struct ClassicBackend {
    resources: BackendResources,
}

impl ClassicBackend {
    /// 创建后端资源
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        instance_capacity: u32,
        route_capacity: u32,
    ) -> Self {
        Self {
            resources: BackendResources::new(
                device,
                surface_format,
                PARTICLE_SHADER,
                instance_capacity,
                route_capacity,
            ),
        }
    }
}

impl ShaderBackend for ClassicBackend {
    fn upload(
        &mut self,
        queue: &wgpu::Queue,
        particles: &[GpuParticleInstance],
        routes: &[RouteVertex],
        uniforms: &SceneUniforms,
    ) {
        self.resources.upload(queue, particles, routes, uniforms);
    }

    fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        self.resources.render(encoder, view);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "classic"
    }
}
