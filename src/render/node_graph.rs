//! 表达式图着色器后端
//!
//! 以可组合的表达式节点描述着色数学，再降低为与经典后端相同的
//! WGSL。表达式可以在 CPU 侧求值，测试据此验证两个后端的着色
//! 数学逐项一致。uniform 名称与语义与经典后端共享。

use glam::Vec3;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::core::error::RenderError;
use crate::overlay::RouteVertex;
use crate::render::backend::{BackendResources, ShaderBackend};
use crate::render::camera::SceneUniforms;
use crate::sim::store::GpuParticleInstance;

/// 表达式节点
#[derive(Debug, Clone)]
pub enum Expr {
    /// 场景 uniform 字段引用
    Uniform(&'static str),
    /// 顶点/实例属性或图内中间量引用
    Attribute(&'static str),
    /// 标量字面量
    Literal(f32),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Dot(Box<Expr>, Box<Expr>),
    Normalize(Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
    Smoothstep {
        lo: Box<Expr>,
        hi: Box<Expr>,
        x: Box<Expr>,
    },
}

/// CPU 求值结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Scalar(f32),
    Vector(Vec3),
}

impl Value {
    fn scalar(self) -> f32 {
        match self {
            Value::Scalar(s) => s,
            Value::Vector(_) => f32::NAN,
        }
    }
}

/// CPU 求值环境：名字到值的绑定
pub type EvalContext = HashMap<&'static str, Value>;

impl Expr {
    /// 降低为 WGSL 表达式文本
    pub fn to_wgsl(&self) -> String {
        match self {
            Expr::Uniform(name) => format!("uniforms.{}", name),
            Expr::Attribute(name) => (*name).to_string(),
            Expr::Literal(v) => format!("{:?}", v),
            Expr::Add(a, b) => format!("({} + {})", a.to_wgsl(), b.to_wgsl()),
            Expr::Sub(a, b) => format!("({} - {})", a.to_wgsl(), b.to_wgsl()),
            Expr::Mul(a, b) => format!("({} * {})", a.to_wgsl(), b.to_wgsl()),
            Expr::Div(a, b) => format!("({} / {})", a.to_wgsl(), b.to_wgsl()),
            Expr::Neg(a) => format!("(-{})", a.to_wgsl()),
            Expr::Dot(a, b) => format!("dot({}, {})", a.to_wgsl(), b.to_wgsl()),
            Expr::Normalize(a) => format!("normalize({})", a.to_wgsl()),
            Expr::Max(a, b) => format!("max({}, {})", a.to_wgsl(), b.to_wgsl()),
            Expr::Smoothstep { lo, hi, x } => format!(
                "smoothstep({}, {}, {})",
                lo.to_wgsl(),
                hi.to_wgsl(),
                x.to_wgsl()
            ),
        }
    }

    /// CPU 求值（测试后端等价性用）
    pub fn eval(&self, ctx: &EvalContext) -> Value {
        match self {
            Expr::Uniform(name) | Expr::Attribute(name) => {
                *ctx.get(name).unwrap_or(&Value::Scalar(f32::NAN))
            }
            Expr::Literal(v) => Value::Scalar(*v),
            Expr::Add(a, b) => binary(a.eval(ctx), b.eval(ctx), |x, y| x + y),
            Expr::Sub(a, b) => binary(a.eval(ctx), b.eval(ctx), |x, y| x - y),
            Expr::Mul(a, b) => binary(a.eval(ctx), b.eval(ctx), |x, y| x * y),
            Expr::Div(a, b) => binary(a.eval(ctx), b.eval(ctx), |x, y| x / y),
            Expr::Neg(a) => match a.eval(ctx) {
                Value::Scalar(s) => Value::Scalar(-s),
                Value::Vector(v) => Value::Vector(-v),
            },
            Expr::Dot(a, b) => match (a.eval(ctx), b.eval(ctx)) {
                (Value::Vector(x), Value::Vector(y)) => Value::Scalar(x.dot(y)),
                _ => Value::Scalar(f32::NAN),
            },
            Expr::Normalize(a) => match a.eval(ctx) {
                Value::Vector(v) => Value::Vector(v.normalize_or_zero()),
                Value::Scalar(_) => Value::Scalar(f32::NAN),
            },
            Expr::Max(a, b) => Value::Scalar(a.eval(ctx).scalar().max(b.eval(ctx).scalar())),
            Expr::Smoothstep { lo, hi, x } => {
                let lo = lo.eval(ctx).scalar();
                let hi = hi.eval(ctx).scalar();
                let x = x.eval(ctx).scalar();
                Value::Scalar(crate::overlay::smoothstep(lo, hi, x))
            }
        }
    }
}

/// 逐分量二元运算（标量按 WGSL 语义广播到向量）
fn binary(a: Value, b: Value, f: impl Fn(f32, f32) -> f32) -> Value {
    match (a, b) {
        (Value::Scalar(x), Value::Scalar(y)) => Value::Scalar(f(x, y)),
        (Value::Vector(x), Value::Scalar(y)) => {
            Value::Vector(Vec3::new(f(x.x, y), f(x.y, y), f(x.z, y)))
        }
        (Value::Scalar(x), Value::Vector(y)) => {
            Value::Vector(Vec3::new(f(x, y.x), f(x, y.y), f(x, y.z)))
        }
        (Value::Vector(x), Value::Vector(y)) => {
            Value::Vector(Vec3::new(f(x.x, y.x), f(x.y, y.y), f(x.z, y.z)))
        }
    }
}

/// 粒子着色图：两个命名输出
pub struct ShaderGraph {
    /// 点大小（像素）
    pub point_size: Expr,
    /// 朝向渐隐系数
    pub fade: Expr,
    /// 片元软边衰减
    pub soft_edge: Expr,
}

impl ShaderGraph {
    /// 默认粒子着色图：与经典后端逐项相同的数学
    pub fn particle_default() -> Self {
        use Expr::*;
        Self {
            // base_size * i_size / max(eps, -view_z)
            point_size: Div(
                Box::new(Mul(
                    Box::new(Uniform("base_size")),
                    Box::new(Attribute("i_size")),
                )),
                Box::new(Max(
                    Box::new(Literal(0.0001)),
                    Box::new(Neg(Box::new(Attribute("view_z")))),
                )),
            ),
            // smoothstep(fade_lo, fade_hi, dot(normalize(world_pos), normalize(camera_pos)))
            fade: Smoothstep {
                lo: Box::new(Uniform("fade_lo")),
                hi: Box::new(Uniform("fade_hi")),
                x: Box::new(Dot(
                    Box::new(Normalize(Box::new(Attribute("world_pos")))),
                    Box::new(Normalize(Box::new(Uniform("camera_pos")))),
                )),
            },
            // smoothstep(0.5, 0.35, d)
            soft_edge: Smoothstep {
                lo: Box::new(Literal(0.5)),
                hi: Box::new(Literal(0.35)),
                x: Box::new(Attribute("d")),
            },
        }
    }

    /// 降低为完整 WGSL 着色器
    ///
    /// 骨架（属性装配、矩阵变换、圆形丢弃）固定，三个表达式输出
    /// 内联到对应位置。uniform 布局与经典后端完全一致。
    pub fn emit_wgsl(&self) -> String {
        let mut src = String::new();
        src.push_str(
            r#"
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
    let world_pos = (uniforms.model * vec4<f32>(i_pos, 1.0)).xyz;
    let view_pos = uniforms.view * vec4<f32>(world_pos, 1.0);
    let view_z = view_pos.z;
"#,
        );
        let _ = writeln!(src, "    let point_size = {};", self.point_size.to_wgsl());
        let _ = writeln!(src, "    let fade = {};", self.fade.to_wgsl());
        src.push_str(
            r#"    var clip = uniforms.proj * view_pos;
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
"#,
        );
        let _ = writeln!(src, "    let soft = {};", self.soft_edge.to_wgsl());
        src.push_str(
            r#"    return vec4<f32>(color * fade * soft, soft);
}
"#,
        );
        src
    }
}

/// 表达式图后端
pub struct NodeGraphBackend {
    resources: BackendResources,
    /// 生成的着色器源（诊断用）
    source: String,
}

impl NodeGraphBackend {
    /// 由默认粒子着色图创建后端
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        instance_capacity: u32,
        route_capacity: u32,
    ) -> Self {
        Self::with_graph(
            device,
            surface_format,
            &ShaderGraph::particle_default(),
            instance_capacity,
            route_capacity,
        )
    }

    /// 由自定义着色图创建后端
    pub fn with_graph(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        graph: &ShaderGraph,
        instance_capacity: u32,
        route_capacity: u32,
    ) -> Self {
        let source = graph.emit_wgsl();
        tracing::debug!(target: "render", "Node graph lowered to {} bytes of WGSL", source.len());
        Self {
            resources: BackendResources::new(
                device,
                surface_format,
                &source,
                instance_capacity,
                route_capacity,
            ),
            source,
        }
    }

    /// 生成的 WGSL 源
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl ShaderBackend for NodeGraphBackend {
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
        "node_graph"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{facing_fade, FADE_HI, FADE_LO};

    #[test]
    fn test_lowered_wgsl_matches_classic_math() {
        let graph = ShaderGraph::particle_default();
        let src = graph.emit_wgsl();
        // 与经典后端相同的三个着色项
        assert!(src.contains("max(0.0001, (-view_z))"));
        assert!(src.contains("smoothstep(uniforms.fade_lo, uniforms.fade_hi"));
        assert!(src.contains("smoothstep(0.5, 0.35, d)"));
        // 共享 uniform 布局
        for name in ["base_size", "fade_lo", "fade_hi", "camera_pos", "viewport"] {
            assert!(src.contains(name));
        }
    }

    #[test]
    fn test_fade_expr_matches_cpu_reference() {
        let graph = ShaderGraph::particle_default();
        let cases = [
            (Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 30.0)),
            (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 30.0)),
            (Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 30.0)),
            (Vec3::new(0.3, -0.8, 0.5), Vec3::new(5.0, 3.0, 20.0)),
        ];
        for (world, camera) in cases {
            let mut ctx = EvalContext::new();
            ctx.insert("world_pos", Value::Vector(world));
            ctx.insert("camera_pos", Value::Vector(camera));
            ctx.insert("fade_lo", Value::Scalar(FADE_LO));
            ctx.insert("fade_hi", Value::Scalar(FADE_HI));

            let Value::Scalar(graph_fade) = graph.fade.eval(&ctx) else {
                panic!("fade must be scalar");
            };
            let reference = facing_fade(world, camera);
            assert!(
                (graph_fade - reference).abs() < 1e-6,
                "graph fade {} != reference {}",
                graph_fade,
                reference
            );
        }
    }

    #[test]
    fn test_point_size_expr_attenuates_with_depth() {
        let graph = ShaderGraph::particle_default();
        let size_at = |view_z: f32| -> f32 {
            let mut ctx = EvalContext::new();
            ctx.insert("base_size", Value::Scalar(6.0));
            ctx.insert("i_size", Value::Scalar(1.0));
            ctx.insert("view_z", Value::Scalar(view_z));
            graph.point_size.eval(&ctx).scalar()
        };
        // 视空间深度为负，越远（更负）点越小
        assert!(size_at(-10.0) > size_at(-20.0));
        // 极近处被 eps 钳制，不发散
        assert!(size_at(-1e-8).is_finite());
    }

    #[test]
    fn test_expr_wgsl_emission() {
        use Expr::*;
        let expr = Mul(
            Box::new(Uniform("base_size")),
            Box::new(Add(Box::new(Literal(1.0)), Box::new(Attribute("i_size")))),
        );
        assert_eq!(expr.to_wgsl(), "(uniforms.base_size * (1.0 + i_size))");
    }
}
