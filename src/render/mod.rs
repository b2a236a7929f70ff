//! 渲染模块
//!
//! 着色器管线把粒子存储光栅化为屏幕空间点精灵：点大小随视深做
//! 透视衰减，按朝向角平滑压暗背面，圆形足迹软边衰减，加法混合
//! 叠亮。两个后端实现同一契约且视觉等价。

pub mod backend;
pub mod camera;
pub mod classic;
pub mod context;
pub mod node_graph;

pub use backend::{probe_backend, ShaderBackend};
pub use camera::{Camera, SceneUniforms};
pub use classic::ClassicBackend;
pub use context::GpuContext;
pub use node_graph::{Expr, NodeGraphBackend, ShaderGraph};
