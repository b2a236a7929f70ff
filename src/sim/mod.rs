//! 粒子仿真模块
//!
//! 包含扁平并行数组的粒子存储、逐帧弹簧/斥力积分器和形变控制器。

pub mod morph;
pub mod physics;
pub mod store;

pub use morph::{MorphController, MorphState};
pub use physics::{integrate, repulsion_impulse, PhysicsParams};
pub use store::{GpuParticleInstance, ParticleStore};
