//! 物理积分器
//!
//! 每帧对全部 `count` 个粒子做 O(count) 独立更新，无空间索引
//! （数万粒子规模下不需要）。任何粒子的更新不读取其他粒子的
//! 位置，保持完全可并行的性质。
//!
//! ## 逐粒子更新顺序
//! 1. 指针命中点在斥力半径内时，沿径向外推，强度 `(1 - d/r)² × strength`
//! 2. 弹簧项把速度拉向目标（单极点临界阻尼，不做完整弹簧-质量-阻尼）
//! 3. 速度无条件衰减 `velocity *= damping`，无弹簧项时粒子也能静定
//! 4. `position += velocity`，再把位置直接向目标混合 `return_speed`
//!
//! 第 4 步的双重校正是粒子干净“吸附”回轮廓而不漂移的原因。

use glam::Vec3;

use crate::sim::store::ParticleStore;

/// 物理参数（引擎级可调，非逐粒子）
#[derive(Debug, Clone, Copy)]
pub struct PhysicsParams {
    /// 斥力强度
    pub repulsion_strength: f32,
    /// 斥力作用半径
    pub repulsion_radius: f32,
    /// 回位速度
    pub return_speed: f32,
    /// 速度衰减系数
    pub damping: f32,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            repulsion_strength: 0.12,
            repulsion_radius: 1.8,
            return_speed: 0.08,
            damping: 0.93,
        }
    }
}

/// 斥力冲量大小
///
/// 在 `[0, radius)` 内随距离严格递减，达到或超出半径时恰为零。
pub fn repulsion_impulse(dist: f32, radius: f32, strength: f32) -> f32 {
    if dist >= radius || radius <= 0.0 {
        return 0.0;
    }
    let falloff = 1.0 - dist / radius;
    falloff * falloff * strength
}

/// 积分一帧
///
/// `hit` 为交互解析器给出的仿真局部空间命中点；`None` 表示无交互。
/// 就地修改 `positions` / `velocities`，不触碰其他缓冲。
pub fn integrate(store: &mut ParticleStore, hit: Option<Vec3>, params: &PhysicsParams) {
    let count = store.count();
    for i in 0..count {
        let target = store.targets[i];
        let mut velocity = store.velocities[i];
        let mut position = store.positions[i];

        if let Some(hit_point) = hit {
            let away = position - hit_point;
            let dist = away.length();
            let impulse = repulsion_impulse(dist, params.repulsion_radius, params.repulsion_strength);
            if impulse > 0.0 && dist > f32::EPSILON {
                velocity += away / dist * impulse;
            }
        }

        velocity += (target - position) * params.return_speed;
        velocity *= params.damping;

        position += velocity;
        position = position.lerp(target, params.return_speed);

        store.velocities[i] = velocity;
        store.positions[i] = position;
    }
}
