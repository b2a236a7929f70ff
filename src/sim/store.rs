//! 粒子存储
//!
//! 扁平并行数组（struct-of-arrays）而非粒子对象数组：积分器与
//! 着色器管线可以零分配地流式处理，也为将来的 compute shader /
//! SIMD 移植保留完全独立的逐粒子更新性质。粒子一律以整数下标
//! 引用，不以对象引用传递。

use glam::Vec3;
use rand::Rng;

use crate::manifold::Manifold;
use crate::sampler::SampleSet;

/// GPU 粒子实例（对应 WGSL struct）
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticleInstance {
    /// 位置（仿真局部空间）
    pub position: [f32; 3],
    /// 点大小系数
    pub size: f32,
    /// 颜色
    pub color: [f32; 3],
    /// 填充对齐到 32 字节
    pub _pad: f32,
}

/// 粒子存储
///
/// 所有数组长度恒等于 `count`。`targets` 在形状切换时整体覆盖，
/// 从不逐元素修改。
pub struct ParticleStore {
    /// 当前位置
    pub positions: Vec<Vec3>,
    /// 目标位置（静止时即原始位置）
    pub targets: Vec<Vec3>,
    /// 速度
    pub velocities: Vec<Vec3>,
    /// 颜色
    pub colors: Vec<Vec3>,
    /// 点大小系数
    pub sizes: Vec<f32>,
}

/// 边缘采样粒子的大小加成
const EDGE_SIZE_BOOST: f32 = 1.25;

impl ParticleStore {
    /// 由采样集在流形上初始化粒子
    ///
    /// 初始位置即目标位置，速度为零。边缘粒子略大，颜色在基色
    /// 附近做小幅随机扰动，避免完全均匀的色块。
    pub fn from_samples<R: Rng>(
        set: &SampleSet,
        manifold: &Manifold,
        base_color: Vec3,
        rng: &mut R,
    ) -> Self {
        let count = set.len();
        let mut positions = Vec::with_capacity(count);
        let mut colors = Vec::with_capacity(count);
        let mut sizes = Vec::with_capacity(count);

        for p in &set.points {
            positions.push(manifold.project_uv(p.u, p.v));
            let tint = 1.0 + rng.gen_range(-0.15..0.15);
            colors.push((base_color * tint).clamp(Vec3::ZERO, Vec3::ONE));
            sizes.push(if p.edge { EDGE_SIZE_BOOST } else { 1.0 });
        }

        Self {
            targets: positions.clone(),
            velocities: vec![Vec3::ZERO; count],
            positions,
            colors,
            sizes,
        }
    }

    /// 粒子数量
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    /// 整体覆盖目标位置
    ///
    /// 长度不符时截断或以最后一个目标补齐，保持数组长度不变量。
    pub fn set_targets(&mut self, targets: &[Vec3]) {
        let count = self.count();
        if targets.is_empty() || count == 0 {
            return;
        }
        for i in 0..count {
            self.targets[i] = *targets.get(i).unwrap_or(
                targets.last().unwrap_or(&Vec3::ZERO),
            );
        }
    }

    /// 写出 GPU 实例数据
    ///
    /// 复用调用方提供的缓冲，避免每帧分配。
    pub fn write_instances(&self, out: &mut Vec<GpuParticleInstance>) {
        out.clear();
        out.reserve(self.count());
        for i in 0..self.count() {
            out.push(GpuParticleInstance {
                position: self.positions[i].to_array(),
                size: self.sizes[i],
                color: self.colors[i].to_array(),
                _pad: 0.0,
            });
        }
    }
}
