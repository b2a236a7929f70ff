//! 标记与航线叠加层
//!
//! 地球仪变体的辅助几何：脉动的位置标记，以及两点间的大圆弧航线。
//! 标记落点复用流形模块的同一投影公式，保证与粒子轮廓逐像素对齐。
//!
//! 标记以逐标记随机相位的正弦驱动透明度与缩放，避免肉眼可见的
//! 同步脉动。航线是预计算的球面插值弧线，带中点径向隆起，以持续
//! 滚动的虚线相位表达流向；一个巡游光点按 `(time·speed +
//! route_index·offset) mod 1` 在弧线采样点上行进。
//!
//! 叠加层与粒子场共用一套朝向渐隐数学（`facing_fade`），悬停或
//! 钉选的激活态以固定倍率增亮。

use glam::Vec3;
use rand::Rng;

use crate::manifold::latlon_to_cartesian;
use crate::sim::store::GpuParticleInstance;

/// 朝向渐隐下阈值（dot 值）
pub const FADE_LO: f32 = -0.65;

/// 朝向渐隐上阈值（dot 值）
pub const FADE_HI: f32 = 0.35;

/// 激活态（悬停/钉选）的透明度与缩放倍率
pub const ACTIVE_BOOST: f32 = 1.6;

/// 每条航线的弧线采样点数
const ARC_SAMPLES: usize = 64;

/// 弧线中点径向隆起比例
const ARC_BULGE: f32 = 0.18;

/// 虚线滚动速度（弧长比例/秒）
const DASH_SPEED: f32 = 0.25;

/// 虚线周期数与占空比
const DASH_COUNT: f32 = 14.0;
const DASH_DUTY: f32 = 0.55;

/// 巡游光点速度（弧长比例/秒）与相邻航线错相
const SPRITE_SPEED: f32 = 0.12;
const SPRITE_ROUTE_OFFSET: f32 = 0.37;

/// 标记脉动速度（弧度/秒）
const PULSE_SPEED: f32 = 2.4;

/// 标记基础点大小系数（相对粒子）
const MARKER_SIZE: f32 = 3.2;

/// 标记悬浮在球面上方的比例
const MARKER_LIFT: f32 = 1.02;

/// 平滑阶跃（与着色器 smoothstep 等价）
pub fn smoothstep(lo: f32, hi: f32, x: f32) -> f32 {
    let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// 朝向渐隐
///
/// 以外法线与相机方向的夹角余弦经平滑阈值映射到 `[0, 1]`：
/// 背面几何被压暗而不是剔除，旋转时不会突跳。粒子着色器内
/// 使用同名 uniform（`fade_lo`/`fade_hi`）执行同一计算。
pub fn facing_fade(normal: Vec3, camera_dir: Vec3) -> f32 {
    let facing = normal
        .normalize_or_zero()
        .dot(camera_dir.normalize_or_zero());
    smoothstep(FADE_LO, FADE_HI, facing)
}

/// 位置标记描述
#[derive(Debug, Clone)]
pub struct MarkerDescriptor {
    /// 标记名
    pub name: String,
    /// 流形上的单位方向
    pub direction: Vec3,
    /// 颜色
    pub color: Vec3,
    /// 脉动相位偏移（创建时随机一次）
    pub phase: f32,
}

impl MarkerDescriptor {
    /// 由经纬度创建，落点经流形的权威投影公式
    pub fn from_latlon<R: Rng>(
        name: impl Into<String>,
        lat: f32,
        lon: f32,
        color: Vec3,
        rng: &mut R,
    ) -> Self {
        Self {
            name: name.into(),
            direction: latlon_to_cartesian(lat, lon, 1.0).normalize(),
            color,
            phase: rng.gen_range(0.0..std::f32::consts::TAU),
        }
    }

    /// 由单位方向直接创建（测试与平面变体用）
    pub fn from_direction(
        name: impl Into<String>,
        direction: Vec3,
        color: Vec3,
        phase: f32,
    ) -> Self {
        Self {
            name: name.into(),
            direction: direction.normalize(),
            color,
            phase,
        }
    }

    /// 当前脉动：返回（透明度系数, 缩放系数）
    pub fn pulse(&self, time: f32) -> (f32, f32) {
        let wave = (time * PULSE_SPEED + self.phase).sin() * 0.5 + 0.5;
        (0.55 + 0.45 * wave, 0.8 + 0.4 * wave)
    }
}

/// 航线线条顶点（对应 WGSL struct）
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RouteVertex {
    /// 位置（仿真局部空间）
    pub position: [f32; 3],
    /// 透明度（已含朝向渐隐与虚线）
    pub alpha: f32,
    /// 颜色
    pub color: [f32; 3],
    /// 填充
    pub _pad: f32,
}

/// 航线描述
///
/// 弧线几何创建时计算一次，此后只有虚线相位随时间变化。
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    /// 起点单位方向
    pub start_dir: Vec3,
    /// 终点单位方向
    pub end_dir: Vec3,
    /// 基础透明度
    pub base_opacity: f32,
    /// 虚线相位
    pub dash_phase: f32,
    /// 颜色
    pub color: Vec3,
    /// 单位球上的弧线采样点（含隆起）
    arc: Vec<Vec3>,
}

impl RouteDescriptor {
    /// 在两个标记之间构建航线
    pub fn between(a: &MarkerDescriptor, b: &MarkerDescriptor, color: Vec3, base_opacity: f32) -> Self {
        let arc = (0..ARC_SAMPLES)
            .map(|i| {
                let t = i as f32 / (ARC_SAMPLES - 1) as f32;
                let dir = slerp_dir(a.direction, b.direction, t);
                // 中点隆起让弧线脱离球面，视觉上更像航线
                let lift = 1.0 + ARC_BULGE * (t * std::f32::consts::PI).sin();
                dir * lift
            })
            .collect();
        Self {
            start_dir: a.direction,
            end_dir: b.direction,
            base_opacity,
            dash_phase: 0.0,
            color,
            arc,
        }
    }

    /// 弧线采样点
    pub fn arc(&self) -> &[Vec3] {
        &self.arc
    }

    /// 巡游光点在弧线上的位置（单位球空间）
    pub fn sprite_position(&self, time: f32, route_index: usize) -> Vec3 {
        let t = (time * SPRITE_SPEED + route_index as f32 * SPRITE_ROUTE_OFFSET).rem_euclid(1.0);
        let idx = ((t * (ARC_SAMPLES - 1) as f32) as usize).min(ARC_SAMPLES - 1);
        self.arc[idx]
    }
}

/// 叠加层：标记与航线的集合
pub struct Overlay {
    /// 标记
    pub markers: Vec<MarkerDescriptor>,
    /// 航线
    pub routes: Vec<RouteDescriptor>,
    /// 钉选的标记下标（点击选中）
    pub pinned_marker: Option<usize>,
}

impl Overlay {
    /// 创建空叠加层
    pub fn new() -> Self {
        Self {
            markers: Vec::new(),
            routes: Vec::new(),
            pinned_marker: None,
        }
    }

    /// 推进时变相位
    pub fn update(&mut self, dt: f32) {
        for route in &mut self.routes {
            route.dash_phase = (route.dash_phase + dt * DASH_SPEED).rem_euclid(1.0);
        }
    }

    /// 某标记是否处于激活态（悬停或钉选）
    pub fn is_active(&self, index: usize, hovered: Option<usize>) -> bool {
        hovered == Some(index) || self.pinned_marker == Some(index)
    }

    /// 写出标记的粒子实例
    ///
    /// 标记经粒子着色器管线渲染，朝向渐隐在着色器内完成，
    /// 此处只负责脉动与激活倍率。
    pub fn write_marker_instances(
        &self,
        time: f32,
        radius: f32,
        hovered: Option<usize>,
        out: &mut Vec<GpuParticleInstance>,
    ) {
        for (index, marker) in self.markers.iter().enumerate() {
            let (opacity, scale) = marker.pulse(time);
            let boost = if self.is_active(index, hovered) {
                ACTIVE_BOOST
            } else {
                1.0
            };
            out.push(GpuParticleInstance {
                position: (marker.direction * radius * MARKER_LIFT).to_array(),
                size: MARKER_SIZE * scale * boost,
                color: (marker.color * opacity * boost).to_array(),
                _pad: 0.0,
            });
        }
    }

    /// 写出航线的虚线线段顶点（line list）
    ///
    /// 虚线通过跳过处于占空比之外的线段实现；每个顶点的透明度
    /// 由共享的 `facing_fade` 计算，与粒子着色保持一致。
    pub fn write_route_vertices(
        &self,
        radius: f32,
        camera_dir: Vec3,
        out: &mut Vec<RouteVertex>,
    ) {
        out.clear();
        for route in &self.routes {
            let last = route.arc.len() - 1;
            for i in 0..last {
                let t0 = i as f32 / last as f32;
                let dash = ((t0 - route.dash_phase) * DASH_COUNT).rem_euclid(1.0);
                if dash > DASH_DUTY {
                    continue;
                }
                for dir in [route.arc[i], route.arc[i + 1]] {
                    let fade = facing_fade(dir, camera_dir);
                    out.push(RouteVertex {
                        position: (dir * radius).to_array(),
                        alpha: route.base_opacity * fade,
                        color: route.color.to_array(),
                        _pad: 0.0,
                    });
                }
            }
        }
    }

    /// 写出巡游光点的粒子实例
    pub fn write_sprite_instances(
        &self,
        time: f32,
        radius: f32,
        out: &mut Vec<GpuParticleInstance>,
    ) {
        for (index, route) in self.routes.iter().enumerate() {
            let pos = route.sprite_position(time, index) * radius;
            out.push(GpuParticleInstance {
                position: pos.to_array(),
                size: MARKER_SIZE * 0.6,
                color: (route.color * 1.4).to_array(),
                _pad: 0.0,
            });
        }
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

/// 两单位方向间的球面线性插值
fn slerp_dir(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    let cos_omega = a.dot(b).clamp(-1.0, 1.0);
    let omega = cos_omega.acos();
    if omega < 1e-4 {
        return a.lerp(b, t).normalize_or_zero();
    }
    let sin_omega = omega.sin();
    (a * ((1.0 - t) * omega).sin() + b * (t * omega).sin()) / sin_omega
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_markers() -> (MarkerDescriptor, MarkerDescriptor) {
        (
            MarkerDescriptor::from_direction("a", Vec3::X, Vec3::ONE, 0.0),
            MarkerDescriptor::from_direction("b", Vec3::Z, Vec3::ONE, 1.0),
        )
    }

    #[test]
    fn test_marker_direction_is_unit() {
        let mut rng = StdRng::seed_from_u64(17);
        let marker = MarkerDescriptor::from_latlon("tokyo", 35.68, 139.69, Vec3::ONE, &mut rng);
        assert!((marker.direction.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_marker_phases_differ() {
        let mut rng = StdRng::seed_from_u64(17);
        let a = MarkerDescriptor::from_latlon("a", 0.0, 0.0, Vec3::ONE, &mut rng);
        let b = MarkerDescriptor::from_latlon("b", 0.0, 0.0, Vec3::ONE, &mut rng);
        assert_ne!(a.phase, b.phase);
    }

    #[test]
    fn test_route_endpoints_and_bulge() {
        let (a, b) = two_markers();
        let route = RouteDescriptor::between(&a, &b, Vec3::ONE, 0.8);
        let arc = route.arc();

        // 端点落在单位球上（端点处无隆起）
        assert!((arc[0].length() - 1.0).abs() < 1e-4);
        assert!((arc[arc.len() - 1].length() - 1.0).abs() < 1e-4);

        // 中点隆起
        let mid = arc[arc.len() / 2];
        assert!(mid.length() > 1.1);

        // 端点方向正确
        assert!((arc[0] - a.direction).length() < 1e-4);
        assert!((arc[arc.len() - 1] - b.direction).length() < 1e-4);
    }

    #[test]
    fn test_facing_fade_limits() {
        // 正对相机：完全可见
        assert!((facing_fade(Vec3::Z, Vec3::Z) - 1.0).abs() < 1e-6);
        // 背对相机：完全压暗
        assert_eq!(facing_fade(-Vec3::Z, Vec3::Z), 0.0);
        // 侧面：部分渐隐
        let side = facing_fade(Vec3::X, Vec3::Z);
        assert!(side > 0.0 && side < 1.0);
    }

    #[test]
    fn test_sprite_wraps_around_arc() {
        let (a, b) = two_markers();
        let route = RouteDescriptor::between(&a, &b, Vec3::ONE, 0.8);
        let p0 = route.sprite_position(0.0, 0);
        // 一个完整周期后回到同一点
        let p1 = route.sprite_position(1.0 / SPRITE_SPEED, 0);
        assert!((p0 - p1).length() < 1e-5);
    }

    #[test]
    fn test_active_state_boosts_marker() {
        let (a, _) = two_markers();
        let mut overlay = Overlay::new();
        overlay.markers.push(a);

        let mut plain = Vec::new();
        overlay.write_marker_instances(0.0, 10.0, None, &mut plain);
        let mut hovered = Vec::new();
        overlay.write_marker_instances(0.0, 10.0, Some(0), &mut hovered);

        assert!(hovered[0].size > plain[0].size);
        assert!(hovered[0].color[0] > plain[0].color[0]);
    }

    #[test]
    fn test_route_vertices_are_dashed_and_faded() {
        let (a, b) = two_markers();
        let mut overlay = Overlay::new();
        overlay.routes.push(RouteDescriptor::between(&a, &b, Vec3::ONE, 1.0));

        let mut verts = Vec::new();
        overlay.write_route_vertices(10.0, Vec3::Z, &mut verts);

        // 虚线跳段：顶点数少于完整弧线
        assert!(!verts.is_empty());
        assert!(verts.len() < (ARC_SAMPLES - 1) * 2);
        // 顶点成对（line list）
        assert_eq!(verts.len() % 2, 0);
        // 透明度不超过基础值
        assert!(verts.iter().all(|v| v.alpha <= 1.0));
    }

    #[test]
    fn test_dash_phase_advances_and_wraps() {
        let (a, b) = two_markers();
        let mut overlay = Overlay::new();
        overlay.routes.push(RouteDescriptor::between(&a, &b, Vec3::ONE, 1.0));

        overlay.update(1.0);
        let phase = overlay.routes[0].dash_phase;
        assert!(phase > 0.0 && phase < 1.0);

        overlay.update(10.0);
        assert!(overlay.routes[0].dash_phase < 1.0);
    }
}
