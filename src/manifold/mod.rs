//! 流形映射模块
//!
//! 将归一化图像坐标 `(u, v)` 投影到目标流形：球面或平面轮廓。
//!
//! 球面映射公式为引擎内唯一权威版本，粒子、标记、航线全部经由
//! 同一个 `latlon_to_cartesian` 投影。标记若使用另一套经纬度转换
//! 公式会与粒子轮廓产生可见错位，这是此类实现的已知缺陷类型。

use glam::{Vec2, Vec3};

use crate::sampler::{SamplePoint, SampleSet};

/// 平面帧：由采样集包围盒推导的居中缩放
///
/// 让轮廓无论源图宽高比如何都充满视口。视口尺寸变化时必须在
/// 下一帧之前重新计算，而不是惰性求值。
#[derive(Debug, Clone, Copy)]
pub struct PlaneFrame {
    /// 包围盒中心（uv 空间）
    center: Vec2,
    /// uv 到仿真空间的统一缩放
    scale: f32,
    /// 视口宽高比补偿（x 方向）
    aspect: f32,
}

impl PlaneFrame {
    /// 由采样集包围盒与半幅构建
    pub fn from_samples(set: &SampleSet, half_extent: f32, viewport_aspect: f32) -> Self {
        Self::from_points(&set.points, half_extent, viewport_aspect)
    }

    /// 由采样点切片构建
    ///
    /// 包围盒较长的一边被缩放到 `2 * half_extent`。空切片退化为
    /// 单位帧，避免除零。视口变化时用保留的 uv 采样点重建整个帧
    /// 并重投影粒子目标，帧本身不可变。
    pub fn from_points(points: &[SamplePoint], half_extent: f32, viewport_aspect: f32) -> Self {
        if points.is_empty() {
            return Self {
                center: Vec2::new(0.5, 0.5),
                scale: 2.0 * half_extent,
                aspect: viewport_aspect.max(f32::EPSILON),
            };
        }
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for p in points {
            min = min.min(Vec2::new(p.u, p.v));
            max = max.max(Vec2::new(p.u, p.v));
        }
        let extent = (max - min).max_element().max(f32::EPSILON);
        Self {
            center: (min + max) * 0.5,
            scale: 2.0 * half_extent / extent,
            aspect: viewport_aspect.max(f32::EPSILON),
        }
    }

    /// uv 投影到 z = 0 平面
    ///
    /// 图像 `v` 向下，仿真 `y` 向上，因此翻转纵轴。宽视口下
    /// 轮廓不做横向拉伸，保持 1:1 像素对应。
    pub fn project(&self, u: f32, v: f32) -> Vec3 {
        let centered = Vec2::new(u, v) - self.center;
        let aspect_fit = if self.aspect > 1.0 { 1.0 } else { self.aspect };
        Vec3::new(
            centered.x * self.scale * aspect_fit,
            -centered.y * self.scale * aspect_fit,
            0.0,
        )
    }
}

/// 目标流形
#[derive(Debug, Clone, Copy)]
pub enum Manifold {
    /// 球面（粒子地球仪变体）
    Sphere { radius: f32 },
    /// z = 0 平面（图像形变变体）
    Plane { frame: PlaneFrame },
}

impl Manifold {
    /// uv 采样坐标投影到流形
    pub fn project_uv(&self, u: f32, v: f32) -> Vec3 {
        match self {
            Manifold::Sphere { radius } => {
                let (lat, lon) = latlon_from_uv(u, v);
                latlon_to_cartesian(lat, lon, *radius)
            }
            Manifold::Plane { frame } => frame.project(u, v),
        }
    }

    /// 流形半径 / 半幅
    pub fn radius(&self) -> f32 {
        match self {
            Manifold::Sphere { radius } => *radius,
            Manifold::Plane { frame } => frame.scale * 0.5,
        }
    }

    /// 是否球面流形
    pub fn is_sphere(&self) -> bool {
        matches!(self, Manifold::Sphere { .. })
    }
}

/// uv 转经纬度（度）
///
/// `lat = asin(2v-1)`，`lon = 360u - 180`。
pub fn latlon_from_uv(u: f32, v: f32) -> (f32, f32) {
    let lat = (2.0 * v - 1.0).clamp(-1.0, 1.0).asin().to_degrees();
    let lon = 360.0 * u - 180.0;
    (lat, lon)
}

/// 经纬度（度）转 uv
pub fn uv_from_latlon(lat: f32, lon: f32) -> (f32, f32) {
    let v = (lat.to_radians().sin() + 1.0) * 0.5;
    let u = (lon + 180.0) / 360.0;
    (u, v)
}

/// 经纬度（度）转笛卡尔坐标
///
/// `phi = (90-lat)·π/180`，`theta = (lon+180)·π/180`，
/// `x = -r·sinφ·cosθ`，`y = r·cosφ`，`z = r·sinφ·sinθ`。
/// 标记与航线的落点必须复用本函数。
pub fn latlon_to_cartesian(lat: f32, lon: f32, radius: f32) -> Vec3 {
    let phi = (90.0 - lat).to_radians();
    let theta = (lon + 180.0).to_radians();
    Vec3::new(
        -radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

/// 笛卡尔坐标反推经纬度（度）
pub fn cartesian_to_latlon(p: Vec3) -> (f32, f32) {
    let radius = p.length().max(f32::EPSILON);
    let phi = (p.y / radius).clamp(-1.0, 1.0).acos();
    let lat = 90.0 - phi.to_degrees();
    let theta = p.z.atan2(-p.x);
    let theta = if theta < 0.0 {
        theta + std::f32::consts::TAU
    } else {
        theta
    };
    let lon = theta.to_degrees() - 180.0;
    (lat, lon)
}

/// 球面映射的逆：笛卡尔坐标反推 uv
pub fn sphere_unproject(p: Vec3) -> (f32, f32) {
    let (lat, lon) = cartesian_to_latlon(p);
    uv_from_latlon(lat, lon)
}
