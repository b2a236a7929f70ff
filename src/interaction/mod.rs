//! 交互解析模块
//!
//! 把指针/相机状态投影到仿真坐标空间：从相机经指针 NDC 投射射线，
//! 与不可见碰撞面（比粒子半径略大的球，或 z = 0 平面）求交。命中点
//! 必须先经整体旋转的逆变换转入仿真局部空间再用作斥力源——粒子系统
//! 自身带惯性旋转时漏掉这步是常见缺陷。
//!
//! 标记悬停采用进入/退出双阈值（滞回），指针停在边界附近时不闪烁。
//! 悬停只驱动 UI 高亮，不参与物理，因此按固定间隔节流轮询。

use glam::{Quat, Vec2, Vec3};

use crate::core::clock::SimulationClock;
use crate::manifold::Manifold;
use crate::overlay::MarkerDescriptor;
use crate::render::camera::Camera;

/// 进入悬停的角距阈值（弧度，约 3.4°）
pub const HOVER_ENTER_ANGLE: f32 = 0.06;

/// 退出悬停的角距阈值（弧度，约 4.9°）
pub const HOVER_EXIT_ANGLE: f32 = 0.085;

/// 悬停轮询间隔（秒）
const HOVER_POLL_INTERVAL: f32 = 0.1;

/// 碰撞球相对粒子球的放大系数
const COLLISION_SPHERE_SCALE: f32 = 1.08;

/// 一条射线
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// 起点
    pub origin: Vec3,
    /// 单位方向
    pub dir: Vec3,
}

impl Ray {
    /// 从相机经 NDC 坐标投射射线
    pub fn from_ndc(camera: &Camera, ndc: Vec2) -> Self {
        let inv_vp = (camera.proj() * camera.view()).inverse();
        let near = inv_vp.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inv_vp.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        Self {
            origin: camera.eye,
            dir: (far - near).normalize_or_zero(),
        }
    }

    /// 与以原点为中心的球求交，返回最近的正向命中点
    pub fn intersect_sphere(&self, radius: f32) -> Option<Vec3> {
        // |o + t·d|² = r²，解一元二次方程
        let b = self.origin.dot(self.dir);
        let c = self.origin.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t = if -b - sqrt_disc > 0.0 {
            -b - sqrt_disc
        } else if -b + sqrt_disc > 0.0 {
            -b + sqrt_disc
        } else {
            return None;
        };
        Some(self.origin + self.dir * t)
    }

    /// 与 z = 0 平面求交
    pub fn intersect_plane_z0(&self) -> Option<Vec3> {
        if self.dir.z.abs() < f32::EPSILON {
            return None;
        }
        let t = -self.origin.z / self.dir.z;
        if t <= 0.0 {
            return None;
        }
        Some(self.origin + self.dir * t)
    }
}

/// 交互状态，每帧重算
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionState {
    /// 指针 NDC 坐标（在表面上时）
    pub pointer_ndc: Option<Vec2>,
    /// 仿真局部空间命中点
    pub hit_point: Option<Vec3>,
    /// 悬停的标记下标
    pub hovered_marker: Option<usize>,
}

/// 交互解析器
pub struct InteractionResolver {
    state: InteractionState,
    /// 上次悬停轮询的仿真时刻
    last_hover_poll: f32,
}

impl InteractionResolver {
    /// 创建解析器
    pub fn new() -> Self {
        Self {
            state: InteractionState::default(),
            last_hover_poll: f32::NEG_INFINITY,
        }
    }

    /// 当前状态
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// 解析一帧交互
    ///
    /// `rotation_y` 为施加在整个粒子系统上的 Y 轴旋转；命中点经其
    /// 逆变换转入局部空间。指针缺失或在 NDC 方块之外时清除命中点
    /// 并衰减悬停状态。
    pub fn resolve(
        &mut self,
        pointer_ndc: Option<Vec2>,
        camera: &Camera,
        manifold: &Manifold,
        rotation_y: f32,
        markers: &[MarkerDescriptor],
        clock: &SimulationClock,
    ) -> &InteractionState {
        let ndc = match pointer_ndc {
            Some(p) if p.x.abs() <= 1.0 && p.y.abs() <= 1.0 => p,
            _ => {
                self.state = InteractionState::default();
                return &self.state;
            }
        };

        let ray = Ray::from_ndc(camera, ndc);
        let world_hit = match manifold {
            Manifold::Sphere { radius } => {
                ray.intersect_sphere(radius * COLLISION_SPHERE_SCALE)
            }
            Manifold::Plane { .. } => ray.intersect_plane_z0(),
        };

        let local_hit = world_hit.map(|hit| {
            // 整体旋转的逆：世界命中点 → 仿真局部空间
            Quat::from_rotation_y(-rotation_y) * hit
        });

        self.state.pointer_ndc = Some(ndc);
        self.state.hit_point = local_hit;

        match local_hit {
            Some(hit) if !markers.is_empty() => {
                if clock.elapsed() - self.last_hover_poll >= HOVER_POLL_INTERVAL {
                    self.last_hover_poll = clock.elapsed();
                    self.state.hovered_marker =
                        resolve_hover(hit, markers, self.state.hovered_marker);
                }
            }
            _ => {
                self.state.hovered_marker = None;
            }
        }

        &self.state
    }
}

impl Default for InteractionResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// 滞回悬停判定
///
/// 已悬停的标记在退出阈值内保持悬停；否则取进入阈值内角距最近
/// 的标记。`enter < exit` 防止边界闪烁。
fn resolve_hover(
    hit: Vec3,
    markers: &[MarkerDescriptor],
    previous: Option<usize>,
) -> Option<usize> {
    let hit_dir = hit.normalize_or_zero();
    if hit_dir == Vec3::ZERO {
        return None;
    }

    let angle_to = |index: usize| -> f32 {
        markers[index]
            .direction
            .dot(hit_dir)
            .clamp(-1.0, 1.0)
            .acos()
    };

    if let Some(prev) = previous {
        if prev < markers.len() && angle_to(prev) < HOVER_EXIT_ANGLE {
            return Some(prev);
        }
    }

    let mut best: Option<(usize, f32)> = None;
    for index in 0..markers.len() {
        let angle = angle_to(index);
        if angle < HOVER_ENTER_ANGLE {
            match best {
                Some((_, best_angle)) if best_angle <= angle => {}
                _ => best = Some((index, angle)),
            }
        }
    }
    best.map(|(index, _)| index)
}
