//! 相机与场景 Uniform
//!
//! 两个着色器后端共享同一份 `SceneUniforms` 布局与字段语义，
//! 对任一后端的调参同样作用于另一个。

use glam::{Mat4, Vec3};

/// 透视相机
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// 相机位置
    pub eye: Vec3,
    /// 注视点
    pub target: Vec3,
    /// 上方向
    pub up: Vec3,
    /// 垂直视场角（弧度）
    pub fovy: f32,
    /// 宽高比
    pub aspect: f32,
    /// 近裁剪面
    pub znear: f32,
    /// 远裁剪面
    pub zfar: f32,
}

impl Camera {
    /// 创建相机
    pub fn new(eye: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Y,
            fovy: 45.0_f32.to_radians(),
            aspect: aspect.max(f32::EPSILON),
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    /// 视图矩阵
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// 投影矩阵（wgpu 深度范围 [0, 1]）
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy, self.aspect, self.znear, self.zfar)
    }

    /// 视图投影矩阵
    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// 朝向渐隐使用的相机方向
    pub fn facing_dir(&self) -> Vec3 {
        self.eye.normalize_or_zero()
    }

    /// 更新宽高比（resize 时调用）
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }
}

/// 场景 Uniform（对应 WGSL struct，两后端共享）
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    /// 视图矩阵
    pub view: [[f32; 4]; 4],
    /// 投影矩阵
    pub proj: [[f32; 4]; 4],
    /// 模型矩阵（整体旋转）
    pub model: [[f32; 4]; 4],
    /// 相机位置
    pub camera_pos: [f32; 3],
    /// 仿真时间（秒）
    pub time: f32,
    /// 粒子基础点大小（像素）
    pub base_size: f32,
    /// 朝向渐隐下阈值
    pub fade_lo: f32,
    /// 朝向渐隐上阈值
    pub fade_hi: f32,
    /// 填充
    pub _pad0: f32,
    /// 视口尺寸（像素）
    pub viewport: [f32; 2],
    /// 填充对齐到 16 字节
    pub _pad1: [f32; 2],
}

impl SceneUniforms {
    /// 组装一帧的 Uniform
    pub fn new(
        camera: &Camera,
        model: Mat4,
        time: f32,
        base_size: f32,
        viewport: (u32, u32),
    ) -> Self {
        Self {
            view: camera.view().to_cols_array_2d(),
            proj: camera.proj().to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            camera_pos: camera.eye.to_array(),
            time,
            base_size,
            fade_lo: crate::overlay::FADE_LO,
            fade_hi: crate::overlay::FADE_HI,
            _pad0: 0.0,
            viewport: [viewport.0 as f32, viewport.1 as f32],
            _pad1: [0.0, 0.0],
        }
    }
}
