//! GPU 上下文
//!
//! 引擎拥有作用域在宿主表面上的 wgpu 实例、设备与表面配置，
//! 宿主发出卸载信号时随引擎一并释放。

use crate::core::error::RenderError;

/// wgpu 设备与表面的集合
pub struct GpuContext {
    /// 渲染表面
    pub surface: wgpu::Surface<'static>,
    /// 设备
    pub device: wgpu::Device,
    /// 命令队列
    pub queue: wgpu::Queue,
    /// 表面配置
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// 创建上下文
    ///
    /// `target` 为宿主提供的不透明可绘制表面句柄。
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: Some("Particle Field Device"),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceRequest(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats[0];
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: caps.present_modes[0],
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::info!(
            target: "render",
            "GPU context created: {:?}, surface {}x{}",
            adapter.get_info().backend,
            width,
            height
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    /// 重新配置表面尺寸
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
    }

    /// 当前表面尺寸
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}
