//! 引擎生命周期
//!
//! 引擎是单个帧驱动对象，不是场景图。宿主提供表面句柄、解码后的
//! RGBA 像素、指针/缩放事件和每帧一次的 `tick(dt)`；引擎内部按
//! 固定顺序执行：解析交互 → 形变推进 → 物理积分 → 上传缓冲 →
//! 渲染，全部同步完成。
//!
//! CPU 侧状态收在 [`EngineState`] 中，不持有任何 GPU 资源，因此
//! 采样、物理、形变与交互可以在无 GPU 的环境下完整测试。
//! [`Engine`] 在其上包一层 wgpu 上下文与着色器后端。

use glam::{Mat4, Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{BackendKind, EngineOptions, ManifoldKind};
use crate::core::clock::SimulationClock;
use crate::core::error::{EngineError, EngineResult, RenderError};
use crate::interaction::InteractionResolver;
use crate::manifold::{Manifold, PlaneFrame};
use crate::overlay::{MarkerDescriptor, Overlay, RouteDescriptor, RouteVertex};
use crate::render::backend::ShaderBackend;
use crate::render::camera::{Camera, SceneUniforms};
use crate::render::classic::ClassicBackend;
use crate::render::context::GpuContext;
use crate::render::node_graph::NodeGraphBackend;
use crate::sampler::{self, ImageSource, MaskPredicate, RasterMask, SamplePoint};
use crate::sim::morph::{MorphController, ShapeId};
use crate::sim::physics::{self, PhysicsParams};
use crate::sim::store::{GpuParticleInstance, ParticleStore};

/// 掩码亮度阈值
const LUMINANCE_THRESHOLD: f32 = 0.35;

/// 粒子基色（着色器内另有逐粒子扰动与朝向渐隐）
const BASE_COLOR: Vec3 = Vec3::new(0.35, 0.65, 1.0);

/// 相机距离相对流形半径的倍率
const CAMERA_DISTANCE: f32 = 3.0;

/// 叠加层实例的缓冲余量（标记 + 巡游光点）
const OVERLAY_INSTANCE_HEADROOM: u32 = 256;

/// 航线顶点缓冲容量
const ROUTE_VERTEX_CAPACITY: u32 = 8192;

/// 初始化日志订阅器
///
/// 宿主可选调用一次；重复调用或已有全局订阅器时静默忽略。
/// 过滤规则来自 `RUST_LOG`（如 `particle_field=debug,sampler=trace`）。
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// CPU 侧引擎状态
///
/// 不持有 GPU 资源。每帧 `step(dt)` 后，`instances()` 与
/// `route_vertices()` 给出待上传的缓冲内容。
pub struct EngineState {
    options: EngineOptions,
    clock: SimulationClock,
    manifold: Manifold,
    store: ParticleStore,
    /// 形状 A 的 uv 采样点，与粒子数等长
    ///
    /// 平面帧依赖视口宽高比，重投影必须回到 uv 空间进行，因此
    /// 采样点在初始化后一直保留。
    points_a: Vec<SamplePoint>,
    /// 形状 B（形变目标）的 uv 采样点，已循环补齐到粒子数
    points_b: Option<Vec<SamplePoint>>,
    morph: Option<MorphController>,
    resolver: InteractionResolver,
    overlay: Overlay,
    camera: Camera,
    params: PhysicsParams,
    /// 整体 Y 轴旋转（弧度）
    rotation_y: f32,
    pointer_ndc: Option<Vec2>,
    viewport: (u32, u32),
    rng: StdRng,
    /// 帧间复用的实例缓冲
    instances: Vec<GpuParticleInstance>,
    /// 帧间复用的航线顶点缓冲
    route_vertices: Vec<RouteVertex>,
}

impl EngineState {
    /// 由源图像与选项构建初始状态
    ///
    /// 采样目标数取自选项；空掩码或预算耗尽由采样器内部回退，
    /// 此处不再失败。
    pub fn new(
        image: &ImageSource,
        options: EngineOptions,
        width: u32,
        height: u32,
    ) -> EngineResult<Self> {
        options.validate()?;
        let mut rng = StdRng::from_entropy();

        let mask = RasterMask::build(image, MaskPredicate::Luminance(LUMINANCE_THRESHOLD));
        let domain = match options.manifold {
            ManifoldKind::Sphere => sampler::SampleDomain::Sphere,
            ManifoldKind::Plane => sampler::SampleDomain::Plane,
        };
        let set = sampler::sample(
            &mask,
            options.target_particle_count,
            options.max_attempts_factor,
            domain,
            &mut rng,
        );
        let set = sampler::duplicate_edges(&set, &mut rng);

        let viewport = (width.max(1), height.max(1));
        let aspect = viewport.0 as f32 / viewport.1 as f32;
        let manifold = match options.manifold {
            ManifoldKind::Sphere => Manifold::Sphere {
                radius: options.manifold_radius,
            },
            ManifoldKind::Plane => Manifold::Plane {
                frame: PlaneFrame::from_samples(&set, options.manifold_radius, aspect),
            },
        };

        let store = ParticleStore::from_samples(&set, &manifold, BASE_COLOR, &mut rng);
        let points_a = set.points;
        let camera = Camera::new(
            Vec3::new(0.0, 0.0, options.manifold_radius * CAMERA_DISTANCE),
            Vec3::ZERO,
            aspect,
        );
        let params = PhysicsParams {
            repulsion_strength: options.repulsion_strength,
            repulsion_radius: options.repulsion_radius,
            return_speed: options.return_speed,
            damping: options.damping,
        };

        tracing::info!(
            target: "engine",
            "Engine state ready: {} particles ({} edge-densified), manifold {:?}",
            store.count(),
            store.count().saturating_sub(options.target_particle_count),
            options.manifold
        );

        Ok(Self {
            options,
            clock: SimulationClock::new(),
            manifold,
            store,
            points_a,
            points_b: None,
            morph: None,
            resolver: InteractionResolver::new(),
            overlay: Overlay::new(),
            camera,
            params,
            rotation_y: 0.0,
            pointer_ndc: None,
            viewport,
            rng,
            instances: Vec::new(),
            route_vertices: Vec::new(),
        })
    }

    /// 推进一帧仿真并重建上传缓冲
    pub fn step(&mut self, dt: f32) {
        self.clock.advance(dt);
        let dt = self.clock.delta();

        self.rotation_y =
            (self.rotation_y + self.options.auto_rotate_speed * dt).rem_euclid(std::f32::consts::TAU);

        self.resolver.resolve(
            self.pointer_ndc,
            &self.camera,
            &self.manifold,
            self.rotation_y,
            &self.overlay.markers,
            &self.clock,
        );

        if let Some(morph) = self.morph.as_mut() {
            morph.tick(dt, &mut self.store);
        }

        let hit = self.resolver.state().hit_point;
        physics::integrate(&mut self.store, hit, &self.params);

        self.overlay.update(dt);
        self.write_frame();
    }

    /// 重建粒子实例与航线顶点缓冲
    fn write_frame(&mut self) {
        self.store.write_instances(&mut self.instances);
        if self.manifold.is_sphere() {
            let time = self.clock.elapsed();
            let radius = self.manifold.radius();
            let hovered = self.resolver.state().hovered_marker;
            // 叠加层顶点在仿真局部空间，朝向渐隐用转入局部空间的相机方向
            let local_camera_dir = Quat::from_rotation_y(-self.rotation_y) * self.camera.facing_dir();
            self.overlay
                .write_marker_instances(time, radius, hovered, &mut self.instances);
            self.overlay
                .write_sprite_instances(time, radius, &mut self.instances);
            self.overlay
                .write_route_vertices(radius, local_camera_dir, &mut self.route_vertices);
        } else {
            self.route_vertices.clear();
        }
    }

    /// 设定形变目标图像
    ///
    /// 以当前形状为起点、新图像的采样形状为终点构建形变控制器。
    /// 采样点经循环取下标补齐到现有粒子数，保持两形状等长；两组
    /// uv 采样点均被保留，供视口变化时重投影。
    pub fn set_morph_target(&mut self, image: &ImageSource) -> EngineResult<()> {
        let mask = RasterMask::build(image, MaskPredicate::Luminance(LUMINANCE_THRESHOLD));
        let domain = match self.options.manifold {
            ManifoldKind::Sphere => sampler::SampleDomain::Sphere,
            ManifoldKind::Plane => sampler::SampleDomain::Plane,
        };
        let set = sampler::sample(
            &mask,
            self.options.target_particle_count,
            self.options.max_attempts_factor,
            domain,
            &mut self.rng,
        );
        let set = sampler::duplicate_edges(&set, &mut self.rng);
        if set.is_empty() {
            return Err(EngineError::General(
                "morph target produced no samples".to_string(),
            ));
        }

        // 上一轮形变停在 B 上时，B 的采样点成为新起点
        if let (Some(morph), Some(points)) = (&self.morph, &self.points_b) {
            if morph.current_shape() == ShapeId::B {
                self.points_a = points.clone();
            }
        }

        let count = self.store.count();
        let points_b: Vec<SamplePoint> =
            (0..count).map(|i| set.points[i % set.points.len()]).collect();
        let shape_a: Vec<Vec3> = self
            .points_a
            .iter()
            .map(|p| self.manifold.project_uv(p.u, p.v))
            .collect();
        let shape_b: Vec<Vec3> = points_b
            .iter()
            .map(|p| self.manifold.project_uv(p.u, p.v))
            .collect();
        self.points_b = Some(points_b);

        self.morph = Some(MorphController::new(
            shape_a,
            shape_b,
            self.options.morph_duration,
            self.options.morph_noise_amplitude,
            &mut self.rng,
        ));
        Ok(())
    }

    /// 触发一次形变过渡
    ///
    /// 未设定目标或过渡进行中时返回 `false`（无操作）。
    pub fn trigger_morph(&mut self) -> bool {
        self.morph.as_mut().map(|m| m.trigger()).unwrap_or(false)
    }

    /// 视口尺寸变化
    ///
    /// 立即更新相机宽高比。平面流形下用保留的 uv 采样点重建平面帧
    /// 并整体重投影粒子目标与形状快照，下一帧即以新填充缩放生效；
    /// 进行中的形变进度不受影响。
    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        self.camera.set_aspect(width, height);
        if !self.manifold.is_sphere() {
            let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;
            let manifold = Manifold::Plane {
                frame: PlaneFrame::from_points(
                    self.current_points(),
                    self.options.manifold_radius,
                    aspect,
                ),
            };
            let project = |points: &[SamplePoint]| -> Vec<Vec3> {
                points.iter().map(|p| manifold.project_uv(p.u, p.v)).collect()
            };
            let targets = project(self.current_points());
            let shapes = self
                .points_b
                .as_ref()
                .map(|points| (project(&self.points_a), project(points)));
            self.manifold = manifold;
            self.store.set_targets(&targets);
            if let (Some(morph), Some((shape_a, shape_b))) = (self.morph.as_mut(), shapes) {
                morph.set_shapes(shape_a, shape_b);
            }
        }
    }

    /// 当前形状的 uv 采样点
    ///
    /// 过渡中以目的形状为准，与 `MorphController::current_shape`
    /// 的约定一致。
    fn current_points(&self) -> &[SamplePoint] {
        match (&self.morph, &self.points_b) {
            (Some(morph), Some(points)) if morph.current_shape() == ShapeId::B => points,
            _ => &self.points_a,
        }
    }

    /// 更新指针 NDC 坐标（`None` 表示指针离开表面）
    pub fn set_pointer_ndc(&mut self, ndc: Option<Vec2>) {
        self.pointer_ndc = ndc;
    }

    /// 添加位置标记，返回标记下标
    pub fn add_marker(&mut self, name: impl Into<String>, lat: f32, lon: f32, color: Vec3) -> usize {
        let marker = MarkerDescriptor::from_latlon(name, lat, lon, color, &mut self.rng);
        self.overlay.markers.push(marker);
        self.overlay.markers.len() - 1
    }

    /// 在两个标记之间添加航线，任一下标越界时返回 `None`
    pub fn add_route(
        &mut self,
        from: usize,
        to: usize,
        color: Vec3,
        base_opacity: f32,
    ) -> Option<usize> {
        let a = self.overlay.markers.get(from)?;
        let b = self.overlay.markers.get(to)?;
        let route = RouteDescriptor::between(a, b, color, base_opacity);
        self.overlay.routes.push(route);
        Some(self.overlay.routes.len() - 1)
    }

    /// 钉选标记（点击选中，`None` 取消）
    pub fn set_pinned_marker(&mut self, index: Option<usize>) {
        self.overlay.pinned_marker = index;
    }

    /// 组装当前帧的场景 Uniform
    pub fn scene_uniforms(&self) -> SceneUniforms {
        SceneUniforms::new(
            &self.camera,
            Mat4::from_rotation_y(self.rotation_y),
            self.clock.elapsed(),
            self.options.base_point_size,
            self.viewport,
        )
    }

    /// 粒子存储
    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// 仿真时钟
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// 引擎选项
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 形变控制器
    pub fn morph(&self) -> Option<&MorphController> {
        self.morph.as_ref()
    }

    /// 当前整体旋转（弧度）
    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    /// 待上传的粒子实例
    pub fn instances(&self) -> &[GpuParticleInstance] {
        &self.instances
    }

    /// 待上传的航线顶点
    pub fn route_vertices(&self) -> &[RouteVertex] {
        &self.route_vertices
    }
}

/// GPU 引擎
///
/// 在 [`EngineState`] 之上持有 wgpu 上下文与着色器后端。
/// `dispose()` 之后所有会触碰 GPU 的调用返回 [`EngineError::Disposed`]。
pub struct Engine {
    state: EngineState,
    gpu: Option<GpuContext>,
    backend: Option<Box<dyn ShaderBackend>>,
}

impl Engine {
    /// 初始化引擎
    ///
    /// 同步阻塞直到适配器与设备就绪。后端类型取自选项；实例缓冲
    /// 容量按粒子数加叠加层余量预留，此后不再扩容。
    pub fn init(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        image: &ImageSource,
        options: EngineOptions,
    ) -> EngineResult<Self> {
        let state = EngineState::new(image, options, width, height)?;
        let gpu = pollster::block_on(GpuContext::new(target, width, height))?;

        let instance_capacity = state.store().count() as u32 + OVERLAY_INSTANCE_HEADROOM;
        let backend: Box<dyn ShaderBackend> = match state.options().backend {
            BackendKind::Classic => Box::new(ClassicBackend::new(
                &gpu.device,
                gpu.config.format,
                instance_capacity,
                ROUTE_VERTEX_CAPACITY,
            )),
            BackendKind::NodeGraph => Box::new(NodeGraphBackend::new(
                &gpu.device,
                gpu.config.format,
                instance_capacity,
                ROUTE_VERTEX_CAPACITY,
            )),
        };
        tracing::info!(
            target: "engine",
            "Engine initialized: {} particles, backend {}",
            state.store().count(),
            backend.name()
        );

        Ok(Self {
            state,
            gpu: Some(gpu),
            backend: Some(backend),
        })
    }

    /// 推进一帧并渲染
    ///
    /// 表面丢失/过期时重新配置并跳过当帧（不视为错误）。
    pub fn tick(&mut self, dt: f32) -> EngineResult<()> {
        let gpu = self.gpu.as_mut().ok_or(EngineError::Disposed)?;
        let backend = self.backend.as_mut().ok_or(EngineError::Disposed)?;

        self.state.step(dt);

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                let (w, h) = gpu.size();
                tracing::warn!(target: "render", "Surface lost, reconfiguring to {}x{}", w, h);
                gpu.resize(w, h);
                return Ok(());
            }
            Err(e) => return Err(RenderError::Surface(e.to_string()).into()),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = self.state.scene_uniforms();
        backend.upload(
            &gpu.queue,
            self.state.instances(),
            self.state.route_vertices(),
            &uniforms,
        );

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Field Encoder"),
            });
        backend.render(&mut encoder, &view)?;
        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// 表面尺寸变化
    pub fn on_resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        let gpu = self.gpu.as_mut().ok_or(EngineError::Disposed)?;
        gpu.resize(width, height);
        self.state.on_resize(width, height);
        Ok(())
    }

    /// 设定形变目标图像
    pub fn set_morph_target(&mut self, image: &ImageSource) -> EngineResult<()> {
        self.state.set_morph_target(image)
    }

    /// 触发一次形变过渡
    pub fn trigger_morph(&mut self) -> bool {
        self.state.trigger_morph()
    }

    /// 更新指针 NDC 坐标
    pub fn set_pointer_ndc(&mut self, ndc: Option<Vec2>) {
        self.state.set_pointer_ndc(ndc);
    }

    /// 添加位置标记
    pub fn add_marker(&mut self, name: impl Into<String>, lat: f32, lon: f32, color: Vec3) -> usize {
        self.state.add_marker(name, lat, lon, color)
    }

    /// 在两个标记之间添加航线
    pub fn add_route(
        &mut self,
        from: usize,
        to: usize,
        color: Vec3,
        base_opacity: f32,
    ) -> Option<usize> {
        self.state.add_route(from, to, color, base_opacity)
    }

    /// 钉选标记
    pub fn set_pinned_marker(&mut self, index: Option<usize>) {
        self.state.set_pinned_marker(index);
    }

    /// CPU 侧状态
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// 释放 GPU 资源
    ///
    /// 幂等；之后所有触碰 GPU 的调用返回 [`EngineError::Disposed`]。
    pub fn dispose(&mut self) {
        if self.gpu.take().is_some() {
            self.backend = None;
            tracing::info!(target: "engine", "Engine disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::morph::MorphState;

    /// 实心圆盘测试图像
    fn disc_image(size: u32) -> ImageSource {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        let center = size as f32 / 2.0;
        let radius = size as f32 * 0.4;
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 + 0.5 - center;
                let dy = y as f32 + 0.5 - center;
                let inside = (dx * dx + dy * dy).sqrt() < radius;
                let value = if inside { 255 } else { 0 };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        ImageSource::from_rgba8(pixels, size, size).unwrap()
    }

    fn small_options() -> EngineOptions {
        EngineOptions {
            target_particle_count: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_state_init_and_step() {
        let image = disc_image(64);
        let mut state = EngineState::new(&image, small_options(), 800, 600).unwrap();
        assert!(state.store().count() >= 500);

        for _ in 0..10 {
            state.step(1.0 / 60.0);
        }
        assert_eq!(state.clock().frame(), 10);
        assert!(state.rotation_y() > 0.0);
        assert_eq!(state.instances().len(), state.store().count());
        assert!(state.store().positions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let image = disc_image(16);
        let options = EngineOptions {
            target_particle_count: 0,
            ..Default::default()
        };
        assert!(EngineState::new(&image, options, 100, 100).is_err());
    }

    #[test]
    fn test_morph_target_and_trigger() {
        let image = disc_image(64);
        let mut state = EngineState::new(&image, small_options(), 800, 600).unwrap();

        // 未设定目标时触发是无操作
        assert!(!state.trigger_morph());

        state.set_morph_target(&disc_image(32)).unwrap();
        assert!(state.trigger_morph());
        assert!(!state.trigger_morph(), "retrigger during transition");

        for _ in 0..200 {
            state.step(1.0 / 60.0);
        }
        let morph = state.morph().unwrap();
        assert!(!morph.is_transitioning());
    }

    #[test]
    fn test_resize_preserves_morph_progress() {
        let image = disc_image(64);
        let mut state = EngineState::new(&image, small_options(), 800, 600).unwrap();
        state.set_morph_target(&disc_image(32)).unwrap();
        state.trigger_morph();

        for _ in 0..20 {
            state.step(1.0 / 60.0);
        }
        let MorphState::Transitioning { progress: before, .. } = state.morph().unwrap().state()
        else {
            panic!("should be transitioning");
        };

        state.on_resize(400, 900);
        let MorphState::Transitioning { progress: after, .. } = state.morph().unwrap().state()
        else {
            panic!("resize must not settle the morph");
        };
        assert_eq!(before, after);
    }

    #[test]
    fn test_plane_resize_reprojects_targets() {
        let image = disc_image(64);
        let options = EngineOptions {
            target_particle_count: 300,
            manifold: ManifoldKind::Plane,
            auto_rotate_speed: 0.0,
            ..Default::default()
        };
        let mut state = EngineState::new(&image, options, 1600, 400).unwrap();
        let before = state.store().targets.clone();
        let extent_before = before.iter().map(|t| t.x.abs()).fold(0.0_f32, f32::max);

        // 宽高比 4.0 → 0.25：新的填充缩放必须在下一帧之前生效
        state.on_resize(400, 1600);
        state.step(1.0 / 60.0);

        let after = &state.store().targets;
        let moved = before
            .iter()
            .zip(after.iter())
            .any(|(b, a)| (*b - *a).length() > 1e-4);
        assert!(moved, "plane targets must be reprojected after resize");

        let extent_after = after.iter().map(|t| t.x.abs()).fold(0.0_f32, f32::max);
        assert!(extent_after < extent_before * 0.5);
        assert!(after.iter().all(|t| t.is_finite() && t.z == 0.0));
    }

    #[test]
    fn test_plane_resize_mid_morph_rescales_shapes() {
        let image = disc_image(64);
        let options = EngineOptions {
            target_particle_count: 300,
            manifold: ManifoldKind::Plane,
            ..Default::default()
        };
        let mut state = EngineState::new(&image, options, 1600, 400).unwrap();
        state.set_morph_target(&disc_image(32)).unwrap();
        state.trigger_morph();
        for _ in 0..20 {
            state.step(1.0 / 60.0);
        }
        let MorphState::Transitioning { progress: before, .. } = state.morph().unwrap().state()
        else {
            panic!("should be transitioning");
        };

        state.on_resize(400, 1600);
        let MorphState::Transitioning { progress: after, .. } = state.morph().unwrap().state()
        else {
            panic!("resize must not settle the morph");
        };
        assert_eq!(before, after);

        // 过渡以重投影后的快照收尾，落点在收缩后的幅度内
        for _ in 0..400 {
            state.step(1.0 / 60.0);
        }
        assert!(!state.morph().unwrap().is_transitioning());
        let radius = state.options().manifold_radius;
        assert!(state
            .store()
            .targets
            .iter()
            .all(|t| t.is_finite() && t.x.abs() <= radius * 0.3));
    }

    #[test]
    fn test_pointer_repulsion_displaces_particles() {
        let image = disc_image(64);
        let mut options = small_options();
        options.auto_rotate_speed = 0.0;
        let mut state = EngineState::new(&image, options, 800, 600).unwrap();

        let rest: Vec<Vec3> = state.store().positions.clone();
        state.set_pointer_ndc(Some(Vec2::ZERO));
        for _ in 0..5 {
            state.step(1.0 / 60.0);
        }
        let moved = state
            .store()
            .positions
            .iter()
            .zip(rest.iter())
            .any(|(p, r)| (*p - *r).length() > 1e-4);
        assert!(moved, "center pointer should repel nearby particles");
    }

    #[test]
    fn test_markers_and_routes_extend_frame_buffers() {
        let image = disc_image(64);
        let mut state = EngineState::new(&image, small_options(), 800, 600).unwrap();
        let a = state.add_marker("tokyo", 35.68, 139.69, Vec3::ONE);
        let b = state.add_marker("london", 51.5, -0.12, Vec3::ONE);
        assert!(state.add_route(a, b, Vec3::ONE, 0.8).is_some());
        assert!(state.add_route(a, 99, Vec3::ONE, 0.8).is_none());

        state.step(1.0 / 60.0);
        // 粒子 + 2 标记 + 1 巡游光点
        assert_eq!(state.instances().len(), state.store().count() + 3);
        assert!(!state.route_vertices().is_empty());
    }

    #[test]
    fn test_plane_manifold_has_no_overlay_geometry() {
        let image = disc_image(64);
        let options = EngineOptions {
            target_particle_count: 300,
            manifold: ManifoldKind::Plane,
            ..Default::default()
        };
        let mut state = EngineState::new(&image, options, 800, 600).unwrap();
        state.add_marker("x", 0.0, 0.0, Vec3::ONE);
        state.step(1.0 / 60.0);
        assert_eq!(state.instances().len(), state.store().count());
        assert!(state.route_vertices().is_empty());
    }
}
