//! 端到端集成测试
//!
//! 不触碰 GPU：通过 `EngineState` 走完采样 → 物理 → 形变 → 叠加层
//! 的完整帧循环，验证各子系统组合后的行为。

use glam::{Vec2, Vec3};
use particle_field::config::{EngineOptions, ManifoldKind};
use particle_field::core::EngineState;
use particle_field::manifold::sphere_unproject;
use particle_field::sampler::ImageSource;
use particle_field::sim::MorphState;

/// 2x2 棋盘图像：左上与右下象限为白
fn checkerboard(size: u32) -> ImageSource {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    let half = size / 2;
    for y in 0..size {
        for x in 0..size {
            let white = (x < half) == (y < half);
            let value = if white { 255 } else { 0 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    ImageSource::from_rgba8(pixels, size, size).unwrap()
}

/// 以中心为圆心的实心圆盘图像
fn disc(size: u32, radius_frac: f32) -> ImageSource {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 + 0.5) / size as f32 - 0.5;
            let dy = (y as f32 + 0.5) / size as f32 - 0.5;
            let inside = (dx * dx + dy * dy).sqrt() < radius_frac;
            let value = if inside { 255 } else { 0 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    ImageSource::from_rgba8(pixels, size, size).unwrap()
}

fn options(count: usize) -> EngineOptions {
    EngineOptions {
        target_particle_count: count,
        ..Default::default()
    }
}

#[test]
fn test_checkerboard_silhouette_survives_projection() {
    let state = EngineState::new(&checkerboard(64), options(1000), 800, 600).unwrap();

    // 初始目标反投影回 uv 后必须落在白色象限内。
    // 边缘复制带抖动，象限分界附近的点放行。
    for target in &state.store().targets {
        let (u, v) = sphere_unproject(*target);
        let boundary = (u - 0.5).abs() < 0.01
            || (v - 0.5).abs() < 0.01
            || !(0.01..0.99).contains(&u)
            || !(0.01..0.99).contains(&v);
        if boundary {
            continue;
        }
        let left = u < 0.5;
        let top = v < 0.5;
        assert_eq!(
            left, top,
            "particle projected back to a black quadrant at ({}, {})",
            u, v
        );
    }
}

#[test]
fn test_disc_to_disc_morph_converges() {
    let mut state = EngineState::new(&disc(64, 0.2), options(800), 800, 600).unwrap();
    state.set_morph_target(&disc(64, 0.45)).unwrap();
    assert!(state.trigger_morph());

    // 过渡 + 物理吸附：默认时长 1 秒，多跑一段让位置收敛
    for _ in 0..400 {
        state.step(1.0 / 60.0);
    }

    let morph = state.morph().unwrap();
    assert!(matches!(morph.state(), MorphState::Settled(_)));

    // 验证位置确实收敛到新目标
    let max_err = state
        .store()
        .positions
        .iter()
        .zip(state.store().targets.iter())
        .map(|(p, t)| (*p - *t).length())
        .fold(0.0f32, f32::max);
    assert!(max_err < 0.05, "particles still {} from targets", max_err);
}

#[test]
fn test_full_frame_loop_with_overlay_and_pointer() {
    let mut state = EngineState::new(&disc(64, 0.4), options(600), 800, 600).unwrap();
    let a = state.add_marker("a", 10.0, 20.0, Vec3::new(1.0, 0.8, 0.2));
    let b = state.add_marker("b", -35.0, 120.0, Vec3::new(0.2, 0.8, 1.0));
    state.add_route(a, b, Vec3::ONE, 0.8).unwrap();
    state.set_pointer_ndc(Some(Vec2::new(0.0, 0.0)));

    for _ in 0..30 {
        state.step(1.0 / 60.0);
    }

    // 粒子 + 2 标记 + 1 巡游光点
    assert_eq!(state.instances().len(), state.store().count() + 3);
    assert!(!state.route_vertices().is_empty());
    assert!(
        state.route_vertices().len() % 2 == 0,
        "route buffer must be a line list"
    );
    assert!(state.store().positions.iter().all(|p| p.is_finite()));

    // 指针离开后粒子回到静止轮廓
    state.set_pointer_ndc(None);
    for _ in 0..300 {
        state.step(1.0 / 60.0);
    }
    let max_err = state
        .store()
        .positions
        .iter()
        .zip(state.store().targets.iter())
        .map(|(p, t)| (*p - *t).length())
        .fold(0.0f32, f32::max);
    assert!(max_err < 1e-2);
}

#[test]
fn test_plane_variant_frame_loop() {
    let opts = EngineOptions {
        target_particle_count: 500,
        manifold: ManifoldKind::Plane,
        ..Default::default()
    };
    let mut state = EngineState::new(&disc(64, 0.4), opts, 800, 600).unwrap();

    for _ in 0..10 {
        state.step(1.0 / 60.0);
    }
    // 平面变体：目标贴在 z = 0 平面上
    assert!(state.store().targets.iter().all(|t| t.z == 0.0));
    assert_eq!(state.instances().len(), state.store().count());

    // 缩放不破坏帧循环
    state.on_resize(300, 900);
    state.step(1.0 / 60.0);
    assert!(state.store().positions.iter().all(|p| p.is_finite()));
}

#[test]
fn test_options_from_toml_drive_engine() {
    let toml = r#"
        target_particle_count = 256
        manifold = "plane"
        backend = "node_graph"
        auto_rotate_speed = 0.0
    "#;
    let opts = EngineOptions::from_toml_str(toml).unwrap();
    let mut state = EngineState::new(&disc(32, 0.4), opts, 400, 400).unwrap();
    state.step(1.0 / 60.0);
    assert_eq!(state.rotation_y(), 0.0);
    assert!(state.store().count() >= 256);
}
