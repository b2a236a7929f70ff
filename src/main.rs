//! 演示程序：窗口内的粒子地球仪
//!
//! 用两张程序生成的剪影驱动引擎：环形为初始形状，实心圆盘为形变
//! 目标。移动指针排开粒子，左键触发形变。

use std::sync::Arc;
use std::time::Instant;

use glam::{Vec2, Vec3};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

use particle_field::config::EngineOptions;
use particle_field::core::{init_logging, Engine};
use particle_field::sampler::ImageSource;

fn main() {
    if let Err(e) = run() {
        eprintln!("Engine failed to start: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Particle Field")
            .build(&event_loop)?,
    );

    let mut options = EngineOptions::default();
    options.apply_env_overrides();

    let size = window.inner_size();
    let mut engine = Engine::init(
        window.clone(),
        size.width,
        size.height,
        &ring_image(256)?,
        options,
    )?;
    engine.set_morph_target(&disc_image(256)?)?;

    let tokyo = engine.add_marker("Tokyo", 35.68, 139.69, Vec3::new(1.0, 0.75, 0.3));
    let london = engine.add_marker("London", 51.50, -0.12, Vec3::new(0.4, 0.9, 1.0));
    engine.add_route(tokyo, london, Vec3::new(0.5, 0.8, 1.0), 0.8);

    let mut last_frame = Instant::now();
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => {
                engine.dispose();
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Err(e) = engine.on_resize(new_size.width, new_size.height) {
                    tracing::error!(target: "demo", "Resize failed: {}", e);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let size = window.inner_size();
                let ndc = Vec2::new(
                    position.x as f32 / size.width.max(1) as f32 * 2.0 - 1.0,
                    1.0 - position.y as f32 / size.height.max(1) as f32 * 2.0,
                );
                engine.set_pointer_ndc(Some(ndc));
            }
            WindowEvent::CursorLeft { .. } => {
                engine.set_pointer_ndc(None);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                engine.trigger_morph();
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;
                if let Err(e) = engine.tick(dt) {
                    tracing::error!(target: "demo", "Frame failed: {}", e);
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;
    Ok(())
}

/// 程序生成的环形剪影
fn ring_image(size: u32) -> Result<ImageSource, Box<dyn std::error::Error>> {
    shape_image(size, |d| d > 0.22 && d < 0.42)
}

/// 程序生成的实心圆盘剪影
fn disc_image(size: u32) -> Result<ImageSource, Box<dyn std::error::Error>> {
    shape_image(size, |d| d < 0.38)
}

fn shape_image(
    size: u32,
    inside: impl Fn(f32) -> bool,
) -> Result<ImageSource, Box<dyn std::error::Error>> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 + 0.5) / size as f32 - 0.5;
            let dy = (y as f32 + 0.5) / size as f32 - 0.5;
            let value = if inside((dx * dx + dy * dy).sqrt()) {
                255
            } else {
                0
            };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    Ok(ImageSource::from_rgba8(pixels, size, size)?)
}
