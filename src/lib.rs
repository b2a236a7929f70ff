//! # Particle Field
//!
//! A GPU particle-field simulation and rendering engine built with Rust.
//!
//! ## Features
//!
//! - **Raster Sampling**: Rejection-sample particle positions from any RGBA image silhouette
//! - **Manifold Mapping**: Project samples onto a sphere (particle globe) or a plane (image morph)
//! - **Spring/Repulsion Physics**: Per-frame, per-particle integration with pointer repulsion
//! - **Dual Shader Backends**: A classic vertex/fragment pipeline and an expression-graph pipeline with identical shading
//! - **Morph Transitions**: Eased, noise-scattered interpolation between two particle shapes
//! - **Marker/Route Overlay**: Pulsing location markers and animated great-arc routes on the globe
//!
//! ## Architecture Design
//!
//! The engine is a single frame-driven object, not a scene graph:
//! - **State (`ParticleStore`)**: Flat struct-of-arrays buffers, indexed by integer handle
//! - **Systems (`sampler`, `sim`, `interaction`)**: Pure functions over that state
//! - **Backend (`render`)**: Read-only consumer of the store, swappable behind one trait
//!
//! Each display refresh the host calls `tick(dt)`, which runs
//! resolve interaction → integrate physics → upload buffers → render,
//! synchronously and in that order.
//!
//! ### Example
//!
//! ```ignore
//! use particle_field::core::Engine;
//! use particle_field::config::EngineOptions;
//! use particle_field::sampler::ImageSource;
//!
//! let image = ImageSource::decode(include_bytes!("../assets/earth.png"))?;
//! let mut engine = Engine::init(window, 800, 600, &image, EngineOptions::default())?;
//! // in the host render loop:
//! engine.tick(dt)?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Engine lifecycle, simulation clock and unified error types
//! - [`config`]: Engine options with TOML/JSON loading and validation
//! - [`sampler`]: Raster mask construction and rejection sampling
//! - [`manifold`]: Sphere/plane projection shared by particles and overlay
//! - [`sim`]: Particle store, physics integrator and morph controller
//! - [`interaction`]: Pointer ray casting and hysteretic marker hover
//! - [`render`]: wgpu shader backends and camera
//! - [`overlay`]: Location markers and route arcs

/// Engine lifecycle, simulation clock and unified error types
pub mod core;
/// Engine options with TOML/JSON loading and validation
pub mod config;
/// Raster mask construction and rejection sampling
pub mod sampler;
/// Sphere/plane projection shared by particles and overlay
pub mod manifold;
/// Particle store, physics integrator and morph controller
pub mod sim;
/// Pointer ray casting and hysteretic marker hover
pub mod interaction;
/// wgpu shader backends and camera
pub mod render;
/// Location markers and route arcs
pub mod overlay;


pub use crate::config::EngineOptions;
pub use crate::core::{init_logging, Engine, EngineError, EngineResult, SimulationClock};
pub use crate::sampler::ImageSource;
