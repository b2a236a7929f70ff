//! 引擎核心模块
//!
//! 包含引擎生命周期管理、仿真时钟和统一错误类型。

pub mod clock;
pub mod engine;
pub mod error;

pub use clock::SimulationClock;
pub use engine::{init_logging, Engine, EngineState};
pub use error::{EngineError, EngineResult, RenderError, SamplerError};
