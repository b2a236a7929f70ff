//! 统一错误处理模块
//!
//! 提供引擎范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **基础设施层错误** (`RenderError`): GPU 适配器、设备、表面相关错误
//! - **数据层错误** (`SamplerError`): 图像解码、掩码采样相关错误
//!
//! `EngineError` 可以同时处理两层的错误。采样层错误均为非致命错误：
//! 调用方应回退到均匀随机填充而不是中断渲染。

use thiserror::Error;

/// 引擎核心错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Sampler error: {0}")]
    Sampler(#[from] SamplerError),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Engine already disposed")]
    Disposed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    General(String),
}

/// 渲染系统错误
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),

    #[error("Failed to request adapter: no compatible GPU found")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    DeviceRequest(String),

    #[error("Requested backend is not supported by this runtime: {0}")]
    BackendUnsupported(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Invalid render state: {0}")]
    InvalidState(String),
}

/// 采样系统错误
///
/// 所有变体均为非致命：引擎在遇到这些错误时回退到均匀随机填充，
/// 保证始终渲染出粒子而不是崩溃或渲染空白。
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Mask is empty: no pixel satisfies the predicate")]
    EmptyMask,

    #[error("Sampling attempt budget exhausted: accepted {accepted} of {requested}")]
    AttemptBudgetExhausted { accepted: usize, requested: usize },

    #[error("Image dimensions are invalid: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// 引擎结果类型别名
pub type EngineResult<T> = Result<T, EngineError>;
