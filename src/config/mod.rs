//! 统一配置系统
//!
//! 提供TOML/JSON配置文件、环境变量和运行时动态调整。
//! 所有数值选项都是可选的，带有文档化的默认值。

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// 引擎配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 着色器后端类型
///
/// 两个后端在视觉上等价，共享 uniform 名称与语义，
/// 因此对一个后端的调参同样作用于另一个后端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 传统顶点/片元着色器，直接操作原始实例缓冲区
    Classic,
    /// 表达式图后端：由可组合的表达式节点生成同样的着色数学
    NodeGraph,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Classic
    }
}

/// 目标流形类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifoldKind {
    /// 球面（粒子地球仪变体）
    Sphere,
    /// z = 0 平面（图像形变变体）
    Plane,
}

impl Default for ManifoldKind {
    fn default() -> Self {
        Self::Sphere
    }
}

/// 引擎选项
///
/// 所有字段均为引擎级可调参数（非逐粒子）。粒子数量由宿主根据
/// 帧预算选择，引擎不做自动限流。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// 流形半径（球面变体的球半径，平面变体的半幅）
    pub manifold_radius: f32,

    /// 目标粒子数
    pub target_particle_count: usize,

    /// 自动旋转速度（弧度/秒，0 表示不旋转）
    pub auto_rotate_speed: f32,

    /// 指针斥力强度
    pub repulsion_strength: f32,

    /// 指针斥力作用半径（仿真空间单位）
    pub repulsion_radius: f32,

    /// 回位速度（位置每帧向目标混合的比例，单极点临界阻尼）
    pub return_speed: f32,

    /// 速度衰减系数，每帧无条件应用
    pub damping: f32,

    /// 形变过渡时长（秒），按 dt 累积
    pub morph_duration: f32,

    /// 形变中途散射噪声幅度（仿真空间单位）
    pub morph_noise_amplitude: f32,

    /// 粒子基础点大小（随视深做透视衰减）
    pub base_point_size: f32,

    /// 采样尝试预算倍率：尝试次数上限 = 目标数 × 该倍率
    pub max_attempts_factor: usize,

    /// 着色器后端
    pub backend: BackendKind,

    /// 目标流形
    pub manifold: ManifoldKind,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            manifold_radius: 10.0,
            target_particle_count: 20_000,
            auto_rotate_speed: 0.05,
            repulsion_strength: 0.12,
            repulsion_radius: 1.8,
            return_speed: 0.08,
            damping: 0.93,
            morph_duration: 1.0,
            morph_noise_amplitude: 1.2,
            base_point_size: 6.0,
            max_attempts_factor: 20,
            backend: BackendKind::Classic,
            manifold: ManifoldKind::Sphere,
        }
    }
}

impl EngineOptions {
    /// 创建默认选项
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    ///
    /// 识别 `PARTICLE_FIELD_*` 前缀的环境变量，解析失败的值保持原状。
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PARTICLE_FIELD_RADIUS") {
            if let Ok(radius) = val.parse() {
                self.manifold_radius = radius;
            }
        }
        if let Ok(val) = env::var("PARTICLE_FIELD_COUNT") {
            if let Ok(count) = val.parse() {
                self.target_particle_count = count;
            }
        }
        if let Ok(val) = env::var("PARTICLE_FIELD_ROTATE_SPEED") {
            if let Ok(speed) = val.parse() {
                self.auto_rotate_speed = speed;
            }
        }
        if let Ok(val) = env::var("PARTICLE_FIELD_MANIFOLD") {
            match val.as_str() {
                "sphere" => self.manifold = ManifoldKind::Sphere,
                "plane" => self.manifold = ManifoldKind::Plane,
                other => {
                    log::debug!("Ignoring unknown PARTICLE_FIELD_MANIFOLD value: {}", other);
                }
            }
        }
        if let Ok(val) = env::var("PARTICLE_FIELD_BACKEND") {
            match val.as_str() {
                "classic" => self.backend = BackendKind::Classic,
                "node_graph" => self.backend = BackendKind::NodeGraph,
                other => {
                    log::debug!("Ignoring unknown PARTICLE_FIELD_BACKEND value: {}", other);
                }
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.manifold_radius <= 0.0 {
            return Err(ConfigError::ValidationError(
                "manifold_radius must be positive".to_string(),
            ));
        }
        if self.target_particle_count == 0 {
            return Err(ConfigError::ValidationError(
                "target_particle_count must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(ConfigError::ValidationError(
                "damping must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.return_speed) {
            return Err(ConfigError::ValidationError(
                "return_speed must be in [0, 1]".to_string(),
            ));
        }
        if self.repulsion_radius <= 0.0 {
            return Err(ConfigError::ValidationError(
                "repulsion_radius must be positive".to_string(),
            ));
        }
        if self.morph_duration <= 0.0 {
            return Err(ConfigError::ValidationError(
                "morph_duration must be positive".to_string(),
            ));
        }
        if self.max_attempts_factor == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
