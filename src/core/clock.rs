//! 仿真时钟
//!
//! 引擎内所有随时间变化的量（自动旋转、标记脉动、虚线相位）都由
//! `SimulationClock` 驱动，而不是自由运行的全局计时器。时钟只在宿主
//! 调用 `tick(dt)` 时前进，因此引擎是确定性的，测试无需依赖墙钟。

/// 帧驱动的仿真时钟
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    /// 累计仿真时间（秒）
    elapsed: f32,
    /// 上一帧时间增量（秒）
    delta: f32,
    /// 帧序号
    frame: u64,
}

impl SimulationClock {
    /// 创建归零的时钟
    pub fn new() -> Self {
        Self {
            elapsed: 0.0,
            delta: 0.0,
            frame: 0,
        }
    }

    /// 前进一帧
    ///
    /// 负的 `dt` 被钳制为 0，防止宿主传入倒退的时间戳差值。
    pub fn advance(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.delta = dt;
        self.elapsed += dt;
        self.frame += 1;
    }

    /// 累计仿真时间（秒）
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// 上一帧时间增量（秒）
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// 帧序号（从 0 开始，advance 后为 1）
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advance() {
        let mut clock = SimulationClock::new();
        assert_eq!(clock.elapsed(), 0.0);
        assert_eq!(clock.frame(), 0);

        clock.advance(1.0 / 60.0);
        clock.advance(1.0 / 60.0);
        assert_eq!(clock.frame(), 2);
        assert!((clock.elapsed() - 2.0 / 60.0).abs() < 1e-6);
        assert!((clock.delta() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_clock_clamps_negative_dt() {
        let mut clock = SimulationClock::new();
        clock.advance(0.016);
        clock.advance(-5.0);
        assert!((clock.elapsed() - 0.016).abs() < 1e-6);
        assert_eq!(clock.delta(), 0.0);
    }
}
