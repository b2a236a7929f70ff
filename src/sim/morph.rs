//! 形变控制器
//!
//! 驱动两个粒子形状快照之间的缓动插值。过渡期间注入瞬态逐粒子
//! 噪声：幅度按 `sin(progress·π)` 包络，两端为零、中点最大，粒子
//! 在中途可见地散开而不是直线移动——这是标志性视觉行为。
//!
//! 进度按 `dt / duration` 累积（时长与帧率解耦）。重入由显式状态机
//! 保证：`trigger()` 仅在 `Settled` 状态下有效。

use glam::Vec3;
use rand::Rng;

use crate::sim::store::ParticleStore;

/// 形状标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeId {
    /// 第一张图像的采样形状
    A,
    /// 第二张图像的采样形状
    B,
}

impl ShapeId {
    fn other(self) -> Self {
        match self {
            ShapeId::A => ShapeId::B,
            ShapeId::B => ShapeId::A,
        }
    }

    fn index(self) -> usize {
        match self {
            ShapeId::A => 0,
            ShapeId::B => 1,
        }
    }
}

/// 形变状态机
///
/// 同一时刻至多一个过渡在进行；`Transitioning` 期间的再次触发
/// 是无操作。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MorphState {
    /// 静止在某个形状上
    Settled(ShapeId),
    /// 过渡中
    Transitioning {
        from: ShapeId,
        to: ShapeId,
        progress: f32,
    },
}

/// 三次缓入缓出
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

/// 形变控制器
pub struct MorphController {
    /// 两个形状快照，长度一致
    shapes: [Vec<Vec3>; 2],
    /// 状态机
    state: MorphState,
    /// 过渡时长（秒）
    duration: f32,
    /// 中点散射噪声幅度
    noise_amplitude: f32,
    /// 逐粒子固定噪声方向（创建时随机一次）
    noise_dirs: Vec<Vec3>,
}

impl MorphController {
    /// 创建控制器，初始静止在形状 A
    ///
    /// 两个形状必须等长；引擎在采样时以同一目标数采样两张图像
    /// 来保证这一点。
    pub fn new<R: Rng>(
        shape_a: Vec<Vec3>,
        shape_b: Vec<Vec3>,
        duration: f32,
        noise_amplitude: f32,
        rng: &mut R,
    ) -> Self {
        debug_assert_eq!(shape_a.len(), shape_b.len());
        let noise_dirs = (0..shape_a.len())
            .map(|_| {
                // 单位球内拒绝采样，方向均匀
                loop {
                    let v = Vec3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    );
                    let len = v.length();
                    if len > 1e-3 && len <= 1.0 {
                        break v / len;
                    }
                }
            })
            .collect();
        Self {
            shapes: [shape_a, shape_b],
            state: MorphState::Settled(ShapeId::A),
            duration: duration.max(f32::EPSILON),
            noise_amplitude,
            noise_dirs,
        }
    }

    /// 当前状态
    pub fn state(&self) -> MorphState {
        self.state
    }

    /// 是否过渡中
    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, MorphState::Transitioning { .. })
    }

    /// 当前静止形状（过渡中返回目的形状）
    pub fn current_shape(&self) -> ShapeId {
        match self.state {
            MorphState::Settled(shape) => shape,
            MorphState::Transitioning { to, .. } => to,
        }
    }

    /// 整体替换两个形状快照
    ///
    /// 流形投影变化（平面帧随视口重建）时调用，长度必须与原快照
    /// 一致。状态机不受影响：进行中的过渡保持进度，下一次 `tick`
    /// 以新快照继续插值。
    pub fn set_shapes(&mut self, shape_a: Vec<Vec3>, shape_b: Vec<Vec3>) {
        debug_assert_eq!(shape_a.len(), self.shapes[0].len());
        debug_assert_eq!(shape_b.len(), self.shapes[1].len());
        self.shapes = [shape_a, shape_b];
    }

    /// 触发一次过渡
    ///
    /// 仅在 `Settled` 状态下有效；过渡中返回 `false`（无操作）。
    pub fn trigger(&mut self) -> bool {
        match self.state {
            MorphState::Settled(from) => {
                self.state = MorphState::Transitioning {
                    from,
                    to: from.other(),
                    progress: 0.0,
                };
                tracing::debug!(target: "morph", "Morph triggered: {:?} -> {:?}", from, from.other());
                true
            }
            MorphState::Transitioning { .. } => false,
        }
    }

    /// 推进过渡并写出目标缓冲
    ///
    /// 静止状态下无操作。过渡完成（progress ≥ 1）时把目标精确写为
    /// 目的形状、翻转当前形状标签并回到 `Settled`。
    pub fn tick(&mut self, dt: f32, store: &mut ParticleStore) {
        let MorphState::Transitioning { from, to, progress } = self.state else {
            return;
        };

        // 先按当前进度写目标：progress=0 时恰为源形状（噪声包络为零）
        let src = &self.shapes[from.index()];
        let dst = &self.shapes[to.index()];
        let eased = ease_in_out_cubic(progress);
        let envelope = (progress * std::f32::consts::PI).sin();
        let count = store.count().min(src.len());
        for i in 0..count {
            let noise = self.noise_dirs[i] * self.noise_amplitude * envelope;
            store.targets[i] = src[i].lerp(dst[i], eased) + noise;
        }

        let next = progress + dt / self.duration;
        if next >= 1.0 {
            store.set_targets(dst);
            self.state = MorphState::Settled(to);
            tracing::debug!(target: "morph", "Morph settled on {:?}", to);
        } else {
            self.state = MorphState::Transitioning {
                from,
                to,
                progress: next,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn shapes() -> (Vec<Vec3>, Vec<Vec3>) {
        let a = vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let b = vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)];
        (a, b)
    }

    fn store_for(shape: &[Vec3]) -> ParticleStore {
        ParticleStore {
            positions: shape.to_vec(),
            targets: shape.to_vec(),
            velocities: vec![Vec3::ZERO; shape.len()],
            colors: vec![Vec3::ONE; shape.len()],
            sizes: vec![1.0; shape.len()],
        }
    }

    fn controller() -> MorphController {
        let (a, b) = shapes();
        let mut rng = StdRng::seed_from_u64(21);
        MorphController::new(a, b, 1.0, 0.5, &mut rng)
    }

    #[test]
    fn test_trigger_is_reentrancy_guarded() {
        let mut morph = controller();
        assert!(morph.trigger());
        assert!(!morph.trigger(), "trigger during transition must be a no-op");
        assert!(morph.is_transitioning());
    }

    #[test]
    fn test_progress_zero_yields_source_exactly() {
        let (a, _) = shapes();
        let mut store = store_for(&a);
        let mut morph = controller();
        morph.trigger();

        // dt = 0：进度停在 0，噪声包络 sin(0) = 0
        morph.tick(0.0, &mut store);
        for (t, s) in store.targets.iter().zip(a.iter()) {
            assert_eq!(t, s);
        }
    }

    #[test]
    fn test_progress_one_yields_dest_exactly() {
        let (a, b) = shapes();
        let mut store = store_for(&a);
        let mut morph = controller();
        morph.trigger();

        for _ in 0..200 {
            morph.tick(1.0 / 60.0, &mut store);
        }
        assert_eq!(morph.state(), MorphState::Settled(ShapeId::B));
        for (t, d) in store.targets.iter().zip(b.iter()) {
            assert_eq!(t, d);
        }
    }

    #[test]
    fn test_noise_peaks_mid_flight() {
        let (a, b) = shapes();
        let mut store = store_for(&a);
        let mut morph = controller();
        morph.trigger();

        // 推进到约一半
        for _ in 0..30 {
            morph.tick(1.0 / 60.0, &mut store);
        }
        let MorphState::Transitioning { progress, .. } = morph.state() else {
            panic!("should still be transitioning");
        };
        assert!((progress - 0.5).abs() < 0.05);

        // 目标偏离纯插值，说明噪声在中途生效
        let eased = ease_in_out_cubic(progress);
        let pure = a[0].lerp(b[0], eased);
        assert!((store.targets[0] - pure).length() > 0.1);
    }

    #[test]
    fn test_round_trip_returns_to_shape_a() {
        let (a, _) = shapes();
        let mut store = store_for(&a);
        let mut morph = controller();

        morph.trigger();
        for _ in 0..120 {
            morph.tick(1.0 / 60.0, &mut store);
        }
        assert_eq!(morph.current_shape(), ShapeId::B);

        morph.trigger();
        for _ in 0..120 {
            morph.tick(1.0 / 60.0, &mut store);
        }
        assert_eq!(morph.current_shape(), ShapeId::A);
        for (t, s) in store.targets.iter().zip(a.iter()) {
            assert_eq!(t, s);
        }
    }

    #[test]
    fn test_set_shapes_preserves_transition_progress() {
        let (a, b) = shapes();
        let mut store = store_for(&a);
        let mut morph = controller();
        morph.trigger();
        for _ in 0..30 {
            morph.tick(1.0 / 60.0, &mut store);
        }
        let before = morph.state();

        // 快照缩放后状态机不变，过渡以新快照收尾
        let scaled_a: Vec<Vec3> = a.iter().map(|p| *p * 0.5).collect();
        let scaled_b: Vec<Vec3> = b.iter().map(|p| *p * 0.5).collect();
        morph.set_shapes(scaled_a, scaled_b.clone());
        assert_eq!(morph.state(), before);

        for _ in 0..120 {
            morph.tick(1.0 / 60.0, &mut store);
        }
        assert_eq!(morph.state(), MorphState::Settled(ShapeId::B));
        for (t, d) in store.targets.iter().zip(scaled_b.iter()) {
            assert_eq!(t, d);
        }
    }

    #[test]
    fn test_ease_boundaries() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-6);
        // 单调
        let mut last = 0.0;
        for i in 1..=20 {
            let t = i as f32 / 20.0;
            let v = ease_in_out_cubic(t);
            assert!(v >= last);
            last = v;
        }
    }
}
