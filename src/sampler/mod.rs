//! 光栅采样模块
//!
//! 将源图像转换为带权掩码，并从掩码中拒绝采样候选点。
//!
//! ## 算法流程
//! 1. 阈值化图像亮度或透明度，得到 `RasterMask`
//! 2. 按流形对应的分布抽取候选 `(u, v)`（球面用 `lat = asin(2v-1)` 保证均匀）
//! 3. 掩码命中则接受，直到达到目标数或耗尽尝试预算
//! 4. 探测 8 邻域标记轮廓边缘点，边缘点带抖动复制一份以增密轮廓
//!
//! 采样是图像 + RNG 流的纯函数，无副作用。掩码为空时回退到全域
//! 均匀随机填充，保证引擎始终有粒子可渲染。

use crate::core::error::SamplerError;
use rand::Rng;

/// 掩码判定谓词
#[derive(Debug, Clone, Copy)]
pub enum MaskPredicate {
    /// 亮度高于阈值（0-1）的像素被接受
    Luminance(f32),
    /// 透明度高于阈值（0-1）的像素被接受
    Alpha(f32),
}

/// 解码后的 RGBA 图像
///
/// 宿主负责获取与解码图像；引擎只接受像素数据加宽高。
/// `decode` 仅作为便捷入口提供给直接持有编码字节的宿主。
#[derive(Debug, Clone)]
pub struct ImageSource {
    /// RGBA8 像素数据，长度 = width * height * 4
    pub pixels: Vec<u8>,
    /// 宽度（像素）
    pub width: u32,
    /// 高度（像素）
    pub height: u32,
}

impl ImageSource {
    /// 从原始 RGBA8 像素构造
    pub fn from_rgba8(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self, SamplerError> {
        if width == 0 || height == 0 || pixels.len() != (width * height * 4) as usize {
            return Err(SamplerError::InvalidDimensions { width, height });
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// 解码编码字节（PNG/JPEG）为 RGBA8
    pub fn decode(bytes: &[u8]) -> Result<Self, SamplerError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| SamplerError::Decode(e.to_string()))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Self::from_rgba8(decoded.into_raw(), width, height)
    }

    /// 解码，失败时回退到 1x1 空图像
    ///
    /// 空图像产生空掩码，采样器随即回退到全域均匀随机填充，
    /// 引擎照常渲染粒子而不是中断。
    pub fn decode_or_fallback(bytes: &[u8]) -> Self {
        match Self::decode(bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(target: "sampler", "Image decode failed, using empty fallback: {}", e);
                Self {
                    pixels: vec![0; 4],
                    width: 1,
                    height: 1,
                }
            }
        }
    }
}

/// 二维权重掩码
///
/// 尺寸与源图像一致，构建后不可变。采样期间由采样器独占，
/// 采样完成后即可丢弃。
pub struct RasterMask {
    width: u32,
    height: u32,
    weights: Vec<f32>,
}

impl RasterMask {
    /// 阈值化图像，构建掩码
    pub fn build(image: &ImageSource, predicate: MaskPredicate) -> Self {
        let count = (image.width * image.height) as usize;
        let mut weights = Vec::with_capacity(count);
        for i in 0..count {
            let px = &image.pixels[i * 4..i * 4 + 4];
            let weight = match predicate {
                MaskPredicate::Luminance(threshold) => {
                    // Rec. 601 亮度系数
                    let lum = (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
                        / 255.0;
                    if lum > threshold {
                        lum
                    } else {
                        0.0
                    }
                }
                MaskPredicate::Alpha(threshold) => {
                    let alpha = px[3] as f32 / 255.0;
                    if alpha > threshold {
                        alpha
                    } else {
                        0.0
                    }
                }
            };
            weights.push(weight);
        }
        Self {
            width: image.width,
            height: image.height,
            weights,
        }
    }

    /// 宽度（像素）
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 高度（像素）
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 归一化坐标处的掩码命中判定
    ///
    /// `u` 向右，`v` 向下，与图像像素顺序一致。越界视为未命中。
    pub fn hit(&self, u: f32, v: f32) -> bool {
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return false;
        }
        let x = (u * self.width as f32) as u32;
        let y = (v * self.height as f32) as u32;
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.weights[(y * self.width + x) as usize] > 0.0
    }

    /// 掩码是否完全为空
    pub fn is_empty(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }
}

/// 采样域：决定候选 `(u, v)` 的抽取分布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDomain {
    /// 球面经纬域：`v` 经 `asin(2v-1)` 映射，使球面上均匀
    Sphere,
    /// 平面矩形域：单位矩形内均匀
    Plane,
}

/// 单个接受的采样点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// 归一化图像横坐标
    pub u: f32,
    /// 归一化图像纵坐标
    pub v: f32,
    /// 是否位于轮廓边缘（8 邻域探测中至少一个未命中）
    pub edge: bool,
}

/// 有序采样点序列，构建后不可变
#[derive(Debug, Clone)]
pub struct SampleSet {
    /// 接受的采样点
    pub points: Vec<SamplePoint>,
    /// 是否由空掩码回退填充产生
    pub fallback: bool,
}

impl SampleSet {
    /// 采样点数量
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 边缘探测的归一化偏移量
const EDGE_PROBE_OFFSET: f32 = 0.008;

/// 边缘复制时的抖动幅度
const EDGE_JITTER: f32 = 0.004;

/// 从掩码中拒绝采样 `target_count` 个点
///
/// 尝试次数上限为 `target_count * max_attempts_factor`，达到上限后
/// 返回已收集的部分结果而不是挂起。掩码完全为空时回退到全域均匀
/// 随机填充。
pub fn sample<R: Rng>(
    mask: &RasterMask,
    target_count: usize,
    max_attempts_factor: usize,
    domain: SampleDomain,
    rng: &mut R,
) -> SampleSet {
    if mask.is_empty() {
        tracing::warn!(target: "sampler", "Mask is empty, falling back to uniform random fill");
        return fallback_fill(target_count, rng);
    }

    let max_attempts = target_count * max_attempts_factor;
    let mut points = Vec::with_capacity(target_count);
    let mut attempts = 0usize;

    while points.len() < target_count && attempts < max_attempts {
        attempts += 1;
        let (u, v) = draw_candidate(domain, rng);
        if mask.hit(u, v) {
            let edge = probe_edge(mask, u, v);
            points.push(SamplePoint { u, v, edge });
        }
    }

    if points.is_empty() {
        tracing::warn!(
            target: "sampler",
            "No sample accepted after {} attempts, falling back to uniform random fill",
            max_attempts
        );
        return fallback_fill(target_count, rng);
    }

    if points.len() < target_count {
        tracing::warn!(
            target: "sampler",
            "Sampling budget exhausted: accepted {} of {} after {} attempts",
            points.len(),
            target_count,
            attempts
        );
    }

    SampleSet {
        points,
        fallback: false,
    }
}

/// 复制边缘采样点，附带小抖动
///
/// 只追加，不修改已接受的基础采样点。增密轮廓边界对小块陆地 /
/// 图标在粒子预算下的可读性有决定性影响，属必需行为。
pub fn duplicate_edges<R: Rng>(set: &SampleSet, rng: &mut R) -> SampleSet {
    let mut points = set.points.clone();
    for p in &set.points {
        if p.edge {
            points.push(SamplePoint {
                u: (p.u + rng.gen_range(-EDGE_JITTER..EDGE_JITTER)).clamp(0.0, 0.999),
                v: (p.v + rng.gen_range(-EDGE_JITTER..EDGE_JITTER)).clamp(0.0, 0.999),
                edge: true,
            });
        }
    }
    SampleSet {
        points,
        fallback: set.fallback,
    }
}

/// 按采样域分布抽取候选坐标
fn draw_candidate<R: Rng>(domain: SampleDomain, rng: &mut R) -> (f32, f32) {
    match domain {
        // 球面均匀：lat = asin(2v-1)。候选仍以 (u, v) 表达，
        // v 的非均匀抽取补偿纬度圈周长差异。
        SampleDomain::Sphere => {
            let u = rng.gen_range(0.0..1.0);
            let s: f32 = rng.gen_range(-1.0..1.0);
            let lat = s.asin();
            // lat ∈ [-π/2, π/2] 映射回 v ∈ [0, 1]
            let v = lat / std::f32::consts::PI + 0.5;
            (u, v)
        }
        SampleDomain::Plane => (rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)),
    }
}

/// 探测 8 邻域，任一偏移未命中即视为边缘
fn probe_edge(mask: &RasterMask, u: f32, v: f32) -> bool {
    const OFFSETS: [(f32, f32); 8] = [
        (-1.0, -1.0),
        (0.0, -1.0),
        (1.0, -1.0),
        (-1.0, 0.0),
        (1.0, 0.0),
        (-1.0, 1.0),
        (0.0, 1.0),
        (1.0, 1.0),
    ];
    OFFSETS.iter().any(|(dx, dy)| {
        !mask.hit(u + dx * EDGE_PROBE_OFFSET, v + dy * EDGE_PROBE_OFFSET)
    })
}

/// 全域均匀随机填充（空掩码回退路径）
fn fallback_fill<R: Rng>(target_count: usize, rng: &mut R) -> SampleSet {
    let points = (0..target_count)
        .map(|_| SamplePoint {
            u: rng.gen_range(0.0..1.0),
            v: rng.gen_range(0.0..1.0),
            edge: false,
        })
        .collect();
    SampleSet {
        points,
        fallback: true,
    }
}
