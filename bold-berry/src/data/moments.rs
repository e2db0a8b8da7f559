//! 逐体素时间方向统计量.

use ndarray::{Array3, ArrayView1, ArrayView3, ArrayView4, Axis, Zip};

use crate::Idx3d;

/// 单条时间序列的均值和离差平方和.
///
/// 使用两遍法计算, 以 `f64` 累加, 避免大量 `f32` 样本求和时的精度损失.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Moments {
    /// 样本个数.
    pub n: usize,

    /// 均值.
    pub mean: f64,

    /// 离差平方和, 即 `sum((x - mean)^2)`.
    pub m2: f64,
}

impl Moments {
    /// 计算时间序列 `ts` 的矩.
    pub fn of(ts: ArrayView1<f32>) -> Self {
        let n = ts.len();
        if n == 0 {
            return Self {
                n,
                mean: f64::NAN,
                m2: f64::NAN,
            };
        }
        let mean = ts.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let m2 = ts
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>();
        Self { n, mean, m2 }
    }

    /// 样本标准差 (除数为 `n - 1`). 样本不足两个时返回 NaN.
    #[inline]
    pub fn sample_std(&self) -> f64 {
        if self.n < 2 {
            f64::NAN
        } else {
            (self.m2 / (self.n - 1) as f64).sqrt()
        }
    }

    /// 总体标准差 (除数为 `n`).
    #[inline]
    pub fn population_std(&self) -> f64 {
        (self.m2 / self.n as f64).sqrt()
    }
}

/// 整个 volume 的逐体素时间矩, 形状为 (x, y, z).
#[derive(Debug, Clone)]
pub struct TemporalMoments {
    data: Array3<Moments>,
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        fn collect_moments(data: ArrayView4<f32>) -> Array3<Moments> {
            Zip::from(data.lanes(Axis(3))).par_map_collect(Moments::of)
        }
    } else {
        fn collect_moments(data: ArrayView4<f32>) -> Array3<Moments> {
            Zip::from(data.lanes(Axis(3))).map_collect(Moments::of)
        }
    }
}

impl TemporalMoments {
    /// 对 `[x, y, z, t]` 组织的 4D 数据逐体素计算时间矩.
    pub fn of(data: ArrayView4<f32>) -> Self {
        Self {
            data: collect_moments(data),
        }
    }

    /// 空间形状 (x, y, z).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获得底层数据的不可变视图.
    #[inline]
    pub fn view(&self) -> ArrayView3<'_, Moments> {
        self.data.view()
    }

    /// 时间均值图.
    pub fn mean_map(&self) -> Array3<f64> {
        self.data.map(|m| m.mean)
    }

    /// 时间标准差图 (总体标准差, 除数为 `n`).
    pub fn population_std_map(&self) -> Array3<f64> {
        self.data.map(Moments::population_std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array4};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_moments_basic() {
        let ts = arr1(&[100.0f32, 110.0, 120.0, 130.0]);
        let m = Moments::of(ts.view());
        assert_eq!(m.n, 4);
        assert!(f64_eq(m.mean, 115.0));
        assert!(f64_eq(m.m2, 500.0));
        assert!(f64_eq(m.sample_std(), (500.0f64 / 3.0).sqrt()));
        assert!(f64_eq(m.population_std(), 125.0f64.sqrt()));
    }

    #[test]
    fn test_moments_single_sample() {
        let m = Moments::of(arr1(&[5.0f32]).view());
        assert!(m.sample_std().is_nan());
        assert!(f64_eq(m.population_std(), 0.0));
    }

    #[test]
    fn test_temporal_moments_shape_and_values() {
        let data = Array4::from_shape_fn((2, 3, 4, 5), |(x, y, z, t)| {
            (x + y + z) as f32 * 10.0 + t as f32
        });
        let tm = TemporalMoments::of(data.view());
        assert_eq!(tm.shape(), (2, 3, 4));

        let mean = tm.mean_map();
        assert!(f64_eq(mean[[1, 2, 3]], 62.0));
        assert!(f64_eq(mean[[0, 0, 0]], 2.0));

        let std = tm.population_std_map();
        assert!(f64_eq(std[[1, 1, 1]], 2.0f64.sqrt()));
    }
}
