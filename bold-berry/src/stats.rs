//! 一维统计量: 百分位数与中位数.
//!
//! 与 numpy 默认的线性插值百分位数定义保持一致. NaN 样本会被忽略.

use ordered_float::NotNan;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::slice::ParallelSliceMut;

        #[inline]
        fn sort(values: &mut [NotNan<f64>]) {
            values.par_sort_unstable();
        }
    } else {
        #[inline]
        fn sort(values: &mut [NotNan<f64>]) {
            values.sort_unstable();
        }
    }
}

/// 已排序的非 NaN 样本.
#[derive(Debug, Clone)]
pub struct Sorted(Vec<NotNan<f64>>);

impl Sorted {
    /// 收集 `it` 中的所有非 NaN 值并排序.
    pub fn from_iter<I: IntoIterator<Item = f64>>(it: I) -> Self {
        let mut v: Vec<NotNan<f64>> = it.into_iter().filter_map(|x| NotNan::new(x).ok()).collect();
        sort(&mut v);
        Self(v)
    }

    /// 有效样本个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否没有任何有效样本.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 第 `q` 百分位数 (`0 <= q <= 100`), 相邻秩之间线性插值.
    ///
    /// 没有有效样本时返回 `None`.
    pub fn percentile(&self, q: f64) -> Option<f64> {
        debug_assert!((0.0..=100.0).contains(&q));
        let n = self.0.len();
        if n == 0 {
            return None;
        }
        let rank = q / 100.0 * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = (rank.ceil() as usize).min(n - 1);
        let (a, b) = (self.0[lo].into_inner(), self.0[hi].into_inner());
        Some(a + (b - a) * (rank - lo as f64))
    }

    /// 中位数. 偶数个样本时取中间两个的平均.
    #[inline]
    pub fn median(&self) -> Option<f64> {
        self.percentile(50.0)
    }
}

/// 计算 `it` 中所有非 NaN 值的中位数.
#[inline]
pub fn median<I: IntoIterator<Item = f64>>(it: I) -> Option<f64> {
    Sorted::from_iter(it).median()
}

/// 计算 `it` 中所有非 NaN 值的第 `q` 百分位数.
#[inline]
pub fn percentile<I: IntoIterator<Item = f64>>(it: I, q: f64) -> Option<f64> {
    Sorted::from_iter(it).percentile(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median([3.0, 1.0, 2.0]), Some(2.0));
        assert!(f64_eq(median([4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5));
        assert_eq!(median(Vec::<f64>::new()), None);
    }

    #[test]
    fn test_nan_is_ignored() {
        assert_eq!(median([f64::NAN, 7.0]), Some(7.0));
        assert_eq!(median([f64::NAN]), None);
    }

    /// 对照 `np.percentile(np.arange(1, 11), q)`.
    #[test]
    fn test_percentile_matches_numpy_linear() {
        let s = Sorted::from_iter((1..=10).map(f64::from));
        assert!(f64_eq(s.percentile(0.0).unwrap(), 1.0));
        assert!(f64_eq(s.percentile(100.0).unwrap(), 10.0));
        assert!(f64_eq(s.percentile(95.0).unwrap(), 9.55));
        assert!(f64_eq(s.percentile(25.0).unwrap(), 3.25));
    }
}
