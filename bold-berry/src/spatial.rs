//! 空间 QC: 时间均值图与时间标准差图.

use ndarray::Array3;

use crate::data::TemporalMoments;

/// 逐体素时间均值与时间标准差 (总体标准差, 除数为 `n`).
#[derive(Debug, Clone)]
pub struct SpatialMaps {
    /// 时间均值图.
    pub mean: Array3<f32>,

    /// 时间标准差图.
    pub std: Array3<f32>,
}

impl SpatialMaps {
    /// 从逐体素时间矩生成两张图.
    pub fn of(moments: &TemporalMoments) -> Self {
        let view = moments.view();
        Self {
            mean: view.map(|m| m.mean as f32),
            std: view.map(|m| m.population_std() as f32),
        }
    }

    /// 均值图在全体体素上的最小值与最大值, 用于日志.
    pub fn mean_range(&self) -> Option<(f32, f32)> {
        self.mean.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
