//! 层面 QC: 每个时间点每一层的平均信号.
//!
//! `slicemean[t, z]` 是第 `t` 帧第 `z` 层在整个 x-y 平面上的平均信号.
//! 层间不均匀的采集伪影 (例如某一层在部分帧上突然变暗) 在该矩阵中很容易看出.

use std::path::Path;

use ndarray::{s, Array2, ArrayView2, ArrayView4, Axis};
use ndarray_npy::WriteNpyError;

/// 每帧每层平均信号矩阵, 形状为 `(t, z)`.
#[derive(Debug, Clone)]
pub struct SliceMeans {
    data: Array2<f32>,
}

/// 某一层在时间方向上的统计.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SliceProfile {
    /// 层号.
    pub z: usize,

    /// 时间均值.
    pub mean: f64,

    /// 时间标准差 (除数为帧数).
    pub std: f64,
}

impl SliceMeans {
    /// 对 `[x, y, z, t]` 组织的 4D 数据计算层均值.
    pub fn of(data: ArrayView4<f32>) -> Self {
        let (nx, ny, nz, nt) = data.dim();
        let n = (nx * ny) as f64;
        let data = Array2::from_shape_fn((nt, nz), |(t, z)| {
            let sum: f64 = data.slice(s![.., .., z, t]).iter().map(|&v| v as f64).sum();
            (sum / n) as f32
        });
        Self { data }
    }

    /// `(帧数, 层数)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// 获得底层数据的不可变视图.
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 每一层的时间统计.
    pub fn profile(&self) -> Vec<SliceProfile> {
        self.data
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(z, col)| {
                let n = col.len() as f64;
                let mean = col.iter().map(|&v| v as f64).sum::<f64>() / n;
                let var = col
                    .iter()
                    .map(|&v| (v as f64 - mean) * (v as f64 - mean))
                    .sum::<f64>()
                    / n;
                SliceProfile {
                    z,
                    mean,
                    std: var.sqrt(),
                }
            })
            .collect()
    }

    /// 以 `.npy` 格式保存到 `path`.
    pub fn write_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError> {
        ndarray_npy::write_npy(path, &self.data)
    }
}
