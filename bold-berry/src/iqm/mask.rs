use ndarray::{Array3, ArrayView3, Zip};

use super::IqmSpec;
use crate::data::TemporalMoments;
use crate::stats::percentile;
use crate::Idx3d;

/// 基于强度阈值的简单脑掩膜.
///
/// 时间均值超过 `mask_frac * P(mask_percentile)` (百分位数取自全体体素的时间均值分布)
/// 的体素视为脑组织. 该掩膜仅在 IQM 计算内部使用, 不会持久化.
#[derive(Debug, Clone)]
pub struct BrainMask {
    data: Array3<bool>,
    n_voxels: usize,
}

impl BrainMask {
    /// 从逐体素时间矩构造掩膜.
    ///
    /// 只要有一个体素的时间均值为 NaN, 阈值即无定义, 返回空掩膜.
    pub fn from_moments(moments: &TemporalMoments, spec: &IqmSpec) -> Self {
        let view = moments.view();
        let threshold = if view.iter().any(|m| m.mean.is_nan()) {
            None
        } else {
            percentile(view.iter().map(|m| m.mean), spec.mask_percentile)
                .map(|p| spec.mask_frac * p)
        };

        let data = match threshold {
            Some(th) => view.map(|m| m.mean > th),
            None => Array3::from_elem(moments.shape(), false),
        };
        Self::from_array(data)
    }

    /// 直接由布尔数组构造掩膜.
    pub fn from_array(data: Array3<bool>) -> Self {
        let n_voxels = data.iter().filter(|v| **v).count();
        Self { data, n_voxels }
    }

    /// 掩膜内体素个数.
    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.n_voxels
    }

    /// 掩膜是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_voxels == 0
    }

    /// 空间形状 (x, y, z).
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// `pos` 是否在掩膜内. 越界时 panic.
    #[inline]
    pub fn contains(&self, (x, y, z): Idx3d) -> bool {
        self.data[[x, y, z]]
    }

    /// 获得底层数据的不可变视图.
    #[inline]
    pub fn view(&self) -> ArrayView3<'_, bool> {
        self.data.view()
    }

    /// 收集 `map` 中掩膜内的值.
    pub(crate) fn masked_values<T: Copy>(&self, map: ArrayView3<T>) -> Vec<T> {
        debug_assert_eq!(map.dim(), self.shape());
        let mut ans = Vec::with_capacity(self.n_voxels);
        Zip::from(map).and(&self.data).for_each(|&v, &inside| {
            if inside {
                ans.push(v);
            }
        });
        ans
    }
}
