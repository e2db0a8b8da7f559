//! 逐体素的 tSNR 与 CoV.

use ndarray::{Array3, Zip};

use super::BrainMask;
use crate::data::TemporalMoments;
use crate::stats::median;

/// tSNR 图: `mean / std` (样本标准差).
///
/// 掩膜外体素为 0; 掩膜内标准差为 0 (或无定义) 的体素也为 0, 以保证整张图有限.
pub fn tsnr_map(moments: &TemporalMoments, mask: &BrainMask) -> Array3<f32> {
    Zip::from(moments.view())
        .and(mask.view())
        .map_collect(|m, &inside| {
            let std = m.sample_std();
            if inside && std > 0.0 {
                (m.mean / std) as f32
            } else {
                0.0
            }
        })
}

/// CoV 图: `100 * std / mean` (百分比).
///
/// 掩膜外体素为 0; 掩膜内均值非正的体素也为 0.
pub fn cov_map(moments: &TemporalMoments, mask: &BrainMask) -> Array3<f32> {
    Zip::from(moments.view())
        .and(mask.view())
        .map_collect(|m, &inside| {
            if inside && m.mean > 0.0 {
                (100.0 * m.sample_std() / m.mean) as f32
            } else {
                0.0
            }
        })
}

/// `map` 在掩膜内的中位数. 掩膜为空时返回 `None`.
pub fn masked_median(map: &Array3<f32>, mask: &BrainMask) -> Option<f64> {
    median(mask.masked_values(map.view()).into_iter().map(f64::from))
}
