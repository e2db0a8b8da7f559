//! GCOR: 全局相关.

use ndarray::{ArrayView4, Axis, Zip};

use super::BrainMask;
use crate::data::TemporalMoments;

/// 计算全局相关系数.
///
/// 每个掩膜内体素的时间序列先去均值并除以样本标准差 (标准差为 0 时按 1 处理),
/// 再求所有体素的平均时间序列; GCOR 即该平均序列的样本方差 (除数 `t - 1`),
/// 数值上等于所有体素对相关系数的平均, 但只需 O(体素数 × 时间点数) 的计算量.
///
/// 掩膜为空时返回 `None`.
pub fn gcor(data: ArrayView4<f32>, moments: &TemporalMoments, mask: &BrainMask) -> Option<f64> {
    let n = mask.n_voxels();
    if n == 0 {
        return None;
    }
    let nt = data.len_of(Axis(3));
    debug_assert!(nt >= 2);

    let mut acc = vec![0.0f64; nt];
    Zip::from(data.lanes(Axis(3)))
        .and(moments.view())
        .and(mask.view())
        .for_each(|ts, m, &inside| {
            if !inside {
                return;
            }
            let std = match m.sample_std() {
                s if s > 0.0 => s,
                _ => 1.0,
            };
            for (a, &v) in acc.iter_mut().zip(ts.iter()) {
                *a += (v as f64 - m.mean) / std;
            }
        });

    let g: Vec<f64> = acc.into_iter().map(|s| s / n as f64).collect();
    let mean = g.iter().sum::<f64>() / nt as f64;
    let ss = g.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    Some(ss / (nt - 1) as f64)
}
