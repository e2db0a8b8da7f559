//! DVARS: 相邻帧信号差在脑内体素上的均方根.

use std::io::{self, Write};

use ndarray::{ArrayView4, Axis, Zip};

use super::BrainMask;
use crate::consts::iqm::DVARS_GRAND_MEAN;
use crate::data::TemporalMoments;
use crate::stats::median;

/// DVARS 序列及其汇总.
///
/// 序列长度等于时间点个数. 第 0 帧没有前一帧, 因此无定义;
/// 其余帧为掩膜内体素差分的均方根.
#[derive(Debug, Clone)]
pub struct Dvars {
    /// 第 1..t 帧的 DVARS 值, 长度为 `t - 1`. 掩膜为空时全为 NaN.
    frames: Vec<f64>,
    median: Option<f64>,
    n_spikes: usize,
    spike_factor: f64,
}

impl Dvars {
    /// 计算 DVARS.
    ///
    /// 先将掩膜内信号缩放到总均值为 1000 (总均值非正时不缩放), 再对时间求一阶差分.
    /// 尖峰: 大于 `spike_factor` 倍中位数的帧 (中位数只在有定义的帧上计算).
    pub fn compute(
        data: ArrayView4<f32>,
        moments: &TemporalMoments,
        mask: &BrainMask,
        spike_factor: f64,
    ) -> Self {
        let nt = data.len_of(Axis(3));
        debug_assert!(nt >= 2);

        let n = mask.n_voxels();
        let frames = if n == 0 {
            vec![f64::NAN; nt - 1]
        } else {
            // 每个体素时间点数相同, 因此总均值等于体素均值的平均.
            let grand_mean = mask
                .masked_values(moments.view())
                .iter()
                .map(|m| m.mean)
                .sum::<f64>()
                / n as f64;
            let scale = if grand_mean > 0.0 {
                DVARS_GRAND_MEAN / grand_mean
            } else {
                1.0
            };

            let mut acc = vec![0.0f64; nt - 1];
            Zip::from(data.lanes(Axis(3)))
                .and(mask.view())
                .for_each(|ts, &inside| {
                    if !inside {
                        return;
                    }
                    for i in 1..nt {
                        let d = (ts[i] as f64 - ts[i - 1] as f64) * scale;
                        acc[i - 1] += d * d;
                    }
                });
            acc.into_iter().map(|s| (s / n as f64).sqrt()).collect()
        };

        let median = median(frames.iter().copied());
        let n_spikes = match median {
            Some(m) => frames.iter().filter(|&&v| v > spike_factor * m).count(),
            None => 0,
        };

        Self {
            frames,
            median,
            n_spikes,
            spike_factor,
        }
    }

    /// 完整序列, 长度为时间点个数. 第 0 帧及无定义的帧为 `None`.
    pub fn series(&self) -> Vec<Option<f64>> {
        std::iter::once(None)
            .chain(self.frames.iter().map(|v| v.is_finite().then_some(*v)))
            .collect()
    }

    /// 序列长度 (时间点个数).
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len() + 1
    }

    /// 序列永远至少包含第 0 帧.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// 第 1..t 帧的 DVARS 值.
    #[inline]
    pub fn frames(&self) -> &[f64] {
        &self.frames
    }

    /// 有定义的帧的中位数.
    #[inline]
    pub fn median(&self) -> Option<f64> {
        self.median
    }

    /// 尖峰帧个数.
    #[inline]
    pub fn n_spikes(&self) -> usize {
        self.n_spikes
    }

    /// 尖峰判定系数.
    #[inline]
    pub fn spike_factor(&self) -> f64 {
        self.spike_factor
    }

    /// 尖峰判定阈值.
    #[inline]
    pub fn spike_threshold(&self) -> Option<f64> {
        self.median.map(|m| m * self.spike_factor)
    }

    /// 以 TSV 格式写入 `w`: 表头 `dvars`, 每行一帧, 保留 4 位小数.
    /// 无定义的帧写为 `nan`.
    pub fn write_tsv<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "dvars")?;
        for v in self.series() {
            match v {
                Some(v) => writeln!(w, "{v:.4}")?,
                None => writeln!(w, "nan")?,
            }
        }
        Ok(())
    }
}
