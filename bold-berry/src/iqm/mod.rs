//! 图像质量指标 (Image Quality Metrics).
//!
//! 从 4D BOLD 扫描计算脑掩膜以及四项无参考指标:
//!
//! 1. tSNR: 时间信噪比, 逐体素 `mean / std`;
//! 2. CoV: 变异系数, 逐体素 `100 * std / mean`;
//! 3. DVARS: 相邻帧信号差的均方根, 每帧一个值;
//! 4. GCOR: 全局相关, 所有体素对相关系数的平均.
//!
//! 所有标量汇总都只在掩膜内的体素上计算. 掩膜为空时汇总值无定义 (`None`).
//! 所有计算都是 `(V, M)` 的纯函数.

mod dvars;
mod gcor;
mod mask;
mod report;
mod voxel;

use ndarray::Array3;

pub use dvars::Dvars;
pub use gcor::gcor;
pub use mask::BrainMask;
pub use report::IqmDocument;
pub use voxel::{cov_map, masked_median, tsnr_map};

use crate::consts::iqm::{MASK_FRAC, MASK_PERCENTILE, SPIKE_FACTOR};
use crate::BoldScan;

/// IQM 计算参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IqmSpec {
    /// 掩膜阈值系数.
    pub mask_frac: f64,

    /// 掩膜阈值百分位数, `0..=100`.
    pub mask_percentile: f64,

    /// DVARS 尖峰判定系数.
    pub spike_factor: f64,
}

impl Default for IqmSpec {
    fn default() -> Self {
        Self {
            mask_frac: MASK_FRAC,
            mask_percentile: MASK_PERCENTILE,
            spike_factor: SPIKE_FACTOR,
        }
    }
}

/// IQM 标量汇总.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IqmSummary {
    /// 掩膜内体素个数.
    pub n_voxels_mask: usize,

    /// 掩膜内 tSNR 中位数.
    pub tsnr_median: Option<f64>,

    /// 掩膜内 CoV 中位数 (百分比).
    pub cov_median: Option<f64>,

    /// DVARS 中位数 (不含第 0 帧).
    pub dvars_median: Option<f64>,

    /// DVARS 尖峰帧个数.
    pub dvars_n_spikes: usize,

    /// DVARS 尖峰判定系数.
    pub dvars_spike_threshold_factor: f64,

    /// 全局相关.
    pub gcor: Option<f64>,
}

/// 一次 IQM 计算的全部输出.
#[derive(Debug, Clone)]
pub struct IqmOutput {
    /// 脑掩膜.
    pub mask: BrainMask,

    /// tSNR 图, 掩膜外为 0.
    pub tsnr_map: Array3<f32>,

    /// CoV 图 (百分比), 掩膜外为 0.
    pub cov_map: Array3<f32>,

    /// DVARS 序列.
    pub dvars: Dvars,

    /// 全局相关.
    pub gcor: Option<f64>,
}

impl IqmOutput {
    /// 对 `scan` 计算掩膜与全部指标.
    pub fn compute(scan: &BoldScan, spec: &IqmSpec) -> Self {
        let moments = scan.temporal_moments();
        let mask = BrainMask::from_moments(&moments, spec);
        if mask.is_empty() {
            log::warn!("brain mask is empty, IQM summaries are undefined");
        }
        let tsnr_map = tsnr_map(&moments, &mask);
        let cov_map = cov_map(&moments, &mask);
        let dvars = Dvars::compute(scan.data(), &moments, &mask, spec.spike_factor);
        let gcor = gcor(scan.data(), &moments, &mask);
        Self {
            mask,
            tsnr_map,
            cov_map,
            dvars,
            gcor,
        }
    }

    /// 计算标量汇总.
    pub fn summary(&self) -> IqmSummary {
        IqmSummary {
            n_voxels_mask: self.mask.n_voxels(),
            tsnr_median: masked_median(&self.tsnr_map, &self.mask),
            cov_median: masked_median(&self.cov_map, &self.mask),
            dvars_median: self.dvars.median(),
            dvars_n_spikes: self.dvars.n_spikes(),
            dvars_spike_threshold_factor: self.dvars.spike_factor(),
            gcor: self.gcor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TemporalMoments;
    use ndarray::Array4;

    fn near(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    /// 4x4x4 的 volume, 只有 x, y, z 均小于 2 的 8 个体素有信号 `[100, 110, 120, 130]`.
    fn eight_voxel_scan() -> BoldScan {
        let series = [100.0f32, 110.0, 120.0, 130.0];
        let data = Array4::from_shape_fn((4, 4, 4, 4), |(x, y, z, t)| {
            if x < 2 && y < 2 && z < 2 {
                series[t]
            } else {
                0.0
            }
        });
        BoldScan::fake(data, [2.0; 3]).unwrap()
    }

    #[test]
    fn test_eight_voxel_scenario() {
        let out = IqmOutput::compute(&eight_voxel_scan(), &IqmSpec::default());
        let s = out.summary();

        assert_eq!(s.n_voxels_mask, 8);

        let std = (500.0f64 / 3.0).sqrt();
        assert!(near(std, 12.91, 1e-2));
        assert!(near(s.tsnr_median.unwrap(), 115.0 / std, 1e-4));
        assert!(near(s.tsnr_median.unwrap(), 8.91, 1e-2));
        assert!(near(s.cov_median.unwrap(), 100.0 * std / 115.0, 1e-4));

        assert!(near(s.dvars_median.unwrap(), 10.0 * 1000.0 / 115.0, 1e-6));
        assert!(near(s.dvars_median.unwrap(), 86.96, 1e-2));
        assert_eq!(s.dvars_n_spikes, 0);
        assert_eq!(s.dvars_spike_threshold_factor, 1.5);

        // 所有体素完全相关.
        assert!(near(s.gcor.unwrap(), 1.0, 1e-9));
    }

    #[test]
    fn test_maps_are_zero_outside_mask() {
        let out = IqmOutput::compute(&eight_voxel_scan(), &IqmSpec::default());
        for ((x, y, z), &v) in out.tsnr_map.indexed_iter() {
            let inside = x < 2 && y < 2 && z < 2;
            assert_eq!(inside, out.mask.contains((x, y, z)));
            if inside {
                assert!(v > 0.0);
            } else {
                assert_eq!(v, 0.0);
                assert_eq!(out.cov_map[[x, y, z]], 0.0);
            }
        }
    }

    #[test]
    fn test_zero_std_voxel_maps_to_zero() {
        let data = Array4::from_shape_fn((2, 1, 1, 4), |(x, _, _, t)| {
            if x == 0 {
                100.0
            } else {
                100.0 + t as f32
            }
        });
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let out = IqmOutput::compute(&scan, &IqmSpec::default());
        assert_eq!(out.mask.n_voxels(), 2);
        assert_eq!(out.tsnr_map[[0, 0, 0]], 0.0);
        assert_eq!(out.cov_map[[0, 0, 0]], 0.0);
        assert!(out.tsnr_map[[1, 0, 0]].is_finite());
        assert!(out.tsnr_map[[1, 0, 0]] > 0.0);
        assert!(out.gcor.unwrap().is_finite());
    }

    #[test]
    fn test_nonpositive_mean_cov_is_zero() {
        let data = Array4::from_shape_fn((2, 1, 1, 3), |(x, _, _, t)| {
            let v = 10.0 + t as f32;
            if x == 0 {
                -v
            } else {
                v
            }
        });
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let moments = TemporalMoments::of(scan.data());
        let mask = BrainMask::from_array(Array3::from_elem((2, 1, 1), true));
        let cov = cov_map(&moments, &mask);
        assert_eq!(cov[[0, 0, 0]], 0.0);
        assert!(cov[[1, 0, 0]] > 0.0);
    }

    #[test]
    fn test_dvars_shape_and_values() {
        let data = Array4::from_shape_fn((3, 3, 2, 7), |(x, y, z, t)| {
            200.0 + (x + y + z) as f32 + ((t * t) % 5) as f32
        });
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let out = IqmOutput::compute(&scan, &IqmSpec::default());

        let series = out.dvars.series();
        assert_eq!(series.len(), 7);
        assert_eq!(out.dvars.len(), 7);
        assert_eq!(series[0], None);
        for v in &series[1..] {
            let v = v.unwrap();
            assert!(v.is_finite() && v >= 0.0);
        }
    }

    #[test]
    fn test_dvars_spike_detection() {
        // 第 4 帧出现大的跳变.
        let series = [100.0f32, 101.0, 100.0, 101.0, 140.0, 141.0, 140.0];
        let data = Array4::from_shape_fn((2, 2, 1, 7), |(_, _, _, t)| series[t]);
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let out = IqmOutput::compute(&scan, &IqmSpec::default());
        // 差分绝对值为 [1, 1, 1, 39, 1, 1], 中位数对应 1.
        assert_eq!(out.dvars.n_spikes(), 1);
        let th = out.dvars.spike_threshold().unwrap();
        assert!(near(th, 1.5 * out.dvars.median().unwrap(), 1e-12));
    }

    #[test]
    fn test_dvars_nonpositive_grand_mean_is_not_rescaled() {
        // 20 个体素恒为 -100, 阈值为 0.1 * (-100) = -10, 只有 (0, 0, 0) 进入掩膜.
        let series = [-1.0f32, -0.5, -1.0, -0.5];
        let data = Array4::from_shape_fn((3, 7, 1, 4), |(x, y, _, t)| {
            if (x, y) == (0, 0) {
                series[t]
            } else {
                -100.0
            }
        });
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let out = IqmOutput::compute(&scan, &IqmSpec::default());

        assert_eq!(out.mask.n_voxels(), 1);
        assert!(out.mask.contains((0, 0, 0)));
        // 未缩放: 单体素的 RMS 即差分绝对值.
        assert_eq!(out.dvars.median(), Some(0.5));
        assert_eq!(out.dvars.n_spikes(), 0);
        assert_eq!(&out.dvars.series()[1..], &[Some(0.5); 3]);
    }

    #[test]
    fn test_dvars_tsv_format() {
        let out = IqmOutput::compute(&eight_voxel_scan(), &IqmSpec::default());
        let mut buf = Vec::new();
        out.dvars.write_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, ["dvars", "nan", "86.9565", "86.9565", "86.9565"]);
    }

    #[test]
    fn test_gcor_bounds() {
        // 8 个体素, 不同频率和相位的正弦, 不同幅度.
        let data = Array4::from_shape_fn((2, 2, 2, 40), |(x, y, z, t)| {
            let v = (x + 2 * y + 4 * z) as f32;
            let phase = t as f32 * (0.3 + 0.1 * v) + v;
            500.0 + (1.0 + v) * phase.sin() + 0.5 * (t as f32 * 0.7).cos()
        });
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let out = IqmOutput::compute(&scan, &IqmSpec::default());
        assert_eq!(out.mask.n_voxels(), 8);
        let g = out.gcor.unwrap();
        assert!((0.0..=1.0).contains(&g), "gcor = {g}");
    }

    #[test]
    fn test_gcor_anticorrelated_pair_is_zero() {
        let data = Array4::from_shape_fn((2, 1, 1, 5), |(x, _, _, t)| {
            let d = t as f32;
            if x == 0 {
                100.0 + d
            } else {
                100.0 - d
            }
        });
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let out = IqmOutput::compute(&scan, &IqmSpec::default());
        assert!(near(out.gcor.unwrap(), 0.0, 1e-12));
    }

    #[test]
    fn test_empty_mask_is_degenerate() {
        let data = Array4::<f32>::zeros((3, 3, 3, 5));
        let scan = BoldScan::fake(data, [1.0; 3]).unwrap();
        let out = IqmOutput::compute(&scan, &IqmSpec::default());
        let s = out.summary();
        assert_eq!(s.n_voxels_mask, 0);
        assert_eq!(s.tsnr_median, None);
        assert_eq!(s.cov_median, None);
        assert_eq!(s.dvars_median, None);
        assert_eq!(s.dvars_n_spikes, 0);
        assert_eq!(s.gcor, None);
        assert_eq!(out.dvars.len(), 5);
        assert!(out.dvars.series().iter().all(Option::is_none));
        assert!(out.tsnr_map.iter().all(|v| *v == 0.0));
    }
}
