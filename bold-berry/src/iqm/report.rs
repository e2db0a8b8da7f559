//! `iqm.json` 文档.

use super::IqmSummary;

/// 写入 `iqm.json` 的文档. 中位数保留 4 位小数, GCOR 保留 6 位.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IqmDocument {
    /// 被试 ID, 如 `sub-08033`.
    pub subject: String,

    /// 会话名, 如 `ses-06`.
    pub session: String,

    /// 掩膜内体素个数.
    pub n_voxels_mask: usize,

    /// 掩膜内 tSNR 中位数.
    pub tsnr_median: Option<f64>,

    /// 掩膜内 CoV 中位数.
    pub cov_median: Option<f64>,

    /// DVARS 中位数.
    pub dvars_median: Option<f64>,

    /// DVARS 尖峰帧个数.
    pub dvars_n_spikes: usize,

    /// DVARS 尖峰判定系数.
    pub dvars_spike_threshold_factor: f64,

    /// 全局相关.
    pub gcor: Option<f64>,
}

impl IqmDocument {
    /// 由汇总构造文档, 并按约定位数舍入.
    pub fn new(subject: impl Into<String>, session: impl Into<String>, s: &IqmSummary) -> Self {
        Self {
            subject: subject.into(),
            session: session.into(),
            n_voxels_mask: s.n_voxels_mask,
            tsnr_median: s.tsnr_median.map(|v| round_to(v, 4)),
            cov_median: s.cov_median.map(|v| round_to(v, 4)),
            dvars_median: s.dvars_median.map(|v| round_to(v, 4)),
            dvars_n_spikes: s.dvars_n_spikes,
            dvars_spike_threshold_factor: s.dvars_spike_threshold_factor,
            gcor: s.gcor.map(|v| round_to(v, 6)),
        }
    }
}

fn round_to(v: f64, digits: i32) -> f64 {
    let k = 10f64.powi(digits);
    (v * k).round() / k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        let s = IqmSummary {
            n_voxels_mask: 8,
            tsnr_median: Some(8.907_842_2),
            cov_median: Some(11.226_0),
            dvars_median: Some(86.956_521_7),
            dvars_n_spikes: 0,
            dvars_spike_threshold_factor: 1.5,
            gcor: Some(0.123_456_789),
        };
        let doc = IqmDocument::new("sub-08033", "ses-06", &s);
        assert_eq!(doc.subject, "sub-08033");
        assert_eq!(doc.tsnr_median, Some(8.9078));
        assert_eq!(doc.dvars_median, Some(86.9565));
        assert_eq!(doc.gcor, Some(0.123457));
        assert_eq!(doc.dvars_n_spikes, 0);
    }

    #[test]
    fn test_empty_mask_keeps_none() {
        let s = IqmSummary {
            n_voxels_mask: 0,
            tsnr_median: None,
            cov_median: None,
            dvars_median: None,
            dvars_n_spikes: 0,
            dvars_spike_threshold_factor: 1.5,
            gcor: None,
        };
        let doc = IqmDocument::new("sub-1", "ses-06", &s);
        assert_eq!(doc.tsnr_median, None);
        assert_eq!(doc.gcor, None);
    }
}
