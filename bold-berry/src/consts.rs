//! 通用常量.

/// 已下载 (materialized) 文件的最小字节数.
///
/// 内容寻址存储 (git-annex) 中, 未获取内容的文件只是一个很小的指针文件.
/// 大小超过该值的文件才被视为真实数据.
pub const MATERIALIZED_BYTES: u64 = 1024 * 1024;

/// 默认 session.
pub const DEFAULT_SESSION: &str = "ses-06";

/// 默认任务名 (静息态).
pub const DEFAULT_TASK: &str = "rest";

/// 默认模态目录.
pub const DEFAULT_MODALITY: &str = "func";

/// 被试目录前缀.
pub const SUBJECT_PREFIX: &str = "sub-";

/// 脑掩膜与 IQM 的默认参数.
pub mod iqm {
    /// 掩膜阈值系数: 时间均值超过 `MASK_FRAC * P(MASK_PERCENTILE)` 的体素入选.
    pub const MASK_FRAC: f64 = 0.1;

    /// 掩膜阈值所用的百分位数.
    pub const MASK_PERCENTILE: f64 = 95.0;

    /// DVARS 尖峰判定系数: 大于 `SPIKE_FACTOR * median` 的帧视为尖峰.
    pub const SPIKE_FACTOR: f64 = 1.5;

    /// DVARS 计算前, 脑内体素总均值被缩放到该值.
    pub const DVARS_GRAND_MEAN: f64 = 1000.0;
}

/// 各分析阶段的输出文件名.
pub mod artifacts {
    /// Spatial QC 完成标记: 时间均值图.
    pub const MEAN_BOLD: &str = "mean_bold.nii.gz";

    /// Spatial QC 附带输出: 时间标准差图.
    pub const STD_BOLD: &str = "std_bold.nii.gz";

    /// Slice QC 完成标记: 每帧每层的平均信号.
    pub const SLICEMEAN: &str = "slicemean.npy";

    /// IQM 完成标记: 标量汇总.
    pub const IQM_JSON: &str = "iqm.json";

    /// IQM 附带输出: tSNR 图.
    pub const TSNR_MAP: &str = "tsnr_map.nii.gz";

    /// IQM 附带输出: CoV 图.
    pub const COV_MAP: &str = "cov_map.nii.gz";

    /// IQM 附带输出: 每帧 DVARS.
    pub const DVARS_TSV: &str = "dvars.tsv";
}
