use crate::consts::artifacts;

/// 分析阶段. 执行顺序固定为 `SpatialQc -> SliceQc -> Iqm`, 即 [`AnalysisStage::ALL`] 的顺序.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AnalysisStage {
    /// 空间 QC: 时间均值图与标准差图.
    SpatialQc,

    /// 切片 QC: 每帧每层平均信号.
    SliceQc,

    /// 图像质量指标.
    Iqm,
}

impl AnalysisStage {
    /// 所有阶段, 按执行顺序排列.
    pub const ALL: [AnalysisStage; 3] = [Self::SpatialQc, Self::SliceQc, Self::Iqm];

    /// 机器可读名称.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SpatialQc => "spatial_qc",
            Self::SliceQc => "slice_qc",
            Self::Iqm => "iqm",
        }
    }

    /// 结果子目录名. 空间 QC 沿用已有结果树中的 `visualise_bold`.
    #[inline]
    pub const fn dir(&self) -> &'static str {
        match self {
            Self::SpatialQc => "visualise_bold",
            Self::SliceQc => "slice_qc",
            Self::Iqm => "iqm",
        }
    }

    /// 人类可读名称.
    #[inline]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::SpatialQc => "Spatial QC",
            Self::SliceQc => "Slice QC",
            Self::Iqm => "IQM",
        }
    }

    /// 完成标记文件名. 该文件存在即表示阶段已完成.
    #[inline]
    pub const fn marker(&self) -> &'static str {
        match self {
            Self::SpatialQc => artifacts::MEAN_BOLD,
            Self::SliceQc => artifacts::SLICEMEAN,
            Self::Iqm => artifacts::IQM_JSON,
        }
    }

    /// 在 [`AnalysisStage::ALL`] 中的下标.
    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
