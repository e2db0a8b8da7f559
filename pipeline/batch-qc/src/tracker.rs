//! 完成状态检查.

use bold_berry::dataset::{AnalysisStage, DatasetLayout};

/// 某个被试各阶段的完成情况, 按 [`AnalysisStage::ALL`] 顺序排列.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion([bool; 3]);

impl Completion {
    /// `stage` 是否已完成.
    #[inline]
    pub fn is_done(&self, stage: AnalysisStage) -> bool {
        self.0[stage.index()]
    }

    /// 所有阶段均已完成.
    #[inline]
    pub fn all_done(&self) -> bool {
        self.0.iter().all(|d| *d)
    }

    /// 至少一个阶段已完成.
    #[inline]
    pub fn any_done(&self) -> bool {
        self.0.iter().any(|d| *d)
    }

    /// 将 `stage` 标记为已完成.
    #[cfg(test)]
    pub(crate) fn with_done(mut self, stage: AnalysisStage) -> Self {
        self.0[stage.index()] = true;
        self
    }

    /// 按执行顺序第一个未完成的阶段.
    pub fn first_missing(&self) -> Option<AnalysisStage> {
        AnalysisStage::ALL.into_iter().find(|s| !self.is_done(*s))
    }
}

/// 通过检查完成标记文件是否存在来判断阶段是否完成. 不检查文件内容, 也不缓存结果.
#[derive(Debug, Clone, Copy)]
pub struct CompletionTracker<'a> {
    layout: &'a DatasetLayout,
}

impl<'a> CompletionTracker<'a> {
    /// 创建.
    pub fn new(layout: &'a DatasetLayout) -> Self {
        Self { layout }
    }

    /// 读取 `subject` 的完成情况.
    pub fn status(&self, subject: &str) -> Completion {
        Completion(AnalysisStage::ALL.map(|s| {
            let marker = self.layout.marker_path(subject, s);
            let done = marker.exists();
            log::debug!("{subject}: {} -> {done}", marker.display());
            done
        }))
    }
}
