use std::path::{Path, PathBuf};

use super::AnalysisStage;
use crate::consts::{DEFAULT_MODALITY, DEFAULT_SESSION, DEFAULT_TASK};

/// 数据集与结果目录的路径布局.
///
/// 原始数据按 `{wand_root}/{subject}/{session}/{modality}/{subject}_{session}_task-{task}_bold.nii.gz`
/// 组织 (BIDS 风格), 分析结果按 `{results_root}/{subject}/{stage_dir}/` 组织.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    wand_root: PathBuf,
    results_root: PathBuf,
    session: String,
    task: String,
    modality: String,
}

impl DatasetLayout {
    /// 以默认 session / task / modality 创建布局.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(wand_root: P, results_root: Q) -> Self {
        Self {
            wand_root: wand_root.into(),
            results_root: results_root.into(),
            session: DEFAULT_SESSION.to_owned(),
            task: DEFAULT_TASK.to_owned(),
            modality: DEFAULT_MODALITY.to_owned(),
        }
    }

    /// 替换 session.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    /// 替换任务名.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    /// 替换模态目录.
    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = modality.into();
        self
    }

    /// 原始数据集根目录.
    #[inline]
    pub fn wand_root(&self) -> &Path {
        &self.wand_root
    }

    /// 分析结果根目录.
    #[inline]
    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// 会话名, 如 `ses-06`.
    #[inline]
    pub fn session(&self) -> &str {
        &self.session
    }

    /// 任务名.
    #[inline]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// 模态目录名.
    #[inline]
    pub fn modality(&self) -> &str {
        &self.modality
    }

    /// 被试的模态目录 (相对于 `wand_root`).
    pub fn modality_dir_relative(&self, subject: &str) -> PathBuf {
        [subject, &self.session, &self.modality].iter().collect()
    }

    fn volume_relative(&self, subject: &str, suffix: &str) -> PathBuf {
        let mut p = self.modality_dir_relative(subject);
        p.push(format!(
            "{subject}_{}_task-{}_{suffix}.nii.gz",
            self.session, self.task
        ));
        p
    }

    /// 4D BOLD 文件路径 (相对于 `wand_root`).
    #[inline]
    pub fn bold_relative(&self, subject: &str) -> PathBuf {
        self.volume_relative(subject, "bold")
    }

    /// 单帧参考像 (sbref) 路径 (相对于 `wand_root`).
    #[inline]
    pub fn sbref_relative(&self, subject: &str) -> PathBuf {
        self.volume_relative(subject, "sbref")
    }

    /// 4D BOLD 文件绝对路径.
    #[inline]
    pub fn bold_path(&self, subject: &str) -> PathBuf {
        self.wand_root.join(self.bold_relative(subject))
    }

    /// 单帧参考像绝对路径.
    #[inline]
    pub fn sbref_path(&self, subject: &str) -> PathBuf {
        self.wand_root.join(self.sbref_relative(subject))
    }

    /// 被试的模态目录绝对路径.
    #[inline]
    pub fn modality_dir(&self, subject: &str) -> PathBuf {
        self.wand_root.join(self.modality_dir_relative(subject))
    }

    /// 某阶段的输出目录.
    pub fn stage_dir(&self, subject: &str, stage: AnalysisStage) -> PathBuf {
        let mut p = self.results_root.join(subject);
        p.push(stage.dir());
        p
    }

    /// 某阶段的完成标记路径.
    #[inline]
    pub fn marker_path(&self, subject: &str, stage: AnalysisStage) -> PathBuf {
        self.stage_dir(subject, stage).join(stage.marker())
    }
}
