//! 批处理各环节的错误类型.

use std::io;
use std::path::PathBuf;

use bold_berry::dataset::AnalysisStage;
use bold_berry::OpenBoldError;
use thiserror::Error;

/// 数据下载失败. 只影响当前被试.
#[derive(Debug, Error)]
#[error("fetch of {subject} failed (exit code {code:?})")]
pub struct FetchError {
    /// 被试 ID.
    pub subject: String,

    /// 下载命令退出码. 无法启动或被信号终止时为 `None`.
    pub code: Option<i32>,

    /// 捕获的输出.
    pub output: String,
}

/// 分析阶段失败. 当前被试的后续阶段不再运行.
#[derive(Debug, Error)]
#[error("{stage} failed (exit code {code:?})")]
pub struct StageError {
    /// 失败的阶段.
    pub stage: AnalysisStage,

    /// 阶段命令退出码. 命令成功但未写出完成标记时为 `Some(0)`.
    pub code: Option<i32>,

    /// 捕获的输出.
    pub output: String,
}

/// 清理原始数据失败. 不影响被试状态.
#[derive(Debug, Error)]
#[error("drop failed (exit code {code:?})")]
pub struct DropError {
    /// 清理命令退出码.
    pub code: Option<i32>,

    /// 捕获的输出.
    pub output: String,
}

/// 配置错误. 在处理任何被试之前发生, 终止整个批次.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 没有可处理的被试.
    #[error("no subjects resolved: {0}")]
    NoSubjects(String),

    /// 无法读取文件 (配置文件或被试列表).
    #[error("cannot read {path}: {source}")]
    Read {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: io::Error,
    },

    /// 配置文件格式错误.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: toml::de::Error,
    },
}

/// 批处理整体失败. 个别被试的失败不属于此类.
#[derive(Debug, Error)]
pub enum BatchError {
    /// 配置错误.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 运行日志写入失败.
    #[error("cannot write run log {path}: {source}")]
    Persist {
        /// 日志路径.
        path: PathBuf,
        /// 底层错误.
        source: io::Error,
    },

    /// 运行日志序列化失败.
    #[error("cannot encode run log: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 阶段子命令内部的计算错误.
#[derive(Debug, Error)]
pub enum StageComputeError {
    /// 原始数据不存在或只是占位文件.
    #[error("{0} is missing or not materialized")]
    NotMaterialized(PathBuf),

    /// 读取扫描失败.
    #[error("cannot open {path}: {source}")]
    Open {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: OpenBoldError,
    },

    /// 写 nifti 输出失败.
    #[error("cannot write {path}: {source}")]
    Nifti {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: nifti::NiftiError,
    },

    /// 写 npy 输出失败.
    #[error("cannot write {path}: {source}")]
    Npy {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: ndarray_npy::WriteNpyError,
    },

    /// 其它 I/O 错误.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: io::Error,
    },

    /// 序列化失败.
    #[error("cannot encode {path}: {source}")]
    Encode {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: serde_json::Error,
    },
}
