//! 批处理配置.
//!
//! 配置按以下优先级逐层覆盖 (从高到低):
//!
//! 1. 命令行参数;
//! 2. 环境变量 `$WAND_ROOT`, `$QC_RESULTS_DIR`, `$QC_LOGS_DIR`, `$QC_SESSION`;
//! 3. `--config` 指定的 TOML 文件;
//! 4. 编译期默认值.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use bold_berry::consts::{DEFAULT_MODALITY, DEFAULT_SESSION, DEFAULT_TASK, MATERIALIZED_BYTES};
use bold_berry::dataset::{discover_subjects, read_subject_file, DatasetLayout};
use bold_berry::iqm::IqmSpec;
use serde::Deserialize;

use crate::error::ConfigError;

/// 下载命令模板. 参数中的 `{subject}`, `{session}`, `{modality}` 会被替换.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchTemplate {
    /// 程序名.
    pub program: String,

    /// 参数模板.
    pub args: Vec<String>,
}

impl Default for FetchTemplate {
    fn default() -> Self {
        Self {
            program: "bash".to_owned(),
            args: ["scripts/download.sh", "{subject}", "{session}", "{modality}"]
                .map(str::to_owned)
                .to_vec(),
        }
    }
}

impl FetchTemplate {
    /// 替换占位符, 得到实际参数.
    pub fn render(&self, subject: &str, session: &str, modality: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace("{subject}", subject)
                    .replace("{session}", session)
                    .replace("{modality}", modality)
            })
            .collect()
    }
}

/// 批处理配置.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QcConfig {
    /// 原始数据集根目录.
    pub wand_root: PathBuf,

    /// 分析结果根目录.
    pub results_root: PathBuf,

    /// 运行日志目录.
    pub logs_dir: PathBuf,

    /// 下载命令和阶段命令的工作目录.
    pub work_dir: PathBuf,

    /// 会话名.
    pub session: String,

    /// 任务名.
    pub task: String,

    /// 模态目录名.
    pub modality: String,

    /// 超过该字节数的文件才视为已下载.
    pub materialized_bytes: u64,

    /// 下载命令.
    pub fetch: FetchTemplate,

    /// 内容寻址存储的命令行程序, 以 `<drop_program> drop <files>` 的方式调用.
    pub drop_program: String,

    /// 清理时使用的 ssh 私钥. 默认为 `~/.ssh/wand_deploy_key` (若存在).
    pub deploy_key: Option<PathBuf>,

    /// 所有子命令 `PATH` 的前缀目录.
    pub path_prefix: Option<PathBuf>,

    /// 阶段子命令所在的可执行文件. 默认为当前程序.
    pub stage_program: Option<PathBuf>,

    /// IQM 参数.
    pub iqm: IqmSpec,

    /// 加载的配置文件.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            wand_root: PathBuf::from("data/WAND"),
            results_root: PathBuf::from("results"),
            logs_dir: PathBuf::from("logs"),
            work_dir: PathBuf::from("."),
            session: DEFAULT_SESSION.to_owned(),
            task: DEFAULT_TASK.to_owned(),
            modality: DEFAULT_MODALITY.to_owned(),
            materialized_bytes: MATERIALIZED_BYTES,
            fetch: FetchTemplate::default(),
            drop_program: "git-annex".to_owned(),
            deploy_key: default_deploy_key(),
            path_prefix: None,
            stage_program: None,
            iqm: IqmSpec::default(),
            source: None,
        }
    }
}

/// `~/.ssh/wand_deploy_key`, 仅在文件存在时使用.
fn default_deploy_key() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".ssh").join("wand_deploy_key"))
        .filter(|p| p.is_file())
}

impl QcConfig {
    /// 从 TOML 文件加载. 文件中缺失的键取默认值.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let mut cfg: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        cfg.source = Some(path.to_owned());
        Ok(cfg)
    }

    /// 用环境变量覆盖对应的键.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|k| env::var_os(k));
    }

    /// 用 `lookup` 提供的变量覆盖对应的键. 空值被忽略.
    pub fn apply_env_with<F: Fn(&str) -> Option<OsString>>(&mut self, lookup: F) {
        let get = |k: &str| lookup(k).filter(|v| !v.is_empty());
        if let Some(v) = get("WAND_ROOT") {
            self.wand_root = v.into();
        }
        if let Some(v) = get("QC_RESULTS_DIR") {
            self.results_root = v.into();
        }
        if let Some(v) = get("QC_LOGS_DIR") {
            self.logs_dir = v.into();
        }
        if let Some(v) = get("QC_SESSION") {
            self.session = v.to_string_lossy().into_owned();
        }
    }

    /// 将相对路径解析为以 `base` 为起点的绝对路径.
    ///
    /// 子命令在 `work_dir` 下运行, 传给它们的路径必须与本进程看到的一致.
    pub fn resolve_paths(&mut self, base: &Path) {
        let abs = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for p in [
            &mut self.wand_root,
            &mut self.results_root,
            &mut self.logs_dir,
            &mut self.work_dir,
        ] {
            abs(p);
        }
        for p in [&mut self.source, &mut self.deploy_key, &mut self.path_prefix]
            .into_iter()
            .flatten()
        {
            abs(p);
        }
    }

    /// 数据集路径布局.
    pub fn layout(&self) -> DatasetLayout {
        DatasetLayout::new(&self.wand_root, &self.results_root)
            .with_session(&self.session)
            .with_task(&self.task)
            .with_modality(&self.modality)
    }

    /// 所有子命令共用的额外环境变量.
    pub fn child_env(&self) -> Vec<(OsString, OsString)> {
        let Some(prefix) = &self.path_prefix else {
            return Vec::new();
        };
        let mut paths = vec![prefix.clone()];
        if let Some(old) = env::var_os("PATH") {
            paths.extend(env::split_paths(&old));
        }
        match env::join_paths(paths) {
            Ok(joined) => vec![(OsString::from("PATH"), joined)],
            Err(e) => {
                log::warn!("ignoring path prefix {}: {e}", prefix.display());
                Vec::new()
            }
        }
    }

    /// 清理命令使用的 `GIT_SSH_COMMAND`.
    pub fn git_ssh_command(&self) -> Option<String> {
        self.deploy_key
            .as_ref()
            .map(|k| format!("ssh -i {} -o IdentitiesOnly=yes", k.display()))
    }
}

/// 命令行中的配置参数. 所有子命令共享.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// TOML 配置文件.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 原始数据集根目录.
    #[arg(long, global = true)]
    pub wand_root: Option<PathBuf>,

    /// 分析结果根目录.
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// 运行日志目录.
    #[arg(long, global = true)]
    pub logs_dir: Option<PathBuf>,

    /// 会话名, 如 `ses-06`.
    #[arg(long, global = true)]
    pub session: Option<String>,
}

impl ConfigArgs {
    /// 按优先级合并各层配置. 返回的配置中路径均为绝对路径.
    pub fn load(&self) -> Result<QcConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => QcConfig::from_file(path)?,
            None => QcConfig::default(),
        };
        cfg.apply_env();
        self.apply(&mut cfg);

        let cwd = env::current_dir().map_err(|source| ConfigError::Read {
            path: PathBuf::from("."),
            source,
        })?;
        cfg.resolve_paths(&cwd);
        Ok(cfg)
    }

    /// 用命令行参数覆盖对应的键.
    pub fn apply(&self, cfg: &mut QcConfig) {
        if let Some(v) = &self.wand_root {
            cfg.wand_root = v.clone();
        }
        if let Some(v) = &self.results_dir {
            cfg.results_root = v.clone();
        }
        if let Some(v) = &self.logs_dir {
            cfg.logs_dir = v.clone();
        }
        if let Some(v) = &self.session {
            cfg.session = v.clone();
        }
    }

    /// 将已合并的配置转写为命令行参数, 传给阶段子命令.
    pub fn forward(cfg: &QcConfig) -> Vec<OsString> {
        let mut ans = Vec::with_capacity(10);
        if let Some(src) = &cfg.source {
            ans.push("--config".into());
            ans.push(src.into());
        }
        ans.push("--wand-root".into());
        ans.push(cfg.wand_root.clone().into());
        ans.push("--results-dir".into());
        ans.push(cfg.results_root.clone().into());
        ans.push("--logs-dir".into());
        ans.push(cfg.logs_dir.clone().into());
        ans.push("--session".into());
        ans.push(cfg.session.clone().into());
        ans
    }
}

/// 被试选择方式.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SubjectSelection {
    /// 被试 ID, 如 `sub-43766 sub-64927`.
    pub subjects: Vec<String>,

    /// 每行一个被试 ID 的文本文件.
    #[arg(long, conflicts_with = "all")]
    pub file: Option<PathBuf>,

    /// 处理数据集中所有含有 `{session}/{modality}/` 目录的被试.
    #[arg(long)]
    pub all: bool,
}

impl SubjectSelection {
    /// 解析得到待处理的被试列表. 结果为空时返回 [`ConfigError::NoSubjects`].
    pub fn resolve(&self, cfg: &QcConfig) -> Result<Vec<String>, ConfigError> {
        let subjects = if self.all {
            discover_subjects(&cfg.wand_root, &cfg.session, &cfg.modality).map_err(|source| {
                ConfigError::Read {
                    path: cfg.wand_root.clone(),
                    source,
                }
            })?
        } else if let Some(file) = &self.file {
            read_subject_file(file).map_err(|source| ConfigError::Read {
                path: file.clone(),
                source,
            })?
        } else {
            self.subjects.clone()
        };

        if subjects.is_empty() {
            let why = if self.all {
                format!(
                    "no subject has {}/{}/ under {}",
                    cfg.session,
                    cfg.modality,
                    cfg.wand_root.display()
                )
            } else {
                "pass subject IDs, --file or --all".to_owned()
            };
            return Err(ConfigError::NoSubjects(why));
        }
        Ok(subjects)
    }
}
