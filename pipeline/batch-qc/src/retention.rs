//! 原始数据清理.
//!
//! 所有分析阶段完成后, 通过内容寻址存储的 `drop` 操作删除本地的原始数据内容.
//! 存储中保留指针, 需要时可以重新下载.

use std::path::PathBuf;

use bold_berry::dataset::is_materialized;

use crate::config::QcConfig;
use crate::error::DropError;
use crate::exec::{CommandRunner, CommandSpec};

/// [`RetentionManager::drop`] 的成功结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// 已清理的文件 (相对于数据集根目录).
    Dropped(Vec<PathBuf>),

    /// 本地没有可清理的内容.
    NothingToDrop,
}

/// 清理原始 BOLD 及其参考像.
pub struct RetentionManager<'a> {
    config: &'a QcConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> RetentionManager<'a> {
    /// 创建.
    pub fn new(config: &'a QcConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// 本地已下载, 可以清理的文件 (相对于数据集根目录).
    pub fn candidates(&self, subject: &str) -> Vec<PathBuf> {
        let cfg = self.config;
        let layout = cfg.layout();
        [layout.bold_relative(subject), layout.sbref_relative(subject)]
            .into_iter()
            .filter(|rel| is_materialized(cfg.wand_root.join(rel), cfg.materialized_bytes))
            .collect()
    }

    /// 清理 `subject` 的原始数据.
    ///
    /// 调用者必须保证所有分析阶段都已完成.
    pub fn drop(&self, subject: &str) -> Result<DropOutcome, DropError> {
        let files = self.candidates(subject);
        if files.is_empty() {
            return Ok(DropOutcome::NothingToDrop);
        }

        let cfg = self.config;
        let mut cmd = CommandSpec::new(&cfg.drop_program)
            .arg("drop")
            .args(&files)
            .current_dir(&cfg.wand_root);
        cmd.env = cfg.child_env();
        if let Some(ssh) = cfg.git_ssh_command() {
            cmd = cmd.env("GIT_SSH_COMMAND", ssh);
        }

        log::info!("{subject}: {}", cmd.display());
        let out = self.runner.run(&cmd);
        if out.success() {
            Ok(DropOutcome::Dropped(files))
        } else {
            log::warn!("{subject}: drop failed with {:?}", out.code);
            Err(DropError {
                code: out.code,
                output: out.output,
            })
        }
    }
}
