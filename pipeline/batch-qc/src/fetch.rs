//! 原始数据下载.

use bold_berry::dataset::is_materialized;

use crate::config::QcConfig;
use crate::error::FetchError;
use crate::exec::{CommandRunner, CommandSpec};

/// [`DataFetcher::ensure`] 的结果.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 数据已在本地, 未调用下载命令.
    AlreadyPresent,

    /// 调用了下载命令并成功.
    Fetched,
}

/// 确保被试的原始 BOLD 数据已下载到本地.
pub struct DataFetcher<'a> {
    config: &'a QcConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> DataFetcher<'a> {
    /// 创建.
    pub fn new(config: &'a QcConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// 原始数据是否已在本地.
    pub fn is_present(&self, subject: &str) -> bool {
        let bold = self.config.layout().bold_path(subject);
        let ans = is_materialized(&bold, self.config.materialized_bytes);
        log::debug!("{}: materialized = {ans}", bold.display());
        ans
    }

    /// 原始数据已在本地时直接返回; 否则调用下载命令.
    ///
    /// 只应在至少一个阶段未完成时调用.
    pub fn ensure(&self, subject: &str) -> Result<FetchOutcome, FetchError> {
        if self.is_present(subject) {
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let cmd = self.command(subject);
        log::info!("fetching {subject}: {}", cmd.display());
        let out = self.runner.run(&cmd);
        if out.success() {
            Ok(FetchOutcome::Fetched)
        } else {
            Err(FetchError {
                subject: subject.to_owned(),
                code: out.code,
                output: out.output,
            })
        }
    }

    fn command(&self, subject: &str) -> CommandSpec {
        let cfg = self.config;
        let mut cmd = CommandSpec::new(&cfg.fetch.program)
            .args(cfg.fetch.render(subject, &cfg.session, &cfg.modality))
            .current_dir(&cfg.work_dir);
        cmd.env = cfg.child_env();
        cmd
    }
}
