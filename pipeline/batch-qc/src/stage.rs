//! 分析阶段的统一调用.

use std::env;
use std::ffi::OsString;

use bold_berry::dataset::AnalysisStage;

use crate::config::{ConfigArgs, QcConfig};
use crate::error::StageError;
use crate::exec::{CommandRunner, CommandSpec};

/// 阶段对应的子命令名.
pub const fn subcommand(stage: AnalysisStage) -> &'static str {
    match stage {
        AnalysisStage::SpatialQc => "spatial",
        AnalysisStage::SliceQc => "slice",
        AnalysisStage::Iqm => "iqm",
    }
}

/// 以子进程方式运行某个阶段. 完成标记由阶段自身写出.
pub struct AnalysisStageRunner<'a> {
    config: &'a QcConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> AnalysisStageRunner<'a> {
    /// 创建.
    pub fn new(config: &'a QcConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// 对 `subject` 运行 `stage`. 退出码非 0 时返回 [`StageError`].
    pub fn run(&self, stage: AnalysisStage, subject: &str) -> Result<(), StageError> {
        let program = self.program().map_err(|output| StageError {
            stage,
            code: None,
            output,
        })?;

        let mut cmd = CommandSpec::new(program)
            .arg(subcommand(stage))
            .arg(subject)
            .args(ConfigArgs::forward(self.config))
            .current_dir(&self.config.work_dir);
        cmd.env = self.config.child_env();

        log::info!("{subject}: running {stage}");
        let out = self.runner.run(&cmd);
        if out.success() {
            Ok(())
        } else {
            Err(StageError {
                stage,
                code: out.code,
                output: out.output,
            })
        }
    }

    fn program(&self) -> Result<OsString, String> {
        match &self.config.stage_program {
            Some(p) => Ok(p.clone().into()),
            None => env::current_exe()
                .map(Into::into)
                .map_err(|e| format!("cannot locate current executable: {e}")),
        }
    }
}
