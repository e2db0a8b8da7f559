//! 4D BOLD 批量质量控制.
//!
//! `batch-qc run` 逐个被试下载原始数据, 依次运行三个分析阶段, 全部完成后清理原始数据,
//! 并在 `logs_dir` 下写出本次运行的 JSON 日志. 单个被试的失败不会中止批处理.
//!
//! 三个分析阶段也是本程序的子命令 (`spatial`, `slice`, `iqm`), 批处理以子进程方式调用它们.

use std::io;

use anyhow::Context;
use bold_berry::dataset::AnalysisStage;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use crate::config::{ConfigArgs, SubjectSelection};
use crate::event::ConsoleReporter;
use crate::exec::ProcessRunner;
use crate::runner::BatchController;

mod config;
mod error;
mod event;
mod exec;
mod fetch;
mod result;
mod retention;
mod runner;
mod stage;
mod stages;
mod tracker;

#[cfg(test)]
mod testing;

#[derive(Debug, Parser)]
#[command(name = "batch-qc", version, about = "Batch BOLD QC pipeline: download, analyse, drop raw data")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 批量处理被试.
    Run(SubjectSelection),

    /// 空间 QC: 时间均值图和标准差图.
    Spatial {
        /// 被试 ID.
        subject: String,
    },

    /// 层面 QC: 每帧每层平均信号.
    Slice {
        /// 被试 ID.
        subject: String,
    },

    /// 图像质量指标.
    Iqm {
        /// 被试 ID.
        subject: String,
    },
}

fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("initializing logger")?;

    let cli = Cli::parse();
    let cfg = cli.config.load().context("loading configuration")?;

    let (stage, subject) = match cli.command {
        Command::Run(selection) => {
            let subjects = selection.resolve(&cfg)?;
            let mut reporter = ConsoleReporter::new(io::stdout().lock());
            let (log, path) = BatchController::new(&cfg, &ProcessRunner, &mut reporter)
                .run(&subjects)
                .context("batch run")?;
            log::info!(
                "{} completed, {} skipped, {} failed; log at {}",
                log.summary.completed,
                log.summary.skipped,
                log.summary.failed,
                path.display()
            );
            return Ok(());
        }
        Command::Spatial { subject } => (AnalysisStage::SpatialQc, subject),
        Command::Slice { subject } => (AnalysisStage::SliceQc, subject),
        Command::Iqm { subject } => (AnalysisStage::Iqm, subject),
    };

    let marker = stages::run_stage(stage, &cfg, &subject)
        .with_context(|| format!("{stage} for {subject}"))?;
    log::info!("{stage} complete: {}", marker.display());
    Ok(())
}
