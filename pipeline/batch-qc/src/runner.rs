//! 批处理调度.
//!
//! 逐个被试顺序处理:
//!
//! 1. 检查各阶段完成标记, 全部存在则跳过;
//! 2. 原始数据不在本地时下载, 下载失败则记为失败并处理下一个被试;
//! 3. 按固定顺序运行未完成的阶段, 第一个失败的阶段终止该被试;
//! 4. 重新检查完成标记, 全部存在时才清理原始数据. 清理失败不影响被试状态.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use bold_berry::dataset::AnalysisStage;

use crate::config::QcConfig;
use crate::error::{BatchError, ConfigError, StageError};
use crate::event::{EventSink, PipelineEvent};
use crate::exec::CommandRunner;
use crate::fetch::DataFetcher;
use crate::result::{CleanupStatus, FailedAt, RecordBuilder, RunLog, RunLogger, RunRecord};
use crate::retention::{DropOutcome, RetentionManager};
use crate::stage::AnalysisStageRunner;
use crate::tracker::CompletionTracker;

/// 顶层调度器.
pub struct BatchController<'a> {
    config: &'a QcConfig,
    runner: &'a dyn CommandRunner,
    sink: &'a mut dyn EventSink,
}

impl<'a> BatchController<'a> {
    /// 创建. 所有外部命令经由 `runner` 执行, 所有进度经由 `sink` 发出.
    pub fn new(
        config: &'a QcConfig,
        runner: &'a dyn CommandRunner,
        sink: &'a mut dyn EventSink,
    ) -> Self {
        Self {
            config,
            runner,
            sink,
        }
    }

    #[inline]
    fn emit(&mut self, event: PipelineEvent) {
        self.sink.emit(event);
    }

    /// 处理 `subjects`, 写出运行日志, 返回日志及其路径.
    ///
    /// 被试列表为空时不做任何事, 也不写日志.
    pub fn run(&mut self, subjects: &[String]) -> Result<(RunLog, PathBuf), BatchError> {
        if subjects.is_empty() {
            return Err(ConfigError::NoSubjects("empty subject list".to_owned()).into());
        }

        let cfg = self.config;
        let layout = cfg.layout();
        let tracker = CompletionTracker::new(&layout);
        let n = subjects.len();
        let mut logger = RunLogger::new(&cfg.session, n);

        log::info!("batch of {n} subjects, session {}", cfg.session);
        self.emit(PipelineEvent::BatchStarted {
            session: cfg.session.clone(),
            n_subjects: n,
        });

        for (i, subject) in subjects.iter().enumerate() {
            self.emit(PipelineEvent::SubjectStarted {
                index: i + 1,
                total: n,
                subject: subject.clone(),
            });

            let record = self.process(&tracker, subject);
            log::info!("{subject}: {:?}", record.status);
            self.emit(PipelineEvent::SubjectFinished {
                subject: subject.clone(),
                status: record.status,
                elapsed: Duration::from_secs(record.duration_s),
            });
            logger.push(record);
        }

        let elapsed = logger.elapsed();
        let log = logger.finish();
        let path = log.persist(&cfg.logs_dir)?;
        log::info!("run log written to {}", path.display());

        self.emit(PipelineEvent::BatchFinished {
            summary: log.summary,
            failed: log.failed_subjects().map(str::to_owned).collect(),
            log_path: path.clone(),
            elapsed,
        });
        Ok((log, path))
    }

    /// 处理单个被试, 返回其最终记录.
    fn process(&mut self, tracker: &CompletionTracker, subject: &str) -> RunRecord {
        let cfg = self.config;
        let runner = self.runner;

        let before = tracker.status(subject);
        let mut rec = RecordBuilder::new(subject, &before);
        if before.all_done() {
            self.emit(PipelineEvent::AlreadyComplete);
            return rec.skip();
        }
        if before.any_done() {
            log::info!("{subject}: resuming, missing {:?}", before.first_missing());
        }
        for stage in AnalysisStage::ALL.into_iter().filter(|s| before.is_done(*s)) {
            self.emit(PipelineEvent::StageAlreadyDone(stage));
        }

        let fetcher = DataFetcher::new(cfg, runner);
        if fetcher.is_present(subject) {
            self.emit(PipelineEvent::FetchSkipped);
        } else {
            self.emit(PipelineEvent::FetchStarted);
            let t = Instant::now();
            if let Err(e) = fetcher.ensure(subject) {
                log::error!("{e}");
                self.emit(PipelineEvent::FetchFailed {
                    code: e.code,
                    output: e.output.clone(),
                });
                return rec.fail(FailedAt::Download, &e.output);
            }
            self.emit(PipelineEvent::FetchFinished(t.elapsed()));
        }

        let stages = AnalysisStageRunner::new(cfg, runner);
        for stage in AnalysisStage::ALL.into_iter().filter(|s| !before.is_done(*s)) {
            self.emit(PipelineEvent::StageStarted(stage));
            let t = Instant::now();
            if let Err(e) = stages.run(stage, subject) {
                return self.stage_failed(rec, e);
            }
            rec.mark_ran(stage);
            self.emit(PipelineEvent::StageFinished(stage, t.elapsed()));
        }

        // 阶段命令成功退出但没有写出完成标记, 同样视为失败, 此时绝不清理原始数据.
        if let Some(stage) = tracker.status(subject).first_missing() {
            let marker = cfg.layout().marker_path(subject, stage);
            let e = StageError {
                stage,
                code: Some(0),
                output: format!("{stage} exited without writing {}", marker.display()),
            };
            return self.stage_failed(rec, e);
        }

        let cleanup = self.cleanup(subject);
        rec.complete(cleanup)
    }

    fn stage_failed(&mut self, rec: RecordBuilder, e: StageError) -> RunRecord {
        log::error!("{}: {e}", rec.subject());
        self.emit(PipelineEvent::StageFailed {
            stage: e.stage,
            code: e.code,
            output: e.output.clone(),
        });
        rec.fail(FailedAt::Stage(e.stage), &e.output)
    }

    fn cleanup(&mut self, subject: &str) -> CleanupStatus {
        let retention = RetentionManager::new(self.config, self.runner);
        let files = retention.candidates(subject);
        if files.is_empty() {
            self.emit(PipelineEvent::CleanupSkipped);
            return CleanupStatus::NothingToDrop;
        }

        self.emit(PipelineEvent::CleanupStarted(files));
        match retention.drop(subject) {
            Ok(DropOutcome::Dropped(files)) => {
                log::info!("{subject}: dropped {} file(s)", files.len());
                self.emit(PipelineEvent::CleanupFinished);
                CleanupStatus::Dropped
            }
            Ok(DropOutcome::NothingToDrop) => {
                self.emit(PipelineEvent::CleanupSkipped);
                CleanupStatus::NothingToDrop
            }
            Err(e) => {
                self.emit(PipelineEvent::CleanupFailed {
                    code: e.code,
                    output: e.output,
                });
                CleanupStatus::Failed
            }
        }
    }
}
