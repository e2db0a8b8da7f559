//! 批处理结果: 逐被试记录与整次运行的日志.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bold_berry::dataset::AnalysisStage;
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

use crate::error::BatchError;
use crate::tracker::Completion;

/// 单个阶段在本次运行中的状态.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// 未运行.
    NotRun,

    /// 运行前已完成.
    AlreadyDone,

    /// 本次运行完成.
    Ran,

    /// 本次运行失败.
    Failed,
}

/// 被试的最终状态.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    /// 所有阶段此前已完成, 未做任何事.
    Skipped,

    /// 所有阶段已完成 (部分或全部在本次运行).
    Completed,

    /// 下载或某个阶段失败.
    Failed,
}

/// 失败发生的位置.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FailedAt {
    /// 下载.
    Download,

    /// 分析阶段.
    Stage(AnalysisStage),
}

impl FailedAt {
    /// 机器可读名称.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Stage(s) => s.name(),
        }
    }
}

impl Serialize for FailedAt {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

/// 清理结果. 不影响被试状态.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    /// 已清理.
    Dropped,

    /// 本地没有可清理的内容.
    NothingToDrop,

    /// 清理命令失败.
    Failed,
}

/// 三个阶段的状态.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Analyses {
    /// 空间 QC.
    pub spatial_qc: AnalysisStatus,
    /// 层面 QC.
    pub slice_qc: AnalysisStatus,
    /// IQM.
    pub iqm: AnalysisStatus,
}

impl Analyses {
    fn from_completion(c: &Completion) -> Self {
        let st = |s| {
            if c.is_done(s) {
                AnalysisStatus::AlreadyDone
            } else {
                AnalysisStatus::NotRun
            }
        };
        Self {
            spatial_qc: st(AnalysisStage::SpatialQc),
            slice_qc: st(AnalysisStage::SliceQc),
            iqm: st(AnalysisStage::Iqm),
        }
    }

    /// `stage` 的状态.
    #[allow(dead_code)]
    pub fn get(&self, stage: AnalysisStage) -> AnalysisStatus {
        match stage {
            AnalysisStage::SpatialQc => self.spatial_qc,
            AnalysisStage::SliceQc => self.slice_qc,
            AnalysisStage::Iqm => self.iqm,
        }
    }

    fn set(&mut self, stage: AnalysisStage, status: AnalysisStatus) {
        let slot = match stage {
            AnalysisStage::SpatialQc => &mut self.spatial_qc,
            AnalysisStage::SliceQc => &mut self.slice_qc,
            AnalysisStage::Iqm => &mut self.iqm,
        };
        *slot = status;
    }
}

/// 单个被试在一次运行中的记录. 一经生成不再改变.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunRecord {
    /// 被试 ID.
    pub subject: String,

    /// 各阶段状态.
    pub analyses: Analyses,

    /// 最终状态.
    pub status: SubjectStatus,

    /// 跳过的原因.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// 失败位置.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<FailedAt>,

    /// 失败时捕获的输出.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 清理结果.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupStatus>,

    /// 耗时, 单位为秒.
    pub duration_s: u64,
}

/// 正在处理中的被试记录.
///
/// 只能通过 [`skip`](Self::skip), [`fail`](Self::fail) 或 [`complete`](Self::complete)
/// 之一转为 [`RunRecord`], 因此每条记录恰好结束一次.
#[derive(Debug)]
pub struct RecordBuilder {
    subject: String,
    analyses: Analyses,
    started: Instant,
}

impl RecordBuilder {
    /// 在开始处理被试时创建.
    pub fn new(subject: &str, completion: &Completion) -> Self {
        Self {
            subject: subject.to_owned(),
            analyses: Analyses::from_completion(completion),
            started: Instant::now(),
        }
    }

    /// 被试 ID.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// 记录 `stage` 在本次运行中完成.
    pub fn mark_ran(&mut self, stage: AnalysisStage) {
        self.analyses.set(stage, AnalysisStatus::Ran);
    }

    /// 所有阶段此前已完成.
    pub fn skip(self) -> RunRecord {
        self.finish(SubjectStatus::Skipped, |r| {
            r.reason = Some("all analyses already complete".to_owned());
            r.duration_s = 0;
        })
    }

    /// 在 `at` 处失败.
    pub fn fail(mut self, at: FailedAt, output: &str) -> RunRecord {
        if let FailedAt::Stage(s) = at {
            self.analyses.set(s, AnalysisStatus::Failed);
        }
        self.finish(SubjectStatus::Failed, |r| {
            r.failed_at = Some(at);
            r.error = Some(output.trim().to_owned());
        })
    }

    /// 所有阶段完成.
    pub fn complete(self, cleanup: CleanupStatus) -> RunRecord {
        self.finish(SubjectStatus::Completed, |r| r.cleanup = Some(cleanup))
    }

    fn finish<F: FnOnce(&mut RunRecord)>(self, status: SubjectStatus, f: F) -> RunRecord {
        let mut r = RunRecord {
            duration_s: round_secs(self.started.elapsed()),
            subject: self.subject,
            analyses: self.analyses,
            status,
            reason: None,
            failed_at: None,
            error: None,
            cleanup: None,
        };
        f(&mut r);
        r
    }
}

#[inline]
fn round_secs(d: Duration) -> u64 {
    d.as_secs_f64().round() as u64
}

/// 批次汇总.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// 被试总数.
    pub n_subjects: usize,
    /// 完成数.
    pub completed: usize,
    /// 跳过数.
    pub skipped: usize,
    /// 失败数.
    pub failed: usize,
    /// 总耗时, 单位为秒.
    pub total_duration_s: u64,
}

/// 一次批处理运行的日志.
#[derive(Clone, Debug, Serialize)]
pub struct RunLog {
    /// 运行 ID, 形如 `batch_qc_2024-05-01_093000`.
    pub run_id: String,

    /// 运行开始时间, 精确到秒.
    pub timestamp: String,

    /// 会话名.
    pub session: String,

    /// 汇总.
    pub summary: Summary,

    /// 逐被试记录, 按处理顺序排列.
    pub subjects: Vec<RunRecord>,
}

impl RunLog {
    /// 失败的被试.
    pub fn failed_subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects
            .iter()
            .filter(|r| r.status == SubjectStatus::Failed)
            .map(|r| r.subject.as_str())
    }

    /// 以 2 空格缩进的 JSON 写入 `{dir}/{run_id}.json`, 返回文件路径.
    pub fn persist<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf, BatchError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| BatchError::Persist {
            path: dir.to_owned(),
            source,
        })?;
        let path = dir.join(format!("{}.json", self.run_id));
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text).map_err(|source| BatchError::Persist {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// 累积逐被试记录, 在运行结束时生成 [`RunLog`].
#[derive(Debug)]
pub struct RunLogger {
    started_at: DateTime<Local>,
    started: Instant,
    session: String,
    n_subjects: usize,
    records: Vec<RunRecord>,
}

impl RunLogger {
    /// 在批次开始时创建.
    pub fn new(session: &str, n_subjects: usize) -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
            session: session.to_owned(),
            n_subjects,
            records: Vec::with_capacity(n_subjects),
        }
    }

    /// 追加一条记录.
    pub fn push(&mut self, record: RunRecord) {
        self.records.push(record);
    }

    /// 批次开始至今的时间.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 结束运行, 生成日志.
    pub fn finish(self) -> RunLog {
        let count = |st| self.records.iter().filter(|r| r.status == st).count();
        let summary = Summary {
            n_subjects: self.n_subjects,
            completed: count(SubjectStatus::Completed),
            skipped: count(SubjectStatus::Skipped),
            failed: count(SubjectStatus::Failed),
            total_duration_s: round_secs(self.started.elapsed()),
        };
        debug_assert_eq!(self.records.len(), self.n_subjects);

        RunLog {
            run_id: self.started_at.format("batch_qc_%Y-%m-%d_%H%M%S").to_string(),
            timestamp: self.started_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            session: self.session,
            summary,
            subjects: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(done: [bool; 3]) -> Completion {
        let mut c = Completion::default();
        for (s, d) in AnalysisStage::ALL.into_iter().zip(done) {
            if d {
                c = c.with_done(s);
            }
        }
        c
    }

    #[test]
    fn test_skip_record() {
        let r = RecordBuilder::new("sub-01", &completion([true; 3])).skip();
        assert_eq!(r.status, SubjectStatus::Skipped);
        assert_eq!(r.analyses.iqm, AnalysisStatus::AlreadyDone);
        assert_eq!(r.duration_s, 0);
        assert!(r.reason.is_some());
    }

    #[test]
    fn test_fail_record_marks_stage() {
        let mut b = RecordBuilder::new("sub-01", &completion([true, false, false]));
        assert_eq!(b.analyses.get(AnalysisStage::SliceQc), AnalysisStatus::NotRun);
        b.mark_ran(AnalysisStage::SliceQc);
        let r = b.fail(FailedAt::Stage(AnalysisStage::Iqm), "  Traceback\n boom \n");
        assert_eq!(r.status, SubjectStatus::Failed);
        assert_eq!(r.analyses.spatial_qc, AnalysisStatus::AlreadyDone);
        assert_eq!(r.analyses.slice_qc, AnalysisStatus::Ran);
        assert_eq!(r.analyses.iqm, AnalysisStatus::Failed);
        assert_eq!(r.failed_at, Some(FailedAt::Stage(AnalysisStage::Iqm)));
        assert_eq!(r.error.as_deref(), Some("Traceback\n boom"));
    }

    #[test]
    fn test_record_json_shape() {
        let r = RecordBuilder::new("sub-01", &completion([false; 3])).fail(FailedAt::Download, "x");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["failed_at"], "download");
        assert_eq!(v["analyses"]["spatial_qc"], "not_run");
        assert!(v.get("cleanup").is_none());
        assert!(v.get("reason").is_none());

        let r = RecordBuilder::new("sub-02", &completion([true; 3])).complete(CleanupStatus::NothingToDrop);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "completed");
        assert_eq!(v["cleanup"], "nothing_to_drop");
    }

    #[test]
    fn test_logger_summary_and_persist() {
        let mut logger = RunLogger::new("ses-06", 3);
        logger.push(RecordBuilder::new("a", &completion([true; 3])).skip());
        logger.push(RecordBuilder::new("b", &completion([false; 3])).fail(FailedAt::Download, ""));
        logger.push(RecordBuilder::new("c", &completion([false; 3])).complete(CleanupStatus::Dropped));
        let log = logger.finish();

        let s = log.summary;
        assert_eq!((s.n_subjects, s.completed, s.skipped, s.failed), (3, 1, 1, 1));
        assert!(log.run_id.starts_with("batch_qc_"));
        assert_eq!(log.run_id.len(), "batch_qc_2024-05-01_093000".len());
        assert_eq!(log.timestamp.len(), "2024-05-01T09:30:00".len());
        assert_eq!(log.failed_subjects().collect::<Vec<_>>(), ["b"]);

        let dir = tempfile::tempdir().unwrap();
        let path = log.persist(dir.path().join("logs")).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{}.json", log.run_id));
        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["session"], "ses-06");
        assert_eq!(v["summary"]["failed"], 1);
        assert_eq!(v["subjects"].as_array().unwrap().len(), 3);
        assert_eq!(v["subjects"][0]["subject"], "a");
    }
}
