//! 批处理事件流与控制台输出.
//!
//! 调度逻辑只产生 [`PipelineEvent`], 如何展示由订阅方 ([`EventSink`]) 决定.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use bold_berry::dataset::AnalysisStage;

use crate::result::{SubjectStatus, Summary};

/// 批处理过程中的事件.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// 批次开始.
    BatchStarted {
        /// 会话名.
        session: String,
        /// 被试总数.
        n_subjects: usize,
    },

    /// 开始处理第 `index` 个 (从 1 开始) 被试.
    SubjectStarted {
        /// 序号.
        index: usize,
        /// 被试总数.
        total: usize,
        /// 被试 ID.
        subject: String,
    },

    /// 所有阶段此前已完成.
    AlreadyComplete,

    /// 某阶段此前已完成.
    StageAlreadyDone(AnalysisStage),

    /// 原始数据已在本地.
    FetchSkipped,

    /// 开始下载.
    FetchStarted,

    /// 下载完成.
    FetchFinished(Duration),

    /// 下载失败.
    FetchFailed {
        /// 退出码.
        code: Option<i32>,
        /// 捕获的输出.
        output: String,
    },

    /// 阶段开始.
    StageStarted(AnalysisStage),

    /// 阶段完成.
    StageFinished(AnalysisStage, Duration),

    /// 阶段失败.
    StageFailed {
        /// 阶段.
        stage: AnalysisStage,
        /// 退出码.
        code: Option<i32>,
        /// 捕获的输出.
        output: String,
    },

    /// 本地没有可清理的原始数据.
    CleanupSkipped,

    /// 开始清理.
    CleanupStarted(Vec<PathBuf>),

    /// 清理完成.
    CleanupFinished,

    /// 清理失败. 分析结果不受影响.
    CleanupFailed {
        /// 退出码.
        code: Option<i32>,
        /// 捕获的输出.
        output: String,
    },

    /// 被试处理结束.
    SubjectFinished {
        /// 被试 ID.
        subject: String,
        /// 最终状态.
        status: SubjectStatus,
        /// 耗时.
        elapsed: Duration,
    },

    /// 批次结束, 日志已写出.
    BatchFinished {
        /// 汇总.
        summary: Summary,
        /// 失败的被试.
        failed: Vec<String>,
        /// 日志路径.
        log_path: PathBuf,
        /// 总耗时.
        elapsed: Duration,
    },
}

/// 事件订阅方.
pub trait EventSink {
    /// 接收一个事件.
    fn emit(&mut self, event: PipelineEvent);
}

/// 收集所有事件, 用于测试.
impl EventSink for Vec<PipelineEvent> {
    fn emit(&mut self, event: PipelineEvent) {
        self.push(event);
    }
}

const LINE_WIDTH: usize = 64;
const S4: &str = "    ";
const S8: &str = "        ";

/// 将 `d` 格式化为 `H:MM:SS`.
fn hms(d: Duration) -> String {
    let s = d.as_secs();
    format!("{}:{:02}:{:02}", s / 3600, s / 60 % 60, s % 60)
}

/// 20 格进度条.
fn progress(done: usize, total: usize) -> String {
    let pct = if total == 0 { 0 } else { done * 100 / total };
    let filled = pct / 5;
    format!(
        "[{}{}] {pct:3}%",
        "#".repeat(filled),
        ".".repeat(20 - filled)
    )
}

/// 纯文本进度输出.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    /// 输出到 `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// 取回底层输出.
    #[allow(dead_code)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn bar(&mut self, c: char) -> io::Result<()> {
        writeln!(self.out, "{}", c.to_string().repeat(LINE_WIDTH))
    }

    fn render(&mut self, event: &PipelineEvent) -> io::Result<()> {
        use PipelineEvent::*;

        match event {
            BatchStarted {
                session,
                n_subjects,
            } => {
                self.bar('=')?;
                writeln!(self.out, "  Batch QC Pipeline")?;
                writeln!(self.out, "  Session: {session}  |  Subjects: {n_subjects}")?;
                self.bar('=')?;
            }
            SubjectStarted {
                index,
                total,
                subject,
            } => {
                writeln!(self.out)?;
                self.bar('-')?;
                writeln!(
                    self.out,
                    "  Subject {index}/{total}  {subject}  {}",
                    progress(index - 1, *total)
                )?;
                self.bar('-')?;
            }
            AlreadyComplete => {
                writeln!(self.out, "{S4}[skip] Already complete: all 3 analyses found")?;
            }
            StageAlreadyDone(stage) => {
                writeln!(self.out, "{S4}[skip] {}: outputs already exist", stage.label())?;
            }
            FetchSkipped => writeln!(self.out, "{S4}[skip] Download: BOLD already present")?,
            FetchStarted => writeln!(self.out, "{S4}[....] Download")?,
            FetchFinished(d) => writeln!(self.out, "{S4}[ ok ] Download complete  {}", hms(*d))?,
            FetchFailed { code, output } => {
                writeln!(self.out, "{output}")?;
                writeln!(self.out, "{S4}[FAIL] Download FAILED  exit code {code:?}")?;
            }
            StageStarted(stage) => writeln!(self.out, "{S4}[....] {}", stage.label())?,
            StageFinished(stage, d) => {
                writeln!(self.out, "{S8}-> {}", stage.marker())?;
                writeln!(self.out, "{S4}[ ok ] {} complete  {}", stage.label(), hms(*d))?;
            }
            StageFailed {
                stage,
                code,
                output,
            } => {
                writeln!(self.out, "{output}")?;
                writeln!(self.out, "{S4}[FAIL] {} FAILED  exit code {code:?}", stage.label())?;
            }
            CleanupSkipped => writeln!(self.out, "{S4}[skip] Cleanup: no local BOLD content to drop")?,
            CleanupStarted(files) => {
                writeln!(self.out, "{S4}[....] Cleanup")?;
                let names: Vec<_> = files
                    .iter()
                    .map(|f| f.file_name().unwrap_or(f.as_os_str()).to_string_lossy())
                    .collect();
                writeln!(self.out, "{S8}-> {}", names.join("  +  "))?;
            }
            CleanupFinished => writeln!(self.out, "{S4}[ ok ] Raw BOLD removed, pointer preserved")?,
            CleanupFailed { code, output } => {
                writeln!(
                    self.out,
                    "{S4}[FAIL] Cleanup FAILED  exit code {code:?} (analysis outputs are safe)"
                )?;
                writeln!(self.out, "{output}")?;
            }
            SubjectFinished {
                subject,
                status,
                elapsed,
            } => {
                let word = match status {
                    SubjectStatus::Completed => "done",
                    SubjectStatus::Skipped => "skipped",
                    SubjectStatus::Failed => "failed",
                };
                writeln!(self.out, "  {subject}  {word}  ({})", hms(*elapsed))?;
            }
            BatchFinished {
                summary,
                failed,
                log_path,
                elapsed,
            } => {
                writeln!(self.out)?;
                self.bar('=')?;
                writeln!(self.out, "  Summary")?;
                self.bar('-')?;
                writeln!(self.out, "  Completed  {} / {}", summary.completed, summary.n_subjects)?;
                writeln!(self.out, "  Skipped    {}  (already done)", summary.skipped)?;
                writeln!(self.out, "  Failed     {}", summary.failed)?;
                if !failed.is_empty() {
                    writeln!(self.out)?;
                    for s in failed {
                        writeln!(self.out, "       *  {s}")?;
                    }
                }
                self.bar('-')?;
                writeln!(self.out, "  Total time: {}", hms(*elapsed))?;
                writeln!(self.out, "  Log saved -> {}", log_path.display())?;
                self.bar('=')?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write> EventSink for ConsoleReporter<W> {
    fn emit(&mut self, event: PipelineEvent) {
        if let Err(e) = self.render(&event) {
            log::warn!("console output failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hms_and_progress() {
        assert_eq!(hms(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(hms(Duration::from_millis(999)), "0:00:00");
        assert_eq!(progress(0, 4), "[....................]   0%");
        assert_eq!(progress(2, 4), "[##########..........]  50%");
    }

    #[test]
    fn test_console_reporter() {
        let mut r = ConsoleReporter::new(Vec::new());
        r.emit(PipelineEvent::SubjectStarted {
            index: 1,
            total: 2,
            subject: "sub-01".to_owned(),
        });
        r.emit(PipelineEvent::StageFailed {
            stage: AnalysisStage::SliceQc,
            code: Some(1),
            output: "Traceback: boom".to_owned(),
        });
        r.emit(PipelineEvent::BatchFinished {
            summary: Summary {
                n_subjects: 2,
                completed: 1,
                skipped: 0,
                failed: 1,
                total_duration_s: 5,
            },
            failed: vec!["sub-01".to_owned()],
            log_path: PathBuf::from("logs/batch_qc.json"),
            elapsed: Duration::from_secs(5),
        });
        let text = String::from_utf8(r.into_inner()).unwrap();
        assert!(text.contains("Subject 1/2  sub-01"));
        assert!(text.contains("Traceback: boom"));
        assert!(text.contains("Slice QC FAILED"));
        assert!(text.contains("*  sub-01"));
        assert!(text.contains("Log saved -> logs/batch_qc.json"));
    }
}
