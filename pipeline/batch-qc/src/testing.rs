//! 测试用的假命令执行器.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use bold_berry::dataset::{AnalysisStage, DatasetLayout};

use crate::config::QcConfig;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::stage::subcommand;

pub const STAGE_PROGRAM: &str = "batch-qc-under-test";
pub const THRESHOLD: u64 = 16;

/// 在临时目录下创建配置. 下载阈值很小, 以免测试写大文件.
pub fn config(root: &Path) -> QcConfig {
    QcConfig {
        wand_root: root.join("WAND"),
        results_root: root.join("results"),
        logs_dir: root.join("logs"),
        work_dir: root.to_owned(),
        materialized_bytes: THRESHOLD,
        stage_program: Some(STAGE_PROGRAM.into()),
        ..QcConfig::default()
    }
}

fn write_file(path: &Path, len: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![b'x'; len]).unwrap();
}

/// 写入已下载的原始数据 (及参考像).
pub fn materialize(layout: &DatasetLayout, subject: &str) {
    write_file(&layout.bold_path(subject), 4 * THRESHOLD as usize);
    write_file(&layout.sbref_path(subject), 4 * THRESHOLD as usize);
}

/// 写入完成标记.
pub fn mark_done(layout: &DatasetLayout, subject: &str, stage: AnalysisStage) {
    write_file(&layout.marker_path(subject, stage), 8);
}

/// 记录调用, 并像真实的下载/阶段/清理命令一样修改文件系统.
#[derive(Default)]
pub struct FakeRunner {
    layout: Option<DatasetLayout>,
    pub calls: RefCell<Vec<CommandSpec>>,
    pub fail_fetch: HashSet<String>,
    pub fail_stage: HashMap<String, AnalysisStage>,
    pub forget_marker: HashMap<String, AnalysisStage>,
    pub fail_drop: bool,
    pub fetch_placeholder: bool,
    pub premature_drop: Cell<bool>,
}

impl FakeRunner {
    pub fn new(cfg: &QcConfig) -> Self {
        Self {
            layout: Some(cfg.layout()),
            ..Default::default()
        }
    }

    fn layout(&self) -> &DatasetLayout {
        self.layout.as_ref().unwrap()
    }

    /// 所有调用的 (程序, 第一个参数, 第二个参数).
    pub fn log(&self) -> Vec<(String, String, String)> {
        self.calls
            .borrow()
            .iter()
            .map(|c| {
                (
                    c.program.to_string_lossy().into_owned(),
                    c.arg_str(0).unwrap_or_default(),
                    c.arg_str(1).unwrap_or_default(),
                )
            })
            .collect()
    }

    pub fn count(&self, program: &str) -> usize {
        self.log().iter().filter(|(p, ..)| p == program).count()
    }

    pub fn stage_calls(&self, subject: &str) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|(p, _, s)| p == STAGE_PROGRAM && s == subject)
            .map(|(_, stage, _)| stage)
            .collect()
    }

    fn ok() -> CommandOutput {
        CommandOutput {
            code: Some(0),
            output: String::new(),
        }
    }

    fn err(msg: &str) -> CommandOutput {
        CommandOutput {
            code: Some(1),
            output: msg.to_owned(),
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, cmd: &CommandSpec) -> CommandOutput {
        self.calls.borrow_mut().push(cmd.clone());
        let layout = self.layout().clone();
        let program = cmd.program.to_string_lossy().into_owned();

        match program.as_str() {
            "bash" => {
                let subject = cmd.arg_str(1).unwrap_or_default();
                if self.fail_fetch.contains(&subject) {
                    return Self::err("download.sh: remote not reachable");
                }
                if self.fetch_placeholder {
                    write_file(&layout.bold_path(&subject), 1);
                } else {
                    materialize(&layout, &subject);
                }
                Self::ok()
            }
            STAGE_PROGRAM => {
                let name = cmd.arg_str(0).unwrap_or_default();
                let subject = cmd.arg_str(1).unwrap_or_default();
                let stage = AnalysisStage::ALL
                    .into_iter()
                    .find(|s| subcommand(*s) == name)
                    .unwrap();
                if self.fail_stage.get(&subject) == Some(&stage) {
                    return Self::err(&format!("Traceback: {name} crashed"));
                }
                if self.forget_marker.get(&subject) != Some(&stage) {
                    mark_done(&layout, &subject, stage);
                }
                Self::ok()
            }
            "git-annex" => {
                let subject = cmd
                    .arg_str(1)
                    .and_then(|p| p.split('/').next().map(str::to_owned))
                    .unwrap_or_default();
                let all_done = AnalysisStage::ALL
                    .into_iter()
                    .all(|s| layout.marker_path(&subject, s).exists());
                if !all_done {
                    self.premature_drop.set(true);
                }
                if self.fail_drop {
                    return Self::err("git-annex: drop failed");
                }
                for rel in &cmd.args[1..] {
                    write_file(&layout.wand_root().join(rel), 1);
                }
                Self::ok()
            }
            other => panic!("unexpected program {other}"),
        }
    }
}
