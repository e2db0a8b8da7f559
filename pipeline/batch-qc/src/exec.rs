//! 外部命令执行.
//!
//! 下载, 分析阶段和清理都以外部命令的形式运行. 批处理只关心退出码和捕获的输出,
//! 因此执行能力被抽象为 [`CommandRunner`], 测试时可以替换为不启动子进程的实现.

use std::ffi::OsString;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

/// 一条待执行的命令.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// 程序名或路径.
    pub program: OsString,

    /// 参数.
    pub args: Vec<OsString>,

    /// 工作目录. `None` 表示继承当前目录.
    pub cwd: Option<PathBuf>,

    /// 额外的环境变量, 覆盖继承的同名变量.
    pub env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    /// 创建不带参数的命令.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// 追加一个参数.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 追加多个参数.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 设置工作目录.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// 设置一个环境变量.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// 参数中的第 `i` 个, 以 UTF-8 字符串形式 (有损) 返回.
    #[allow(dead_code)]
    pub fn arg_str(&self, i: usize) -> Option<String> {
        self.args.get(i).map(|a| a.to_string_lossy().into_owned())
    }

    /// 命令行的可读形式, 仅用于日志.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 命令执行结果.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// 退出码. 无法启动或被信号终止时为 `None`.
    pub code: Option<i32>,

    /// 标准输出与标准错误按写入顺序交错合并后的文本.
    pub output: String,
}

impl CommandOutput {
    /// 以退出码 0 成功.
    #[inline]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 阻塞地执行外部命令并捕获输出.
pub trait CommandRunner {
    /// 执行 `cmd`, 直到其结束.
    fn run(&self, cmd: &CommandSpec) -> CommandOutput;
}

/// 以子进程方式执行命令.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutput {
        log::debug!("exec: {}", spec.display());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        match run_merged(&mut cmd) {
            Ok((status, output)) => {
                log::debug!("exit: {:?}", status.code());
                CommandOutput {
                    code: status.code(),
                    output,
                }
            }
            Err(e) => {
                log::warn!("cannot start `{}`: {e}", spec.display());
                CommandOutput {
                    code: None,
                    output: format!("cannot start `{}`: {e}", spec.display()),
                }
            }
        }
    }
}

/// 标准输出和标准错误共用同一个匿名临时文件, 读回的文本保持两者的写入顺序.
fn run_merged(cmd: &mut Command) -> io::Result<(ExitStatus, String)> {
    let mut sink = tempfile::tempfile()?;
    cmd.stdout(sink.try_clone()?).stderr(sink.try_clone()?);
    let status = cmd.status()?;

    sink.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    sink.read_to_end(&mut buf)?;
    Ok((status, String::from_utf8_lossy(&buf).into_owned()))
}
