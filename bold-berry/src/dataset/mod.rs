//! 数据集组织: 原始数据路径, 分析结果目录与被试选择.

use std::fs;
use std::path::Path;

mod layout;
mod stage;
mod subjects;

pub use layout::DatasetLayout;
pub use stage::AnalysisStage;
pub use subjects::{discover_subjects, parse_subject_list, read_subject_file};

/// `path` 是否为已下载的真实数据文件, 即存在且大小超过 `threshold` 字节.
///
/// 内容寻址存储中未获取内容的文件 (指针/符号链接) 不满足该条件.
/// 无法读取元信息时视为未下载.
pub fn is_materialized<P: AsRef<Path>>(path: P, threshold: u64) -> bool {
    fs::metadata(path.as_ref())
        .map(|m| m.is_file() && m.len() > threshold)
        .unwrap_or(false)
}
