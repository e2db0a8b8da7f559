//! 被试选择: 从列表文件读取, 或扫描数据集目录.

use std::fs;
use std::io;
use std::path::Path;

use crate::consts::SUBJECT_PREFIX;

/// 解析被试列表文本. 每行一个被试, 首尾空白会被去掉, 空行和以 `#` 开头的注释行被忽略.
pub fn parse_subject_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

/// 读取被试列表文件.
pub fn read_subject_file<P: AsRef<Path>>(path: P) -> io::Result<Vec<String>> {
    Ok(parse_subject_list(&fs::read_to_string(path)?))
}

/// 扫描 `root` 下所有 `sub-*` 目录, 只保留含有 `{session}/{modality}/` 子目录的被试.
///
/// 结果按字典序排列. 不满足目录结构的被试会被静默跳过.
pub fn discover_subjects<P: AsRef<Path>>(
    root: P,
    session: &str,
    modality: &str,
) -> io::Result<Vec<String>> {
    let mut ans = Vec::new();
    for entry in fs::read_dir(root.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with(SUBJECT_PREFIX) && entry.path().join(session).join(modality).is_dir()
        {
            ans.push(name);
        }
    }
    ans.sort();
    Ok(ans)
}
