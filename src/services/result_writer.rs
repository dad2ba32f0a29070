//! 结果写入服务 - 业务能力层
//!
//! 只负责"追加一行筛选结果 / 读出已记录的结论"能力，不关心流程

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{AppResult, FileError};

/// 结果写入服务
///
/// 职责：
/// - 每个研究范围一个 `<scope>.log`，只追加不改写
/// - 每篇文献一行，行首是 PMID
/// - 续跑时读出已经有结论的 PMID 及其结论
#[derive(Debug, Clone)]
pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    /// `<folder>/<scope_name>.log`
    pub fn for_scope(folder: impl AsRef<Path>, scope_name: &str) -> Self {
        Self {
            path: folder.as_ref().join(format!("{}.log", scope_name)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条结论
    pub async fn write(&self, pmid: &str, term: &str, accepted: bool) -> AppResult<()> {
        let line = format_line(pmid, term, accepted);
        debug!("写入结果: {}", line);

        let write_failed = |source: std::io::Error| FileError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_failed)?;

        file.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(write_failed)?;
        file.flush().await.map_err(write_failed)?;

        Ok(())
    }

    /// 日志中已有的结论：PMID → 是否通过；文件不存在时为空
    ///
    /// 同一 PMID 出现多次时以最后一行为准。
    pub async fn recorded_verdicts(&self) -> HashMap<String, bool> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!("读取结果日志失败 ({}): {}", self.path.display(), e);
                return HashMap::new();
            }
        };

        content.lines().filter_map(parse_line).collect()
    }
}

/// 解析一行结论；无法识别的行按未通过处理
fn parse_line(line: &str) -> Option<(String, bool)> {
    let line = line.trim_start();
    let (pmid, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    if pmid.is_empty() {
        return None;
    }
    let accepted = rest.trim_start().starts_with("is relevant to ");
    Some((pmid.to_string(), accepted))
}

/// 结果日志的一行（不含换行）
pub fn format_line(pmid: &str, term: &str, accepted: bool) -> String {
    if accepted {
        format!("{} is relevant to {}.", pmid, term)
    } else {
        format!("{} is NOT relevant to {}.", pmid, term)
    }
}
