//! 检查点存储 - 业务能力层
//!
//! 两个互相独立的追加日志：
//! - processed：已处理（成功或失败都算），用于断点续跑
//! - failed：没有拿到任何报价的零件，用于下一批重试
//!
//! 每次追加一行并立即 flush，崩溃最多丢失正在处理的那一个零件。

use crate::error::{AppResult, FatalError};
use crate::models::PartNumber;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 按行追加的日志文件
#[derive(Debug, Clone)]
pub struct AppendLog {
    path: PathBuf,
}

impl AppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 按出现顺序读取全部条目（空行跳过）；文件不存在返回空列表
    pub fn read_all(&self) -> AppResult<Vec<PartNumber>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(FatalError::CheckpointUnreadable {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        Ok(content
            .lines()
            .map(PartNumber::new)
            .filter(|p| !p.is_empty())
            .collect())
    }

    /// 读取为集合
    pub fn load(&self) -> AppResult<HashSet<PartNumber>> {
        Ok(self.read_all()?.into_iter().collect())
    }

    /// 追加一行，文件不存在时自动创建
    pub fn append(&self, part_number: &PartNumber) -> AppResult<()> {
        let unwritable = |source| FatalError::CheckpointUnwritable {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(unwritable)?;

        writeln!(file, "{}", part_number).map_err(unwritable)?;
        file.flush().map_err(unwritable)?;
        Ok(())
    }

    /// 把当前文件复制为 `<stem>.<suffix>.<ext>`，原文件保持不变；文件不存在返回 `None`
    pub fn archive(&self, suffix: &str) -> AppResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "log".to_string());
        let file_name = match self.path.extension() {
            Some(ext) => format!("{}.{}.{}", stem, suffix, ext.to_string_lossy()),
            None => format!("{}.{}", stem, suffix),
        };
        let target = self.path.with_file_name(file_name);

        fs::copy(&self.path, &target).map_err(|source| FatalError::CheckpointUnwritable {
            path: target.display().to_string(),
            source,
        })?;
        Ok(Some(target))
    }

    /// 用给定条目整体替换文件内容
    ///
    /// 先写临时文件再改名，中途崩溃时旧内容仍然完整
    pub fn rewrite(&self, entries: &[PartNumber]) -> AppResult<()> {
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        let unwritable = |source| FatalError::CheckpointUnwritable {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = fs::File::create(&tmp).map_err(unwritable)?;
        for entry in entries {
            writeln!(file, "{}", entry).map_err(unwritable)?;
        }
        file.sync_all().map_err(unwritable)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(unwritable)
    }

    /// 删除文件（不存在不算错误）
    pub fn remove(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FatalError::CheckpointUnwritable {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

/// 检查点存储
///
/// 追加操作通过互斥锁串行化，并发处理零件时日志行不会交错
pub struct CheckpointStore {
    processed: AppendLog,
    failed: AppendLog,
    write_lock: Mutex<()>,
}

impl CheckpointStore {
    pub fn new(processed_path: impl Into<PathBuf>, failed_path: impl Into<PathBuf>) -> Self {
        Self {
            processed: AppendLog::new(processed_path),
            failed: AppendLog::new(failed_path),
            write_lock: Mutex::new(()),
        }
    }

    /// 读取已处理集合
    pub fn load(&self) -> AppResult<HashSet<PartNumber>> {
        let processed = self.processed.load()?;
        info!(
            "🗂️ 检查点: {} 个零件已处理 ({})",
            processed.len(),
            self.processed.path().display()
        );
        Ok(processed)
    }

    /// 按顺序读取失败列表（去重）
    pub fn load_failed(&self) -> AppResult<Vec<PartNumber>> {
        let mut seen = HashSet::new();
        Ok(self
            .failed
            .read_all()?
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect())
    }

    pub async fn mark_processed(&self, part_number: &PartNumber) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.processed.append(part_number)?;
        debug!("已记录检查点: {}", part_number);
        Ok(())
    }

    pub async fn mark_failed(&self, part_number: &PartNumber) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.failed.append(part_number)
    }

    /// 重试前保留一份失败列表的快照，原列表不动
    pub fn archive_failed(&self, suffix: &str) -> AppResult<Option<PathBuf>> {
        self.failed.archive(suffix)
    }

    /// 重试结束后整理失败列表：去重，并去掉本轮已找到报价的零件
    ///
    /// 未处理到的零件（超出数量限制、被中断）原样保留，返回整理后的列表
    pub async fn compact_failed(&self, resolved: &HashSet<PartNumber>) -> AppResult<Vec<PartNumber>> {
        let _guard = self.write_lock.lock().await;
        let mut seen = HashSet::new();
        let remaining: Vec<PartNumber> = self
            .failed
            .read_all()?
            .into_iter()
            .filter(|p| !resolved.contains(p) && seen.insert(p.clone()))
            .collect();
        self.failed.rewrite(&remaining)?;
        Ok(remaining)
    }

    /// 清空两个日志
    pub fn clear(&self) -> AppResult<()> {
        self.processed.remove()?;
        self.failed.remove()
    }
}
