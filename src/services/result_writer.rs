//! 结果写入服务 - 业务能力层
//!
//! 只负责"把选中的报价追加到结果 CSV"能力。
//! 文件是新建的才写表头；每条记录写完立即 flush，中途崩溃不丢已写结果。

use crate::error::{AppResult, FatalError};
use crate::models::Offer;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub struct ResultWriter {
    path: PathBuf,
    writer: Mutex<Option<csv::Writer<File>>>,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条结果
    pub async fn write(&self, offer: &Offer) -> AppResult<()> {
        let mut guard = self.writer.lock().await;

        if guard.is_none() {
            *guard = Some(self.open().map_err(|e| self.unwritable(e))?);
        }

        if let Some(writer) = guard.as_mut() {
            writer.serialize(offer).map_err(|e| self.unwritable(e))?;
            writer
                .flush()
                .map_err(|e| self.unwritable(csv::Error::from(e)))?;
        }

        debug!("已写入结果: {}", offer);
        Ok(())
    }

    /// 删除结果文件（不存在不算错误）
    pub async fn clear(&self) -> AppResult<()> {
        let mut guard = self.writer.lock().await;
        *guard = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.unwritable(csv::Error::from(e))),
        }
    }

    fn open(&self) -> Result<csv::Writer<File>, csv::Error> {
        let is_new = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        Ok(csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file))
    }

    fn unwritable(&self, source: csv::Error) -> FatalError {
        FatalError::ResultsUnwritable {
            path: self.path.display().to_string(),
            source,
        }
    }
}
