use crate::error::FatalError;
use crate::models::PartNumber;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// 输入文件中零件号所在列的表头
pub const PART_NUMBER_HEADER: &str = "Part Number";

/// 从文件加载零件号列表
///
/// 支持两种格式：
/// - 带 `Part Number` 表头的 CSV
/// - 每行一个零件号的纯文本（例如失败列表）
///
/// 读取失败属于致命错误
pub async fn load_part_numbers(path: &Path) -> Result<Vec<PartNumber>, FatalError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| FatalError::InputUnreadable {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

    let parts = parse_part_numbers(&content).map_err(|e| FatalError::InputUnreadable {
        path: path.display().to_string(),
        source: Box::new(e),
    })?;

    tracing::info!("📄 从 {} 读取到 {} 个零件号", path.display(), parts.len());
    Ok(parts)
}

/// 解析零件号列表
///
/// 空值跳过；重复的零件号只保留第一次出现
pub fn parse_part_numbers(content: &str) -> Result<Vec<PartNumber>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let mut column = 0;
    let mut parts = Vec::new();
    let mut seen = HashSet::new();

    if let Some(first) = records.next() {
        let first = first?;
        match first
            .iter()
            .position(|field| field.eq_ignore_ascii_case(PART_NUMBER_HEADER))
        {
            Some(index) => column = index,
            None => push_unique(&mut parts, &mut seen, first.get(0)),
        }
    }

    for record in records {
        let record = record?;
        push_unique(&mut parts, &mut seen, record.get(column));
    }

    Ok(parts)
}

fn push_unique(parts: &mut Vec<PartNumber>, seen: &mut HashSet<PartNumber>, field: Option<&str>) {
    let Some(field) = field else { return };
    let part = PartNumber::new(field);
    if part.is_empty() {
        return;
    }
    // 检查点按行存储，含换行的零件号读回后对不上
    if part.as_str().contains(['\r', '\n']) {
        warn!("⚠️ 零件号包含换行，已跳过: {:?}", part.as_str());
        return;
    }
    if seen.insert(part.clone()) {
        parts.push(part);
    }
}
