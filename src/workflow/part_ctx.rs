//! 零件处理上下文
//!
//! 封装"我正在处理第几个零件、是哪个零件"这一信息

use crate::models::PartNumber;
use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct PartCtx {
    pub part_number: PartNumber,

    /// 在本轮待处理列表中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本轮待处理总数
    pub total: usize,
}

impl PartCtx {
    pub fn new(part_number: PartNumber, index: usize, total: usize) -> Self {
        Self {
            part_number,
            index,
            total,
        }
    }
}

impl Display for PartCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[零件 {}/{} {}]", self.index, self.total, self.part_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = PartCtx::new(PartNumber::from("PN-100"), 3, 10);
        assert_eq!(ctx.to_string(), "[零件 3/10 PN-100]");
    }
}
