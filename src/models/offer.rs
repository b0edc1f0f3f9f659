use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// 零件号
///
/// 不透明的标识字符串，同时作为检查点的键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartNumber(String);

impl PartNumber {
    /// 创建零件号（去掉首尾空白）
    pub fn new(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self(value.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PartNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// 报价
///
/// 由某个来源的解析器从一张页面中提取，构造后不再修改。
/// 序列化字段名即结果 CSV 的表头。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    #[serde(rename = "Site")]
    pub source_id: String,
    #[serde(rename = "Part Number")]
    pub part_number: PartNumber,
    #[serde(rename = "Part Name")]
    pub part_name: String,
    #[serde(rename = "Price", serialize_with = "serialize_price")]
    pub price: f64,
    #[serde(rename = "Supplier")]
    pub supplier_name: String,
    #[serde(rename = "Link")]
    pub link: String,
}

fn serialize_price<S: Serializer>(price: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}", price))
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {:.2} | {} ({})",
            self.part_number, self.part_name, self.price, self.supplier_name, self.source_id
        )
    }
}
