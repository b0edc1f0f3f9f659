//! 页面解析 - 业务能力层
//!
//! 每个来源的页面结构各不相同，但都实现同一个 `Extract` 能力。
//! 新增来源 = 新增一个 `SiteExtractor` 变体 + 在注册表里加一行。

use crate::error::ExtractionError;
use crate::models::{Offer, PartNumber};
use phf::phf_map;
use scraper::{Html, Selector};

/// 价格前的货币符号
pub const CURRENCY_SYMBOL: char = '$';

/// 解析上下文
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub source_id: &'a str,
    pub part_number: &'a PartNumber,
    /// 页面最终地址，作为报价链接
    pub source_url: &'a str,
}

/// 解析能力
pub trait Extract {
    fn extract(&self, document: &Html, ctx: &ExtractContext<'_>) -> Result<Offer, ExtractionError>;
}

/// 已知来源的解析器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteExtractor {
    WebsiteA,
    WebsiteB,
    WebsiteC,
}

/// 一个来源需要的三个字段选择器
#[derive(Debug, Clone, Copy)]
struct FieldSelectors {
    part_name: &'static str,
    price: &'static str,
    supplier: &'static str,
}

impl SiteExtractor {
    fn selectors(&self) -> FieldSelectors {
        match self {
            SiteExtractor::WebsiteA => FieldSelectors {
                part_name: ".part-name",
                price: ".price",
                supplier: ".supplier",
            },
            SiteExtractor::WebsiteB => FieldSelectors {
                part_name: "h2.product-title",
                price: "span.product-price",
                supplier: "div.vendor",
            },
            SiteExtractor::WebsiteC => FieldSelectors {
                part_name: ".item-name",
                price: ".item-cost",
                supplier: ".item-supplier",
            },
        }
    }

    /// 直接从 HTML 文本解析
    pub fn extract_html(&self, html: &str, ctx: &ExtractContext<'_>) -> Result<Offer, ExtractionError> {
        let document = Html::parse_document(html);
        self.extract(&document, ctx)
    }
}

impl Extract for SiteExtractor {
    fn extract(&self, document: &Html, ctx: &ExtractContext<'_>) -> Result<Offer, ExtractionError> {
        let selectors = self.selectors();

        let part_name = select_text(document, "part_name", selectors.part_name)?;
        let price_text = select_text(document, "price", selectors.price)?;
        let supplier_name = select_text(document, "supplier", selectors.supplier)?;
        let price = parse_price(&price_text)?;

        Ok(Offer {
            source_id: ctx.source_id.to_string(),
            part_number: ctx.part_number.clone(),
            part_name,
            price,
            supplier_name,
            link: ctx.source_url.to_string(),
        })
    }
}

/// 取第一个匹配元素的文本（去首尾空白），缺失或为空都算字段缺失
fn select_text(document: &Html, field: &'static str, selector: &'static str) -> Result<String, ExtractionError> {
    let parsed = Selector::parse(selector).map_err(|_| ExtractionError::InvalidSelector { selector })?;

    let text = document
        .select(&parsed)
        .next()
        .map(|element| element.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ExtractionError::MissingField { field, selector });
    }
    Ok(text)
}

/// 解析价格
///
/// 去掉货币符号和千分位逗号后，必须是非负十进制数（只允许数字和一个小数点）
pub fn parse_price(raw: &str) -> Result<f64, ExtractionError> {
    let invalid = || ExtractionError::InvalidPrice { raw: raw.to_string() };

    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != CURRENCY_SYMBOL && *c != ',')
        .collect();
    let cleaned = cleaned.trim();

    let digits = cleaned.chars().filter(char::is_ascii_digit).count();
    let dots = cleaned.chars().filter(|c| *c == '.').count();
    if digits == 0 || dots > 1 || digits + dots != cleaned.chars().count() {
        return Err(invalid());
    }

    let price: f64 = cleaned.parse().map_err(|_| invalid())?;
    if !price.is_finite() || price < 0.0 {
        return Err(invalid());
    }
    Ok(price)
}

/// 来源 ID → 解析器
static EXTRACTORS: phf::Map<&'static str, SiteExtractor> = phf_map! {
    "website_a" => SiteExtractor::WebsiteA,
    "website_b" => SiteExtractor::WebsiteB,
    "website_c" => SiteExtractor::WebsiteC,
};

/// 解析器注册表（静态）
#[derive(Debug, Clone, Copy)]
pub struct ExtractorRegistry {
    extractors: &'static phf::Map<&'static str, SiteExtractor>,
}

impl ExtractorRegistry {
    pub fn lookup(&self, source_id: &str) -> Option<SiteExtractor> {
        self.extractors.get(source_id).copied()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self { extractors: &EXTRACTORS }
    }
}
