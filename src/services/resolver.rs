use crate::models::Offer;

/// 在同一零件的全部报价中选出最低价
///
/// 同价时保留最先出现的那个；没有报价返回 `None`，由调用方记为失败
pub fn resolve(offers: Vec<Offer>) -> Option<Offer> {
    offers.into_iter().fold(None, |best, offer| match best {
        Some(current) if current.price <= offer.price => Some(current),
        _ => Some(offer),
    })
}
