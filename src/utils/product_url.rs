use crate::entities::SourcePlatform;
use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn product_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://([a-z0-9-]+\.)*(aliexpress\.(com|us|ru)|alibaba\.com)/\S+$")
            .expect("product url regex is valid")
    })
}

/// Checks that `url` points at an AliExpress or Alibaba listing and returns
/// the platform it belongs to.
pub fn validate_product_url(url: &str) -> AppResult<SourcePlatform> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let caps = product_url_regex().captures(&lower).ok_or_else(|| {
        AppError::ValidationError(
            "Product URL must be an AliExpress or Alibaba listing".to_string(),
        )
    })?;

    match caps.get(2).map(|m| m.as_str()) {
        Some(host) if host.starts_with("alibaba") => Ok(SourcePlatform::Alibaba),
        _ => Ok(SourcePlatform::Aliexpress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_url() {
        assert_eq!(
            validate_product_url("https://www.aliexpress.com/item/1005006.html").unwrap(),
            SourcePlatform::Aliexpress
        );
        assert_eq!(
            validate_product_url("https://fr.aliexpress.com/item/1005006.html").unwrap(),
            SourcePlatform::Aliexpress
        );
        assert_eq!(
            validate_product_url("https://www.alibaba.com/product-detail/Lamp_1600.html")
                .unwrap(),
            SourcePlatform::Alibaba
        );
        assert!(validate_product_url("https://www.amazon.com/dp/B000").is_err());
        assert!(validate_product_url("https://aliexpress.com.evil.io/item/1").is_err());
        assert!(validate_product_url("not a url").is_err());
    }
}
