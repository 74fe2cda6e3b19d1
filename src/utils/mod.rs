pub mod backoff;
pub mod first_sale;
pub mod jwt;
pub mod period;
pub mod product_url;

pub use backoff::Backoff;
pub use first_sale::{
    FirstSaleEstimate, estimate_time_to_first_sale, estimate_time_to_first_sale_with_ads,
};
pub use jwt::*;
pub use period::{monthly_period_from, roll_period_forward};
pub use product_url::validate_product_url;
