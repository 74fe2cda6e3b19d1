pub mod openai;
pub mod stripe;

pub use self::openai::{OpenAiService, ProductBrief, ProductVerdict};
pub use self::stripe::{CheckoutSessionInfo, StripeService, snapshot_from_subscription};
