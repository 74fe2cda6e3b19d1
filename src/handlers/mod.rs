pub mod account;
pub mod analysis;
pub mod billing;
pub mod cron;
pub mod debug;
pub mod estimate;
pub mod quota;
pub mod webhook;

pub use account::account_config;
pub use analysis::analysis_config;
pub use billing::billing_config;
pub use cron::cron_config;
pub use debug::debug_config;
pub use estimate::estimate_config;
pub use quota::quota_config;
pub use webhook::webhook_config;
