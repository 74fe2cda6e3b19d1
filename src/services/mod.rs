pub mod account_service;
pub mod analysis_service;
pub mod billing_service;
pub mod quota_service;
pub mod reconciliation;

pub use account_service::*;
pub use analysis_service::*;
pub use billing_service::*;
pub use quota_service::*;
pub use reconciliation::{PlanUpdate, reconcile};
