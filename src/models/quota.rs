use crate::entities::user_entity as users;
use crate::models::{Plan, SubscriptionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaInfo {
    pub plan: Plan,
    pub status: SubscriptionState,
    pub quota: i32,
    pub used: i32,
    pub remaining: i32,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl From<&users::Model> for QuotaInfo {
    fn from(u: &users::Model) -> Self {
        Self {
            plan: u.subscription_plan,
            status: u.subscription_status,
            quota: u.analysis_quota,
            used: u.analysis_used_this_month,
            remaining: (u.analysis_quota - u.analysis_used_this_month).max(0),
            period_start: u.current_period_start,
            period_end: u.current_period_end,
            cancel_at_period_end: u.cancel_at_period_end,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeductCreditsRequest {
    /// Number of analyses to charge; defaults to one.
    #[schema(example = 1)]
    pub amount: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetQuotasResponse {
    pub reset: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: uuid::Uuid,
    pub email: Option<String>,
    pub quota: QuotaInfo,
    pub has_billing_account: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for AccountResponse {
    fn from(u: users::Model) -> Self {
        let quota = QuotaInfo::from(&u);
        Self {
            id: u.id,
            email: u.email,
            quota,
            has_billing_account: u.stripe_customer_id.is_some(),
            created_at: u.created_at,
        }
    }
}
