use crate::entities::subscription_entity as subscriptions;
use crate::models::{Plan, QuotaInfo};
use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "subscription_status"
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// The user never had a paid subscription.
    #[sea_orm(string_value = "none")]
    #[serde(rename = "none")]
    Inactive,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "trialing")]
    Trialing,
    #[sea_orm(string_value = "past_due")]
    PastDue,
    #[sea_orm(string_value = "incomplete")]
    Incomplete,
    #[sea_orm(string_value = "incomplete_expired")]
    IncompleteExpired,
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

impl SubscriptionState {
    /// Full access to the paid plan's quota.
    pub fn is_entitled(self) -> bool {
        matches!(self, SubscriptionState::Active | SubscriptionState::Trialing)
    }

    /// The subscription is over and the user falls back to the free plan.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubscriptionState::Canceled
                | SubscriptionState::IncompleteExpired
                | SubscriptionState::Unpaid
                | SubscriptionState::Inactive
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionState::Inactive => "none",
            SubscriptionState::Active => "active",
            SubscriptionState::Trialing => "trialing",
            SubscriptionState::PastDue => "past_due",
            SubscriptionState::Incomplete => "incomplete",
            SubscriptionState::IncompleteExpired => "incomplete_expired",
            SubscriptionState::Unpaid => "unpaid",
            SubscriptionState::Paused => "paused",
            SubscriptionState::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<stripe::SubscriptionStatus> for SubscriptionState {
    fn from(status: stripe::SubscriptionStatus) -> Self {
        use stripe::SubscriptionStatus as S;
        match status {
            S::Active => SubscriptionState::Active,
            S::Trialing => SubscriptionState::Trialing,
            S::PastDue => SubscriptionState::PastDue,
            S::Incomplete => SubscriptionState::Incomplete,
            S::IncompleteExpired => SubscriptionState::IncompleteExpired,
            S::Unpaid => SubscriptionState::Unpaid,
            S::Paused => SubscriptionState::Paused,
            S::Canceled => SubscriptionState::Canceled,
        }
    }
}

/// Provider-independent view of a payment provider subscription.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SubscriptionSnapshot {
    pub subscription_id: String,
    pub customer_id: String,
    pub price_id: Option<String>,
    /// Subscription item carrying the price; needed to swap plans.
    pub item_id: Option<String>,
    pub status: SubscriptionState,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    /// `user_id` metadata written at checkout time.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionRecordResponse {
    pub id: Uuid,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub stripe_price_id: Option<String>,
    pub plan: Plan,
    pub status: SubscriptionState,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl From<subscriptions::Model> for SubscriptionRecordResponse {
    fn from(m: subscriptions::Model) -> Self {
        Self {
            id: m.id,
            stripe_subscription_id: m.stripe_subscription_id,
            stripe_customer_id: m.stripe_customer_id,
            stripe_price_id: m.stripe_price_id,
            plan: m.plan,
            status: m.status,
            current_period_start: m.current_period_start,
            current_period_end: m.current_period_end,
            cancel_at_period_end: m.cancel_at_period_end,
            canceled_at: m.canceled_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    #[schema(example = "PRO")]
    pub plan: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
    pub plan: Plan,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SyncSubscriptionRequest {
    /// Checkout session returned to the success page.
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncSubscriptionResponse {
    pub quota: QuotaInfo,
    /// The checkout has not produced a subscription yet; retry later.
    pub pending: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpgradeSubscriptionRequest {
    #[schema(example = "SCALE")]
    pub plan: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CancelSubscriptionRequest {
    #[serde(default)]
    pub immediately: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionDebugResponse {
    pub user: QuotaInfo,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_record: Option<SubscriptionRecordResponse>,
    pub stripe_subscription: Option<SubscriptionSnapshot>,
    pub consistent: bool,
    pub divergent_fields: Vec<String>,
}
