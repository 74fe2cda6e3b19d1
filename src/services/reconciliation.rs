//! Reconciles the users row with the payment provider's view of a subscription.
//!
//! Everything here is pure; the billing service loads the inputs and writes
//! the resulting [`PlanUpdate`] back in one transaction.

use crate::entities::{subscription_entity as subscriptions, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::{Plan, PriceCatalog, SubscriptionSnapshot, SubscriptionState};
use crate::utils::{monthly_period_from, roll_period_forward};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue::Set, IntoActiveModel};

/// Target state of the plan-related columns of a users row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanUpdate {
    pub plan: Plan,
    pub status: SubscriptionState,
    pub quota: i32,
    pub used: i32,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub cancel_at_period_end: bool,
}

impl PlanUpdate {
    /// Applies the update on top of `user`, stamping `updated_at`.
    pub fn into_active_model(self, user: users::Model, now: DateTime<Utc>) -> users::ActiveModel {
        let mut am = user.into_active_model();
        am.subscription_plan = Set(self.plan);
        am.subscription_status = Set(self.status);
        am.analysis_quota = Set(self.quota);
        am.analysis_used_this_month = Set(self.used);
        am.current_period_start = Set(self.period_start);
        am.current_period_end = Set(self.period_end);
        am.stripe_customer_id = Set(self.stripe_customer_id);
        am.stripe_subscription_id = Set(self.stripe_subscription_id);
        am.cancel_at_period_end = Set(self.cancel_at_period_end);
        am.updated_at = Set(Some(now));
        am
    }

    fn differs_from(&self, user: &users::Model) -> Vec<String> {
        let mut fields = Vec::new();
        if self.plan != user.subscription_plan {
            fields.push("subscription_plan".to_string());
        }
        if self.status != user.subscription_status {
            fields.push("subscription_status".to_string());
        }
        if self.quota != user.analysis_quota {
            fields.push("analysis_quota".to_string());
        }
        if self.stripe_subscription_id != user.stripe_subscription_id {
            fields.push("stripe_subscription_id".to_string());
        }
        if self.cancel_at_period_end != user.cancel_at_period_end {
            fields.push("cancel_at_period_end".to_string());
        }
        if self.period_end != user.current_period_end {
            fields.push("current_period_end".to_string());
        }
        fields
    }
}

/// Plan billed by a snapshot's price.
pub fn plan_for_snapshot(
    snapshot: &SubscriptionSnapshot,
    catalog: &PriceCatalog,
) -> AppResult<Plan> {
    let price_id = snapshot.price_id.as_deref().ok_or_else(|| {
        AppError::ExternalApiError(format!(
            "Subscription {} has no price",
            snapshot.subscription_id
        ))
    })?;
    catalog.plan_for_price(price_id).ok_or_else(|| {
        AppError::ConfigError(format!(
            "Unknown price {price_id} on subscription {}",
            snapshot.subscription_id
        ))
    })
}

/// Period a FREE user ends up on: the stored one rolled forward, or a fresh
/// month when the user was paid or has none.
fn free_period(user: &users::Model, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    match (user.current_period_start, user.current_period_end) {
        (Some(start), Some(end)) if !user.subscription_plan.is_paid() => {
            roll_period_forward(start, end, now)
        }
        _ => monthly_period_from(now),
    }
}

/// Computes the users row state implied by `snapshot`.
///
/// * no snapshot or a terminal status: back to FREE, usage clamped to zero
///   quota, the subscription id is cleared;
/// * active/trialing: plan and quota from the price, usage reset when the
///   billing period changed;
/// * past_due/incomplete/paused on the subscription the user already pays
///   for: paid plan kept as a grace period, the stored period is left alone
///   so that recovery still triggers the usage reset;
/// * the same statuses on a subscription that was never paid: FREE quota,
///   with the subscription and its status recorded.
pub fn reconcile(
    user: &users::Model,
    snapshot: Option<&SubscriptionSnapshot>,
    catalog: &PriceCatalog,
    now: DateTime<Utc>,
) -> AppResult<PlanUpdate> {
    let customer_id = snapshot
        .map(|s| s.customer_id.clone())
        .or_else(|| user.stripe_customer_id.clone());

    let Some(snapshot) = snapshot.filter(|s| !s.status.is_terminal()) else {
        let had_subscription = snapshot.is_some()
            || user.stripe_subscription_id.is_some()
            || user.subscription_status != SubscriptionState::Inactive;
        let (period_start, period_end) = free_period(user, now);
        let quota = Plan::Free.quota();
        return Ok(PlanUpdate {
            plan: Plan::Free,
            status: if had_subscription {
                SubscriptionState::Canceled
            } else {
                SubscriptionState::Inactive
            },
            quota,
            used: user.analysis_used_this_month.clamp(0, quota),
            period_start: Some(period_start),
            period_end: Some(period_end),
            stripe_customer_id: customer_id,
            stripe_subscription_id: None,
            cancel_at_period_end: false,
        });
    };

    if snapshot.status.is_entitled() {
        let plan = plan_for_snapshot(snapshot, catalog)?;
        let new_period = user.current_period_start != Some(snapshot.current_period_start);
        Ok(PlanUpdate {
            plan,
            status: snapshot.status,
            quota: plan.quota(),
            used: if new_period {
                0
            } else {
                user.analysis_used_this_month
            },
            period_start: Some(snapshot.current_period_start),
            period_end: Some(snapshot.current_period_end),
            stripe_customer_id: customer_id,
            stripe_subscription_id: Some(snapshot.subscription_id.clone()),
            cancel_at_period_end: snapshot.cancel_at_period_end,
        })
    } else if !holds_paid_plan(user, snapshot) {
        let (period_start, period_end) = free_period(user, now);
        let quota = Plan::Free.quota();
        Ok(PlanUpdate {
            plan: Plan::Free,
            status: snapshot.status,
            quota,
            used: user.analysis_used_this_month.clamp(0, quota),
            period_start: Some(period_start),
            period_end: Some(period_end),
            stripe_customer_id: customer_id,
            stripe_subscription_id: Some(snapshot.subscription_id.clone()),
            cancel_at_period_end: snapshot.cancel_at_period_end,
        })
    } else {
        let plan = plan_for_snapshot(snapshot, catalog)?;
        let (period_start, period_end) = match (user.current_period_start, user.current_period_end)
        {
            (Some(start), Some(end)) => (Some(start), Some(end)),
            _ => (
                Some(snapshot.current_period_start),
                Some(snapshot.current_period_end),
            ),
        };
        Ok(PlanUpdate {
            plan,
            status: snapshot.status,
            quota: plan.quota(),
            used: user.analysis_used_this_month,
            period_start,
            period_end,
            stripe_customer_id: customer_id,
            stripe_subscription_id: Some(snapshot.subscription_id.clone()),
            cancel_at_period_end: snapshot.cancel_at_period_end,
        })
    }
}

/// Whether `snapshot` is the subscription behind the user's current paid plan.
fn holds_paid_plan(user: &users::Model, snapshot: &SubscriptionSnapshot) -> bool {
    user.subscription_plan.is_paid()
        && user.stripe_subscription_id.as_deref() == Some(snapshot.subscription_id.as_str())
}

/// Picks the subscription that should drive the user's plan: entitled
/// before grace before terminal, newest first within a class.
pub fn pick_best_candidate(candidates: &[SubscriptionSnapshot]) -> Option<&SubscriptionSnapshot> {
    candidates.iter().max_by_key(|s| {
        let class = if s.status.is_entitled() {
            2
        } else if !s.status.is_terminal() {
            1
        } else {
            0
        };
        (class, s.created)
    })
}

/// Fields where the stored rows disagree with the live subscription.
pub fn divergent_fields(
    user: &users::Model,
    record: Option<&subscriptions::Model>,
    snapshot: Option<&SubscriptionSnapshot>,
    catalog: &PriceCatalog,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut fields = match reconcile(user, snapshot, catalog, now) {
        Ok(expected) => expected.differs_from(user),
        Err(e) => vec![format!("price ({e})")],
    };
    if user.analysis_used_this_month > user.analysis_quota && user.analysis_quota > 0 {
        fields.push("analysis_used_this_month".to_string());
    }

    match (record, snapshot) {
        (Some(record), Some(snapshot)) => {
            if record.stripe_subscription_id != snapshot.subscription_id {
                fields.push("subscriptions.stripe_subscription_id".to_string());
            }
            if record.status != snapshot.status {
                fields.push("subscriptions.status".to_string());
            }
            if record.stripe_price_id != snapshot.price_id {
                fields.push("subscriptions.stripe_price_id".to_string());
            }
            if record.current_period_end != Some(snapshot.current_period_end) {
                fields.push("subscriptions.current_period_end".to_string());
            }
        }
        (None, Some(_)) => fields.push("subscriptions".to_string()),
        _ => {}
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn catalog() -> PriceCatalog {
        PriceCatalog::new(vec![
            (Plan::Smart, "price_smart".to_string()),
            (Plan::Pro, "price_pro".to_string()),
            (Plan::Scale, "price_scale".to_string()),
        ])
    }

    fn free_user() -> users::Model {
        users::Model {
            id: Uuid::nil(),
            email: Some("seller@example.com".to_string()),
            subscription_plan: Plan::Free,
            subscription_status: SubscriptionState::Inactive,
            analysis_quota: 0,
            analysis_used_this_month: 0,
            current_period_start: Some(at(2025, 3, 1)),
            current_period_end: Some(at(2025, 4, 1)),
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: None,
            cancel_at_period_end: false,
            created_at: Some(at(2025, 3, 1)),
            updated_at: None,
        }
    }

    fn pro_user(used: i32) -> users::Model {
        users::Model {
            subscription_plan: Plan::Pro,
            subscription_status: SubscriptionState::Active,
            analysis_quota: 60,
            analysis_used_this_month: used,
            current_period_start: Some(at(2025, 3, 5)),
            current_period_end: Some(at(2025, 4, 5)),
            stripe_subscription_id: Some("sub_1".to_string()),
            ..free_user()
        }
    }

    fn snapshot(status: SubscriptionState, price: &str, start: DateTime<Utc>) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            subscription_id: "sub_1".to_string(),
            customer_id: "cus_1".to_string(),
            price_id: Some(price.to_string()),
            item_id: Some("si_1".to_string()),
            status,
            current_period_start: start,
            current_period_end: start.checked_add_months(chrono::Months::new(1)).unwrap(),
            cancel_at_period_end: false,
            canceled_at: None,
            created: at(2025, 1, 5),
            user_id: Some(Uuid::nil()),
        }
    }

    #[test]
    fn test_no_subscription_stays_free() {
        let update = reconcile(&free_user(), None, &catalog(), at(2025, 3, 10)).unwrap();
        assert_eq!(update.plan, Plan::Free);
        assert_eq!(update.status, SubscriptionState::Inactive);
        assert_eq!(update.quota, 0);
        assert_eq!(update.period_start, Some(at(2025, 3, 1)));
    }

    #[test]
    fn test_canceled_subscription_falls_back_to_free() {
        let snap = snapshot(SubscriptionState::Canceled, "price_pro", at(2025, 3, 5));
        let update = reconcile(&pro_user(42), Some(&snap), &catalog(), at(2025, 3, 20)).unwrap();
        assert_eq!(update.plan, Plan::Free);
        assert_eq!(update.status, SubscriptionState::Canceled);
        assert_eq!(update.quota, 0);
        assert_eq!(update.used, 0);
        assert_eq!(update.stripe_subscription_id, None);
        assert_eq!(update.stripe_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(update.period_start, Some(at(2025, 3, 20)));
    }

    #[test]
    fn test_unpaid_and_expired_are_terminal() {
        for status in [SubscriptionState::Unpaid, SubscriptionState::IncompleteExpired] {
            let snap = snapshot(status, "price_pro", at(2025, 3, 5));
            let update = reconcile(&pro_user(3), Some(&snap), &catalog(), at(2025, 3, 20)).unwrap();
            assert_eq!(update.plan, Plan::Free);
            assert_eq!(update.status, SubscriptionState::Canceled);
        }
    }

    #[test]
    fn test_missing_snapshot_for_paid_user_downgrades() {
        let update = reconcile(&pro_user(10), None, &catalog(), at(2025, 3, 20)).unwrap();
        assert_eq!(update.plan, Plan::Free);
        assert_eq!(update.status, SubscriptionState::Canceled);
        assert_eq!(update.stripe_subscription_id, None);
    }

    #[test]
    fn test_first_activation_resets_usage() {
        let snap = snapshot(SubscriptionState::Active, "price_smart", at(2025, 3, 10));
        let update = reconcile(&free_user(), Some(&snap), &catalog(), at(2025, 3, 10)).unwrap();
        assert_eq!(update.plan, Plan::Smart);
        assert_eq!(update.quota, 30);
        assert_eq!(update.used, 0);
        assert_eq!(update.status, SubscriptionState::Active);
        assert_eq!(update.stripe_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(update.period_end, Some(at(2025, 4, 10)));
    }

    #[test]
    fn test_mid_period_upgrade_keeps_usage() {
        let snap = snapshot(SubscriptionState::Active, "price_scale", at(2025, 3, 5));
        let update = reconcile(&pro_user(42), Some(&snap), &catalog(), at(2025, 3, 20)).unwrap();
        assert_eq!(update.plan, Plan::Scale);
        assert_eq!(update.quota, 100);
        assert_eq!(update.used, 42);
    }

    #[test]
    fn test_new_period_resets_usage() {
        let snap = snapshot(SubscriptionState::Active, "price_pro", at(2025, 4, 5));
        let update = reconcile(&pro_user(60), Some(&snap), &catalog(), at(2025, 4, 5)).unwrap();
        assert_eq!(update.used, 0);
        assert_eq!(update.period_start, Some(at(2025, 4, 5)));
    }

    #[test]
    fn test_trialing_is_entitled() {
        let snap = snapshot(SubscriptionState::Trialing, "price_pro", at(2025, 3, 5));
        let update = reconcile(&free_user(), Some(&snap), &catalog(), at(2025, 3, 5)).unwrap();
        assert_eq!(update.plan, Plan::Pro);
        assert_eq!(update.status, SubscriptionState::Trialing);
    }

    #[test]
    fn test_past_due_keeps_plan_and_period() {
        let snap = snapshot(SubscriptionState::PastDue, "price_pro", at(2025, 4, 5));
        let update = reconcile(&pro_user(55), Some(&snap), &catalog(), at(2025, 4, 6)).unwrap();
        assert_eq!(update.plan, Plan::Pro);
        assert_eq!(update.quota, 60);
        assert_eq!(update.used, 55);
        assert_eq!(update.status, SubscriptionState::PastDue);
        assert_eq!(update.period_start, Some(at(2025, 3, 5)));

        // Once the invoice is paid the new period resets usage.
        let snap = snapshot(SubscriptionState::Active, "price_pro", at(2025, 4, 5));
        let update = reconcile(&pro_user(55), Some(&snap), &catalog(), at(2025, 4, 7)).unwrap();
        assert_eq!(update.used, 0);
    }

    #[test]
    fn test_unpaid_first_subscription_grants_nothing() {
        for status in [SubscriptionState::Incomplete, SubscriptionState::PastDue] {
            let snap = snapshot(status, "price_scale", at(2025, 3, 10));
            let update = reconcile(&free_user(), Some(&snap), &catalog(), at(2025, 3, 10)).unwrap();
            assert_eq!(update.plan, Plan::Free);
            assert_eq!(update.quota, 0);
            assert_eq!(update.status, status);
            assert_eq!(update.stripe_subscription_id.as_deref(), Some("sub_1"));
            assert_eq!(update.period_start, Some(at(2025, 3, 1)));
        }

        // Payment goes through: the plan starts with a fresh period.
        let mut pending = free_user();
        pending.subscription_status = SubscriptionState::Incomplete;
        pending.stripe_subscription_id = Some("sub_1".to_string());
        let snap = snapshot(SubscriptionState::Active, "price_scale", at(2025, 3, 10));
        let update = reconcile(&pending, Some(&snap), &catalog(), at(2025, 3, 10)).unwrap();
        assert_eq!(update.plan, Plan::Scale);
        assert_eq!(update.quota, 100);
        assert_eq!(update.used, 0);
    }

    #[test]
    fn test_grace_only_for_the_paid_subscription() {
        let mut snap = snapshot(SubscriptionState::PastDue, "price_scale", at(2025, 3, 5));
        snap.subscription_id = "sub_2".to_string();
        let update = reconcile(&pro_user(5), Some(&snap), &catalog(), at(2025, 3, 6)).unwrap();
        assert_eq!(update.plan, Plan::Free);
        assert_eq!(update.quota, 0);
    }

    #[test]
    fn test_unknown_price_is_an_error() {
        let snap = snapshot(SubscriptionState::Active, "price_legacy", at(2025, 3, 5));
        assert!(matches!(
            reconcile(&free_user(), Some(&snap), &catalog(), at(2025, 3, 5)),
            Err(AppError::ConfigError(_))
        ));

        let mut snap = snapshot(SubscriptionState::Active, "price_pro", at(2025, 3, 5));
        snap.price_id = None;
        assert!(reconcile(&free_user(), Some(&snap), &catalog(), at(2025, 3, 5)).is_err());
    }

    #[test]
    fn test_cancel_at_period_end_is_carried() {
        let mut snap = snapshot(SubscriptionState::Active, "price_pro", at(2025, 3, 5));
        snap.cancel_at_period_end = true;
        let update = reconcile(&pro_user(1), Some(&snap), &catalog(), at(2025, 3, 6)).unwrap();
        assert!(update.cancel_at_period_end);
        assert_eq!(update.plan, Plan::Pro);
    }

    #[test]
    fn test_pick_best_candidate() {
        let mut old_active = snapshot(SubscriptionState::Active, "price_smart", at(2025, 1, 1));
        old_active.subscription_id = "sub_old".to_string();
        let mut new_canceled = snapshot(SubscriptionState::Canceled, "price_pro", at(2025, 3, 1));
        new_canceled.subscription_id = "sub_new".to_string();
        new_canceled.created = at(2025, 3, 1);
        let mut past_due = snapshot(SubscriptionState::PastDue, "price_pro", at(2025, 2, 1));
        past_due.subscription_id = "sub_late".to_string();
        past_due.created = at(2025, 2, 1);

        let all = vec![new_canceled.clone(), old_active.clone(), past_due.clone()];
        assert_eq!(pick_best_candidate(&all).unwrap().subscription_id, "sub_old");

        let all = vec![new_canceled.clone(), past_due];
        assert_eq!(pick_best_candidate(&all).unwrap().subscription_id, "sub_late");

        assert!(pick_best_candidate(&[]).is_none());
    }

    #[test]
    fn test_divergent_fields() {
        let snap = snapshot(SubscriptionState::Active, "price_pro", at(2025, 3, 5));
        let user = pro_user(1);
        assert!(divergent_fields(&user, None, None, &catalog(), at(2025, 3, 6))
            .contains(&"subscription_plan".to_string()));

        let fields = divergent_fields(&user, None, Some(&snap), &catalog(), at(2025, 3, 6));
        assert_eq!(fields, vec!["subscriptions".to_string()]);

        let record = subscriptions::Model {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            stripe_subscription_id: "sub_1".to_string(),
            stripe_customer_id: "cus_1".to_string(),
            stripe_price_id: Some("price_pro".to_string()),
            plan: Plan::Pro,
            status: SubscriptionState::PastDue,
            current_period_start: Some(at(2025, 3, 5)),
            current_period_end: Some(at(2025, 4, 5)),
            cancel_at_period_end: false,
            canceled_at: None,
            created_at: None,
            updated_at: None,
        };
        let fields = divergent_fields(&user, Some(&record), Some(&snap), &catalog(), at(2025, 3, 6));
        assert_eq!(fields, vec!["subscriptions.status".to_string()]);
    }
}
