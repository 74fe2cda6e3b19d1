use crate::database::DbPool;
use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::{PLAN_QUOTAS, Plan, QuotaInfo, SubscriptionState};
use crate::utils::{AuthUser, monthly_period_from, roll_period_forward};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ActiveValue::Set, ColumnTrait, Condition, EntityTrait, QueryFilter};
use uuid::Uuid;

#[derive(Clone)]
pub struct QuotaService {
    pool: DbPool,
}

impl QuotaService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_user(&self, user_id: Uuid) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Loads the caller's row, creating a FREE user on first sight.
    pub async fn get_or_create_user(&self, auth: &AuthUser) -> AppResult<users::Model> {
        if let Some(user) = users::Entity::find_by_id(auth.id).one(self.pool.as_ref()).await? {
            return Ok(user);
        }

        let now = Utc::now();
        let (period_start, period_end) = monthly_period_from(now);
        let user = users::ActiveModel {
            id: Set(auth.id),
            email: Set(auth.email.clone()),
            subscription_plan: Set(Plan::Free),
            subscription_status: Set(SubscriptionState::Inactive),
            analysis_quota: Set(Plan::Free.quota()),
            analysis_used_this_month: Set(0),
            current_period_start: Set(Some(period_start)),
            current_period_end: Set(Some(period_end)),
            stripe_customer_id: Set(None),
            stripe_subscription_id: Set(None),
            cancel_at_period_end: Set(false),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        };

        // Two first requests may race; the loser re-reads the winner's row.
        users::Entity::insert(user)
            .on_conflict(OnConflict::column(users::Column::Id).do_nothing().to_owned())
            .exec_without_returning(self.pool.as_ref())
            .await?;

        log::info!("Created user {}", auth.id);
        self.find_user(auth.id).await
    }

    /// The caller's row with an expired period already rolled forward.
    pub async fn current_user(&self, auth: &AuthUser) -> AppResult<users::Model> {
        let user = self.get_or_create_user(auth).await?;
        self.roll_expired_period(user, Utc::now()).await
    }

    pub async fn get_quota(&self, auth: &AuthUser) -> AppResult<QuotaInfo> {
        let user = self.current_user(auth).await?;
        Ok(QuotaInfo::from(&user))
    }

    /// Charges `amount` analyses against the caller's quota.
    pub async fn deduct(&self, auth: &AuthUser, amount: i32) -> AppResult<QuotaInfo> {
        // No plan allows more than its quota in one period.
        let ceiling = PLAN_QUOTAS.iter().map(|(_, q)| *q).max().unwrap_or(0);
        if !(1..=ceiling).contains(&amount) {
            return Err(AppError::ValidationError(format!(
                "Amount must be between 1 and {ceiling}"
            )));
        }
        self.current_user(auth).await?;

        let result = users::Entity::update_many()
            .col_expr(
                users::Column::AnalysisUsedThisMonth,
                Expr::col(users::Column::AnalysisUsedThisMonth).add(amount),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(auth.id))
            .filter(
                Expr::expr(Expr::col(users::Column::AnalysisUsedThisMonth).add(amount))
                    .lte(Expr::col(users::Column::AnalysisQuota)),
            )
            .exec(self.pool.as_ref())
            .await?;

        let user = self.find_user(auth.id).await?;
        if result.rows_affected == 0 {
            return Err(AppError::QuotaExceeded {
                used: user.analysis_used_this_month,
                quota: user.analysis_quota,
            });
        }

        log::info!(
            "User {} used {amount} analysis credit(s): {}/{}",
            auth.id,
            user.analysis_used_this_month,
            user.analysis_quota
        );
        Ok(QuotaInfo::from(&user))
    }

    /// Gives back credits charged for work that did not complete. Usage never
    /// drops below zero.
    pub async fn refund(&self, user_id: Uuid, amount: i32) -> AppResult<()> {
        if amount < 1 {
            return Ok(());
        }
        let used = users::Column::AnalysisUsedThisMonth;
        users::Entity::update_many()
            .col_expr(
                used,
                Expr::case(Expr::col(used).gt(amount), Expr::col(used).sub(amount))
                    .finally(0)
                    .into(),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .exec(self.pool.as_ref())
            .await?;

        log::info!("Refunded {amount} analysis credit(s) to user {user_id}");
        Ok(())
    }

    /// Starts a new period for every user whose period ended and who is not
    /// covered by an entitled subscription. Returns the number of users reset.
    pub async fn reset_expired_periods(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let expired = users::Entity::find()
            .filter(users::Column::CurrentPeriodEnd.lte(now))
            .filter(
                Condition::any()
                    .add(users::Column::SubscriptionPlan.eq(Plan::Free))
                    .add(users::Column::SubscriptionStatus.is_not_in([
                        SubscriptionState::Active,
                        SubscriptionState::Trialing,
                    ])),
            )
            .all(self.pool.as_ref())
            .await?;

        let mut reset = 0;
        for user in expired {
            match self.start_new_period(&user, now).await {
                Ok(rows) => reset += rows,
                Err(e) => log::error!("Failed to reset quota for user {}: {}", user.id, e),
            }
        }

        log::info!("Quota reset complete, users reset: {}", reset);
        Ok(reset)
    }

    async fn roll_expired_period(
        &self,
        mut user: users::Model,
        now: DateTime<Utc>,
    ) -> AppResult<users::Model> {
        if !period_expired(&user, now) {
            return Ok(user);
        }
        self.start_new_period(&user, now).await?;
        let (start, end) = next_period(&user, now);
        user.analysis_used_this_month = 0;
        user.current_period_start = Some(start);
        user.current_period_end = Some(end);
        Ok(user)
    }

    async fn start_new_period(&self, user: &users::Model, now: DateTime<Utc>) -> AppResult<u64> {
        let (start, end) = next_period(user, now);
        let result = users::Entity::update_many()
            .col_expr(users::Column::AnalysisUsedThisMonth, Expr::value(0))
            .col_expr(users::Column::CurrentPeriodStart, Expr::value(start))
            .col_expr(users::Column::CurrentPeriodEnd, Expr::value(end))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(user.id))
            .exec(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

/// Whether the stored period is over and no entitled subscription will renew it.
fn period_expired(user: &users::Model, now: DateTime<Utc>) -> bool {
    let covered = user.subscription_plan.is_paid() && user.subscription_status.is_entitled();
    match user.current_period_end {
        Some(end) => end <= now && !covered,
        None => !covered,
    }
}

fn next_period(user: &users::Model, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    match (user.current_period_start, user.current_period_end) {
        (Some(start), Some(end)) => roll_period_forward(start, end, now),
        _ => monthly_period_from(now),
    }
}
