use crate::database::DbPool;
use crate::entities::user_entity as users;
use crate::error::AppResult;
use crate::models::AccountResponse;
use crate::services::{BillingService, QuotaService};
use crate::utils::AuthUser;
use sea_orm::EntityTrait;

#[derive(Clone)]
pub struct AccountService {
    pool: DbPool,
    quota: QuotaService,
    billing: BillingService,
}

impl AccountService {
    pub fn new(pool: DbPool, quota: QuotaService, billing: BillingService) -> Self {
        Self {
            pool,
            quota,
            billing,
        }
    }

    pub async fn get_account(&self, auth: &AuthUser) -> AppResult<AccountResponse> {
        let user = self.quota.current_user(auth).await?;
        Ok(AccountResponse::from(user))
    }

    /// Deletes the caller's data. A live subscription is canceled first; if
    /// Stripe refuses, the account is still deleted.
    pub async fn delete_account(&self, auth: &AuthUser) -> AppResult<()> {
        let Some(user) = users::Entity::find_by_id(auth.id).one(self.pool.as_ref()).await? else {
            log::info!("Delete requested for unknown user {}", auth.id);
            return Ok(());
        };

        if let Err(e) = self.billing.cancel_for_deletion(&user).await {
            log::error!(
                "Failed to cancel subscription {:?} for deleted user {}: {}",
                user.stripe_subscription_id,
                user.id,
                e
            );
        }

        // subscriptions, products and analyses cascade
        users::Entity::delete_by_id(user.id).exec(self.pool.as_ref()).await?;
        log::info!("Deleted account {}", user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use crate::external::StripeService;
    use crate::models::{Plan, SubscriptionState};
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use uuid::Uuid;

    fn service(db: DbPool) -> AccountService {
        let quota = QuotaService::new(db.clone());
        let billing = BillingService::new(
            db.clone(),
            StripeService::new(StripeConfig::default()),
            quota.clone(),
        );
        AccountService::new(db, quota, billing)
    }

    fn user(id: Uuid) -> users::Model {
        users::Model {
            id,
            email: Some("seller@example.com".to_string()),
            subscription_plan: Plan::Free,
            subscription_status: SubscriptionState::Inactive,
            analysis_quota: 0,
            analysis_used_this_month: 0,
            current_period_start: None,
            current_period_end: None,
            stripe_customer_id: Some("cus_9".to_string()),
            stripe_subscription_id: None,
            cancel_at_period_end: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[actix_web::test]
    async fn test_delete_account_without_subscription() {
        let id = Uuid::from_u128(11);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![user(id)]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let auth = AuthUser { id, email: None };
        service(db).delete_account(&auth).await.unwrap();
    }

    #[actix_web::test]
    async fn test_delete_unknown_account_is_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<users::Model>::new()])
                .into_connection(),
        );

        let auth = AuthUser {
            id: Uuid::from_u128(12),
            email: None,
        };
        service(db).delete_account(&auth).await.unwrap();
    }

    #[actix_web::test]
    async fn test_get_account() {
        let id = Uuid::from_u128(13);
        let now = Utc::now();
        let mut current = user(id);
        current.current_period_start = Some(now - Duration::days(3));
        current.current_period_end = Some(now + Duration::days(27));
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![current]])
                .into_connection(),
        );

        let auth = AuthUser { id, email: None };
        let account = service(db).get_account(&auth).await.unwrap();
        assert_eq!(account.id, id);
        assert!(account.has_billing_account);
        assert_eq!(account.quota.plan, Plan::Free);
    }

    #[actix_web::test]
    async fn test_get_account_rolls_expired_period() {
        let id = Uuid::from_u128(14);
        let now = Utc::now();
        let mut lapsed = user(id);
        lapsed.subscription_status = SubscriptionState::Canceled;
        lapsed.analysis_used_this_month = 3;
        lapsed.current_period_start = Some(now - Duration::days(40));
        lapsed.current_period_end = Some(now - Duration::days(10));
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![lapsed]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let auth = AuthUser { id, email: None };
        let account = service(db).get_account(&auth).await.unwrap();
        assert_eq!(account.quota.used, 0);
        assert!(account.quota.period_end.unwrap() > now);
    }
}
