use crate::database::DbPool;
use crate::entities::{subscription_entity as subscriptions, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::external::{StripeService, snapshot_from_subscription};
use crate::models::{
    CreateCheckoutResponse, Plan, PriceCatalog, QuotaInfo, SubscriptionDebugResponse,
    SubscriptionRecordResponse, SubscriptionSnapshot, SyncSubscriptionResponse,
};
use crate::services::QuotaService;
use crate::services::reconciliation::{
    divergent_fields, pick_best_candidate, plan_for_snapshot, reconcile,
};
use crate::utils::{AuthUser, Backoff};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use stripe::{Event, EventObject, EventType, Expandable, Subscription};
use uuid::Uuid;

#[derive(Clone)]
pub struct BillingService {
    pool: DbPool,
    stripe: StripeService,
    quota: QuotaService,
    backoff: Backoff,
}

fn parse_plan(plan: &str) -> AppResult<Plan> {
    let plan = plan.parse::<Plan>().map_err(AppError::ValidationError)?;
    if !plan.is_paid() {
        return Err(AppError::ValidationError(format!(
            "Plan {plan} cannot be purchased"
        )));
    }
    Ok(plan)
}

fn subscription_id_of(sub: &Expandable<Subscription>) -> String {
    match sub {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(obj) => obj.id.to_string(),
    }
}

/// Whether a snapshot should drive the user's plan. Once the user holds a
/// subscription, another one only takes over when it is entitled; events for
/// the rest only update the mirror row.
fn drives_plan(user: &users::Model, snapshot: Option<&SubscriptionSnapshot>) -> bool {
    match (snapshot, user.stripe_subscription_id.as_deref()) {
        (Some(s), Some(current)) => s.subscription_id == current || s.status.is_entitled(),
        _ => true,
    }
}

/// Plan `current` bills for, once a switch to `target` is known to be allowed.
fn plan_change_source(
    current: &SubscriptionSnapshot,
    target: Plan,
    catalog: &PriceCatalog,
) -> AppResult<Plan> {
    if !current.status.is_entitled() {
        return Err(AppError::ValidationError(format!(
            "Subscription is {}, plan changes need an active subscription",
            current.status
        )));
    }
    let current_plan = plan_for_snapshot(current, catalog)?;
    if current_plan == target {
        return Err(AppError::ValidationError(format!(
            "Already on the {target} plan"
        )));
    }
    Ok(current_plan)
}

impl BillingService {
    pub fn new(pool: DbPool, stripe: StripeService, quota: QuotaService) -> Self {
        Self {
            pool,
            stripe,
            quota,
            backoff: Backoff::default(),
        }
    }

    /// Returns the user's Stripe customer id, creating the customer if needed.
    async fn ensure_customer(&self, user: &users::Model) -> AppResult<String> {
        if let Some(customer_id) = &user.stripe_customer_id {
            return Ok(customer_id.clone());
        }

        let customer_id = self
            .stripe
            .create_customer(user.id, user.email.as_deref())
            .await?;
        users::Entity::update_many()
            .col_expr(users::Column::StripeCustomerId, Expr::value(customer_id.clone()))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user.id))
            .exec(self.pool.as_ref())
            .await?;
        Ok(customer_id)
    }

    pub async fn create_checkout(
        &self,
        auth: &AuthUser,
        plan: &str,
    ) -> AppResult<CreateCheckoutResponse> {
        let plan = parse_plan(plan)?;
        let user = self.quota.get_or_create_user(auth).await?;

        if user.subscription_plan.is_paid() && user.subscription_status.is_entitled() {
            return Err(AppError::Conflict(format!(
                "Already subscribed to {}; change plans with upgrade",
                user.subscription_plan
            )));
        }

        let customer_id = self.ensure_customer(&user).await?;
        let session = self
            .stripe
            .create_subscription_checkout(&customer_id, user.id, plan)
            .await?;

        Ok(CreateCheckoutResponse {
            session_id: session.id,
            url: session.url,
            plan,
        })
    }

    /// Pulls the caller's subscription from Stripe and reconciles it.
    ///
    /// With a checkout session id the session's subscription is awaited with
    /// backoff, since Stripe attaches it asynchronously after payment.
    pub async fn sync(
        &self,
        auth: &AuthUser,
        session_id: Option<&str>,
    ) -> AppResult<SyncSubscriptionResponse> {
        let user = self.quota.get_or_create_user(auth).await?;

        let snapshot = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(session_id) => match self.await_session_subscription(&user, session_id).await? {
                Some(snapshot) => Some(snapshot),
                None => {
                    log::warn!(
                        "Checkout session {session_id} has no subscription yet for user {}",
                        user.id
                    );
                    return Ok(SyncSubscriptionResponse {
                        quota: QuotaInfo::from(&user),
                        pending: true,
                    });
                }
            },
            None => {
                let Some(customer_id) = &user.stripe_customer_id else {
                    return Ok(SyncSubscriptionResponse {
                        quota: self.quota.get_quota(auth).await?,
                        pending: false,
                    });
                };
                let candidates = self.stripe.list_customer_subscriptions(customer_id).await?;
                pick_best_candidate(&candidates).cloned()
            }
        };

        let user = self.apply_snapshot(user.id, snapshot.as_ref()).await?;
        Ok(SyncSubscriptionResponse {
            quota: QuotaInfo::from(&user),
            pending: false,
        })
    }

    async fn await_session_subscription(
        &self,
        user: &users::Model,
        session_id: &str,
    ) -> AppResult<Option<SubscriptionSnapshot>> {
        let expected_ref = user.id.to_string();
        let expected_ref = expected_ref.as_str();
        self.backoff
            .retry(|| async move {
                let session = self.stripe.retrieve_checkout_session(session_id).await?;
                if session.client_reference_id.as_deref() != Some(expected_ref) {
                    log::warn!(
                        "User {} tried to sync checkout session {} owned by {:?}",
                        user.id,
                        session.id,
                        session.client_reference_id
                    );
                    return Err(AppError::Forbidden);
                }
                Ok(session.subscription)
            })
            .await
    }

    /// Moves an entitled subscription to another paid plan with proration.
    pub async fn upgrade(&self, auth: &AuthUser, plan: &str) -> AppResult<QuotaInfo> {
        let plan = parse_plan(plan)?;
        let user = self.quota.get_or_create_user(auth).await?;
        let subscription_id = user.stripe_subscription_id.as_deref().ok_or_else(|| {
            AppError::ValidationError("No active subscription to change".to_string())
        })?;

        let current = self.stripe.retrieve_subscription(subscription_id).await?;
        let current_plan = plan_change_source(&current, plan, self.stripe.catalog())?;

        let updated = self.stripe.change_subscription_price(&current, plan).await?;
        log::info!(
            "User {} {} from {current_plan} to {plan}",
            user.id,
            if plan.rank() > current_plan.rank() {
                "upgraded"
            } else {
                "downgraded"
            }
        );
        let user = self.apply_snapshot(user.id, Some(&updated)).await?;
        Ok(QuotaInfo::from(&user))
    }

    pub async fn cancel(&self, auth: &AuthUser, immediately: bool) -> AppResult<QuotaInfo> {
        let user = self.quota.get_or_create_user(auth).await?;
        let subscription_id = user.stripe_subscription_id.as_deref().ok_or_else(|| {
            AppError::ValidationError("No active subscription to cancel".to_string())
        })?;

        let snapshot = if immediately {
            self.stripe.cancel_now(subscription_id).await?
        } else {
            self.stripe
                .set_cancel_at_period_end(subscription_id, true)
                .await?
        };
        log::info!(
            "User {} canceled subscription {subscription_id} (immediately: {immediately})",
            user.id
        );
        let user = self.apply_snapshot(user.id, Some(&snapshot)).await?;
        Ok(QuotaInfo::from(&user))
    }

    /// Cancels whatever subscription the user holds right away. Used when an
    /// account is deleted.
    pub async fn cancel_for_deletion(&self, user: &users::Model) -> AppResult<()> {
        if let Some(subscription_id) = &user.stripe_subscription_id {
            self.stripe.cancel_now(subscription_id).await?;
        }
        Ok(())
    }

    /// Writes the reconciled users row and the subscriptions mirror row in one
    /// transaction.
    pub async fn apply_snapshot(
        &self,
        user_id: Uuid,
        snapshot: Option<&SubscriptionSnapshot>,
    ) -> AppResult<users::Model> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let user = users::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if let Some(snapshot) = snapshot {
            let plan = plan_for_snapshot(snapshot, self.stripe.catalog()).unwrap_or_else(|e| {
                log::warn!("{e}");
                Plan::Free
            });
            let record = subscriptions::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                stripe_subscription_id: Set(snapshot.subscription_id.clone()),
                stripe_customer_id: Set(snapshot.customer_id.clone()),
                stripe_price_id: Set(snapshot.price_id.clone()),
                plan: Set(plan),
                status: Set(snapshot.status),
                current_period_start: Set(Some(snapshot.current_period_start)),
                current_period_end: Set(Some(snapshot.current_period_end)),
                cancel_at_period_end: Set(snapshot.cancel_at_period_end),
                canceled_at: Set(snapshot.canceled_at),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
            };
            subscriptions::Entity::insert(record)
                .on_conflict(
                    OnConflict::column(subscriptions::Column::StripeSubscriptionId)
                        .update_columns([
                            subscriptions::Column::UserId,
                            subscriptions::Column::StripeCustomerId,
                            subscriptions::Column::StripePriceId,
                            subscriptions::Column::Plan,
                            subscriptions::Column::Status,
                            subscriptions::Column::CurrentPeriodStart,
                            subscriptions::Column::CurrentPeriodEnd,
                            subscriptions::Column::CancelAtPeriodEnd,
                            subscriptions::Column::CanceledAt,
                            subscriptions::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        let user = if drives_plan(&user, snapshot) {
            let update = reconcile(&user, snapshot, self.stripe.catalog(), now)?;
            let user = update.into_active_model(user, now).update(&txn).await?;
            log::info!(
                "Synced user {}: plan {} status {} quota {} used {}",
                user.id,
                user.subscription_plan,
                user.subscription_status,
                user.analysis_quota,
                user.analysis_used_this_month
            );
            user
        } else {
            log::info!(
                "Ignoring {} for replaced subscription on user {}",
                snapshot.map(|s| s.status.as_str()).unwrap_or("none"),
                user.id
            );
            user
        };

        txn.commit().await?;
        Ok(user)
    }

    /// Finds the local user a subscription belongs to.
    async fn resolve_user(&self, snapshot: &SubscriptionSnapshot) -> AppResult<Option<Uuid>> {
        if let Some(user_id) = snapshot.user_id {
            if users::Entity::find_by_id(user_id)
                .one(self.pool.as_ref())
                .await?
                .is_some()
            {
                return Ok(Some(user_id));
            }
        }
        let user = users::Entity::find()
            .filter(users::Column::StripeCustomerId.eq(snapshot.customer_id.as_str()))
            .one(self.pool.as_ref())
            .await?;
        Ok(user.map(|u| u.id))
    }

    async fn sync_subscription(
        &self,
        snapshot: SubscriptionSnapshot,
        fallback_user: Option<Uuid>,
    ) -> AppResult<()> {
        let user_id = match self.resolve_user(&snapshot).await? {
            Some(id) => Some(id),
            None => fallback_user,
        };
        let Some(user_id) = user_id else {
            log::warn!(
                "No user for subscription {} (customer {})",
                snapshot.subscription_id,
                snapshot.customer_id
            );
            return Ok(());
        };
        self.apply_snapshot(user_id, Some(&snapshot)).await?;
        Ok(())
    }

    /// Applies a verified Stripe event. Events that do not concern
    /// subscriptions are acknowledged without side effects.
    pub async fn apply_webhook_event(&self, event: Event) -> AppResult<()> {
        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    let Some(sub) = session.subscription.as_ref() else {
                        log::debug!("Checkout session {} is not a subscription", session.id);
                        return Ok(());
                    };
                    let snapshot = self
                        .stripe
                        .retrieve_subscription(&subscription_id_of(sub))
                        .await?;
                    let fallback = session
                        .client_reference_id
                        .as_deref()
                        .and_then(|s| Uuid::parse_str(s).ok());
                    self.sync_subscription(snapshot, fallback).await?;
                }
                Ok(())
            }
            EventType::CustomerSubscriptionCreated
            | EventType::CustomerSubscriptionUpdated
            | EventType::CustomerSubscriptionDeleted => {
                if let EventObject::Subscription(sub) = event.data.object {
                    self.sync_subscription(snapshot_from_subscription(&sub)?, None)
                        .await?;
                }
                Ok(())
            }
            EventType::InvoicePaymentSucceeded | EventType::InvoicePaymentFailed => {
                let EventObject::Invoice(invoice) = event.data.object else {
                    return Ok(());
                };
                let Some(sub) = invoice.subscription.as_ref() else {
                    return Ok(());
                };
                // Re-fetch: the invoice does not carry the new period.
                let snapshot = self
                    .stripe
                    .retrieve_subscription(&subscription_id_of(sub))
                    .await?;
                self.sync_subscription(snapshot, None).await
            }
            _ => {
                log::info!("Unhandled event type: {:?}", event.type_);
                Ok(())
            }
        }
    }

    /// Side-by-side view of the users row, the mirror row and Stripe.
    pub async fn debug_view(&self, auth: &AuthUser) -> AppResult<SubscriptionDebugResponse> {
        let user = self.quota.get_or_create_user(auth).await?;

        let record = match &user.stripe_subscription_id {
            Some(id) => {
                subscriptions::Entity::find()
                    .filter(subscriptions::Column::StripeSubscriptionId.eq(id.as_str()))
                    .one(self.pool.as_ref())
                    .await?
            }
            None => None,
        };

        let live = match &user.stripe_subscription_id {
            Some(id) => match self.stripe.retrieve_subscription(id).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    log::warn!("Could not fetch subscription {id}: {e}");
                    None
                }
            },
            None => None,
        };

        let fields = divergent_fields(
            &user,
            record.as_ref(),
            live.as_ref(),
            self.stripe.catalog(),
            Utc::now(),
        );

        Ok(SubscriptionDebugResponse {
            user: QuotaInfo::from(&user),
            stripe_customer_id: user.stripe_customer_id.clone(),
            stripe_subscription_id: user.stripe_subscription_id.clone(),
            subscription_record: record.map(SubscriptionRecordResponse::from),
            stripe_subscription: live,
            consistent: fields.is_empty(),
            divergent_fields: fields,
        })
    }
}
