use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Plan, PriceCatalog, SubscriptionSnapshot, SubscriptionState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use stripe::generated::billing::subscription::SubscriptionProrationBehavior;
use stripe::{
    CancelSubscription, CheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionSubscriptionData, CreateCustomer, Customer, CustomerId, Event,
    Expandable, ListSubscriptions, Subscription, SubscriptionId, UpdateSubscription,
    UpdateSubscriptionItems, Webhook,
};
use uuid::Uuid;

/// Checkout session as seen by the sync flow.
#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer_id: Option<String>,
    pub subscription: Option<SubscriptionSnapshot>,
}

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
    catalog: PriceCatalog,
}

fn timestamp(ts: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| AppError::ExternalApiError(format!("Invalid Stripe timestamp {ts}")))
}

fn parse_id<T: std::str::FromStr>(kind: &str, id: &str) -> AppResult<T> {
    id.parse::<T>()
        .map_err(|_| AppError::ValidationError(format!("Invalid {kind} id: {id}")))
}

/// Normalizes a Stripe subscription. The first item's price decides the plan.
pub fn snapshot_from_subscription(sub: &Subscription) -> AppResult<SubscriptionSnapshot> {
    let customer_id = match &sub.customer {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(customer) => customer.id.to_string(),
    };
    let item = sub.items.data.first();
    let price_id = item
        .and_then(|item| item.price.as_ref())
        .map(|price| price.id.to_string());

    Ok(SubscriptionSnapshot {
        subscription_id: sub.id.to_string(),
        customer_id,
        price_id,
        item_id: item.map(|item| item.id.to_string()),
        status: SubscriptionState::from(sub.status.clone()),
        current_period_start: timestamp(sub.current_period_start)?,
        current_period_end: timestamp(sub.current_period_end)?,
        cancel_at_period_end: sub.cancel_at_period_end,
        canceled_at: sub.canceled_at.map(timestamp).transpose()?,
        created: timestamp(sub.created)?,
        user_id: sub
            .metadata
            .get("user_id")
            .and_then(|v| Uuid::parse_str(v).ok()),
    })
}

impl StripeService {
    pub fn new(config: StripeConfig) -> Self {
        let catalog = PriceCatalog::from_config(&config);
        Self {
            client: Client::new(config.secret_key.clone()),
            config,
            catalog,
        }
    }

    pub fn catalog(&self) -> &PriceCatalog {
        &self.catalog
    }

    pub async fn create_customer(&self, user_id: Uuid, email: Option<&str>) -> AppResult<String> {
        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());

        let customer = Customer::create(
            &self.client,
            CreateCustomer {
                email,
                metadata: Some(metadata),
                ..Default::default()
            },
        )
        .await?;

        log::info!("Created Stripe customer {} for user {user_id}", customer.id);
        Ok(customer.id.to_string())
    }

    pub async fn create_subscription_checkout(
        &self,
        customer_id: &str,
        user_id: Uuid,
        plan: Plan,
    ) -> AppResult<CheckoutSessionInfo> {
        let price_id = self.catalog.price_for_plan(plan).ok_or_else(|| {
            AppError::ConfigError(format!("No Stripe price configured for plan {plan}"))
        })?;

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        metadata.insert("plan".to_string(), plan.to_string());

        let user_ref = user_id.to_string();
        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.customer = Some(parse_id::<CustomerId>("customer", customer_id)?);
        params.client_reference_id = Some(&user_ref);
        params.success_url = Some(&self.config.success_url);
        params.cancel_url = Some(&self.config.cancel_url);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(price_id.to_string()),
            quantity: Some(1),
            ..Default::default()
        }]);
        params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            metadata: Some(metadata.clone()),
            ..Default::default()
        });
        params.metadata = Some(metadata);

        let session = CheckoutSession::create(&self.client, params).await?;
        log::info!(
            "Created checkout session {} for user {user_id} plan {plan}",
            session.id
        );
        self.session_info(session).await
    }

    pub async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSessionInfo> {
        let id = parse_id::<CheckoutSessionId>("checkout session", session_id)?;
        let session = CheckoutSession::retrieve(&self.client, &id, &["subscription"]).await?;
        self.session_info(session).await
    }

    async fn session_info(&self, session: CheckoutSession) -> AppResult<CheckoutSessionInfo> {
        let subscription = match session.subscription {
            Some(Expandable::Object(sub)) => Some(snapshot_from_subscription(&sub)?),
            Some(Expandable::Id(id)) => Some(self.retrieve_subscription(&id.to_string()).await?),
            None => None,
        };
        let customer_id = session.customer.as_ref().map(|c| match c {
            Expandable::Id(id) => id.to_string(),
            Expandable::Object(customer) => customer.id.to_string(),
        });

        Ok(CheckoutSessionInfo {
            id: session.id.to_string(),
            url: session.url,
            client_reference_id: session.client_reference_id,
            customer_id,
            subscription,
        })
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionSnapshot> {
        let id = parse_id::<SubscriptionId>("subscription", subscription_id)?;
        let sub = Subscription::retrieve(&self.client, &id, &[]).await?;
        snapshot_from_subscription(&sub)
    }

    /// Non-canceled subscriptions of a customer.
    pub async fn list_customer_subscriptions(
        &self,
        customer_id: &str,
    ) -> AppResult<Vec<SubscriptionSnapshot>> {
        let params = ListSubscriptions {
            customer: Some(parse_id::<CustomerId>("customer", customer_id)?),
            ..Default::default()
        };
        let subs = Subscription::list(&self.client, &params).await?;
        subs.data.iter().map(snapshot_from_subscription).collect()
    }

    /// Swaps the subscription's price, prorating the difference.
    pub async fn change_subscription_price(
        &self,
        subscription: &SubscriptionSnapshot,
        plan: Plan,
    ) -> AppResult<SubscriptionSnapshot> {
        let price_id = self.catalog.price_for_plan(plan).ok_or_else(|| {
            AppError::ConfigError(format!("No Stripe price configured for plan {plan}"))
        })?;
        let item_id = subscription.item_id.clone().ok_or_else(|| {
            AppError::ExternalApiError("Subscription has no items".to_string())
        })?;
        let id = parse_id::<SubscriptionId>("subscription", &subscription.subscription_id)?;

        let mut metadata = HashMap::new();
        metadata.insert("plan".to_string(), plan.to_string());

        let params = UpdateSubscription {
            items: Some(vec![UpdateSubscriptionItems {
                id: Some(item_id),
                price: Some(price_id.to_string()),
                ..Default::default()
            }]),
            metadata: Some(metadata),
            proration_behavior: Some(SubscriptionProrationBehavior::CreateProrations),
            ..Default::default()
        };
        let sub = Subscription::update(&self.client, &id, params).await?;
        snapshot_from_subscription(&sub)
    }

    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> AppResult<SubscriptionSnapshot> {
        let id = parse_id::<SubscriptionId>("subscription", subscription_id)?;
        let params = UpdateSubscription {
            cancel_at_period_end: Some(cancel),
            ..Default::default()
        };
        let sub = Subscription::update(&self.client, &id, params).await?;
        snapshot_from_subscription(&sub)
    }

    pub async fn cancel_now(&self, subscription_id: &str) -> AppResult<SubscriptionSnapshot> {
        let id = parse_id::<SubscriptionId>("subscription", subscription_id)?;
        let params = CancelSubscription {
            cancellation_details: None,
            invoice_now: None,
            prorate: None,
        };
        let sub = Subscription::cancel(&self.client, &id, params).await?;
        snapshot_from_subscription(&sub)
    }

    pub fn verify_webhook_signature(&self, payload: &str, signature: &str) -> AppResult<Event> {
        if self.config.webhook_secret.is_empty() {
            return Err(AppError::ConfigError(
                "Stripe webhook secret is not configured".to_string(),
            ));
        }
        Webhook::construct_event(payload, signature, &self.config.webhook_secret)
            .map_err(|e| AppError::AuthError(format!("Invalid webhook signature: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StripeConfig {
        StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_123".to_string(),
            smart_price_id: Some("price_smart".to_string()),
            pro_price_id: Some("price_pro".to_string()),
            scale_price_id: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_stripe_service_catalog() {
        let service = StripeService::new(config());
        assert_eq!(service.catalog().plan_for_price("price_pro"), Some(Plan::Pro));
        assert_eq!(service.catalog().price_for_plan(Plan::Scale), None);
    }

    #[test]
    fn test_webhook_rejects_bad_signature() {
        let service = StripeService::new(config());
        let result = service.verify_webhook_signature("{}", "t=1,v1=deadbeef");
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }

    #[test]
    fn test_webhook_requires_secret() {
        let service = StripeService::new(StripeConfig {
            webhook_secret: String::new(),
            ..config()
        });
        assert!(matches!(
            service.verify_webhook_signature("{}", "t=1,v1=deadbeef"),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_timestamp_conversion() {
        assert_eq!(timestamp(0).unwrap().timestamp(), 0);
        assert!(timestamp(i64::MAX).is_err());
    }
}
