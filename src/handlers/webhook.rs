use crate::error::AppError;
use crate::external::StripeService;
use crate::services::BillingService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use log::{error, info, warn};

/// Stripe webhook endpoint.
///
/// Bad signatures get a 400. Once the event is authentic it is always
/// acknowledged with 200 so Stripe does not retry; processing failures are
/// logged and repaired by the next sync.
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    stripe_service: web::Data<StripeService>,
    billing_service: web::Data<BillingService>,
) -> Result<HttpResponse> {
    let signature = match req
        .headers()
        .get("stripe-signature")
        .and_then(|sig| sig.to_str().ok())
    {
        Some(sig) => sig,
        None => {
            warn!("Missing Stripe-Signature header");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing Stripe-Signature header"
            })));
        }
    };

    let payload = match std::str::from_utf8(&body) {
        Ok(payload) => payload,
        Err(_) => {
            error!("Invalid UTF-8 in webhook payload");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid payload encoding"
            })));
        }
    };

    let event = match stripe_service.verify_webhook_signature(payload, signature) {
        Ok(event) => event,
        Err(e @ AppError::ConfigError(_)) => return Ok(e.error_response()),
        Err(e) => {
            error!("Webhook signature verification failed: {e}");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid signature"
            })));
        }
    };

    let event_id = event.id.to_string();
    info!("Received Stripe webhook event: {} ({})", event.type_, event_id);

    match billing_service.apply_webhook_event(event).await {
        Ok(_) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "received": true
        }))),
        Err(e) => {
            error!("Failed to process webhook event {event_id}: {e}");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true,
                "error": "Processing failed"
            })))
        }
    }
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/stripe", web::post().to(stripe_webhook)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use crate::services::QuotaService;
    use actix_web::{App, test as actix_test};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn app_data() -> (web::Data<StripeService>, web::Data<BillingService>) {
        let stripe = StripeService::new(StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_test".to_string(),
            ..Default::default()
        });
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let billing = BillingService::new(db.clone(), stripe.clone(), QuotaService::new(db));
        (web::Data::new(stripe), web::Data::new(billing))
    }

    #[actix_web::test]
    async fn test_webhook_requires_signature() {
        let (stripe, billing) = app_data();
        let app = actix_test::init_service(
            App::new()
                .app_data(stripe)
                .app_data(billing)
                .configure(webhook_config),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/webhook/stripe")
            .set_payload("{}")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let req = actix_test::TestRequest::post()
            .uri("/webhook/stripe")
            .insert_header(("stripe-signature", "t=1,v1=deadbeef"))
            .set_payload("{}")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
