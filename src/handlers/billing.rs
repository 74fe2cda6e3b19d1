use crate::external::StripeService;
use crate::middlewares::current_user;
use crate::models::*;
use crate::services::BillingService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/api/v1/billing/plans",
    tag = "billing",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Plans with quota and price", body = [PlanResponse])
    )
)]
pub async fn list_plans(stripe_service: web::Data<StripeService>) -> Result<HttpResponse> {
    let plans: Vec<PlanResponse> = PLAN_QUOTAS
        .iter()
        .map(|(plan, quota)| PlanResponse {
            plan: *plan,
            quota: *quota,
            monthly_price_cents: plan.monthly_price_cents(),
            available: !plan.is_paid() || stripe_service.catalog().price_for_plan(*plan).is_some(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(plans)))
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/checkout",
    tag = "billing",
    request_body = CreateCheckoutRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Checkout session created", body = CreateCheckoutResponse),
        (status = 400, description = "Unknown or free plan"),
        (status = 409, description = "Already subscribed")
    )
)]
pub async fn create_checkout(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    request: web::Json<CreateCheckoutRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match billing_service.create_checkout(&user, &request.plan).await {
        Ok(session) => Ok(HttpResponse::Ok().json(ApiResponse::success(session))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/sync",
    tag = "billing",
    request_body = SyncSubscriptionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Quota after reconciling with Stripe", body = SyncSubscriptionResponse),
        (status = 403, description = "Checkout session belongs to another user")
    )
)]
pub async fn sync_subscription(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    request: Option<web::Json<SyncSubscriptionRequest>>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    let session_id = request.and_then(|r| r.into_inner().session_id);

    match billing_service.sync(&user, session_id.as_deref()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::success(result))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/upgrade",
    tag = "billing",
    request_body = UpgradeSubscriptionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Plan changed", body = QuotaInfo),
        (status = 400, description = "No active subscription or same plan")
    )
)]
pub async fn upgrade_subscription(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    request: web::Json<UpgradeSubscriptionRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match billing_service.upgrade(&user, &request.plan).await {
        Ok(info) => Ok(HttpResponse::Ok().json(ApiResponse::success(info))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/cancel",
    tag = "billing",
    request_body = CancelSubscriptionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Subscription canceled", body = QuotaInfo),
        (status = 400, description = "No active subscription")
    )
)]
pub async fn cancel_subscription(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    request: Option<web::Json<CancelSubscriptionRequest>>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    let immediately = request.map(|r| r.immediately).unwrap_or(false);

    match billing_service.cancel(&user, immediately).await {
        Ok(info) => Ok(HttpResponse::Ok().json(ApiResponse::success(info))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn billing_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/billing")
            .route("/plans", web::get().to(list_plans))
            .route("/checkout", web::post().to(create_checkout))
            .route("/sync", web::post().to(sync_subscription))
            .route("/upgrade", web::post().to(upgrade_subscription))
            .route("/cancel", web::post().to(cancel_subscription)),
    );
}
