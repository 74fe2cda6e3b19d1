use crate::config::DebugConfig;
use crate::error::AppError;
use crate::middlewares::current_user;
use crate::models::*;
use crate::services::BillingService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/api/v1/debug/subscription",
    tag = "debug",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Stored and live subscription state", body = SubscriptionDebugResponse),
        (status = 404, description = "Debug endpoints disabled")
    )
)]
pub async fn subscription_debug(
    billing_service: web::Data<BillingService>,
    debug_config: web::Data<DebugConfig>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if !debug_config.enable_endpoints {
        return Ok(AppError::NotFound("Not found".to_string()).error_response());
    }
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match billing_service.debug_view(&user).await {
        Ok(view) => {
            if !view.consistent {
                log::warn!(
                    "Subscription state of user {} diverges: {:?}",
                    user.id,
                    view.divergent_fields
                );
            }
            Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn debug_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/debug").route("/subscription", web::get().to(subscription_debug)));
}
