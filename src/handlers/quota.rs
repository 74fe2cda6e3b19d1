use crate::middlewares::current_user;
use crate::models::*;
use crate::services::QuotaService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/api/v1/quota",
    tag = "quota",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current plan and usage", body = QuotaInfo),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_quota(
    quota_service: web::Data<QuotaService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match quota_service.get_quota(&user).await {
        Ok(info) => Ok(HttpResponse::Ok().json(ApiResponse::success(info))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/quota/deduct",
    tag = "quota",
    request_body = DeductCreditsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Credits charged", body = QuotaInfo),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Quota exceeded")
    )
)]
pub async fn deduct_credits(
    quota_service: web::Data<QuotaService>,
    req: HttpRequest,
    request: Option<web::Json<DeductCreditsRequest>>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    let amount = request.and_then(|r| r.amount).unwrap_or(1);

    match quota_service.deduct(&user, amount).await {
        Ok(info) => Ok(HttpResponse::Ok().json(ApiResponse::success(info))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn quota_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/quota")
            .route("", web::get().to(get_quota))
            .route("/deduct", web::post().to(deduct_credits)),
    );
}
