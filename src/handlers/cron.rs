use crate::config::CronConfig;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::QuotaService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;
use subtle::ConstantTimeEq;

fn authorize_cron(req: &HttpRequest, config: &CronConfig) -> AppResult<()> {
    if config.secret.is_empty() {
        return Err(AppError::Forbidden);
    }
    let provided = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    let matches: bool = provided
        .trim()
        .as_bytes()
        .ct_eq(config.secret.as_bytes())
        .into();
    if matches {
        Ok(())
    } else {
        Err(AppError::AuthError("Invalid cron secret".to_string()))
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/cron/reset-quotas",
    tag = "cron",
    security(
        ("cron_secret" = [])
    ),
    responses(
        (status = 200, description = "Expired periods reset", body = ResetQuotasResponse),
        (status = 401, description = "Wrong cron secret"),
        (status = 403, description = "Cron endpoints disabled")
    )
)]
pub async fn reset_quotas(
    quota_service: web::Data<QuotaService>,
    cron_config: web::Data<CronConfig>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = authorize_cron(&req, &cron_config) {
        return Ok(e.error_response());
    }

    match quota_service.reset_expired_periods(Utc::now()).await {
        Ok(reset) => Ok(HttpResponse::Ok().json(ApiResponse::success(ResetQuotasResponse { reset }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cron_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/cron").route("/reset-quotas", web::post().to(reset_quotas)));
}
