use crate::middlewares::current_user;
use crate::models::*;
use crate::services::AnalysisService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/analyses",
    tag = "analysis",
    request_body = CreateAnalysisRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Product analyzed, one credit used", body = AnalysisResponse),
        (status = 400, description = "Not an AliExpress/Alibaba product URL"),
        (status = 403, description = "Quota exceeded"),
        (status = 502, description = "Analysis provider failed, credit refunded")
    )
)]
pub async fn create_analysis(
    analysis_service: web::Data<AnalysisService>,
    req: HttpRequest,
    request: web::Json<CreateAnalysisRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match analysis_service.create(&user, request.into_inner()).await {
        Ok(analysis) => Ok(HttpResponse::Created().json(ApiResponse::success(analysis))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/analyses",
    tag = "analysis",
    params(PaginationParams),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Caller's analyses, newest first")
    )
)]
pub async fn list_analyses(
    analysis_service: web::Data<AnalysisService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match analysis_service.list(&user, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/analyses/{id}",
    tag = "analysis",
    params(
        ("id" = Uuid, Path, description = "Analysis id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Analysis", body = AnalysisResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_analysis(
    analysis_service: web::Data<AnalysisService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match analysis_service.get(&user, path.into_inner()).await {
        Ok(analysis) => Ok(HttpResponse::Ok().json(ApiResponse::success(analysis))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/analyses/{id}",
    tag = "analysis",
    params(
        ("id" = Uuid, Path, description = "Analysis id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_analysis(
    analysis_service: web::Data<AnalysisService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match analysis_service.delete(&user, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn analysis_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/analyses")
            .route("", web::post().to(create_analysis))
            .route("", web::get().to(list_analyses))
            .route("/{id}", web::get().to(get_analysis))
            .route("/{id}", web::delete().to(delete_analysis)),
    );
}
