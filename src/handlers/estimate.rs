use crate::models::*;
use crate::utils::{estimate_time_to_first_sale, estimate_time_to_first_sale_with_ads};
use actix_web::{HttpResponse, Result, web};

#[utoipa::path(
    get,
    path = "/api/v1/estimate/first-sale",
    tag = "estimate",
    params(FirstSaleQuery),
    responses(
        (status = 200, description = "Days until the first sale", body = FirstSaleEstimate)
    )
)]
pub async fn first_sale(query: web::Query<FirstSaleQuery>) -> Result<HttpResponse> {
    let estimate = if query.ads {
        estimate_time_to_first_sale_with_ads(query.score)
    } else {
        estimate_time_to_first_sale(query.score)
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(estimate)))
}

pub fn estimate_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/estimate").route("/first-sale", web::get().to(first_sale)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test as actix_test};

    #[actix_web::test]
    async fn test_first_sale_endpoint() {
        let app = actix_test::init_service(App::new().configure(estimate_config)).await;

        let req = actix_test::TestRequest::get()
            .uri("/estimate/first-sale?score=9")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["expected_days"], 3);

        let req = actix_test::TestRequest::get()
            .uri("/estimate/first-sale?score=2&ads=true")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["expected_days"], 12);

        let req = actix_test::TestRequest::get()
            .uri("/estimate/first-sale")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
