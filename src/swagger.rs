use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{AnalysisVerdict, SourcePlatform};
use crate::handlers;
use crate::models::*;
use crate::utils::FirstSaleEstimate;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "cron_secret",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::quota::get_quota,
        handlers::quota::deduct_credits,
        handlers::billing::list_plans,
        handlers::billing::create_checkout,
        handlers::billing::sync_subscription,
        handlers::billing::upgrade_subscription,
        handlers::billing::cancel_subscription,
        handlers::account::get_account,
        handlers::account::delete_account,
        handlers::analysis::create_analysis,
        handlers::analysis::list_analyses,
        handlers::analysis::get_analysis,
        handlers::analysis::delete_analysis,
        handlers::cron::reset_quotas,
        handlers::debug::subscription_debug,
        handlers::estimate::first_sale,
    ),
    components(
        schemas(
            Plan,
            PlanResponse,
            SubscriptionState,
            QuotaInfo,
            DeductCreditsRequest,
            ResetQuotasResponse,
            AccountResponse,
            CreateCheckoutRequest,
            CreateCheckoutResponse,
            SyncSubscriptionRequest,
            SyncSubscriptionResponse,
            UpgradeSubscriptionRequest,
            CancelSubscriptionRequest,
            SubscriptionSnapshot,
            SubscriptionRecordResponse,
            SubscriptionDebugResponse,
            CreateAnalysisRequest,
            ProductResponse,
            AnalysisResponse,
            AnalysisVerdict,
            SourcePlatform,
            FirstSaleEstimate,
            FirstSaleQuery,
            PaginationParams,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "quota", description = "Analysis quota API"),
        (name = "billing", description = "Subscription billing API"),
        (name = "account", description = "Account API"),
        (name = "analysis", description = "Product analysis API"),
        (name = "estimate", description = "Time-to-first-sale estimate API"),
        (name = "cron", description = "Scheduled maintenance API"),
        (name = "debug", description = "Subscription introspection API"),
    ),
    info(
        title = "Etsmart Backend API",
        version = "1.0.0",
        description = "Etsmart quota, subscription and product analysis REST API"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/v1/quota"));
        assert!(paths.contains_key("/api/v1/billing/checkout"));
        assert!(paths.contains_key("/api/v1/analyses/{id}"));
        assert!(paths.contains_key("/api/v1/estimate/first-sale"));
    }
}
