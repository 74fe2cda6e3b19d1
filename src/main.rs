use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use etsmart_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{OpenAiService, StripeService},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().map_err(|e| {
        log::error!("Failed to load configuration: {e:#}");
        std::io::Error::other(e.to_string())
    })?;

    if config.auth.jwt_secret.is_empty() {
        log::warn!("JWT secret is empty; every authenticated request will be rejected");
    }
    if config.stripe.webhook_secret.is_empty() {
        log::warn!("Stripe webhook secret is empty; webhooks will be refused");
    }

    let pool = create_pool(&config.database).await.map_err(|e| {
        log::error!("Failed to create database connection pool: {e}");
        std::io::Error::other(e.to_string())
    })?;

    run_migrations(&pool).await.map_err(|e| {
        log::error!("Failed to run database migrations: {e}");
        std::io::Error::other(e.to_string())
    })?;

    let jwt_service = JwtService::new(&config.auth.jwt_secret, &config.auth.audience);

    // External services
    let stripe_service = StripeService::new(config.stripe.clone());
    let openai_service = OpenAiService::new(config.openai.clone());

    let quota_service = QuotaService::new(pool.clone());
    let billing_service =
        BillingService::new(pool.clone(), stripe_service.clone(), quota_service.clone());
    let account_service =
        AccountService::new(pool.clone(), quota_service.clone(), billing_service.clone());
    let analysis_service =
        AnalysisService::new(pool.clone(), quota_service.clone(), openai_service);

    tasks::spawn_all(quota_service.clone(), &config.cron);

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let cors_origins = config.server.cors_origins.clone();
    let cron_config = config.cron.clone();
    let debug_config = config.debug.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors(&cors_origins))
            .app_data(web::Data::new(quota_service.clone()))
            .app_data(web::Data::new(billing_service.clone()))
            .app_data(web::Data::new(account_service.clone()))
            .app_data(web::Data::new(analysis_service.clone()))
            .app_data(web::Data::new(stripe_service.clone()))
            .app_data(web::Data::new(cron_config.clone()))
            .app_data(web::Data::new(debug_config.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::quota_config)
                    .configure(handlers::billing_config)
                    .configure(handlers::account_config)
                    .configure(handlers::analysis_config)
                    .configure(handlers::estimate_config)
                    .configure(handlers::cron_config)
                    .configure(handlers::debug_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
