use crate::{
    axum_http::{
        default_routers,
        routers::{self, payments::PaymentsState, vaccine_lots::VaccineLotsState},
    },
    config::config_model::DotEnvyConfig,
    usecases::UseCases,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::db::postgres::postgres_connection::PgPoolSquad,
    notifications::{DeliveryProvider, LogProvider, QueuedNotifier, WebhookProvider},
    payments::vnpay_client::{VnPayClient, VnPayConfig},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use url::Url;

/// Log provider always; the webhook provider only when a URL is configured.
pub fn build_notifier(webhook_url: Option<&Url>) -> Result<QueuedNotifier> {
    let mut providers: Vec<Arc<dyn DeliveryProvider>> = vec![Arc::new(LogProvider)];
    if let Some(webhook_url) = webhook_url {
        providers.push(Arc::new(WebhookProvider::new(webhook_url.clone())?));
    }
    Ok(QueuedNotifier::new(providers))
}

pub fn build_gateway(config: &DotEnvyConfig) -> VnPayClient {
    VnPayClient::new(VnPayConfig {
        tmn_code: config.vnpay.tmn_code.clone(),
        hash_secret: config.vnpay.hash_secret.clone(),
        pay_url: config.vnpay.pay_url.clone(),
        return_url: config.vnpay.return_url.clone(),
        expire_minutes: config.vnpay.expire_minutes,
    })
}

pub fn api_routes(config: &DotEnvyConfig, usecases: &UseCases) -> Router {
    Router::new()
        .nest(
            "/appointments",
            routers::appointments::routes(Arc::clone(&usecases.orchestrator)),
        )
        .nest(
            "/slots",
            routers::slots::routes(Arc::clone(&usecases.slot_ledger)),
        )
        .nest(
            "/payments",
            routers::payments::routes(PaymentsState {
                reconciler: Arc::clone(&usecases.reconciler),
                result_page_url: config.vnpay.result_page_url.clone(),
            }),
        )
        .nest(
            "/screenings",
            routers::screenings::routes(Arc::clone(&usecases.screening_gate)),
        )
        .nest(
            "/vaccination-records",
            routers::vaccination_records::routes(Arc::clone(&usecases.recorder)),
        )
        .nest(
            "/vaccine-lots",
            routers::vaccine_lots::routes(VaccineLotsState {
                lot_ledger: Arc::clone(&usecases.lot_ledger),
                expiry_warning_days: config.worker.expiry_warning_days,
                low_stock_threshold: config.worker.low_stock_threshold,
            }),
        )
        .route("/health-check", get(default_routers::health_check))
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let notifier = Arc::new(build_notifier(config.notifications.webhook_url.as_ref())?);
    let gateway = Arc::new(build_gateway(&config));
    let usecases = UseCases::postgres(db_pool, gateway, notifier);

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1", api_routes(&config, &usecases))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
