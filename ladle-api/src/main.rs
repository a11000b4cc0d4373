use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ladle_api::{app, worker::run_notification_worker, AppState};
use ladle_catalog::{Pricer, PricingConfig};
use ladle_core::captcha::{CaptchaVerifier, MockCaptcha};
use ladle_core::notify::ChannelDispatcher;
use ladle_core::payment::MockGateway;
use ladle_core::zone::ZipListChecker;
use ladle_dispatch::assembler::{AssemblerConfig, FifoDriverPicker, RouteAssembler};
use ladle_dispatch::progress::DeliveryProgressService;
use ladle_dispatch::synchronizer::DeliverySynchronizer;
use ladle_order::ledger::{LedgerConfig, OrderLedger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ladle_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ladle_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Ladle API on port {}", config.server.port);

    let db = ladle_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let catalog = Arc::new(ladle_store::PgCatalogRepository::new(db.pool.clone()));
    let orders = Arc::new(ladle_store::PgOrderRepository::new(db.pool.clone()));
    let dispatch = Arc::new(ladle_store::PgDispatchRepository::new(db.pool.clone()));

    // TODO: replace with the real gateway and captcha clients once provider
    // credentials are provisioned.
    let gateway = Arc::new(MockGateway::approving());
    let captcha: Option<Arc<dyn CaptchaVerifier>> = config
        .business_rules
        .captcha_enabled
        .then(|| Arc::new(MockCaptcha { accept: true }) as Arc<dyn CaptchaVerifier>);

    let zone = Arc::new(ZipListChecker::new(
        config.business_rules.served_zips.iter().map(String::as_str),
    ));

    let (dispatcher, rx) = ChannelDispatcher::channel(256);
    tokio::spawn(run_notification_worker(rx));

    let pricer = Pricer::new(PricingConfig {
        tax_rate_bps: config.business_rules.tax_rate_bps,
        promo_discounts_cents: config.business_rules.promo_discounts_cents.clone(),
    });

    let ledger = Arc::new(OrderLedger::new(
        catalog.clone(),
        orders.clone(),
        gateway,
        zone,
        captcha,
        Arc::new(dispatcher),
        dispatch.clone(),
        pricer,
        LedgerConfig {
            minimum_units: config.business_rules.minimum_order_units,
            capture_timeout: Duration::from_millis(config.business_rules.capture_timeout_ms),
            persist_attempts: config.business_rules.persist_attempts,
        },
    ));

    let synchronizer = Arc::new(DeliverySynchronizer::new(dispatch.clone()));
    let assembler = Arc::new(RouteAssembler::new(
        dispatch.clone(),
        dispatch.clone(),
        dispatch.clone(),
        Arc::new(FifoDriverPicker),
        None,
        AssemblerConfig {
            window_min: config.business_rules.route_window_min,
            window_max: config.business_rules.route_window_max,
        },
    ));
    let progress = Arc::new(DeliveryProgressService::new(
        dispatch,
        orders.clone(),
        ledger.clone(),
    ));

    let app_state = AppState {
        catalog,
        ledger,
        orders,
        synchronizer,
        assembler,
        progress,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
