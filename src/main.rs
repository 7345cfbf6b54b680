use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waitlist::{
    config::Config,
    mailer::{LogMailer, Mailer, ResendMailer},
    rate_limit::RateLimiter,
    rest,
    store::{self, AdminStore, PublicStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "waitlist=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Two pools from two sets of credentials; the privileged one also owns
    // the schema.
    let admin_pool = store::connect(&config.admin_database_url, 5).await?;
    store::migrate(&admin_pool).await?;
    let public_pool = store::connect(&config.database_url, 5).await?;

    let mailer: Arc<dyn Mailer> = match &config.resend_api_key {
        Some(api_key) => Arc::new(ResendMailer::new(api_key.clone(), config.mail_from.clone())),
        None => {
            tracing::warn!("RESEND_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        config: Arc::new(config),
        signups: Arc::new(PublicStore::new(public_pool)),
        verifications: Arc::new(AdminStore::new(admin_pool)),
        mailer,
        limiter: Arc::new(RateLimiter::default()),
    };

    let app = rest::router(app_state);
    tracing::info!("Waitlist API listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
