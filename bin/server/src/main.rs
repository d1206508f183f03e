use ssogate_server::{
    app,
    auth::{self, AppState, MemorySessionStore, ProviderContext, SessionStore},
    config::ServerConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ssogate_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let provider_ctx = ProviderContext::new(config.container, config.public_port)
        .expect("failed to create provider context");

    if auth::flow::is_enabled(&config.oidc) {
        match auth::active_provider(&config.oidc, &provider_ctx) {
            Ok(provider) => {
                use auth::IdentityProvider;
                tracing::info!(provider = provider.id(), "OIDC login enabled");
            }
            Err(e) => {
                tracing::warn!(error = %e, "OIDC provider is misconfigured; logins will fail");
            }
        }
    } else {
        tracing::info!("OIDC login disabled");
    }

    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

    let purged = sessions.purge_expired().await;
    if purged > 0 {
        tracing::info!(deleted_sessions = purged, "Cleaned up expired sessions on startup");
    }

    let cleanup_sessions = sessions.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds.max(1);
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            let purged = cleanup_sessions.purge_expired().await;
            if purged > 0 {
                tracing::debug!(deleted_sessions = purged, "Periodic session cleanup");
            }
        }
    });

    let app_state = Arc::new(AppState::new(
        config.oidc,
        provider_ctx,
        sessions,
        config.session,
    ));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
