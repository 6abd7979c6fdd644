use castor::config::Config;
use castor::google_oauth::GoogleOauthClient;
use castor::pool::{GoogleAuthority, TokenPool, spawn_onboard_pipeline, spawn_schedulers};
use castor::server::router::{CastorState, castor_router};
use castor::upstream::CloudCodeClient;
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The server binary requires a real config file with a non-empty
    // castor_key. (Library code uses `config::CONFIG` which is best-effort
    // and does not validate.)
    let cfg = Config::from_toml();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let db = castor::db::spawn(cfg.basic.database_url.as_str()).await;

    let cloudcode = Arc::new(CloudCodeClient::new(&cfg.upstream));
    let oauth = GoogleOauthClient::new(&cfg.upstream);
    let authority = Arc::new(GoogleAuthority {
        oauth: oauth.clone(),
        cloudcode: cloudcode.clone(),
    });

    let pool = Arc::new(TokenPool::new(db.clone(), authority));
    let loaded = pool.load().await?;
    info!("token pool ready with {loaded} accounts");

    spawn_schedulers(pool.clone());
    let onboard = spawn_onboard_pipeline(cfg.upstream.oauth_tps, oauth, db.clone(), pool.clone());

    let state = CastorState {
        pool,
        backend: cloudcode,
        db,
        onboard,
        castor_key: Arc::from(cfg.basic.castor_key.clone()),
        model_list: Arc::new(cfg.upstream.model_list.clone()),
    };
    let app = castor_router(state);

    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
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
}
