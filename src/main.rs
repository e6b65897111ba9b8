use job_board_backend::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    middleware::cors::cors_layer,
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("job_board_backend=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;
    info!("Database migrations applied");

    let app_state = AppState::new(pool, &config);

    info!("Serving uploads from: {}", config.uploads_dir);
    let app = routes::router(app_state, config.api_rps)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .layer(cors_layer(config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
