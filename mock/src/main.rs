use std::sync::Arc;

use eyre::Result;
use mock::AppState;
use tokio::{signal, sync::Mutex};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("LOG").unwrap_or("error".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::new(format!("mock={log_level}"))
                .add_directive(format!("tower_http::trace={log_level}").parse()?),
        )
        .init();

    let state = Arc::new(Mutex::new(AppState::default()));
    let router = mock::router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    println!("ready");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
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
