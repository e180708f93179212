use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use common::youtube::{
    api::{Auth, Client, DEFAULT_BASE_URL},
    auth::TokenManager,
    hub::Hub,
};
use tokio::{fs, spawn, sync::RwLock};
use tracing::{info, warn};
use tracing_subscriber::fmt::format::{Compact, DefaultFields};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    bridge::{Bridge, ChannelCache},
    store::{Store, StoreWrapper},
};

mod bridge;
mod lease;
mod store;
mod web_api;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg(short, long, default_value_t = String::from("config.yaml"))]
    config: String,
    /// API address to bind
    #[arg(short, long, default_value_t = String::from("0.0.0.0:3000"))]
    address: String,
    /// Log to file
    #[arg(short, long)]
    log_file: Option<String>,
    /// Database path, overrides the config file
    #[arg(short, long)]
    database: Option<String>,
}

fn get_layer<S>(
    layer: tracing_subscriber::fmt::Layer<S>,
) -> tracing_subscriber::fmt::Layer<
    S,
    DefaultFields,
    tracing_subscriber::fmt::format::Format<Compact, ChronoLocal>,
> {
    layer
        .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
        .compact()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = std::env::var("LOG").unwrap_or("info".to_owned());
    let tracing_opts = tracing_subscriber::registry()
        .with(
            EnvFilter::new(format!("yt_live_bridge={log_level}"))
                .add_directive(format!("common={log_level}").parse()?)
                .add_directive(format!("tower_http::trace={log_level}").parse()?),
        )
        .with(get_layer(tracing_subscriber::fmt::layer()));

    let file_appender = tracing_appender::rolling::never(
        ".",
        args.log_file.clone().unwrap_or("log.log".to_owned()),
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    if args.log_file.is_some() {
        tracing_opts
            .with(get_layer(tracing_subscriber::fmt::layer()).with_writer(non_blocking))
            .init();
    } else {
        tracing_opts.init();
    }

    let mut c: common::config::Config = serde_yaml::from_str(
        &fs::read_to_string(&args.config)
            .await
            .context("Reading config file")?,
    )
    .context("Parsing config file")?;
    info!("Parsed config file");

    c.parse_and_validate()?;
    if let Some(database) = args.database {
        c.database = database;
    }

    let (store, store_tx) = Store::new(&c.database)?;
    info!("Database ready at {}", c.database);

    let auth = if let Some(oauth) = c.youtube.oauth.clone() {
        Auth::OAuth(TokenManager::new(oauth))
    } else if let Some(api_key) = c.youtube.api_key.clone() {
        Auth::ApiKey(api_key)
    } else {
        warn!("No YouTube credentials in config, metadata and channel resolution are disabled");
        Auth::None
    };
    let yt = Client::new(auth, DEFAULT_BASE_URL.to_owned());
    let hub = Hub::new(
        c.hub_url.clone(),
        c.callback_url.clone(),
        c.secret.clone(),
        c.lease_seconds,
    );
    let cache = ChannelCache::new(&c.cache);

    info!("Config OK!");
    let bridge_data = Arc::new(RwLock::new(Bridge::new(
        c,
        yt,
        hub,
        cache,
        Arc::new(StoreWrapper::new(store)),
        store_tx,
        args.log_file,
    )));

    let lease = spawn(lease::run(bridge_data.clone()));

    info!("Starting web api!");

    let axum_server = web_api::get_api_server(args.address, bridge_data).await;
    axum_server
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    lease.abort();

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

    info!("Shutting down");
}

#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use common::{
        config::{CacheConfig, Config, YouTubeConfig},
        youtube::{
            api::{Auth, Client, DEFAULT_BASE_URL},
            hub::Hub,
        },
    };
    use tokio::sync::{Mutex, RwLock};

    use crate::{
        bridge::{Bridge, ChannelCache},
        store::{
            model::{NewStreamer, Platform, Streamer},
            Store, StoreWrapper,
        },
    };

    pub fn test_config() -> Config {
        Config {
            callback_url: "http://127.0.0.1:3000/push".to_owned(),
            hub_url: "http://127.0.0.1:9/hub".to_owned(),
            secret: Some("test-secret".to_owned()),
            lease_seconds: 300,
            auto_resolve_channels: false,
            database: ":memory:".to_owned(),
            youtube: YouTubeConfig {
                api_key: None,
                oauth: None,
            },
            cache: CacheConfig {
                capacity: 64,
                ttl_secs: 60,
            },
        }
    }

    fn build_state(config: Config, auth: Auth, base_url: String) -> Arc<RwLock<Bridge>> {
        let (store, store_tx) = Store::new(&config.database).unwrap();
        let yt = Client::new(auth, base_url);
        let hub = Hub::new(
            config.hub_url.clone(),
            config.callback_url.clone(),
            config.secret.clone(),
            config.lease_seconds,
        );
        let cache = ChannelCache::new(&config.cache);
        let bridge = Bridge::new(
            config,
            yt,
            hub,
            cache,
            Arc::new(StoreWrapper::new(store)),
            store_tx,
            None,
        );
        Arc::new(RwLock::new(bridge))
    }

    pub async fn test_state(config: Config) -> Arc<RwLock<Bridge>> {
        build_state(config, Auth::None, DEFAULT_BASE_URL.to_owned())
    }

    /// Bridge whose YouTube lookups go to a mock server at `base`.
    pub async fn test_state_with_mock(config: Config, base: &str) -> Arc<RwLock<Bridge>> {
        build_state(
            config,
            Auth::ApiKey("test-key".to_owned()),
            format!("{base}/youtube"),
        )
    }

    pub async fn spawn_mock() -> (String, Arc<Mutex<mock::AppState>>) {
        let state = Arc::new(Mutex::new(mock::AppState::default()));
        let router = mock::router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        (format!("http://{address}"), state)
    }

    pub async fn add_streamer(state: &Arc<RwLock<Bridge>>, name: &str, url: &str) -> Streamer {
        add(state, name, url, None).await
    }

    pub async fn add_streamer_with_channel(
        state: &Arc<RwLock<Bridge>>,
        name: &str,
        url: &str,
        channel_id: &str,
    ) -> Streamer {
        add(state, name, url, Some(channel_id.to_owned())).await
    }

    async fn add(
        state: &Arc<RwLock<Bridge>>,
        name: &str,
        url: &str,
        channel_id: Option<String>,
    ) -> Streamer {
        let bridge = state.read().await.clone();
        let new = NewStreamer {
            name: name.to_owned(),
            platform: Platform::Youtube,
            platform_url: url.to_owned(),
            live: false,
            title: None,
            game: None,
            linked_account: None,
            schedule: None,
            one_time_events: None,
            assigned_user: None,
            channel_id,
        };
        let fetch = name.to_owned();
        bridge
            .store
            .execute(move |s| {
                s.insert_streamer(&new)?;
                s.streamer_by_name(&fetch)
            })
            .await
            .unwrap()
            .unwrap()
    }
}
