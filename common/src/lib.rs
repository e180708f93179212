pub mod config;
pub mod signature;
pub mod youtube;

#[cfg(feature = "testing")]
pub mod testing {
    #[ctor::ctor]
    fn init() {
        init_tracing();
    }

    pub fn init_tracing() {
        use tracing_subscriber::EnvFilter;

        let log_level = std::env::var("LOG").unwrap_or("error".to_owned());
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::new(format!("common={log_level},yt_live_bridge={log_level},mock={log_level}"))
                    .add_directive(format!("tower_http::trace={log_level}").parse().unwrap()),
            )
            .init()
    }
}
