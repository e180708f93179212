use std::{sync::Arc, time::Duration};

use color_eyre::eyre::Result;
use common::youtube::hub::HubMode;
use tokio::{sync::RwLock, time::sleep};
use tracing::{debug, error, warn};

use crate::{bridge::Bridge, store::model::Platform};

/// Keeps hub leases from lapsing by re-subscribing every YouTube streamer
/// at half the configured lease interval.
pub async fn run(state: Arc<RwLock<Bridge>>) {
    let interval = {
        let bridge = state.read().await;
        Duration::from_secs(u64::from(bridge.config.lease_seconds.max(120)) / 2)
    };

    loop {
        if let Err(err) = renew_all(&state).await {
            error!("Lease renewal round failed: {err}");
        }

        sleep(interval).await
    }
}

async fn renew_all(state: &Arc<RwLock<Bridge>>) -> Result<()> {
    let bridge = state.read().await.clone();
    let streamers = bridge
        .store
        .execute(|s| s.streamers_on_platform(Platform::Youtube))
        .await?;
    debug!("Renewing hub leases for {} streamers", streamers.len());

    for streamer in streamers {
        // Soft failures already bumped the counter and logged, a hub error
        // here should not abort the rest of the round
        if let Err(err) = bridge
            .ensure_subscription(HubMode::Subscribe, &streamer)
            .await
        {
            warn!("Lease renewal for {} failed: {err}", streamer.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use color_eyre::eyre::Result;
    use rstest::rstest;

    use super::*;
    use crate::test::{add_streamer_with_channel, spawn_mock, test_config, test_state};

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn renewal_reaches_hub_and_handshake_verifies() -> Result<()> {
        let (mock_base, mock_state) = spawn_mock().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;

        let mut config = test_config();
        config.hub_url = format!("{mock_base}/hub/subscribe");
        config.callback_url = format!("http://{address}/push");
        let state = test_state(config).await;
        add_streamer_with_channel(
            &state,
            "a",
            "https://www.youtube.com/@somehandle",
            "UCtestchannelidentifier0",
        )
        .await;

        let router = crate::web_api::build_router(state.clone());
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        renew_all(&state).await?;

        // The mock verifies asynchronously, give its handshake a moment
        let mut verified = None;
        for _ in 0..50 {
            let subscriptions = mock_state.lock().await.subscriptions.clone();
            if let Some(sub) = subscriptions.first() {
                if sub.verified.is_some() {
                    verified = sub.verified;
                    break;
                }
            }
            sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(verified, Some(true));

        let subscriptions = mock_state.lock().await.subscriptions.clone();
        assert_eq!(subscriptions[0].mode, "subscribe");
        assert!(subscriptions[0].has_secret);
        Ok(())
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_hub_does_not_abort_round() -> Result<()> {
        let mut config = test_config();
        config.hub_url = "http://127.0.0.1:9/hub".to_owned();
        let state = test_state(config).await;
        add_streamer_with_channel(
            &state,
            "a",
            "https://www.youtube.com/@somehandle",
            "UCtestchannelidentifier0",
        )
        .await;

        renew_all(&state).await?;
        Ok(())
    }
}
