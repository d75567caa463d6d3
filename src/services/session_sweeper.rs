use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::{
    dto::events::LiveEvent,
    services::live_events::{self, Audience},
    state::SharedState,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Evict sessions that have seen no activity for the configured TTL.
///
/// Live sessions are memory-only, so without eviction an abandoned lobby
/// would pin its quiz snapshot and roster until process restart.
pub async fn run(state: SharedState) {
    let ttl = state.config().idle_session_ttl();
    let mut ticker = interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        for handle in state.registry().sessions() {
            if handle.idle_for().await < ttl {
                continue;
            }

            let session_id = handle.read_data(|session| session.id.clone()).await;
            info!(session = %session_id, "evicting idle session");

            handle.cancel_timer().await;
            live_events::publish(&handle, Audience::Everyone, &LiveEvent::SessionEnded);
            state.registry().remove(&session_id);
        }
    }
}
