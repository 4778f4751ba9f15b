use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::runtime::BridgeHandle;

/// How often the root bridge originates BPDUs.
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Something that does periodic work when told time has passed.
pub trait Tickable {
    fn tick(&mut self);
}

/// Ticks a bridge once per interval, independent of frame arrival.
///
/// Whether the bridge is root is decided inside the tick, under the same owner that applies BPDUs.
pub struct Announcer {
    handle: BridgeHandle,
    period: Duration,
}

impl Announcer {
    pub fn with_period(handle: BridgeHandle, period: Duration) -> Announcer {
        Announcer { handle, period }
    }

    /// Runs until the bridge goes away.
    pub async fn run(self) {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if self.handle.tick().await.is_err() {
                debug!("Bridge stopped; announcer exiting");
                return;
            }
        }
    }
}
