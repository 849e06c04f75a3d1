// SPDX-License-Identifier: MIT

//! Non-durable pub/sub for waking a coordinator immediately instead of
//! waiting out its idle interval. One [`broadcast::Sender`] per
//! coordinator channel; the CDC listener publishes, coordinator loops
//! subscribe and race the wake against their own interval sleep.

use tokio::sync::broadcast;
use wsc_core::WorkspaceId;

const WAKE_CHANNEL_CAPACITY: usize = 256;

/// One wake notification: which workspace changed, for coordinators that
/// only care about a specific row (WC); OB/GC ignore the payload and treat
/// any wake as "something changed, run a tick now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake {
    pub workspace_id: WorkspaceId,
}

struct Channel {
    tx: broadcast::Sender<Wake>,
}

impl Channel {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(WAKE_CHANNEL_CAPACITY);
        Self { tx }
    }
}

/// The three wake channels coordinators subscribe to: `ob:wake`, `wc:wake`,
/// `gc:wake`. TTL and METRICS run on a fixed interval only and have no wake
/// channel of their own.
pub struct WakeBus {
    ob: Channel,
    wc: Channel,
    gc: Channel,
}

impl WakeBus {
    pub fn new() -> Self {
        Self {
            ob: Channel::new(),
            wc: Channel::new(),
            gc: Channel::new(),
        }
    }

    pub fn publish_ob(&self, wake: Wake) {
        let _ = self.ob.tx.send(wake);
    }

    pub fn publish_wc(&self, wake: Wake) {
        let _ = self.wc.tx.send(wake);
    }

    pub fn publish_gc(&self, wake: Wake) {
        let _ = self.gc.tx.send(wake);
    }

    pub fn subscribe_ob(&self) -> broadcast::Receiver<Wake> {
        self.ob.tx.subscribe()
    }

    pub fn subscribe_wc(&self) -> broadcast::Receiver<Wake> {
        self.wc.tx.subscribe()
    }

    pub fn subscribe_gc(&self) -> broadcast::Receiver<Wake> {
        self.gc.tx.subscribe()
    }
}

impl Default for WakeBus {
    fn default() -> Self {
        Self::new()
    }
}
