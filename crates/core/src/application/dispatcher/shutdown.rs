// Stop signal shared by the background loops

use tokio::sync::watch;

/// Held by each loop (dispatcher, maintenance); loops check it between cycles
#[derive(Clone)]
pub struct ShutdownToken {
    stop: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once stop is requested. A dropped sender counts as a stop.
    pub async fn wait(&mut self) {
        let _ = self.stop.wait_for(|stopped| *stopped).await;
    }
}

/// Owned by whoever decides when the daemon stops
pub struct ShutdownSender {
    stop: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Another token for a loop spawned later
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            stop: self.stop.subscribe(),
        }
    }

    pub fn shutdown(&self) {
        self.stop.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (stop, rx) = watch::channel(false);
    (ShutdownSender { stop }, ShutdownToken { stop: rx })
}
