use tokio::sync::broadcast;

/// Listens for the process-wide shutdown broadcast.
///
/// Once a signal (or the sender going away) has been seen the state sticks, so
/// every later suspension point returns straight away.
#[derive(Debug)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new(notify: broadcast::Receiver<()>) -> Self {
        Self {
            is_shutdown: false,
            notify,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Non-blocking check for a pending signal.
    pub fn poll(&mut self) -> bool {
        if !self.is_shutdown {
            match self.notify.try_recv() {
                Err(broadcast::error::TryRecvError::Empty) => {}
                Ok(()) | Err(_) => self.is_shutdown = true,
            }
        }
        self.is_shutdown
    }

    /// Resolves when shutdown has been requested.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }
        let _ = self.notify.recv().await;
        self.is_shutdown = true;
    }
}
