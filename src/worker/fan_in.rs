use std::sync::Arc;
use std::time::Duration;

use log::trace;
use tokio::sync::{mpsc, Mutex};
use tokio::time;

/// Fallback tick while neither source has anything ready.
pub const IDLE_BACKOFF: Duration = Duration::from_secs(1);

/// A receiver shared by every worker of the pool.
pub type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

pub fn shared<T>(rx: mpsc::Receiver<T>) -> SharedReceiver<T> {
    Arc::new(Mutex::new(rx))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Candidate {
    /// Generated label, still missing the target suffix.
    Label(String),
    /// Hostname found by the recon collector, already qualified.
    Host(String),
}

impl Candidate {
    pub fn qualify(self, target: &str) -> String {
        match self {
            Self::Label(label) => format!("{label}.{target}"),
            Self::Host(host) => host,
        }
    }
}

/// Per-worker view over the two upstream sources. Tracks which of them have
/// been observed closed; `next` yields `None` once both are.
pub struct FanIn {
    brute: SharedReceiver<String>,
    hosts: SharedReceiver<String>,
    brute_open: bool,
    hosts_open: bool,
    idle: Duration,
}

impl FanIn {
    pub fn new(brute: SharedReceiver<String>, hosts: SharedReceiver<String>) -> Self {
        Self {
            brute,
            hosts,
            brute_open: true,
            hosts_open: true,
            idle: IDLE_BACKOFF,
        }
    }

    pub fn with_idle_backoff(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn is_exhausted(&self) -> bool {
        !self.brute_open && !self.hosts_open
    }

    pub async fn next(&mut self) -> Option<Candidate> {
        loop {
            if self.is_exhausted() {
                return None;
            }
            let brute = self.brute.clone();
            let hosts = self.hosts.clone();

            // branch choice is random when both are ready
            tokio::select! {
                label = recv_shared(&brute), if self.brute_open => match label {
                    Some(label) => return Some(Candidate::Label(label)),
                    None => {
                        trace!("brute candidate source closed");
                        self.brute_open = false;
                    }
                },
                host = recv_shared(&hosts), if self.hosts_open => match host {
                    Some(host) => return Some(Candidate::Host(host)),
                    None => {
                        trace!("recon host source closed");
                        self.hosts_open = false;
                    }
                },
                _ = time::sleep(self.idle) => {}
            }
        }
    }
}

async fn recv_shared<T>(rx: &SharedReceiver<T>) -> Option<T> {
    rx.lock().await.recv().await
}
