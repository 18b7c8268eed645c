pub mod fan_in;

use std::sync::Arc;

use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{self, JoinError};

use crate::probe::{Probe, ProbeResult};
use crate::resolver::{resolve_with_retry, Resolve, ResolveResult, RESOLVE_ATTEMPTS};

pub use fan_in::{shared, Candidate, FanIn, SharedReceiver, IDLE_BACKOFF};

/// The persisted unit: one live subdomain and its optional HTTP probe.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SubdomainRecord {
    pub resolve: ResolveResult,
    pub probe: ProbeResult,
}

pub fn default_task_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus * 2 + 1
}

pub struct ResolutionPool<R, P> {
    workers: usize,
    target: Arc<str>,
    fetch_title: bool,
    resolver: R,
    prober: P,
}

impl<R: Resolve, P: Probe> ResolutionPool<R, P> {
    pub fn new(workers: usize, target: &str, fetch_title: bool, resolver: R, prober: P) -> Self {
        Self {
            workers: workers.max(1),
            target: Arc::from(target),
            fetch_title,
            resolver,
            prober,
        }
    }

    /// Spawns the workers and waits for all of them. The results channel
    /// closes when the last worker exits.
    pub async fn run(
        self,
        brute_rx: mpsc::Receiver<String>,
        hosts_rx: mpsc::Receiver<String>,
        results_tx: mpsc::Sender<SubdomainRecord>,
    ) -> Result<(), JoinError> {
        let brute = shared(brute_rx);
        let hosts = shared(hosts_rx);
        debug!("starting {} resolution workers", self.workers);

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let worker = Worker {
                id,
                fan_in: FanIn::new(brute.clone(), hosts.clone()),
                target: self.target.clone(),
                fetch_title: self.fetch_title,
                resolver: self.resolver.clone(),
                prober: self.prober.clone(),
                results_tx: results_tx.clone(),
            };
            handles.push(task::spawn(worker.run()));
        }
        drop(results_tx);

        let mut first_error = None;
        for handle in handles {
            if let Err(e) = handle.await {
                first_error.get_or_insert(e);
            }
        }
        debug!("resolution pool finished");
        first_error.map_or(Ok(()), Err)
    }
}

struct Worker<R, P> {
    id: usize,
    fan_in: FanIn,
    target: Arc<str>,
    fetch_title: bool,
    resolver: R,
    prober: P,
    results_tx: mpsc::Sender<SubdomainRecord>,
}

impl<R: Resolve, P: Probe> Worker<R, P> {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.results_tx.closed() => None,
                next = self.fan_in.next() => next,
            };
            let Some(candidate) = next else {
                break;
            };
            let domain = candidate.qualify(&self.target);
            let resolved = tokio::select! {
                resolved = resolve_with_retry(&self.resolver, &domain, RESOLVE_ATTEMPTS) => resolved,
                _ = self.results_tx.closed() => break,
            };
            let Some(resolve) = resolved else {
                continue;
            };
            if !resolve.has_records() {
                continue;
            }

            let probe = if self.fetch_title {
                self.prober.probe_title(&domain).await
            } else {
                ProbeResult::default()
            };
            if self
                .results_tx
                .send(SubdomainRecord { resolve, probe })
                .await
                .is_err()
            {
                debug!("worker {}: result sink closed, exiting", self.id);
                return;
            }
        }
        if self.results_tx.is_closed() {
            debug!("worker {}: result sink closed, exiting", self.id);
        } else {
            debug!("worker {}: both sources drained", self.id);
        }
    }
}
