use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::Instant;

use crate::collector::{
    CollectError, Collector, PageSource, ReconApi, ReconCredential, DEFAULT_RECON_URL,
};
use crate::generator::{Generator, LengthRange, Technique, WordlistSource, ALPHABET};
use crate::output::{CsvSink, MemorySink, RecordSink, ResultSink, SinkError};
use crate::probe::{HttpProber, NoProbe, Probe, ProbeError};
use crate::resolver::nameserver::prune_unreachable;
use crate::resolver::wildcard::detect_wildcard;
use crate::resolver::{DnsClient, NameserverPool, Resolve, DNS_TIMEOUT};
use crate::worker::{default_task_count, ResolutionPool, SubdomainRecord};

pub const BRUTE_CHANNEL_CAPACITY: usize = 256;
pub const TRIGGER_CHANNEL_CAPACITY: usize = 1;
pub const RESULTS_CHANNEL_CAPACITY: usize = 128;
pub const HOSTS_CHANNEL_CAPACITY: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputTarget {
    /// Truncate-and-create CSV file.
    Csv(PathBuf),
    /// Keep results in the returned `EnumerationResult` only.
    Memory,
}

#[derive(Clone, Debug)]
pub struct Options {
    pub target: String,
    pub techniques: Vec<Technique>,
    pub wordlist: WordlistSource,
    pub brute_length: LengthRange,
    pub recon_credential: Option<ReconCredential>,
    pub recon_url: String,
    pub task_count: usize,
    pub check_wildcard: bool,
    /// Empty means the built-in list.
    pub nameservers: Vec<SocketAddr>,
    pub fetch_title: bool,
    pub output: OutputTarget,
    /// Log every accepted record at info level.
    pub announce: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            target: String::new(),
            techniques: vec![Technique::Dictionary, Technique::Length],
            wordlist: WordlistSource::Builtin,
            brute_length: LengthRange::default(),
            recon_credential: None,
            recon_url: DEFAULT_RECON_URL.to_string(),
            task_count: default_task_count(),
            check_wildcard: true,
            nameservers: Vec::new(),
            fetch_title: false,
            output: OutputTarget::Csv(PathBuf::from("./out.txt")),
            announce: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no target domain provided")]
    EmptyTarget,

    #[error("no technique selected, expected any of D, L, F")]
    NoTechniques,

    #[error("technique F requires a recon credential (email|key)")]
    MissingReconCredential,

    #[error("invalid task count {value}, expected a positive integer")]
    InvalidWorkerCount { value: usize },

    #[error("invalid brute length {min}-{max}: {reason}")]
    InvalidLength {
        min: usize,
        max: usize,
        reason: String,
    },

    #[error("none of the {count} configured nameservers is reachable")]
    NoReachableNameservers { count: usize },

    #[error("{target} has wildcard dns and technique F is not enabled, nothing to do")]
    WildcardWithoutRecon { target: String },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: ProbeError,
    },

    #[error("failed to set up recon client: {source}")]
    ReconClient {
        #[source]
        source: CollectError,
    },

    #[error("task join failed: {source}")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },
}

#[derive(Clone, Debug)]
pub struct EnumerationResult {
    pub started_at: Instant,
    pub elapsed: Duration,
    pub wildcard: bool,
    /// Reachable nameservers the run resolved against.
    pub nameservers: Vec<SocketAddr>,
    pub records: Vec<SubdomainRecord>,
}

/// Everything the three pipeline stages need once preflight is done.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub target: String,
    pub techniques: Vec<Technique>,
    pub wordlist: WordlistSource,
    pub brute_length: LengthRange,
    pub alphabet: Vec<char>,
    pub task_count: usize,
    pub fetch_title: bool,
    pub has_wildcard: bool,
}

impl PipelineSettings {
    pub fn from_options(options: &Options, has_wildcard: bool) -> Self {
        Self {
            target: options.target.clone(),
            techniques: options.techniques.clone(),
            wordlist: options.wordlist.clone(),
            brute_length: options.brute_length,
            alphabet: ALPHABET.to_vec(),
            task_count: options.task_count,
            fetch_title: options.fetch_title,
            has_wildcard,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
}

impl Runner {
    pub fn new(mut options: Options) -> Result<Self, RunnerError> {
        options.target = options.target.trim().trim_end_matches('.').to_string();
        if options.target.is_empty() {
            return Err(RunnerError::EmptyTarget);
        }
        if options.techniques.is_empty() {
            return Err(RunnerError::NoTechniques);
        }
        if options.techniques.contains(&Technique::Recon) && options.recon_credential.is_none() {
            return Err(RunnerError::MissingReconCredential);
        }
        if options.techniques.contains(&Technique::Length) {
            let range = options.brute_length;
            range
                .validate()
                .map_err(|reason| RunnerError::InvalidLength {
                    min: range.min,
                    max: range.max,
                    reason,
                })?;
        }
        if options.task_count == 0 {
            return Err(RunnerError::InvalidWorkerCount {
                value: options.task_count,
            });
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub async fn run(&self) -> Result<EnumerationResult, RunnerError> {
        let started_at = Instant::now();
        let options = &self.options;

        let candidates = if options.nameservers.is_empty() {
            NameserverPool::defaults().servers().to_vec()
        } else {
            options.nameservers.clone()
        };
        let (reachable, unreachable) = prune_unreachable(&candidates, DNS_TIMEOUT).await;
        for ns in unreachable.iter() {
            warn!("nameserver {ns} is unreachable, removed from pool");
        }
        if reachable.is_empty() {
            return Err(RunnerError::NoReachableNameservers {
                count: candidates.len(),
            });
        }
        debug!("resolving against {} nameservers", reachable.len());
        let resolver = DnsClient::new(NameserverPool::new(reachable.clone()));

        let wildcard = if options.check_wildcard {
            detect_wildcard(&resolver, &options.target).await
        } else {
            false
        };
        if wildcard {
            warn!("{} has wildcard dns, brute techniques disabled", options.target);
            if !options.techniques.contains(&Technique::Recon) {
                return Err(RunnerError::WildcardWithoutRecon {
                    target: options.target.clone(),
                });
            }
        }

        let wants_recon = options.techniques.contains(&Technique::Recon);
        let pages = match &options.recon_credential {
            Some(credential) if wants_recon => Some(
                ReconApi::new(&options.recon_url, credential.clone(), &options.target)
                    .map_err(|source| RunnerError::ReconClient { source })?,
            ),
            _ => None,
        };
        let sink = ResultSink::new(open_sink(&options.output)?, options.announce);
        let settings = PipelineSettings::from_options(options, wildcard);

        let records = if options.fetch_title {
            let prober =
                HttpProber::new().map_err(|source| RunnerError::HttpClientBuild { source })?;
            run_pipeline(settings, resolver, prober, pages, sink).await?
        } else {
            run_pipeline(settings, resolver, NoProbe, pages, sink).await?
        };

        Ok(EnumerationResult {
            started_at,
            elapsed: started_at.elapsed(),
            wildcard,
            nameservers: reachable,
            records,
        })
    }
}

fn open_sink(output: &OutputTarget) -> Result<Box<dyn RecordSink>, RunnerError> {
    Ok(match output {
        OutputTarget::Csv(path) => Box::new(CsvSink::create(path)?),
        OutputTarget::Memory => Box::new(MemorySink),
    })
}

/// Wires generator -> (collector + resolution pool) -> sink and waits for
/// all three stages. Shutdown cascades by channel closure.
pub async fn run_pipeline<R, P, S>(
    settings: PipelineSettings,
    resolver: R,
    prober: P,
    pages: Option<S>,
    sink: ResultSink,
) -> Result<Vec<SubdomainRecord>, RunnerError>
where
    R: Resolve,
    P: Probe,
    S: PageSource,
{
    let (brute_tx, brute_rx) = mpsc::channel::<String>(BRUTE_CHANNEL_CAPACITY);
    let (trigger_tx, trigger_rx) = mpsc::channel::<()>(TRIGGER_CHANNEL_CAPACITY);
    let (results_tx, results_rx) = mpsc::channel::<SubdomainRecord>(RESULTS_CHANNEL_CAPACITY);

    let sink_handle = task::spawn(sink.run(results_rx));

    let pool = ResolutionPool::new(
        settings.task_count,
        &settings.target,
        settings.fetch_title,
        resolver,
        prober,
    );
    let collector = Collector::new(pages);
    let engine_handle = task::spawn(async move {
        let (hosts_tx, hosts_rx) = mpsc::channel::<String>(HOSTS_CHANNEL_CAPACITY);
        let collector_handle = task::spawn(collector.run(trigger_rx, hosts_tx));
        let pool_result = pool.run(brute_rx, hosts_rx, results_tx).await;
        let collector_result = collector_handle.await;
        pool_result.and(collector_result)
    });

    let generator = Generator::new(
        settings.techniques,
        settings.wordlist,
        settings.brute_length,
        settings.has_wildcard,
    )
    .with_alphabet(settings.alphabet);
    let generator_handle = task::spawn(generator.run(brute_tx, trigger_tx));

    let sink_result = sink_handle
        .await
        .map_err(|source| RunnerError::TaskJoin { source })?;
    let records = match sink_result {
        Ok(records) => records,
        Err(e) => {
            // workers exit on their own once they see the closed results channel
            generator_handle.abort();
            engine_handle.abort();
            return Err(e.into());
        }
    };
    let generator_result = generator_handle.await;
    let engine_result = engine_handle.await;

    generator_result.map_err(|source| RunnerError::TaskJoin { source })?;
    engine_result
        .map_err(|source| RunnerError::TaskJoin { source })?
        .map_err(|source| RunnerError::TaskJoin { source })?;

    info!("{} subdomains found", records.len());
    Ok(records)
}
