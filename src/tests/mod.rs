use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collector::{CollectError, PageSource, ReconApi};
use crate::generator::{LengthRange, Technique, WordlistSource, ALPHABET};
use crate::output::{CsvSink, MemorySink, RecordSink, ResultSink, SinkError, CSV_HEADER};
use crate::probe::NoProbe;
use crate::resolver::{DnsError, Resolve, ResolveResult};
use crate::runner::{run_pipeline, Options, PipelineSettings, Runner, RunnerError};
use crate::worker::SubdomainRecord;

/// Answers from a fixed table, fails everything else. `answer_all` turns it
/// into a resolver that finds every name.
#[derive(Clone, Default)]
struct ScriptedResolver {
    table: Arc<HashMap<String, Vec<String>>>,
    answer_all: bool,
    delay: Duration,
    queried: Arc<Mutex<Vec<String>>>,
}

impl ScriptedResolver {
    fn with(entries: &[(&str, &str)]) -> Self {
        let table = entries
            .iter()
            .map(|(name, ip)| (name.to_string(), vec![ip.to_string()]))
            .collect();
        Self {
            table: Arc::new(table),
            ..Default::default()
        }
    }

    fn everything() -> Self {
        Self {
            answer_all: true,
            ..Default::default()
        }
    }

    fn slowly(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn lookups(&self) -> usize {
        self.queried.lock().unwrap().len()
    }

    fn queried(&self) -> HashSet<String> {
        self.queried.lock().unwrap().iter().cloned().collect()
    }
}

impl Resolve for ScriptedResolver {
    async fn resolve(&self, domain: &str) -> Result<ResolveResult, DnsError> {
        self.queried.lock().unwrap().push(domain.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let a_records = match self.table.get(domain) {
            Some(ips) => ips.clone(),
            None if self.answer_all => vec!["10.0.0.1".to_string()],
            None => return Err(DnsError::EmptyPool),
        };
        Ok(ResolveResult {
            domain: domain.to_string(),
            a_records,
            cname_records: Vec::new(),
        })
    }
}

struct FixedPages {
    pages: Vec<&'static str>,
}

impl PageSource for FixedPages {
    async fn fetch_page(&self, page: u32) -> Result<Vec<u8>, CollectError> {
        let body = self
            .pages
            .get(page as usize - 1)
            .copied()
            .unwrap_or(r#"{"error":false,"results":[]}"#);
        Ok(body.as_bytes().to_vec())
    }
}

fn settings(
    techniques: Vec<Technique>,
    wordlist: WordlistSource,
    range: LengthRange,
) -> PipelineSettings {
    PipelineSettings {
        target: "example.com".to_string(),
        techniques,
        wordlist,
        brute_length: range,
        alphabet: ALPHABET.to_vec(),
        task_count: 4,
        fetch_title: false,
        has_wildcard: false,
    }
}

fn memory_sink() -> ResultSink {
    ResultSink::new(Box::new(MemorySink), false)
}

#[tokio::test]
async fn dictionary_run_writes_only_resolving_words() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let resolver = ScriptedResolver::with(&[("www.example.com", "1.2.3.4")]);
    let words = ["www", "#comment", "", "api"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let records = run_pipeline(
        settings(
            vec![Technique::Dictionary],
            WordlistSource::Inline(words),
            LengthRange::single(1),
        ),
        resolver.clone(),
        NoProbe,
        None::<ReconApi>,
        ResultSink::new(Box::new(CsvSink::create(&path).unwrap()), false),
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resolve.a_records, vec!["1.2.3.4".to_string()]);
    assert_eq!(
        resolver.queried(),
        HashSet::from(["www.example.com".to_string(), "api.example.com".to_string()])
    );

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], CSV_HEADER.join(","));
    assert!(lines[1].starts_with("www.example.com,,1.2.3.4,"));
}

#[tokio::test]
async fn restricted_alphabet_queries_two_labels() {
    let resolver = ScriptedResolver::everything();
    let mut s = settings(
        vec![Technique::Length],
        WordlistSource::Builtin,
        LengthRange::single(1),
    );
    s.alphabet = vec!['a', 'b', '-'];

    let records = run_pipeline(s, resolver.clone(), NoProbe, None::<ReconApi>, memory_sink())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
        resolver.queried(),
        HashSet::from(["a.example.com".to_string(), "b.example.com".to_string()])
    );
}

#[tokio::test]
async fn full_alphabet_single_length_finds_every_label() {
    let records = run_pipeline(
        settings(vec![Technique::Length], WordlistSource::Builtin, LengthRange::single(1)),
        ScriptedResolver::everything(),
        NoProbe,
        None::<ReconApi>,
        memory_sink(),
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 36);
    assert!(records.iter().all(|r| !r.resolve.domain.starts_with('-')));
}

#[tokio::test]
async fn recon_hosts_are_resolved_without_suffix() {
    let resolver = ScriptedResolver::everything();
    let pages = FixedPages {
        pages: vec![
            r#"{"error":false,"results":[["https://c1.example.com","1.1.1.1","443"],["ss.example.com:10022","1.1.1.2","10022"]]}"#,
            r#"{"error":false,"results":[["c1.example.com","1.1.1.1","80"]]}"#,
        ],
    };

    let records = run_pipeline(
        settings(vec![Technique::Recon], WordlistSource::Builtin, LengthRange::single(1)),
        resolver.clone(),
        NoProbe,
        Some(pages),
        memory_sink(),
    )
    .await
    .unwrap();

    let domains: HashSet<String> = records.iter().map(|r| r.resolve.domain.clone()).collect();
    assert_eq!(
        domains,
        HashSet::from(["c1.example.com".to_string(), "ss.example.com".to_string()])
    );
    assert_eq!(resolver.queried(), domains);
}

#[tokio::test]
async fn wildcard_target_only_uses_recon_hosts() {
    let resolver = ScriptedResolver::everything();
    let mut s = settings(
        vec![Technique::Dictionary, Technique::Length, Technique::Recon],
        WordlistSource::Inline(vec!["www".to_string()]),
        LengthRange::single(1),
    );
    s.has_wildcard = true;
    let pages = FixedPages {
        pages: vec![r#"{"error":false,"results":[["api.example.com","1.1.1.1","80"]]}"#],
    };

    let records = run_pipeline(s, resolver.clone(), NoProbe, Some(pages), memory_sink())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resolve.domain, "api.example.com");
    assert_eq!(resolver.queried().len(), 1);
}

#[tokio::test]
async fn duplicate_sources_write_one_record() {
    let resolver = ScriptedResolver::everything();
    let pages = FixedPages {
        pages: vec![r#"{"error":false,"results":[["www.example.com","1.1.1.1","80"]]}"#],
    };

    let records = run_pipeline(
        settings(
            vec![Technique::Dictionary, Technique::Recon],
            WordlistSource::Inline(vec!["www".to_string(), "www".to_string()]),
            LengthRange::single(1),
        ),
        resolver,
        NoProbe,
        Some(pages),
        memory_sink(),
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resolve.domain, "www.example.com");
}

struct FailingSink;

impl RecordSink for FailingSink {
    fn write_record(&mut self, _record: &SubdomainRecord) -> Result<(), SinkError> {
        Err(SinkError::Write {
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full").into(),
        })
    }
}

#[tokio::test]
async fn sink_failure_aborts_the_run() {
    // length 3 would take a long time if the pipeline kept going
    let run = run_pipeline(
        settings(vec![Technique::Length], WordlistSource::Builtin, LengthRange::single(3)),
        ScriptedResolver::everything(),
        NoProbe,
        None::<ReconApi>,
        ResultSink::new(Box::new(FailingSink), false),
    );
    let err = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RunnerError::Sink(SinkError::Write { .. })));
}

#[tokio::test]
async fn sink_failure_stops_lookups_when_hits_are_rare() {
    let resolver = ScriptedResolver::with(&[("aaa.example.com", "10.0.0.9")])
        .slowly(Duration::from_millis(1));
    let run = run_pipeline(
        settings(vec![Technique::Length], WordlistSource::Builtin, LengthRange::single(3)),
        resolver.clone(),
        NoProbe,
        None::<ReconApi>,
        ResultSink::new(Box::new(FailingSink), false),
    );
    let err = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RunnerError::Sink(SinkError::Write { .. })));

    // detached workers must not keep resolving after the run returned
    tokio::time::sleep(Duration::from_millis(200)).await;
    let lookups = resolver.lookups();
    assert!(lookups < 100, "{lookups} lookups after the sink failed");
}

#[test]
fn runner_rejects_invalid_options() {
    let base = Options {
        target: "example.com".to_string(),
        ..Default::default()
    };

    let err = Runner::new(Options {
        target: "  ".to_string(),
        ..base.clone()
    })
    .unwrap_err();
    assert!(matches!(err, RunnerError::EmptyTarget));

    let err = Runner::new(Options {
        techniques: Vec::new(),
        ..base.clone()
    })
    .unwrap_err();
    assert!(matches!(err, RunnerError::NoTechniques));

    let err = Runner::new(Options {
        techniques: vec![Technique::Recon],
        ..base.clone()
    })
    .unwrap_err();
    assert!(matches!(err, RunnerError::MissingReconCredential));

    let err = Runner::new(Options {
        task_count: 0,
        ..base.clone()
    })
    .unwrap_err();
    assert!(matches!(err, RunnerError::InvalidWorkerCount { value: 0 }));

    for (min, max) in [(3, 1), (0, 2), (1, 64)] {
        let err = Runner::new(Options {
            techniques: vec![Technique::Length],
            brute_length: LengthRange { min, max },
            ..base.clone()
        })
        .unwrap_err();
        assert!(
            matches!(err, RunnerError::InvalidLength { min: m, max: x, .. } if m == min && x == max),
            "{min}-{max} accepted"
        );
    }

    // the range only matters when technique L runs
    Runner::new(Options {
        techniques: vec![Technique::Dictionary],
        brute_length: LengthRange { min: 3, max: 1 },
        ..base.clone()
    })
    .unwrap();

    let runner = Runner::new(Options {
        target: " example.com. ".to_string(),
        ..base
    })
    .unwrap();
    assert_eq!(runner.options().target, "example.com");
}

#[tokio::test]
async fn unreachable_nameservers_fail_preflight() {
    let silent = crate::resolver::testing::spawn_silent_nameserver().await;
    let runner = Runner::new(Options {
        target: "example.com".to_string(),
        nameservers: vec![silent],
        output: crate::runner::OutputTarget::Memory,
        ..Default::default()
    })
    .unwrap();
    let err = runner.run().await.unwrap_err();
    assert!(matches!(err, RunnerError::NoReachableNameservers { count: 1 }));
}

#[tokio::test]
async fn runner_enumerates_against_local_nameserver() {
    let ns = crate::resolver::testing::spawn_fake_nameserver().await;
    let runner = Runner::new(Options {
        target: "example.com".to_string(),
        techniques: vec![Technique::Dictionary],
        wordlist: WordlistSource::Inline(vec!["www".to_string(), "mail".to_string()]),
        nameservers: vec![ns],
        output: crate::runner::OutputTarget::Memory,
        task_count: 2,
        ..Default::default()
    })
    .unwrap();

    let result = runner.run().await.unwrap();
    assert!(!result.wildcard);
    assert_eq!(result.nameservers, vec![ns]);
    assert_eq!(result.records.len(), 1);
    let record = &result.records[0];
    assert_eq!(record.resolve.domain, "www.example.com");
    assert_eq!(record.resolve.a_records, vec!["1.2.3.4".to_string()]);
    assert_eq!(record.resolve.cname_records, vec!["edge.example.net.".to_string()]);
}
