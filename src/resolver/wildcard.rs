use log::{debug, info};
use rand::Rng;

use super::{resolve_with_retry, Resolve, RESOLVE_ATTEMPTS};

/// A label no sane zone publishes.
pub const SENTINEL_LABEL: &str = "this-domain-will-never-exist";
pub const RANDOM_PROBE_COUNT: usize = 2;
pub const RANDOM_LABEL_LEN: usize = 8;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn random_label(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect()
}

pub fn probe_names(target: &str) -> Vec<String> {
    let mut names = vec![format!("{SENTINEL_LABEL}.{target}")];
    for _ in 0..RANDOM_PROBE_COUNT {
        names.push(format!("{}.{target}", random_label(RANDOM_LABEL_LEN)));
    }
    names
}

/// A zone is wildcard-enabled only when every nonexistent probe resolved.
pub fn all_probes_resolved(hits: &[bool]) -> bool {
    !hits.is_empty() && hits.iter().all(|hit| *hit)
}

pub async fn detect_wildcard<R: Resolve>(resolver: &R, target: &str) -> bool {
    let mut hits = Vec::with_capacity(RANDOM_PROBE_COUNT + 1);
    for name in probe_names(target) {
        let hit = match resolve_with_retry(resolver, &name, RESOLVE_ATTEMPTS).await {
            Some(result) => result.has_records(),
            None => false,
        };
        debug!("wildcard probe {name}: resolved={hit}");
        hits.push(hit);
    }
    let wildcard = all_probes_resolved(&hits);
    if wildcard {
        info!("{target} answers for nonexistent labels, wildcard dns detected");
    }
    wildcard
}
