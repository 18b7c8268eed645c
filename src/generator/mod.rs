pub mod brute;
pub mod dictionary;

use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub use brute::{brute_labels, parse_length_range, LengthRange, ALPHABET};
pub use dictionary::{candidate_word, dictionary_words, WordlistSource, BUILTIN_WORDLIST};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Technique {
    /// `D`: dictionary words.
    Dictionary,
    /// `L`: every label in a length range.
    Length,
    /// `F`: hosts already indexed by the recon API.
    Recon,
}

impl Technique {
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'D' => Some(Self::Dictionary),
            'L' => Some(Self::Length),
            'F' => Some(Self::Recon),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Dictionary => 'D',
            Self::Length => 'L',
            Self::Recon => 'F',
        }
    }

    /// Dictionary and length modes are useless against wildcard zones.
    pub fn is_brute(self) -> bool {
        matches!(self, Self::Dictionary | Self::Length)
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dictionary => "dictionary",
            Self::Length => "length",
            Self::Recon => "recon",
        };
        write!(f, "{}({})", self.letter(), name)
    }
}

/// Accepts `DLF`, `D,L,F` or any mix of case and whitespace.
pub fn parse_techniques(value: &str) -> Result<Vec<Technique>, String> {
    let tokens: Vec<String> = if value.contains(',') {
        value.split(',').map(|s| s.trim().to_string()).collect()
    } else {
        value
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(String::from)
            .collect()
    };

    let mut out: Vec<Technique> = Vec::new();
    for token in tokens.iter().filter(|t| !t.is_empty()) {
        let mut chars = token.chars();
        let technique = match (chars.next(), chars.next()) {
            (Some(c), None) => Technique::from_letter(c),
            _ => None,
        }
        .ok_or_else(|| format!("unknown technique '{token}', only D, L, F allowed"))?;
        if !out.contains(&technique) {
            out.push(technique);
        }
    }
    if out.is_empty() {
        return Err("technique list is empty".to_string());
    }
    Ok(out)
}

pub fn format_techniques(techniques: &[Technique]) -> String {
    techniques.iter().map(|t| t.letter()).collect()
}

/// Produces candidate labels for the resolution stage and the single recon
/// trigger. Labels are never suffixed with the target here.
#[derive(Clone, Debug)]
pub struct Generator {
    techniques: Vec<Technique>,
    wordlist: WordlistSource,
    brute_length: LengthRange,
    alphabet: Vec<char>,
    has_wildcard: bool,
}

impl Generator {
    pub fn new(
        techniques: Vec<Technique>,
        wordlist: WordlistSource,
        brute_length: LengthRange,
        has_wildcard: bool,
    ) -> Self {
        Self {
            techniques,
            wordlist,
            brute_length,
            alphabet: ALPHABET.to_vec(),
            has_wildcard,
        }
    }

    pub fn with_alphabet(mut self, alphabet: Vec<char>) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Runs every requested technique in order. Both channels close when this
    /// returns and the senders drop.
    pub async fn run(self, brute_tx: mpsc::Sender<String>, trigger_tx: mpsc::Sender<()>) {
        debug!("generator started");
        for technique in self.techniques.iter().copied() {
            if technique.is_brute() && self.has_wildcard {
                info!("skipping technique {technique}, target has wildcard dns");
                continue;
            }
            info!("building tasks for technique {technique}");
            let open = match technique {
                Technique::Dictionary => self.emit_dictionary(&brute_tx).await,
                Technique::Length => self.emit_brute_length(&brute_tx).await,
                Technique::Recon => trigger_tx.send(()).await.is_ok(),
            };
            if !open {
                debug!("downstream closed, generator stopping early");
                break;
            }
        }
        debug!("generator finished");
    }

    async fn emit_dictionary(&self, tx: &mpsc::Sender<String>) -> bool {
        match &self.wordlist {
            WordlistSource::FilePath(path) => {
                let file = match File::open(path).await {
                    Ok(file) => file,
                    Err(e) => {
                        warn!("failed to open dictionary {path}: {e}");
                        return true;
                    }
                };
                let mut lines = BufReader::new(file).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if let Some(word) = candidate_word(&line) {
                                if tx.send(word.to_string()).await.is_err() {
                                    return false;
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("error reading dictionary {path}: {e}");
                            break;
                        }
                    }
                }
                true
            }
            WordlistSource::Inline(words) => {
                for word in words.iter().filter_map(|w| candidate_word(w)) {
                    if tx.send(word.to_string()).await.is_err() {
                        return false;
                    }
                }
                true
            }
            WordlistSource::Builtin => {
                debug!("using built-in dictionary");
                for word in dictionary_words(BUILTIN_WORDLIST) {
                    if tx.send(word.to_string()).await.is_err() {
                        return false;
                    }
                }
                true
            }
        }
    }

    async fn emit_brute_length(&self, tx: &mpsc::Sender<String>) -> bool {
        for label in brute_labels(self.alphabet.clone(), self.brute_length) {
            if tx.send(label).await.is_err() {
                return false;
            }
        }
        debug!("length {} candidates done", self.brute_length);
        true
    }
}
