/// Built-in wordlist used when no dictionary file is given.
pub const BUILTIN_WORDLIST: &str = include_str!("../../wordlists/subdomains.txt");

#[derive(Clone, Debug, Default)]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
    #[default]
    Builtin,
}

/// Returns the trimmed label if the line is a candidate. Blank lines and
/// `#` comments are not.
pub fn candidate_word(line: &str) -> Option<&str> {
    let word = line.trim();
    if word.is_empty() || word.starts_with('#') {
        return None;
    }
    Some(word)
}

pub fn dictionary_words(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter_map(candidate_word)
}
