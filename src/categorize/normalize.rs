/// Label used when a raw category has no meaningful words
pub const FALLBACK_CATEGORY: &str = "general";

/// Default maximum length of a normalized category name
pub const DEFAULT_MAX_LENGTH: usize = 50;

const ARTICLES: &[&str] = &["a", "an", "the"];

/// Words that carry no topic on their own
pub(crate) const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "for", "to", "in", "on", "with", "by", "at", "from",
    "about", "into", "is", "are", "&",
];

/// Phrase collapses applied to the token stream, longest first per target
const SYNONYMS: &[(&[&str], &str)] = &[
    (&["eos", "network"], "eos"),
    (&["eos", "io"], "eos"),
    (&["eosio"], "eos"),
    (&["react", "js"], "react"),
    (&["reactjs"], "react"),
    (&["node", "js"], "node"),
    (&["nodejs"], "node"),
    (&["vue", "js"], "vue"),
    (&["vuejs"], "vue"),
    (&["next", "js"], "next"),
    (&["nextjs"], "next"),
    (&["golang"], "go"),
    (&["k8s"], "kubernetes"),
];

/// Lowercases and splits on anything that is not a letter or digit
pub(crate) fn tokenize(raw: &str) -> Vec<String> {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Replaces every synonym phrase in `tokens` with its canonical word
pub(crate) fn collapse_synonyms(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'outer: while i < tokens.len() {
        for (phrase, replacement) in SYNONYMS {
            let end = i + phrase.len();
            if end <= tokens.len() && tokens[i..end].iter().zip(phrase.iter()).all(|(t, p)| t == p)
            {
                out.push(replacement.to_string());
                i = end;
                continue 'outer;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

/// Normalizes a raw category label into a container name
///
/// # Steps
///
/// 1. Lowercase and split on non-alphanumerics
/// 2. Strip leading articles
/// 3. Collapse synonyms (`eos network` → `eos`, `react js` → `react`)
/// 4. Join: no separator for up to 3 tokens, underscores beyond that
/// 5. Truncate to `max_length` characters
///
/// Empty or stop-word-only input yields [`FALLBACK_CATEGORY`].
///
/// # Examples
///
/// ```
/// use ripple_ingest::categorize::normalize_category;
///
/// assert_eq!(normalize_category("EOS Network", 50), "eos");
/// assert_eq!(normalize_category("react.js", 50), "react");
/// assert_eq!(normalize_category("The Smart Contracts", 50), "smartcontracts");
/// assert_eq!(normalize_category("  of the  ", 50), "general");
/// ```
pub fn normalize_category(raw: &str, max_length: usize) -> String {
    let mut tokens = tokenize(raw);

    let leading_articles = tokens
        .iter()
        .take_while(|t| ARTICLES.contains(&t.as_str()))
        .count();
    tokens.drain(..leading_articles);

    let tokens = collapse_synonyms(tokens);
    if tokens.iter().all(|t| STOP_WORDS.contains(&t.as_str())) {
        return FALLBACK_CATEGORY.to_string();
    }

    let joined = if tokens.len() <= 3 {
        tokens.concat()
    } else {
        tokens.join("_")
    };

    let truncated: String = joined.chars().take(max_length.max(1)).collect();
    let trimmed = truncated.trim_end_matches('_');
    if trimmed.is_empty() {
        FALLBACK_CATEGORY.to_string()
    } else {
        trimmed.to_string()
    }
}
