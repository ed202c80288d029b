//! Merchant name extraction and normalization
//!
//! Extracts merchant names from free text without a hardcoded merchant
//! enumeration, using a strategy hierarchy: prepositional context first
//! (fast, rule-based), then fuzzy matching against the corpus of merchants
//! seen in indexed receipts, then a language-model fallback. The first
//! strategy producing candidates wins; strategies are never merged.

use std::collections::HashSet;
use std::sync::RwLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::ai::{AiClient, LanguageBackend};

/// Corporate/store-type suffixes stripped during normalization,
/// longest first so alternation can't partially strip
const SUFFIXES: &[&str] = &[
    "restaurant",
    "pharmacy",
    "market",
    "coffee",
    "store",
    "shop",
    "cafe",
    "corp",
    "inc",
    "llc",
    "ltd",
];

/// Keywords that end a captured merchant phrase (a trailing date or
/// threshold clause must not be swallowed into the name)
const PHRASE_STOPWORDS: &str =
    "in|during|for|last|this|past|yesterday|on|over|under|with|about";

/// Candidate names that are really temporal terms, not merchants
const TEMPORAL_TERMS: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
    "today",
    "yesterday",
    "week",
    "month",
    "year",
];

/// Candidate names that are really category terms, not merchants
const CATEGORY_TERMS: &[&str] = &[
    "coffee shop",
    "coffee shops",
    "restaurant",
    "restaurants",
    "groceries",
    "grocery",
    "electronics",
    "pharmacy",
    "treats",
];

/// Canonicalize a merchant name for equality comparison
///
/// Lowercases, strips non-alphanumerics, collapses whitespace, and removes
/// one trailing corporate/store-type suffix. Two names refer to the same
/// merchant iff their normalized forms are equal; display names are never
/// normalized.
pub fn normalize_merchant_name(name: &str) -> String {
    let mut norm: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    norm = norm.split_whitespace().collect::<Vec<_>>().join(" ");

    for suffix in SUFFIXES {
        if let Some(stripped) = norm.strip_suffix(suffix) {
            // Only strip whole trailing words, not "shopmart" -> "shop"
            if stripped.ends_with(' ') {
                norm = stripped.trim_end().to_string();
                break;
            }
        }
    }

    norm.trim().to_string()
}

/// Extracts merchant candidates from queries, learning from indexed data
///
/// The corpus is append-only for the lifetime of the process; stale or
/// duplicate entries only affect fuzzy-match recall, never correctness.
#[derive(Debug, Default)]
pub struct MerchantResolver {
    corpus: RwLock<HashSet<String>>,
}

impl MerchantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed observed merchant display names into the fuzzy-match corpus
    pub fn learn<I>(&self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Ok(mut corpus) = self.corpus.write() {
            for name in names {
                if !name.trim().is_empty() {
                    corpus.insert(name.trim().to_string());
                }
            }
        }
    }

    /// Number of distinct merchants learned so far
    pub fn corpus_size(&self) -> usize {
        self.corpus.read().map(|c| c.len()).unwrap_or(0)
    }

    /// A bounded sample of the corpus, for language-model context
    pub fn corpus_sample(&self, limit: usize) -> Vec<String> {
        let Ok(corpus) = self.corpus.read() else {
            return Vec::new();
        };
        let mut sample: Vec<String> = corpus.iter().cloned().collect();
        sample.sort();
        sample.truncate(limit);
        sample
    }

    /// Extract merchant candidates using the rule-based strategies
    ///
    /// Returns display-cased names, possibly empty; never fails.
    pub fn extract(&self, query: &str) -> Vec<String> {
        let mut merchants = extract_via_prepositions(query);

        if merchants.is_empty() {
            if let Ok(corpus) = self.corpus.read() {
                if !corpus.is_empty() {
                    merchants = extract_via_fuzzy_match(query, &corpus);
                }
            }
        }

        post_filter(dedupe_normalized(merchants))
    }

    /// Extract with the language-model fallback as the final strategy
    ///
    /// The backend is only consulted when both rule-based strategies come
    /// up empty; a backend failure degrades to an empty result.
    pub async fn extract_with_fallback(
        &self,
        query: &str,
        ai: Option<&AiClient>,
    ) -> Vec<String> {
        let merchants = self.extract(query);
        if !merchants.is_empty() {
            return merchants;
        }

        let Some(ai) = ai else {
            return Vec::new();
        };

        let known = self.corpus_sample(20);
        match ai.extract_merchants(query, &known).await {
            Ok(mut extracted) => {
                extracted.truncate(5);
                debug!(?extracted, "language model extracted merchants");
                post_filter(dedupe_normalized(extracted))
            }
            Err(e) => {
                warn!(error = %e, "language model merchant extraction failed");
                Vec::new()
            }
        }
    }
}

/// Strategy 1: preposition followed by a capitalized phrase
///
/// "How much at Whole Foods last month" -> "Whole Foods"
fn extract_via_prepositions(query: &str) -> Vec<String> {
    let Ok(prep_re) = Regex::new(
        r"(?:^|[\s,])(?i:spent at|bought at|shopped at|ordered from|purchased from|receipts from|visited|at|from|to)\s+([A-Z][A-Za-z0-9 .&']+)",
    ) else {
        return Vec::new();
    };
    let Ok(stop_re) = Regex::new(&format!(r"(?i)\s+(?:{PHRASE_STOPWORDS})\b")) else {
        return Vec::new();
    };

    let mut merchants = Vec::new();
    for caps in prep_re.captures_iter(query) {
        let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        // Truncate at the first temporal/conjunction keyword
        let candidate = stop_re
            .split(raw)
            .next()
            .unwrap_or(raw)
            .trim()
            .trim_end_matches(['.', ',', ';', '!', '?'])
            .trim();

        if candidate.len() >= 3 && !matches!(candidate.to_lowercase().as_str(), "the" | "a" | "an")
        {
            merchants.push(candidate.to_string());
        }
    }

    merchants
}

/// Strategy 2: fuzzy match query tokens against the learned corpus
///
/// Handles typos ("Walmat") and partial names ("Whole Foods" for
/// "Whole Foods Market"). Substring containment between normalized forms
/// boosts the score to at least 0.9; matches below 0.75 are rejected.
fn extract_via_fuzzy_match(query: &str, corpus: &HashSet<String>) -> Vec<String> {
    let mut merchants = Vec::new();

    for token in tokenize_candidates(query) {
        if token.len() < 3 {
            continue;
        }
        let norm_token = normalize_merchant_name(&token);
        if norm_token.is_empty() {
            continue;
        }

        let mut best: Option<(&String, f64)> = None;
        for merchant in corpus {
            let norm_merchant = normalize_merchant_name(merchant);
            if norm_merchant.is_empty() {
                continue;
            }

            let mut score = similarity_ratio(&norm_token, &norm_merchant);
            if norm_merchant.contains(&norm_token) || norm_token.contains(&norm_merchant) {
                score = score.max(0.9);
            }

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((merchant, score));
            }
        }

        if let Some((merchant, score)) = best {
            if score >= 0.75 {
                debug!(token, merchant = %merchant, score, "fuzzy merchant match");
                merchants.push(merchant.clone());
            }
        }
    }

    merchants
}

/// Capitalized sequences and standalone capitalized words from a query
fn tokenize_candidates(query: &str) -> Vec<String> {
    let Ok(split_re) = Regex::new(r"[,;.!?]|\s+(?:and|or|in|at|from)\s+") else {
        return Vec::new();
    };
    let Ok(caps_re) = Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b") else {
        return Vec::new();
    };

    let mut tokens = Vec::new();
    for segment in split_re.split(query) {
        for m in caps_re.find_iter(segment) {
            tokens.push(m.as_str().to_string());
        }
    }
    tokens
}

/// Similarity ratio in [0, 1] based on the longest common subsequence,
/// 2*lcs / (len_a + len_b)
fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(row[j])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }

    let lcs = prev[b.len()];
    (2.0 * lcs as f64) / ((a.len() + b.len()) as f64)
}

/// Drop duplicates that normalize to the same merchant, keeping the first
/// spelling seen (better for display)
fn dedupe_normalized(merchants: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for merchant in merchants {
        let trimmed = merchant.trim();
        if trimmed.len() < 2 {
            continue;
        }
        let key = normalize_merchant_name(trimmed);
        if !key.is_empty() && seen.insert(key) {
            deduped.push(trimmed.to_string());
        }
    }
    deduped
}

/// Discard candidates that are really temporal or category vocabulary
///
/// The extraction strategies share vocabulary with the temporal resolver
/// and category mapper ("December", "coffee shops"); anything they would
/// claim must not leak through as a merchant.
fn post_filter(merchants: Vec<String>) -> Vec<String> {
    let month_year = Regex::new(
        r"(?i)^(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+20\d{2}$",
    )
    .ok();

    merchants
        .into_iter()
        .filter(|m| {
            let lower = m.to_lowercase();
            if TEMPORAL_TERMS.contains(&lower.as_str()) {
                return false;
            }
            if CATEGORY_TERMS.contains(&lower.as_str()) {
                return false;
            }
            if month_year.as_ref().is_some_and(|re| re.is_match(m)) {
                return false;
            }
            true
        })
        .collect()
}
