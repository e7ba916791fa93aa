// src/ingest/relevance.rs
//! Keyword relevance gate.
//!
//! Three tiers per topic: primary (on-topic), secondary (adjacent) and exclude.
//! Exclusion always wins. Topics differ only in what happens when no primary
//! keyword hits, see [`FallbackPolicy`].

use crate::ingest::types::FeedSource;
use regex::Regex;

/// What to do when neither an exclude nor a primary keyword matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Accept on any secondary hit; otherwise accept only from specialized sources.
    AnySecondaryOrSpecialized,
    /// Require a secondary hit AND one of these innovation keywords.
    SecondaryAndInnovation(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct KeywordTiers {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
    /// Whole words only, so "crypto" does not reject "cryptography".
    pub exclude: Vec<String>,
    pub policy: FallbackPolicy,
    exclude_re: Vec<(String, Regex)>,
}

/// Why an item was accepted or rejected (kept for debug logs and tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Excluded(String),
    Primary(String),
    Secondary(String),
    SecondaryWithInnovation { secondary: String, innovation: String },
    SpecializedSource,
    NoMatch,
}

impl Verdict {
    pub fn accepted(&self) -> bool {
        !matches!(self, Verdict::Excluded(_) | Verdict::NoMatch)
    }
}

fn lower_all(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

fn first_hit<'a>(text: &str, words: &'a [String]) -> Option<&'a String> {
    words.iter().find(|w| text.contains(w.as_str()))
}

fn whole_word(word: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"(?:^|[^\p{{L}}\p{{N}}]){}(?:$|[^\p{{L}}\p{{N}}])",
        regex::escape(word)
    ))
    .ok()
}

impl KeywordTiers {
    pub fn new(primary: &[&str], secondary: &[&str], exclude: &[&str], policy: FallbackPolicy) -> Self {
        let exclude = lower_all(exclude);
        let exclude_re = exclude
            .iter()
            .filter_map(|w| whole_word(w).map(|re| (w.clone(), re)))
            .collect();
        Self {
            primary: lower_all(primary),
            secondary: lower_all(secondary),
            exclude,
            policy,
            exclude_re,
        }
    }

    fn excluded_by(&self, text: &str) -> Option<&String> {
        self.exclude_re
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(w, _)| w)
    }

    /// Classify title + description text coming from `source`.
    pub fn evaluate(&self, title: &str, description: &str, source: &FeedSource) -> Verdict {
        let text = format!("{} {}", title, description).to_lowercase();

        if let Some(w) = self.excluded_by(&text) {
            return Verdict::Excluded(w.clone());
        }
        if let Some(w) = first_hit(&text, &self.primary) {
            return Verdict::Primary(w.clone());
        }

        let secondary = first_hit(&text, &self.secondary);
        match &self.policy {
            FallbackPolicy::AnySecondaryOrSpecialized => match secondary {
                Some(w) => Verdict::Secondary(w.clone()),
                None if source.specialized => Verdict::SpecializedSource,
                None => Verdict::NoMatch,
            },
            FallbackPolicy::SecondaryAndInnovation(innovation) => {
                match (secondary, first_hit(&text, innovation)) {
                    (Some(s), Some(i)) => Verdict::SecondaryWithInnovation {
                        secondary: s.clone(),
                        innovation: i.clone(),
                    },
                    _ => Verdict::NoMatch,
                }
            }
        }
    }

    pub fn is_relevant(&self, title: &str, description: &str, source: &FeedSource) -> bool {
        self.evaluate(title, description, source).accepted()
    }
}
