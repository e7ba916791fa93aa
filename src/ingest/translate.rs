// src/ingest/translate.rs
//! English → French labelling by literal phrase substitution.
//!
//! This is not machine translation. A [`PhraseSubstitutionTable`] holds an
//! ordered list of (phrase, replacement) pairs; matching is case-insensitive,
//! word-bounded, longest phrase first, and happens in a single pass so a
//! replacement is never re-translated. Text with no table entry passes through
//! unchanged, so output is routinely half-English.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Ordered (pattern, replacement) pairs compiled into one alternation.
#[derive(Debug, Clone)]
pub struct PhraseSubstitutionTable {
    re: Option<Regex>,
    replacements: HashMap<String, String>,
}

impl PhraseSubstitutionTable {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut ordered: Vec<(String, String)> = pairs
            .iter()
            .filter(|(p, _)| !p.trim().is_empty())
            .map(|(p, r)| (p.trim().to_lowercase(), r.to_string()))
            .collect();
        // Longest first; stable so equal lengths keep table order
        ordered.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let mut replacements = HashMap::with_capacity(ordered.len());
        let mut alts = Vec::with_capacity(ordered.len());
        for (phrase, repl) in ordered {
            if replacements.contains_key(&phrase) {
                continue;
            }
            alts.push(regex::escape(&phrase).replace(' ', r"\s+"));
            replacements.insert(phrase, repl);
        }

        let re = if alts.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b(?:{})\b", alts.join("|"))).ok()
        };

        Self { re, replacements }
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Substitute every known phrase; unknown text is left alone.
    pub fn apply(&self, text: &str) -> String {
        let Some(re) = &self.re else {
            return text.to_string();
        };
        re.replace_all(text, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            let key = collapse_ws(&matched.to_lowercase());
            match self.replacements.get(&key) {
                Some(repl) => match_case(matched, repl),
                None => matched.to_string(),
            }
        })
        .into_owned()
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Carry a leading capital over to the replacement.
fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Common French function words and auxiliary forms.
const FRENCH_INDICATORS: &[&str] = &[
    "le", "la", "les", "des", "du", "une", "est", "sont", "avec", "pour", "dans", "sur",
    "par", "qui", "que", "nous", "vous", "été", "être", "avoir", "ont", "cette", "ces",
    "aux", "mais", "également", "nouvelle", "nouveau", "mise à jour",
];

static RE_FRENCH: Lazy<Vec<Regex>> = Lazy::new(|| {
    FRENCH_INDICATORS
        .iter()
        .filter_map(|w| Regex::new(&format!(r"(?i)(?:^|[^\p{{L}}]){}(?:$|[^\p{{L}}])", regex::escape(w))).ok())
        .collect()
});

/// Number of distinct French indicators present in `text`.
pub fn french_indicator_count(text: &str) -> usize {
    RE_FRENCH.iter().filter(|re| re.is_match(text)).count()
}

/// Heuristic: true once at least `threshold` distinct indicators appear.
/// Not a language detector; both false positives and negatives happen.
pub fn is_french_content(text: &str, threshold: usize) -> bool {
    french_indicator_count(text) >= threshold.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PhraseSubstitutionTable {
        PhraseSubstitutionTable::new(&[
            ("cloud", "nuage"),
            ("cloud computing", "informatique en nuage"),
            ("security update", "mise à jour de sécurité"),
            ("update", "mise à jour"),
        ])
    }

    #[test]
    fn longest_phrase_wins() {
        let out = table().apply("Cloud computing trends");
        assert_eq!(out, "Informatique en nuage trends");
    }

    #[test]
    fn respects_word_boundaries() {
        let out = table().apply("updated clouds");
        assert_eq!(out, "updated clouds");
    }

    #[test]
    fn single_pass_does_not_retranslate() {
        let out = table().apply("New security update");
        assert_eq!(out, "New mise à jour de sécurité");
    }

    #[test]
    fn whitespace_inside_phrase_is_flexible() {
        let out = table().apply("cloud\n  computing");
        assert_eq!(out, "informatique en nuage");
    }

    #[test]
    fn french_detection_counts_distinct_indicators() {
        let fr = "Microsoft publie une mise à jour pour les serveurs avec des correctifs";
        assert!(is_french_content(fr, 3));
        let en = "Microsoft ships an update for servers with fixes";
        assert!(!is_french_content(en, 3));
        // accents are part of the word, not a boundary
        assert_eq!(french_indicator_count("étéole"), 0);
    }

    #[test]
    fn empty_table_passes_through() {
        let t = PhraseSubstitutionTable::new(&[]);
        assert!(t.is_empty());
        assert_eq!(t.apply("anything"), "anything");
    }
}
