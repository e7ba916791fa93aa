// src/ingest/category.rs
//! Content-based category scoring.

use regex::Regex;
use tracing::debug;

/// Ordered (category, patterns) table. Declaration order is the tie-break.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<(&'static str, Vec<Regex>)>,
}

impl CategoryRules {
    /// Build from case-insensitive regex fragments. Fragments that fail to
    /// compile are skipped with a debug log.
    pub fn new(table: &[(&'static str, &[&str])]) -> Self {
        let rules = table
            .iter()
            .map(|(cat, patterns)| {
                let compiled = patterns
                    .iter()
                    .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            debug!(target: "ingest", category = *cat, pattern = *p, error = %e, "skipping category pattern");
                            None
                        }
                    })
                    .collect();
                (*cat, compiled)
            })
            .collect();
        Self { rules }
    }

    /// Per-category count of matching patterns, in declaration order.
    pub fn scores(&self, text: &str) -> Vec<(&'static str, usize)> {
        self.rules
            .iter()
            .map(|(cat, res)| (*cat, res.iter().filter(|re| re.is_match(text)).count()))
            .collect()
    }

    /// Strictly highest scoring category; among equal scores the first declared
    /// wins. `None` when nothing scores above zero.
    pub fn detect(&self, title: &str, description: &str) -> Option<&'static str> {
        let text = format!("{} {}", title, description);
        let mut best: Option<(&'static str, usize)> = None;
        for (cat, score) in self.scores(&text) {
            if score == 0 {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((cat, score)),
            }
        }
        best.map(|(cat, _)| cat)
    }
}
