// src/ingest/providers/starlink.rs
//! Starlink / SpaceX news. Sources here are broad space-news feeds, so the
//! relevance gate is strict: a secondary space keyword alone is not enough.

use crate::ingest::category::CategoryRules;
use crate::ingest::extract::{extract_mission_info, extract_satellite_count};
use crate::ingest::relevance::{FallbackPolicy, KeywordTiers};
use crate::ingest::translate::PhraseSubstitutionTable;
use crate::ingest::types::{FeedSource, Topic, TopicProfile, Update};

pub const CATEGORIES: &[&str] = &["spacex", "space", "launch", "satellite"];

const CATEGORY_TABLE: &[(&str, &[&str])] = &[
    (
        "spacex",
        &[
            r"\bspacex\b",
            r"\belon musk\b",
            r"\bstarship\b",
            r"\bgwynne shotwell\b",
            r"\bstarbase\b",
            r"\bdragon\b",
        ],
    ),
    (
        "space",
        &[
            r"\bnasa\b",
            r"\besa\b",
            r"\b(?:iss|space station|station spatiale)\b",
            r"\bmars\b",
            r"\b(?:moon|lune)\b",
            r"\bartemis\b",
            r"\bastronau",
        ],
    ),
    (
        "launch",
        &[
            r"\b(?:launch(?:es|ed)?|lancements?)\b",
            r"\b(?:liftoff|lift-off|d[ée]collage)\b",
            r"\bfalcon (?:9|heavy)\b",
            r"\bboosters?\b",
            r"\b(?:landing|atterrissage)\b",
            r"\bstatic fire\b",
            r"\blaunch pad\b|\bpas de tir\b",
        ],
    ),
    (
        "satellite",
        &[
            r"\bsatellites?\b",
            r"\bconstellation\b",
            r"\b(?:orbit|orbite)\b",
            r"\bstarlink\b",
            r"\binternet\b",
            r"\b(?:bandwidth|d[ée]bit)\b",
            r"\bdirect[- ]to[- ]cell\b",
            r"\b(?:kuiper|oneweb)\b",
        ],
    ),
];

const TAG_TABLE: &[(&str, &[&str])] = &[
    ("starlink", &["starlink"]),
    ("spacex", &["spacex"]),
    ("starship", &["starship"]),
    ("falcon-9", &["falcon 9"]),
    ("launch", &["launch", "lancement", "liftoff", "décollage"]),
    ("satellite", &["satellite"]),
    ("internet", &["internet", "broadband", "haut débit"]),
    ("direct-to-cell", &["direct to cell", "direct-to-cell"]),
    ("nasa", &["nasa"]),
    ("mars", &["mars"]),
    ("iss", &["space station", "station spatiale", " iss "]),
    ("record", &["record"]),
    ("kuiper", &["kuiper"]),
];

const PHRASES: &[(&str, &str)] = &[
    ("satellite constellation", "constellation de satellites"),
    ("low earth orbit", "orbite terrestre basse"),
    ("booster landing", "atterrissage du booster"),
    ("internet service", "service internet"),
    ("space station", "station spatiale"),
    ("flight test", "vol d'essai"),
    ("test flight", "vol d'essai"),
    ("launch pad", "pas de tir"),
    ("successfully", "avec succès"),
    ("spacecraft", "vaisseau spatial"),
    ("astronauts", "astronautes"),
    ("launches", "lance"),
    ("launch", "lancement"),
    ("liftoff", "décollage"),
    ("landing", "atterrissage"),
    ("coverage", "couverture"),
    ("customers", "clients"),
    ("rocket", "fusée"),
    ("orbit", "orbite"),
    ("crew", "équipage"),
    ("users", "utilisateurs"),
    ("space", "espace"),
    ("first", "premier"),
];

pub struct StarlinkTopic {
    keywords: KeywordTiers,
    rules: CategoryRules,
    phrases: PhraseSubstitutionTable,
}

impl StarlinkTopic {
    pub fn new() -> Self {
        Self {
            keywords: KeywordTiers::new(
                &["starlink", "spacex", "starship", "falcon 9", "falcon heavy"],
                &[
                    "satellite",
                    "orbit",
                    "orbite",
                    "space",
                    "spatial",
                    "rocket",
                    "fusée",
                    "launch",
                    "lancement",
                    "constellation",
                ],
                &[
                    "tesla model",
                    "cybertruck",
                    "neuralink",
                    "boring company",
                    "gaming",
                    "twitter",
                    "dogecoin",
                    "crypto",
                    "cryptocurrency",
                    "cryptomonnaie",
                ],
                FallbackPolicy::SecondaryAndInnovation(
                    [
                        "new", "nouveau", "nouvelle", "innovation", "record", "first", "premier",
                        "première", "technology", "technologie", "breakthrough", "internet", "test",
                        "mission",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                ),
            ),
            rules: CategoryRules::new(CATEGORY_TABLE),
            phrases: PhraseSubstitutionTable::new(PHRASES),
        }
    }
}

impl Default for StarlinkTopic {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicProfile for StarlinkTopic {
    fn topic(&self) -> Topic {
        Topic::Starlink
    }

    fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    fn max_description_len(&self) -> usize {
        1000
    }

    fn french_threshold(&self) -> usize {
        2
    }

    fn keywords(&self) -> &KeywordTiers {
        &self.keywords
    }

    fn category_rules(&self) -> &CategoryRules {
        &self.rules
    }

    fn phrase_table(&self) -> &PhraseSubstitutionTable {
        &self.phrases
    }

    fn tag_table(&self) -> &'static [(&'static str, &'static [&'static str])] {
        TAG_TABLE
    }

    fn extract_metadata(&self, text: &str, _source: &FeedSource, update: &mut Update) {
        update.mission = extract_mission_info(text);
        update.satellite_count = extract_satellite_count(text);
    }

    fn default_sources(&self) -> Vec<FeedSource> {
        vec![
            FeedSource::new("teslarati-spacex", "Teslarati SpaceX", "https://www.teslarati.com/category/spacex/feed/", "spacex"),
            FeedSource::new("spacenews", "SpaceNews", "https://spacenews.com/feed/", "space"),
            FeedSource::new("space-com", "Space.com", "https://www.space.com/feeds/all", "space"),
            FeedSource::new("nasaspaceflight", "NASASpaceflight", "https://www.nasaspaceflight.com/feed/", "launch"),
            FeedSource::new("numerama-espace", "Numerama Espace", "https://www.numerama.com/sciences/espace/feed/", "space")
                .french(),
        ]
    }
}
