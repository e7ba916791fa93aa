// src/ingest/providers/windows.rs
//! Windows / Microsoft updates.

use crate::ingest::category::CategoryRules;
use crate::ingest::extract::{extract_kb_number, extract_severity, extract_windows_version};
use crate::ingest::relevance::{FallbackPolicy, KeywordTiers};
use crate::ingest::translate::PhraseSubstitutionTable;
use crate::ingest::types::{FeedSource, Topic, TopicProfile, Update};

pub const CATEGORIES: &[&str] = &["particuliers", "serveur", "security", "entreprise", "iot"];

/// Scoring lists; the order here is the tie-break order.
const CATEGORY_TABLE: &[(&str, &[&str])] = &[
    (
        "security",
        &[
            r"\bcve-\d{4}-\d+",
            r"vuln[ée]rab",
            r"\bfailles?\b",
            r"\bexploit",
            r"\bzero[- ]day\b",
            r"\bpatch tuesday\b",
            r"(?:security update|correctif de s[ée]curit[ée]|mise à jour de s[ée]curit[ée])",
            r"\b(?:malware|ransomware|ran[çc]ongiciel)",
            r"\bmsrc\b",
            r"\bdefender\b",
            r"\b(?:attaque|attack)s?\b",
        ],
    ),
    (
        "serveur",
        &[
            r"\bwindows server\b",
            r"\bhyper-v\b",
            r"\bactive directory\b",
            r"\biis\b",
            r"\bexchange server\b",
            r"\bsql server\b",
            r"\bdatacenter\b",
            r"\bhotpatch",
            r"\bserver core\b",
            r"\bfailover cluster",
        ],
    ),
    (
        "iot",
        &[
            r"\biot\b",
            r"internet (?:des objets|of things)",
            r"\b(?:embedded|embarqu[ée]s?)\b",
            r"\bedge devices?\b",
            r"\braspberry\b",
        ],
    ),
    (
        "particuliers",
        &[
            r"\bwindows 1[01]\b",
            r"\bcopilot\b",
            r"\binsider\b",
            r"\b(?:fonctionnalit[ée]s?|features?)\b",
            r"\b(?:notepad|bloc-notes|paint)\b",
            r"\b(?:start menu|menu d[ée]marrer)\b",
            r"\b(?:grand public|consumers?)\b",
        ],
    ),
    (
        "entreprise",
        &[
            r"\b(?:entreprises?|enterprise)\b",
            r"\bintune\b",
            r"\bmicrosoft 365\b",
            r"\bautopilot\b",
            r"\bwindows 365\b",
            r"\b(?:gpo|strat[ée]gie de groupe|group policy)\b",
            r"\bltsc\b",
            r"\b(?:deployment|d[ée]ploiement)\b",
        ],
    ),
];

const TAG_TABLE: &[(&str, &[&str])] = &[
    ("windows-11", &["windows 11"]),
    ("windows-10", &["windows 10"]),
    ("windows-server", &["windows server"]),
    ("security", &["security", "sécurité", "cve-", "vulnerab", "vulnérab", "faille", "exploit"]),
    ("patch-tuesday", &["patch tuesday"]),
    ("update", &["update", "mise à jour", "mises à jour"]),
    ("azure", &["azure"]),
    ("active-directory", &["active directory", "entra id"]),
    ("hyper-v", &["hyper-v"]),
    ("microsoft-365", &["microsoft 365", "office 365"]),
    ("copilot", &["copilot"]),
    ("defender", &["defender"]),
    ("powershell", &["powershell"]),
    ("intune", &["intune"]),
    ("iot", &["iot", "internet des objets", "internet of things"]),
];

const PHRASES: &[(&str, &str)] = &[
    ("we are excited to announce", "nous sommes ravis d'annoncer"),
    ("we're excited to announce", "nous sommes ravis d'annoncer"),
    ("remote code execution", "exécution de code à distance"),
    ("elevation of privilege", "élévation de privilèges"),
    ("denial of service", "déni de service"),
    ("security update", "mise à jour de sécurité"),
    ("security updates", "mises à jour de sécurité"),
    ("cumulative update", "mise à jour cumulative"),
    ("out-of-band", "hors bande"),
    ("release notes", "notes de version"),
    ("known issues", "problèmes connus"),
    ("known issue", "problème connu"),
    ("now available", "désormais disponible"),
    ("learn more", "en savoir plus"),
    ("vulnerabilities", "vulnérabilités"),
    ("vulnerability", "vulnérabilité"),
    ("updates", "mises à jour"),
    ("update", "mise à jour"),
    ("servers", "serveurs"),
    ("server", "serveur"),
    ("features", "fonctionnalités"),
    ("feature", "fonctionnalité"),
    ("available", "disponible"),
    ("security", "sécurité"),
    ("fixes", "correctifs"),
    ("fix", "correctif"),
    ("patch", "correctif"),
    ("devices", "appareils"),
    ("device", "appareil"),
    ("users", "utilisateurs"),
    ("preview", "aperçu"),
    ("critical", "critique"),
    ("release", "version"),
];

pub struct WindowsTopic {
    keywords: KeywordTiers,
    rules: CategoryRules,
    phrases: PhraseSubstitutionTable,
}

impl WindowsTopic {
    pub fn new() -> Self {
        Self {
            keywords: KeywordTiers::new(
                &[
                    "windows server",
                    "windows 11",
                    "windows 10",
                    "windows update",
                    "microsoft",
                    "patch tuesday",
                    "hyper-v",
                    "active directory",
                    "defender",
                ],
                &[
                    "windows",
                    "security",
                    "sécurité",
                    "update",
                    "mise à jour",
                    "infrastructure",
                    "server",
                    "serveur",
                    "vulnerab",
                    "vulnérab",
                    "cve-",
                    "driver",
                    "pilote",
                ],
                &["xbox", "game pass", "gaming", "jeux vidéo", "surface duo"],
                FallbackPolicy::AnySecondaryOrSpecialized,
            ),
            rules: CategoryRules::new(CATEGORY_TABLE),
            phrases: PhraseSubstitutionTable::new(PHRASES),
        }
    }
}

impl Default for WindowsTopic {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicProfile for WindowsTopic {
    fn topic(&self) -> Topic {
        Topic::Windows
    }

    fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    fn security_category(&self) -> Option<&'static str> {
        Some("security")
    }

    fn max_description_len(&self) -> usize {
        800
    }

    fn french_threshold(&self) -> usize {
        3
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
        update.version = extract_windows_version(text);
        update.kb_number = extract_kb_number(text);
        update.severity = extract_severity(text);
    }

    fn default_sources(&self) -> Vec<FeedSource> {
        vec![
            FeedSource::new("windows-blog", "Windows Blog", "https://blogs.windows.com/feed/", "particuliers")
                .specialized(),
            FeedSource::new(
                "msrc",
                "Microsoft Security Response Center",
                "https://api.msrc.microsoft.com/update-guide/rss",
                "security",
            )
            .specialized(),
            FeedSource::new(
                "windows-server",
                "Windows Server Blog",
                "https://techcommunity.microsoft.com/t5/s/gxcuf89792/rss/board?board.id=Windows-Server-Blog",
                "serveur",
            )
            .specialized(),
            FeedSource::new(
                "windows-iot",
                "Windows IoT Blog",
                "https://techcommunity.microsoft.com/t5/s/gxcuf89792/rss/board?board.id=IoTBlog",
                "iot",
            )
            .specialized(),
            FeedSource::new("bleepingcomputer", "BleepingComputer", "https://www.bleepingcomputer.com/feed/", "security"),
            FeedSource::new(
                "lemondeinformatique",
                "Le Monde Informatique",
                "https://www.lemondeinformatique.fr/flux-rss/thematique/systemes-d-exploitation/rss.xml",
                "entreprise",
            )
            .french(),
        ]
    }
}
