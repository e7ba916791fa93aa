// src/ingest/providers/cloud.rs
//! Cloud computing news.

use crate::ingest::category::CategoryRules;
use crate::ingest::extract::{extract_cloud_provider, extract_service_type};
use crate::ingest::relevance::{FallbackPolicy, KeywordTiers};
use crate::ingest::translate::PhraseSubstitutionTable;
use crate::ingest::types::{FeedSource, Topic, TopicProfile, Update};

pub const CATEGORIES: &[&str] = &["cloud", "securite", "infrastructure", "devops"];

const CATEGORY_TABLE: &[(&str, &[&str])] = &[
    (
        "cloud",
        &[
            r"\bcloud\b",
            r"\b(?:saas|paas|iaas)\b",
            r"\bmigrat",
            r"\bmulti-?cloud\b",
            r"\b(?:hybrid|hybride)\b",
            r"\b(?:pricing|tarif)",
        ],
    ),
    (
        "securite",
        &[
            r"\bs[ée]curit[ée]\b|\bsecurity\b",
            r"vuln[ée]rab",
            r"\b(?:iam|identity|identit[ée])\b",
            r"\bzero trust\b",
            r"\b(?:compliance|conformit[ée])\b",
            r"\b(?:encryption|chiffrement)\b",
            r"\b(?:breach|fuite de donn[ée]es)\b",
            r"\bransomware\b",
        ],
    ),
    (
        "infrastructure",
        &[
            r"\b(?:data ?cent(?:er|re)s?|centres? de donn[ée]es)\b",
            r"\b(?:regions?|r[ée]gions?)\b",
            r"\b(?:network|r[ée]seau)",
            r"\b(?:storage|stockage)\b",
            r"\bcompute\b",
            r"\b(?:virtual machines?|machines? virtuelles?)\b",
            r"\bbare[- ]metal\b",
            r"\bgpus?\b",
        ],
    ),
    (
        "devops",
        &[
            r"\bdevops\b",
            r"\bkubernetes\b",
            r"\b(?:docker|containers?|conteneurs?)\b",
            r"\bci/cd\b",
            r"\bterraform\b",
            r"\bgitops\b",
            r"\bpipelines?\b",
            r"\b(?:observability|observabilit[ée])\b",
        ],
    ),
];

const TAG_TABLE: &[(&str, &[&str])] = &[
    ("aws", &["aws", "amazon web services"]),
    ("azure", &["azure"]),
    ("gcp", &["google cloud", "gcp"]),
    ("ovh", &["ovh"]),
    ("kubernetes", &["kubernetes", "k8s"]),
    ("serverless", &["serverless", "sans serveur", "lambda"]),
    (
        "ia",
        &["artificial intelligence", "intelligence artificielle", "machine learning", "generative", "génératif", "llm"],
    ),
    ("security", &["security", "sécurité", "vulnerab", "vulnérab"]),
    ("devops", &["devops", "ci/cd", "gitops"]),
    ("database", &["database", "base de données", "bases de données"]),
    ("storage", &["storage", "stockage"]),
    ("multicloud", &["multicloud", "multi-cloud"]),
    ("souverainete", &["souverain", "sovereign", "secnumcloud"]),
];

const PHRASES: &[(&str, &str)] = &[
    ("we're excited to announce", "nous sommes ravis d'annoncer"),
    ("we are excited to announce", "nous sommes ravis d'annoncer"),
    ("generally available", "disponible pour tous"),
    ("now available", "désormais disponible"),
    ("cloud computing", "informatique en nuage"),
    ("cloud provider", "fournisseur cloud"),
    ("artificial intelligence", "intelligence artificielle"),
    ("machine learning", "apprentissage automatique"),
    ("virtual machines", "machines virtuelles"),
    ("virtual machine", "machine virtuelle"),
    ("data centers", "centres de données"),
    ("data center", "centre de données"),
    ("datacenter", "centre de données"),
    ("databases", "bases de données"),
    ("database", "base de données"),
    ("learn more", "en savoir plus"),
    ("serverless", "sans serveur"),
    ("containers", "conteneurs"),
    ("container", "conteneur"),
    ("compliance", "conformité"),
    ("customers", "clients"),
    ("announces", "annonce"),
    ("launches", "lance"),
    ("security", "sécurité"),
    ("storage", "stockage"),
    ("network", "réseau"),
    ("pricing", "tarification"),
    ("regions", "régions"),
    ("region", "région"),
];

pub struct CloudTopic {
    keywords: KeywordTiers,
    rules: CategoryRules,
    phrases: PhraseSubstitutionTable,
}

impl CloudTopic {
    pub fn new() -> Self {
        Self {
            keywords: KeywordTiers::new(
                &[
                    "cloud", "aws", "azure", "google cloud", "gcp", "ovh", "kubernetes", "saas", "paas",
                    "iaas", "serverless",
                ],
                &[
                    "infrastructure",
                    "datacenter",
                    "data center",
                    "centre de données",
                    "devops",
                    "container",
                    "conteneur",
                    "virtualization",
                    "virtualisation",
                    "storage",
                    "stockage",
                ],
                &["crypto", "cryptocurrency", "cryptomonnaie", "bitcoin", "nft", "gaming"],
                FallbackPolicy::AnySecondaryOrSpecialized,
            ),
            rules: CategoryRules::new(CATEGORY_TABLE),
            phrases: PhraseSubstitutionTable::new(PHRASES),
        }
    }
}

impl Default for CloudTopic {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicProfile for CloudTopic {
    fn topic(&self) -> Topic {
        Topic::Cloud
    }

    fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    fn security_category(&self) -> Option<&'static str> {
        Some("securite")
    }

    fn max_description_len(&self) -> usize {
        1000
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

    fn extract_metadata(&self, text: &str, source: &FeedSource, update: &mut Update) {
        update.service_type = extract_service_type(text);
        update.cloud_provider = extract_cloud_provider(text, source.provider.as_deref());
    }

    fn default_sources(&self) -> Vec<FeedSource> {
        vec![
            FeedSource::new("aws", "AWS News Blog", "https://aws.amazon.com/blogs/aws/feed/", "cloud")
                .specialized()
                .with_provider("AWS"),
            FeedSource::new("azure", "Azure Blog", "https://azure.microsoft.com/en-us/blog/feed/", "cloud")
                .specialized()
                .with_provider("Azure"),
            FeedSource::new("gcp", "Google Cloud Blog", "https://cloudblog.withgoogle.com/rss/", "cloud")
                .specialized()
                .with_provider("GCP"),
            FeedSource::new("ovh", "OVHcloud Blog", "https://blog.ovhcloud.com/feed/", "infrastructure")
                .specialized()
                .with_provider("OVH"),
            FeedSource::new("cncf", "CNCF", "https://www.cncf.io/feed/", "devops").specialized(),
            FeedSource::new("lemagit-cloud", "LeMagIT Cloud", "https://www.lemagit.fr/rss/Cloud-Computing.xml", "cloud")
                .french(),
        ]
    }
}
