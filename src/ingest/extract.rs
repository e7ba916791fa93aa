// src/ingest/extract.rs
//! Structured field extraction. Every extractor is case-insensitive, walks an
//! ordered pattern list (first match wins) and returns `None` for "unknown".

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(table: &[(&'static str, &str)]) -> Vec<(&'static str, Regex)> {
    table
        .iter()
        .filter_map(|(label, p)| Regex::new(&format!("(?i){p}")).ok().map(|re| (*label, re)))
        .collect()
}

fn first_label(table: &[(&'static str, Regex)], text: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(label, _)| *label)
}

/* ----------------------------
Windows
---------------------------- */

static WINDOWS_VERSIONS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    compile(&[
        ("Windows 11 24H2", r"\bwindows\s+11,?\s+(?:version\s+)?24h2\b"),
        ("Windows 11 23H2", r"\bwindows\s+11,?\s+(?:version\s+)?23h2\b"),
        ("Windows 11", r"\bwindows\s+11\b"),
        ("Windows Server 2025", r"\bwindows\s+server\s+2025\b"),
        ("Windows Server 2022", r"\bwindows\s+server\s+2022\b"),
        ("Windows Server 2019", r"\bwindows\s+server\s+2019\b"),
        ("Windows 10", r"\bwindows\s+10\b"),
        ("Microsoft 365", r"\b(?:microsoft|office)\s+365\b"),
        ("Office 2024", r"\boffice\s+(?:ltsc\s+)?2024\b"),
        ("Office 2021", r"\boffice\s+(?:ltsc\s+)?2021\b"),
    ])
});

static RE_KB: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bKB(\d{7})\b").unwrap());

static SEVERITIES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    compile(&[
        ("Critical", r"\b(?:critical|critique|zero-day|0-day)\b"),
        ("Important", r"\b(?:important|importante|high|élevée?)\b"),
        ("Moderate", r"\b(?:moderate|modérée?|medium|moyenne?)\b"),
        ("Low", r"\b(?:low|faible|mineure?)\b"),
    ])
});

pub fn extract_windows_version(text: &str) -> Option<String> {
    first_label(&WINDOWS_VERSIONS, text).map(str::to_string)
}

/// `KB` followed by exactly seven digits, normalised to upper case.
pub fn extract_kb_number(text: &str) -> Option<String> {
    RE_KB.captures(text).map(|c| format!("KB{}", &c[1]))
}

pub fn extract_severity(text: &str) -> Option<String> {
    first_label(&SEVERITIES, text).map(str::to_string)
}

/* ----------------------------
Cloud
---------------------------- */

static SERVICE_TYPES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    compile(&[
        ("SaaS", r"\bsaas\b|software[\s-]as[\s-]a[\s-]service|logiciel en tant que service|\bmicrosoft 365\b|\bsalesforce\b"),
        ("PaaS", r"\bpaas\b|platform[\s-]as[\s-]a[\s-]service|plateforme en tant que service|\bapp service\b|\bapp engine\b|\bkubernetes\b|\baks\b|\beks\b|\bgke\b"),
        ("IaaS", r"\biaas\b|infrastructure[\s-]as[\s-]a[\s-]service|infrastructure en tant que service|virtual machines?|machines? virtuelles?|\bec2\b|compute engine"),
        ("FaaS", r"\bfaas\b|function[\s-]as[\s-]a[\s-]service|serverless|sans serveur|\blambda\b|azure functions|cloud functions"),
    ])
});

static CLOUD_PROVIDERS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    compile(&[
        ("AWS", r"\baws\b|amazon web services|\bec2\b|\bamazon s3\b"),
        ("Azure", r"\bazure\b|microsoft cloud"),
        ("GCP", r"\bgcp\b|google cloud|\bbigquery\b"),
        ("OVH", r"\bovh(?:cloud)?\b"),
        ("IBM", r"\bibm\b"),
        ("Oracle", r"\boracle\b|\boci\b"),
    ])
});

pub fn extract_service_type(text: &str) -> Option<String> {
    first_label(&SERVICE_TYPES, text).map(str::to_string)
}

/// Provider named in the text, else the source's declared provider.
pub fn extract_cloud_provider(text: &str, declared: Option<&str>) -> Option<String> {
    first_label(&CLOUD_PROVIDERS, text)
        .map(str::to_string)
        .or_else(|| declared.map(str::to_string))
}

/* ----------------------------
Starlink
---------------------------- */

static MISSIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bstarlink\s+(?:group\s+)?\d{1,2}-\d{1,3}\b",
        r"(?i)\bgroup\s+\d{1,2}-\d{1,3}\b",
        r"(?i)\b(?:crew|transporter|bandwagon|ax|nrol)-\d{1,3}\b",
        r"(?i)\b(?:integrated\s+)?flight\s+(?:test\s+)?\d{1,2}\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static RE_SAT_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,4})\s+(?:(?:new|more|additional|nouveaux)\s+)?(?:starlink\s+)?satellites?\b").unwrap());

/// Mission name as written in the text, whitespace-collapsed.
pub fn extract_mission_info(text: &str) -> Option<String> {
    MISSIONS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn extract_satellite_count(text: &str) -> Option<u32> {
    RE_SAT_COUNT
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_versions_follow_priority() {
        assert_eq!(
            extract_windows_version("Windows 11, version 24H2 rollout").as_deref(),
            Some("Windows 11 24H2")
        );
        assert_eq!(
            extract_windows_version("windows 11 and windows server 2022").as_deref(),
            Some("Windows 11")
        );
        assert_eq!(
            extract_windows_version("Hotpatch for Windows Server 2025").as_deref(),
            Some("Windows Server 2025")
        );
        assert_eq!(extract_windows_version("macOS Sequoia"), None);
    }

    #[test]
    fn kb_requires_seven_digits() {
        assert_eq!(extract_kb_number("fix in kb5034441").as_deref(), Some("KB5034441"));
        assert_eq!(extract_kb_number("KB12345"), None);
        assert_eq!(extract_kb_number("KB123456789"), None);
    }

    #[test]
    fn severity_maps_french_and_english() {
        assert_eq!(extract_severity("Vulnérabilité critique").as_deref(), Some("Critical"));
        assert_eq!(extract_severity("rated Important").as_deref(), Some("Important"));
        assert_eq!(extract_severity("gravité modérée").as_deref(), Some("Moderate"));
        assert_eq!(extract_severity("risque faible").as_deref(), Some("Low"));
        assert_eq!(extract_severity("no rating"), None);
    }

    #[test]
    fn cloud_service_and_provider() {
        assert_eq!(extract_service_type("Going serverless").as_deref(), Some("FaaS"));
        assert_eq!(extract_service_type("New IaaS region").as_deref(), Some("IaaS"));
        assert_eq!(
            extract_cloud_provider("Amazon Web Services launches", None).as_deref(),
            Some("AWS")
        );
        assert_eq!(
            extract_cloud_provider("A new region", Some("OVH")).as_deref(),
            Some("OVH")
        );
        assert_eq!(extract_cloud_provider("A new region", None), None);
    }

    #[test]
    fn starlink_mission_and_count() {
        assert_eq!(
            extract_mission_info("Falcon 9 launches Starlink 6-77 mission").as_deref(),
            Some("Starlink 6-77")
        );
        assert_eq!(
            extract_mission_info("launch of group 10-12 from Vandenberg").as_deref(),
            Some("group 10-12")
        );
        assert_eq!(extract_satellite_count("deploys 23 Starlink satellites"), Some(23));
        assert_eq!(extract_satellite_count("one satellite"), None);
    }
}
