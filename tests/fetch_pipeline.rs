// tests/fetch_pipeline.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use veille_rss::ingest::fetcher::FeedFetcher;
use veille_rss::ingest::providers::{cloud::CloudTopic, starlink::StarlinkTopic, windows::WindowsTopic};
use veille_rss::ingest::transport::StaticTransport;
use veille_rss::ingest::types::FeedSource;

const WINDOWS_RSS: &str = include_str!("fixtures/windows_rss.xml");
const STARLINK_RSS: &str = include_str!("fixtures/starlink_rss.xml");
const CLOUD_ATOM: &str = include_str!("fixtures/cloud_atom.xml");

fn rss(items: &[(&str, &str, &str, &str)]) -> String {
    let mut body = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>"#);
    for (title, link, desc, date) in items {
        body.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><description>{desc}</description><pubDate>{date}</pubDate></item>"
        ));
    }
    body.push_str("</channel></rss>");
    body
}

fn windows_fetcher(transport: StaticTransport, sources: Vec<FeedSource>) -> FeedFetcher {
    FeedFetcher::new(Arc::new(WindowsTopic::new()), Arc::new(transport))
        .with_sources(sources)
        .with_delay(Duration::ZERO)
}

#[tokio::test]
async fn windows_feed_end_to_end() {
    let url = "https://news.example.test/feed";
    let src = FeedSource::new("news", "Security News", url, "security");
    let fetcher = windows_fetcher(StaticTransport::new().with(url, 200, WINDOWS_RSS), vec![src]);

    let out = fetcher.fetch_all_feeds().await;
    assert_eq!(out.len(), 1, "gaming item is excluded, linkless item dropped");

    let u = &out[0];
    assert_eq!(u.category, "security");
    assert_eq!(u.kb_number.as_deref(), Some("KB1234567"));
    assert_eq!(u.severity.as_deref(), Some("Critical"));
    assert_eq!(u.version.as_deref(), Some("Windows 11"));
    assert_eq!(u.source, "Security News");
    assert_eq!(u.link, "https://news.example.test/2025/06/kb1234567");
    assert_eq!(u.published_date, Utc.with_ymd_and_hms(2025, 6, 10, 17, 0, 0).unwrap());
    assert_eq!(u.id.len(), 16);
    assert!(u.tags.contains(&"security".to_string()));
    assert!(u.tags.contains(&"windows-11".to_string()));
    // english source: phrase table applied
    assert!(u.title.contains("mise à jour de sécurité"), "{}", u.title);
    assert!(!u.description.contains('<'));
    assert!(u.description.chars().count() <= 800);
}

#[tokio::test]
async fn failing_sources_do_not_abort_the_batch() {
    let ok = "https://ok.test/rss";
    let transport = StaticTransport::new()
        .with(ok, 200, WINDOWS_RSS)
        .unreachable("https://down.test/rss");
    let sources = vec![
        FeedSource::new("missing", "Missing", "https://missing.test/rss", "security"),
        FeedSource::new("down", "Down", "https://down.test/rss", "security"),
        FeedSource::new("ok", "Ok", ok, "security"),
    ];
    let transport = Arc::new(transport);
    let fetcher = FeedFetcher::new(Arc::new(WindowsTopic::new()), transport.clone())
        .with_sources(sources)
        .with_delay(Duration::ZERO);

    let out = fetcher.fetch_all_feeds().await;
    assert_eq!(out.len(), 1);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn unknown_source_key_yields_nothing() {
    let fetcher = windows_fetcher(StaticTransport::new(), Vec::new());
    assert!(fetcher.fetch_feed("nope").await.is_empty());
}

#[tokio::test]
async fn garbage_body_yields_empty_list() {
    let url = "https://junk.test/rss";
    let fetcher = windows_fetcher(
        StaticTransport::new().with(url, 200, "<html><body>Service Unavailable"),
        vec![FeedSource::new("junk", "Junk", url, "security").specialized()],
    );
    assert!(fetcher.fetch_all_feeds().await.is_empty());
}

#[tokio::test]
async fn title_prefix_dedup_across_sources_keeps_newest() {
    let a = "https://a.test/rss";
    let b = "https://b.test/rss";
    let older = rss(&[(
        "Windows Server 2025 hotpatching is now generally available (blog)",
        "https://a.test/1",
        "Hotpatch for Windows Server.",
        "Mon, 09 Jun 2025 08:00:00 GMT",
    )]);
    let newer = rss(&[(
        "Windows Server 2025 hotpatching is now generally available - news",
        "https://b.test/1",
        "Hotpatch for Windows Server.",
        "Tue, 10 Jun 2025 08:00:00 GMT",
    )]);
    let fetcher = windows_fetcher(
        StaticTransport::new().with(a, 200, &older).with(b, 200, &newer),
        vec![
            FeedSource::new("a", "A", a, "serveur").specialized(),
            FeedSource::new("b", "B", b, "serveur").specialized(),
        ],
    );

    let out = fetcher.fetch_all_feeds().await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].link, "https://b.test/1");
    assert_eq!(out[0].category, "serveur");
}

#[tokio::test]
async fn results_are_sorted_newest_first() {
    let url = "https://s.test/rss";
    let body = rss(&[
        ("Windows 10 update one", "https://s.test/1", "x", "Mon, 02 Jun 2025 08:00:00 GMT"),
        ("Windows 10 update three", "https://s.test/3", "x", "Wed, 04 Jun 2025 08:00:00 GMT"),
        ("Windows 10 update two", "https://s.test/2", "x", "Tue, 03 Jun 2025 08:00:00 GMT"),
    ]);
    let fetcher = windows_fetcher(
        StaticTransport::new().with(url, 200, &body),
        vec![FeedSource::new("s", "S", url, "particuliers")],
    );
    let links: Vec<String> = fetcher.fetch_all_feeds().await.into_iter().map(|u| u.link).collect();
    assert_eq!(links, vec!["https://s.test/3", "https://s.test/2", "https://s.test/1"]);
}

#[tokio::test]
async fn french_sources_and_french_text_pass_through() {
    let fr_url = "https://fr.test/rss";
    let en_url = "https://en.test/rss";
    let fr_title = "Windows 11 : la nouvelle mise à jour de sécurité est disponible";
    let fr_body = rss(&[(fr_title, "https://fr.test/1", "Microsoft corrige des failles.", "Mon, 09 Jun 2025 08:00:00 GMT")]);
    // French text on a source declared English: detected, not re-translated
    let en_title = "Windows Server : les correctifs de sécurité sont disponibles pour les administrateurs";
    let en_body = rss(&[(en_title, "https://en.test/1", "Une mise à jour avec des correctifs.", "Mon, 09 Jun 2025 09:00:00 GMT")]);

    let fetcher = windows_fetcher(
        StaticTransport::new().with(fr_url, 200, &fr_body).with(en_url, 200, &en_body),
        vec![
            FeedSource::new("fr", "FR", fr_url, "entreprise").french(),
            FeedSource::new("en", "EN", en_url, "serveur"),
        ],
    );
    let out = fetcher.fetch_all_feeds().await;
    assert_eq!(out.len(), 2);
    let titles: Vec<&str> = out.iter().map(|u| u.title.as_str()).collect();
    assert!(titles.contains(&fr_title));
    assert!(titles.contains(&en_title));
}

#[tokio::test]
async fn english_text_is_relabelled() {
    let url = "https://en.test/rss";
    let body = rss(&[(
        "Security update now available",
        "https://en.test/1",
        "Known issues are listed in the release notes.",
        "Mon, 09 Jun 2025 08:00:00 GMT",
    )]);
    let fetcher = windows_fetcher(
        StaticTransport::new().with(url, 200, &body),
        vec![FeedSource::new("en", "EN", url, "security")],
    );
    let out = fetcher.fetch_all_feeds().await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "Mise à jour de sécurité désormais disponible");
    assert_eq!(
        out[0].description,
        "Problèmes connus are listed in the notes de version."
    );
}

#[tokio::test]
async fn exclusion_beats_primary_keyword() {
    let url = "https://x.test/rss";
    let body = rss(&[(
        "Microsoft brings Game Pass to Windows 11 handhelds",
        "https://x.test/1",
        "Xbox news.",
        "Mon, 09 Jun 2025 08:00:00 GMT",
    )]);
    let fetcher = windows_fetcher(
        StaticTransport::new().with(url, 200, &body),
        vec![FeedSource::new("x", "X", url, "particuliers").specialized()],
    );
    assert!(fetcher.fetch_all_feeds().await.is_empty());
}

#[tokio::test]
async fn specialized_source_accepts_items_without_keywords() {
    let url = "https://x.test/rss";
    let body = rss(&[("Quarterly roadmap", "https://x.test/1", "What is next.", "Mon, 09 Jun 2025 08:00:00 GMT")]);

    let plain = windows_fetcher(
        StaticTransport::new().with(url, 200, &body),
        vec![FeedSource::new("x", "X", url, "iot")],
    );
    assert!(plain.fetch_all_feeds().await.is_empty());

    let specialized = windows_fetcher(
        StaticTransport::new().with(url, 200, &body),
        vec![FeedSource::new("x", "X", url, "iot").specialized()],
    );
    let out = specialized.fetch_all_feeds().await;
    assert_eq!(out.len(), 1);
    // no category rule fires, declared category is used
    assert_eq!(out[0].category, "iot");
}

#[tokio::test]
async fn security_refresh_only_hits_security_sources() {
    let sec = "https://sec.test/rss";
    let other = "https://other.test/rss";
    let transport = Arc::new(
        StaticTransport::new()
            .with(sec, 200, WINDOWS_RSS)
            .with(other, 200, WINDOWS_RSS),
    );
    let fetcher = FeedFetcher::new(Arc::new(WindowsTopic::new()), transport.clone())
        .with_sources(vec![
            FeedSource::new("sec", "Sec", sec, "security"),
            FeedSource::new("other", "Other", other, "particuliers"),
        ])
        .with_delay(Duration::ZERO);

    let out = fetcher.fetch_security_feeds().await;
    assert_eq!(out.len(), 1);
    assert!(out.iter().all(|u| u.category == "security"));
    let calls = transport.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![sec.to_string()]);
}

#[tokio::test]
async fn starlink_feed_applies_strict_gate_and_extractors() {
    let url = "https://space.test/rss";
    let fetcher = FeedFetcher::new(
        Arc::new(StarlinkTopic::new()),
        Arc::new(StaticTransport::new().with(url, 200, STARLINK_RSS)),
    )
    .with_sources(vec![FeedSource::new("space", "Space Desk", url, "space")])
    .with_delay(Duration::ZERO);

    let out = fetcher.fetch_all_feeds().await;
    assert_eq!(out.len(), 1, "tesla item excluded, generic rollout rejected");
    let u = &out[0];
    assert_eq!(u.category, "launch");
    assert_eq!(u.mission.as_deref(), Some("Starlink 6-77"));
    assert_eq!(u.satellite_count, Some(23));
    assert!(u.tags.contains(&"starlink".to_string()));
    assert!(u.tags.contains(&"falcon-9".to_string()));
    assert!(u.description.contains("atterrissage du booster"), "{}", u.description);

    // no security category on this topic
    assert!(fetcher.fetch_security_feeds().await.is_empty());
}

#[tokio::test]
async fn cloud_atom_feed_is_understood() {
    let url = "https://cloud.test/atom";
    let fetcher = FeedFetcher::new(
        Arc::new(CloudTopic::new()),
        Arc::new(StaticTransport::new().with(url, 200, CLOUD_ATOM)),
    )
    .with_sources(vec![FeedSource::new("blog", "Cloud Blog", url, "cloud").with_provider("GCP")])
    .with_delay(Duration::ZERO);

    let out = fetcher.fetch_all_feeds().await;
    assert_eq!(out.len(), 1);
    let u = &out[0];
    assert_eq!(u.link, "https://cloud.example.test/serverless");
    assert_eq!(u.published_date, Utc.with_ymd_and_hms(2025, 6, 11, 8, 0, 0).unwrap());
    assert_eq!(u.service_type.as_deref(), Some("PaaS"));
    // named in the text, wins over the declared provider
    assert_eq!(u.cloud_provider.as_deref(), Some("AWS"));
    assert!(u.description.starts_with("Deploy Lambda"), "{}", u.description);
}

#[tokio::test]
async fn malformed_item_does_not_sink_its_neighbours() {
    let url = "https://broken.test/rss";
    let body = r#"<rss><channel>
<item><title>Windows 11 update ships</title><link>https://broken.test/1</link><pubDate>Mon, 09 Jun 2025 08:00:00 GMT</pubDate></item>
<item><title>Broken item</title><link>https://broken.test/2</link><description><!-- unterminated comment</description></item>
<item><title>Windows Server update ships</title><link>https://broken.test/3</link><pubDate>Mon, 09 Jun 2025 07:00:00 GMT</pubDate></item>
</channel></rss>"#;
    let fetcher = windows_fetcher(
        StaticTransport::new().with(url, 200, body),
        vec![FeedSource::new("b", "B", url, "particuliers")],
    );
    let links: Vec<String> = fetcher.fetch_all_feeds().await.into_iter().map(|u| u.link).collect();
    assert!(links.contains(&"https://broken.test/1".to_string()));
    assert!(links.contains(&"https://broken.test/3".to_string()));
    assert!(!links.contains(&"https://broken.test/2".to_string()));
}
