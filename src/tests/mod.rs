use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use reqwest::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::http::scripted::{self, ScriptedTransport};
use crate::http::{ClientConfig, HttpClient, HttpTransport, ProbeMethod, ProbeRequest, TransportError};
use crate::models::{Finding, FindingSeverity, InjectionPoint, RedirectMethod, Severity};
use crate::payloads::PayloadSet;
use crate::redirect::{BodySignal, Resolver};
use crate::runner::{Options, Runner};
use crate::scanner::{ScanConfig, Scanner};

fn query_value(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn vulnerable(findings: &[Finding]) -> Vec<&Finding> {
    findings.iter().filter(|f| f.vulnerable).collect()
}

#[tokio::test]
async fn forwarded_host_reflection_is_reported_as_header_injection() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.url.starts_with("http://evil.com") {
            return scripted::page(&req.url, 200, "evil");
        }
        let forwarded = req
            .headers
            .iter()
            .find(|(k, _)| k == "X-Forwarded-Host")
            .map(|(_, v)| v.clone());
        match forwarded {
            Some(host) if !host.contains('/') => {
                scripted::redirect(&req.url, 302, &format!("https://{host}/home"))
            }
            _ => scripted::page(&req.url, 200, "home"),
        }
    }));
    let scanner = Scanner::new(
        transport.clone(),
        ScanConfig {
            test_headers: true,
            params: vec!["unused".to_string()],
            ..ScanConfig::default()
        },
        PayloadSet::builtin(),
    );

    let findings = scanner.scan_target("http://site.test/").await;
    let hits = vulnerable(&findings);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].injection, InjectionPoint::Header("X-Forwarded-Host".to_string()));
    assert_eq!(hits[0].payload, "evil.com");
    assert_eq!(hits[0].method, RedirectMethod::HeaderInjection);
    assert_eq!(hits[0].terminal_location.as_deref(), Some("https://evil.com/home"));
    assert_eq!(hits[0].severity, Some(FindingSeverity::Rated(Severity::High)));
}

#[tokio::test]
async fn bare_host_reflected_into_script_stays_on_site() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.url.starts_with("http://evil.com") {
            return scripted::page(&req.url, 200, "evil");
        }
        let body = match req.headers.iter().find(|(k, _)| k == "X-Forwarded-Host") {
            Some((_, host)) => format!("<script>window.location = \"{host}\"</script>"),
            None => "home".to_string(),
        };
        scripted::page(&req.url, 200, &body)
    }));
    let scanner = Scanner::new(
        transport.clone(),
        ScanConfig {
            test_headers: true,
            params: vec!["unused".to_string()],
            ..ScanConfig::default()
        },
        PayloadSet::builtin(),
    );

    let findings = scanner.scan_target("http://site.test/").await;
    let forwarded = InjectionPoint::Header("X-Forwarded-Host".to_string());
    let bare = findings
        .iter()
        .find(|f| f.injection == forwarded && f.payload == "evil.com")
        .expect("bare host payload was sent");
    assert!(!bare.vulnerable);
    assert_eq!(bare.terminal_location, None);

    let hits = vulnerable(&findings);
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|f| f.injection == forwarded && f.payload != "evil.com"));
    assert!(hits.iter().all(|f| f.method == RedirectMethod::JavaScript));
    let protocol_relative = hits
        .iter()
        .find(|f| f.payload == "//evil.com")
        .expect("protocol-relative payload is reported");
    assert_eq!(protocol_relative.terminal_location.as_deref(), Some("http://evil.com/"));
}

#[tokio::test]
async fn script_scheme_location_from_cookie_is_terminal() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.url.starts_with("http://evil.com") {
            return scripted::page(&req.url, 200, "evil");
        }
        match req.cookies.iter().find(|(k, _)| k == "next_url") {
            Some((_, value)) => scripted::redirect(&req.url, 302, value),
            None => scripted::page(&req.url, 200, "home"),
        }
    }));
    let scanner = Scanner::new(
        transport.clone(),
        ScanConfig {
            params: vec!["unused".to_string()],
            ..ScanConfig::default()
        },
        PayloadSet::builtin(),
    );

    let findings = scanner.scan_target("http://site.test/").await;
    let hits = vulnerable(&findings);
    assert_eq!(hits.len(), 3);
    assert!(hits
        .iter()
        .all(|f| f.injection == InjectionPoint::Cookie("next_url".to_string())));

    let script = hits
        .iter()
        .find(|f| f.payload == "javascript:alert(1)")
        .expect("javascript payload reported");
    assert_eq!(script.terminal_location.as_deref(), Some("javascript:alert(1)"));
    assert_eq!(script.redirect_chain.len(), 1);
    assert_eq!(script.severity, Some(FindingSeverity::Rated(Severity::High)));
    assert!(transport
        .requests()
        .iter()
        .all(|r| !r.url.to_ascii_lowercase().starts_with("javascript:")));
}

#[tokio::test]
async fn reflected_meta_refresh_in_form_post_is_detected() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.url.starts_with("http://evil.com") {
            return scripted::page(&req.url, 200, "evil");
        }
        if req.method == ProbeMethod::Post {
            if let Some((_, value)) = req.form.iter().find(|(k, _)| k == "next") {
                let body = format!(
                    "<html><head><meta http-equiv=\"refresh\" content=\"0;url={value}\"></head></html>"
                );
                return scripted::page(&req.url, 200, &body);
            }
        }
        scripted::page(&req.url, 200, "<form method='post' action='/login'></form>")
    }));
    let scanner = Scanner::new(
        transport.clone(),
        ScanConfig {
            params: vec!["unused".to_string()],
            ..ScanConfig::default()
        },
        PayloadSet::builtin(),
    );

    let findings = scanner.scan_target("http://site.test/login").await;
    let hits = vulnerable(&findings);
    assert_eq!(hits.len(), 3);
    for hit in hits.iter() {
        assert_eq!(hit.injection, InjectionPoint::FormField("next".to_string()));
        assert_eq!(hit.method, RedirectMethod::MetaRefresh);
        assert!(hit.redirect_chain.is_empty());
        assert_eq!(hit.severity, Some(FindingSeverity::Rated(Severity::High)));
    }
    // Every http(s) meta candidate was followed before being trusted.
    assert!(transport
        .requests()
        .iter()
        .any(|r| r.url == "http://evil.com/"));
}

#[tokio::test]
async fn meta_refresh_to_dead_host_is_not_trusted() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.url.starts_with("http://evil.com") {
            return scripted::unreachable(&req.url);
        }
        let body = "<meta http-equiv='refresh' content='0; url=http://evil.com/'>";
        scripted::page(&req.url, 200, body)
    }));
    let resolver = Resolver::new(transport.clone(), 5);
    let outcome = resolver
        .resolve(&ProbeRequest::get("http://site.test/"), |_: &str| true)
        .await;
    assert_eq!(outcome.initial_status, Some(200));
    assert!(outcome.body_redirect.is_none());
    assert!(outcome.terminal.is_none());
}

#[tokio::test]
async fn runner_findings_render_to_every_format() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if !req.url.starts_with("http://site.test") {
            return scripted::page(&req.url, 200, "elsewhere");
        }
        match query_value(&req.url, "next") {
            Some(value) if value != "/home" => scripted::redirect(&req.url, 302, &value),
            _ => scripted::page(&req.url, 200, "login"),
        }
    }));
    let runner = Runner::new(Options {
        urls: vec!["site.test/login?next=/home".to_string(), "site.test/login?next=/home".to_string()],
        params: vec!["next".to_string()],
        ..Options::default()
    })
    .unwrap();

    let report = runner
        .run_with_transport(transport.clone(), ProgressBar::hidden())
        .await
        .unwrap();
    assert_eq!(report.targets, vec!["http://site.test/login?next=/home".to_string()]);
    assert_eq!(report.total_requests, transport.requests().len() as u64);

    let scheme_relative = report
        .vulnerable()
        .find(|f| f.payload == "//evil.com")
        .expect("scheme-relative payload reported");
    assert_eq!(scheme_relative.status, Some(302));
    assert_eq!(scheme_relative.severity, Some(FindingSeverity::Rated(Severity::High)));

    let records = crate::output::build_records(&report.findings, false);
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.vulnerable));

    let json: serde_json::Value =
        serde_json::from_slice(&crate::output::render_json(&records)).unwrap();
    assert_eq!(json.as_array().map(|a| a.len()), Some(records.len()));

    let xml = String::from_utf8(crate::output::render_xml(&records)).unwrap();
    assert!(xml.contains("<payload>//evil.com</payload>"));

    let text = String::from_utf8(crate::output::render_text(&records)).unwrap();
    assert_eq!(text.lines().count(), records.len());
}

#[tokio::test]
async fn callback_host_replaces_attacker_domain() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.url.starts_with("http://cb.test") {
            return scripted::page(&req.url, 200, "callback");
        }
        match query_value(&req.url, "next") {
            Some(value) if value.contains("evil.com") || value.contains("cb.test") => {
                scripted::redirect(&req.url, 302, &value)
            }
            _ => scripted::page(&req.url, 200, "login"),
        }
    }));
    let config = ScanConfig {
        callback_host: Some("cb.test".to_string()),
        params: vec!["next".to_string()],
        ..ScanConfig::default()
    };
    let scanner = Scanner::new(
        transport.clone(),
        config,
        PayloadSet::new(None, Some("cb.test")),
    );

    let findings = scanner.scan_target("http://site.test/login?next=/home").await;
    let hits = vulnerable(&findings);
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|f| !f.payload.contains("evil.com")));
    assert!(transport.requests().iter().all(|r| !r.url.contains("evil.com")));
}

#[tokio::test]
async fn real_client_detects_parameter_redirect_to_callback_server() {
    let site = MockServer::start().await;
    let attacker = MockServer::start().await;
    let callback = attacker.address().to_string();

    Mock::given(method("GET"))
        .and(path("/login"))
        .and(query_param("next", format!("//{callback}").as_str()))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("//{callback}/landing").as_str()),
        )
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("login"))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&attacker)
        .await;

    let runner = Runner::new(Options {
        urls: vec![format!("{}/login?next=/home", site.uri())],
        params: vec!["next".to_string()],
        callback_host: Some(callback.clone()),
        timeout_seconds: 5,
        ..Options::default()
    })
    .unwrap();
    let report = runner.run().await.unwrap();

    let hits: Vec<&Finding> = report.vulnerable().collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload, format!("//{callback}"));
    assert_eq!(hits[0].status, Some(302));
    assert_eq!(
        hits[0].terminal_location.as_deref(),
        Some(format!("{}/landing", attacker.uri()).as_str())
    );
    assert_eq!(hits[0].severity, Some(FindingSeverity::Rated(Severity::High)));
    let evidence = hits[0].evidence_headers.as_ref().unwrap();
    assert_eq!(
        evidence.get("location").map(String::as_str),
        Some(format!("//{callback}/landing").as_str())
    );
    assert!(report.total_requests > 1);
}

#[tokio::test]
async fn real_client_follows_chain_across_servers() {
    let site = MockServer::start().await;
    let attacker = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/b"))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(307).insert_header("Location", format!("{}/final", attacker.uri()).as_str()),
        )
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&attacker)
        .await;

    let client = HttpClient::new(&ClientConfig::default()).unwrap();
    let resolver = Resolver::new(client.into_shared(), 5);
    let outcome = resolver
        .resolve(&ProbeRequest::get(&format!("{}/a", site.uri())), |_: &str| false)
        .await;

    assert_eq!(outcome.initial_status, Some(301));
    assert_eq!(outcome.terminal_status, Some(200));
    assert_eq!(outcome.hops.len(), 2);
    assert_eq!(outcome.hops[0].location, "/b");
    assert_eq!(outcome.terminal.as_deref(), Some(format!("{}/final", attacker.uri()).as_str()));
    assert!(!outcome.incomplete);
}

#[tokio::test]
async fn real_client_resolves_meta_refresh() {
    let site = MockServer::start().await;
    let attacker = MockServer::start().await;
    let body = format!(
        "<html><head><META HTTP-EQUIV=\"Refresh\" CONTENT=\"0; URL={}/landing\"></head></html>",
        attacker.uri()
    );

    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&attacker)
        .await;

    let client = HttpClient::new(&ClientConfig::default()).unwrap();
    let transport = client.into_shared();
    let resolver = Resolver::new(transport.clone(), 5);
    let outcome = resolver
        .resolve(&ProbeRequest::get(&format!("{}/meta", site.uri())), |t: &str| {
            t.ends_with("/landing")
        })
        .await;

    let redirect = outcome.body_redirect.expect("meta refresh detected");
    assert_eq!(redirect.signal, BodySignal::MetaRefresh);
    assert_eq!(outcome.terminal.as_deref(), Some(format!("{}/landing", attacker.uri()).as_str()));
    assert_eq!(transport.requests_sent(), 2);
}

#[tokio::test]
async fn real_client_sends_form_cookie_and_extra_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(header("x-scan", "redirx"))
        .and(header("cookie", "session=abc"))
        .and(body_string_contains("next=http%3A%2F%2Fevil.com"))
        .respond_with(ResponseTemplate::new(201).insert_header("X-Seen", "yes"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&ClientConfig {
        header: Some("X-Scan: redirx".to_string()),
        ..ClientConfig::default()
    })
    .unwrap();
    let request = ProbeRequest::post_form(
        &format!("{}/submit", server.uri()),
        vec![("next".to_string(), "http://evil.com".to_string())],
    )
    .with_cookie("session", "abc");

    let response = client.send(&request).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.header("X-SEEN"), Some("yes"));
    assert_eq!(client.requests_sent(), 1);
}

#[tokio::test]
async fn real_client_reports_timeouts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&ClientConfig {
        timeout_seconds: 1,
        ..ClientConfig::default()
    })
    .unwrap();
    let err = client
        .send(&ProbeRequest::get(&format!("{}/slow", server.uri())))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout { .. }));
}

#[tokio::test]
async fn real_client_caps_large_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(2 * 1024 * 1024)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&ClientConfig::default()).unwrap();
    let response = client
        .send(&ProbeRequest::get(&format!("{}/huge", server.uri())))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.len(), 1024 * 1024);
}

#[tokio::test]
async fn unreachable_target_produces_no_findings() {
    let runner = Runner::new(Options {
        urls: vec!["http://127.0.0.1:1/login?next=/home".to_string()],
        params: vec!["next".to_string()],
        timeout_seconds: 2,
        ..Options::default()
    })
    .unwrap();
    let report = runner.run().await.unwrap();
    assert!(report.findings.is_empty());
    assert!(report.total_requests > 0);
}
