//! Tests against a scripted local HTTP endpoint standing in for the
//! management API, so requests travel the real client path: readiness
//! gate, rate limiter, HTTP, response decoding.

use reqwest::Url;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use vendure_storyblok_sync::catalog::MemoryCatalog;
use vendure_storyblok_sync::model::{EntityKind, Product, Translation};
use vendure_storyblok_sync::processor::SyncProcessor;
use vendure_storyblok_sync::reconcile::{run_full_sync, RetryPolicy};
use vendure_storyblok_sync::storyblok::{ContentService, StoryblokClient};

/// Request lines with arrival timestamps, in arrival order.
#[derive(Clone, Default)]
struct RequestLog(Arc<Mutex<Vec<(Instant, String)>>>);

impl RequestLog {
    fn push(&self, line: String) {
        self.0.lock().unwrap().push((Instant::now(), line));
    }

    fn entries(&self) -> Vec<(Instant, String)> {
        self.0.lock().unwrap().clone()
    }

    fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, line)| line).collect()
    }
}

/// Serve scripted responses on an ephemeral local port. With
/// `components_listed` false the space reports no component schemas,
/// forcing the client to provision them.
async fn spawn_api(components_listed: bool) -> (SocketAddr, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = RequestLog::default();
    let accept_log = log.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let log = accept_log.clone();
            tokio::spawn(async move {
                if let Some(request_line) = read_request(&mut sock).await {
                    log.push(request_line.clone());
                    let body = respond_to(&request_line, components_listed);
                    let resp = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                }
            });
        }
    });
    (addr, log)
}

/// Read one HTTP request (head plus body) and return its request line.
async fn read_request(sock: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    let header_end = loop {
        let n = sock.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let lower = line.to_ascii_lowercase();
            lower
                .strip_prefix("content-length:")?
                .trim()
                .parse::<usize>()
                .ok()
        })
        .unwrap_or(0);
    let mut body_read = buf.len() - header_end;
    while body_read < content_length {
        let n = sock.read(&mut tmp).await.ok()?;
        if n == 0 {
            break;
        }
        body_read += n;
    }
    head.lines().next().map(str::to_string)
}

fn respond_to(request_line: &str, components_listed: bool) -> String {
    if request_line.contains("/components") {
        if request_line.starts_with("POST") {
            return r#"{"component":{"name":"created"}}"#.into();
        }
        if components_listed {
            return concat!(
                r#"{"components":[{"name":"product"},"#,
                r#"{"name":"product_variant"},{"name":"collection"}]}"#
            )
            .into();
        }
        return r#"{"components":[]}"#.into();
    }
    if request_line.starts_with("POST") || request_line.starts_with("PUT") {
        return concat!(
            r#"{"story":{"id":1,"uuid":"uuid-1","name":"Product 1","#,
            r#""slug":"product-1","content":{}}}"#
        )
        .into();
    }
    r#"{"stories":[]}"#.into()
}

fn client_for(addr: SocketAddr, rate_per_second: u32) -> StoryblokClient {
    let base_url = Url::parse(&format!("http://{}/", addr)).unwrap();
    StoryblokClient::with_base_url(
        "token".into(),
        "1".into(),
        base_url,
        rate_per_second,
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn missing_component_schemas_are_created_once_across_concurrent_callers() {
    let (addr, log) = spawn_api(false).await;
    let client = Arc::new(client_for(addr, 50));

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.find_by_slug("laptop-computer").await }
    });
    let second = tokio::spawn({
        let client = client.clone();
        async move { client.find_by_slug("tablet").await }
    });
    assert!(first.await.unwrap().unwrap().is_none());
    assert!(second.await.unwrap().unwrap().is_none());

    let lines = log.lines();
    let component_gets = lines
        .iter()
        .filter(|l| l.starts_with("GET") && l.contains("/components"))
        .count();
    let component_posts = lines
        .iter()
        .filter(|l| l.starts_with("POST") && l.contains("/components"))
        .count();
    assert_eq!(component_gets, 1, "one shared initialization: {:?}", lines);
    assert_eq!(component_posts, 3, "one POST per missing schema: {:?}", lines);
    assert_eq!(lines.iter().filter(|l| l.contains("/stories")).count(), 2);
}

#[tokio::test]
async fn sweep_calls_are_paced_by_the_client_rate_limit() {
    let (addr, log) = spawn_api(true).await;
    let client = Arc::new(client_for(addr, 5));

    let mut catalog = MemoryCatalog::new("en");
    for id in 1..=2 {
        catalog.insert_product(Product {
            id,
            translations: vec![Translation {
                language_code: "en".into(),
                name: format!("Product {}", id),
                slug: Some(format!("product-{}", id)),
                description: None,
            }],
            variant_ids: vec![],
        });
    }
    let catalog = Arc::new(catalog);
    let processor = SyncProcessor::new(catalog.clone(), client);

    let started = Instant::now();
    let outcome = run_full_sync(
        EntityKind::Product,
        &processor,
        catalog.as_ref(),
        &RetryPolicy::default(),
    )
    .await
    .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.success_count, 2);

    // One components listing, then find + create per product, all through
    // the same chokepoint.
    let entries = log.entries();
    assert_eq!(entries.len(), 5, "requests: {:?}", log.lines());
    assert_eq!(
        log.lines().iter().filter(|l| l.contains("/components")).count(),
        1
    );

    // Five calls at 5/s: four paced slots after the first.
    assert!(started.elapsed() >= Duration::from_millis(700));
    for pair in entries.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0);
        // Margin below 200ms absorbs localhost delivery jitter.
        assert!(gap >= Duration::from_millis(150), "calls too close: {:?}", gap);
    }
}
