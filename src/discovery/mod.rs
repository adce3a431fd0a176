use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

use crate::cli::config::DiscoverySettings;
use crate::pipeline::extractor;
use crate::pipeline::fetcher::Fetcher;
use crate::pipeline::task::FetchOutcome;
use crate::utils::urls;

/// Bounded breadth-first link collector
///
/// Starting from a seed page, collects same-site links level by level
/// until `max_pages` URLs are gathered or `max_depth` is reached.
/// First-seen order is preserved so the analysis run processes pages in
/// a stable order. Fetch failures on individual pages are skipped, not
/// fatal.
pub async fn discover(
    fetcher: &Fetcher,
    seed: &str,
    settings: &DiscoverySettings,
) -> Result<Vec<String>> {
    let seed_url = Url::parse(seed).context(format!("Invalid seed URL: {}", seed))?;
    let seed_url = urls::normalize(seed_url);

    info!(
        "Discovering up to {} URLs from {} (depth {})",
        settings.max_pages, seed_url, settings.max_depth
    );

    let mut queue: VecDeque<(Url, u32)> = VecDeque::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut discovered: Vec<String> = Vec::new();

    seen.insert(seed_url.to_string());
    discovered.push(seed_url.to_string());
    queue.push_back((seed_url.clone(), 0));

    while let Some((url, depth)) = queue.pop_front() {
        if discovered.len() >= settings.max_pages {
            break;
        }
        if depth >= settings.max_depth {
            continue;
        }

        let body = match fetcher.fetch(url.as_str()).await {
            FetchOutcome::Fetched { body, .. } => body,
            FetchOutcome::TransientFailure { reason }
            | FetchOutcome::PermanentFailure { reason } => {
                warn!("Skipping {} during discovery: {}", url, reason);
                continue;
            }
        };

        let record = match extractor::extract(url.as_str(), &body) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unparseable page {} during discovery: {}", url, e);
                continue;
            }
        };

        for link in &record.links {
            if discovered.len() >= settings.max_pages {
                break;
            }
            let Ok(candidate) = Url::parse(link) else {
                continue;
            };
            if !urls::same_site(&seed_url, &candidate) {
                continue;
            }
            if !seen.insert(candidate.to_string()) {
                continue;
            }

            debug!("Discovered {} at depth {}", candidate, depth + 1);
            discovered.push(candidate.to_string());
            queue.push_back((candidate, depth + 1));
        }
    }

    info!("Discovery finished: {} URLs", discovered.len());
    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::FetchSettings;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html_page(links: &[String]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{}">link</a>"#, l))
            .collect();
        format!("<html><body>{}</body></html>", anchors)
    }

    fn settings(max_pages: usize, max_depth: u32) -> DiscoverySettings {
        DiscoverySettings {
            max_pages,
            max_depth,
        }
    }

    #[tokio::test]
    async fn test_discover_collects_same_site_links_breadth_first() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html_page(&[
                        format!("{}/a", base),
                        format!("{}/b", base),
                        "https://elsewhere.org/external".to_string(),
                    ]))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html_page(&[format!("{}/c", base)]))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>leaf</p></body></html>")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetchSettings::default()).unwrap();
        let urls = discover(&fetcher, &format!("{}/", base), &settings(10, 2))
            .await
            .unwrap();

        assert_eq!(
            urls,
            vec![
                format!("{}/", base),
                format!("{}/a", base),
                format!("{}/b", base),
                format!("{}/c", base),
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_respects_page_limit() {
        let server = MockServer::start().await;
        let base = server.uri();

        let links: Vec<String> = (0..20).map(|i| format!("{}/page{}", base, i)).collect();
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html_page(&links))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetchSettings::default()).unwrap();
        let urls = discover(&fetcher, &format!("{}/", base), &settings(5, 3))
            .await
            .unwrap();

        assert_eq!(urls.len(), 5);
        assert_eq!(urls[0], format!("{}/", base));
    }

    #[tokio::test]
    async fn test_discover_skips_failing_pages() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html_page(&[format!("{}/broken", base)]))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetchSettings::default()).unwrap();
        let urls = discover(&fetcher, &format!("{}/", base), &settings(10, 2))
            .await
            .unwrap();

        // The broken page is still listed; it just contributes no links
        assert_eq!(
            urls,
            vec![format!("{}/", base), format!("{}/broken", base)]
        );
    }
}
