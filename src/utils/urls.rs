use url::Url;

/// Normalize a URL so the same page is never collected twice
///
/// The `url` crate already lowercases hosts and strips default ports on
/// parse, so only the fragment needs removing here.
pub fn normalize(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Registered domain of a host, approximated as its last two labels
///
/// `docs.example.com` and `www.example.com` both map to `example.com`.
/// No public-suffix list is consulted; two labels are enough for the
/// internal/external link split this crate needs.
pub fn registered_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host.to_lowercase();
    }
    labels[labels.len() - 2..].join(".").to_lowercase()
}

/// Whether two URLs belong to the same registered domain
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => registered_domain(ha) == registered_domain(hb),
        _ => false,
    }
}
