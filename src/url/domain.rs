use url::Url;

/// Second-level labels that say nothing about a site's topic
const GENERIC_LABELS: &[&str] = &["co", "com", "org", "net", "gov", "edu", "ac"];

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_ingest::url::extract_domain;
///
/// let url = Url::parse("https://Docs.Example.com:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Derives a topic label from a domain, used when no better category is known
///
/// Picks the registrable name of the host: `docs.eosnetwork.com` becomes
/// `eosnetwork`, `blog.example.co.uk` becomes `example`. Hosts without a dot
/// (e.g. `localhost`) are returned unchanged.
pub fn domain_label(domain: &str) -> String {
    let labels: Vec<&str> = domain
        .trim_start_matches("www.")
        .split('.')
        .filter(|l| !l.is_empty())
        .collect();

    if labels.len() < 2 {
        return domain.to_string();
    }

    // Skip the TLD, then any generic second-level label like "co" in "co.uk"
    labels[..labels.len() - 1]
        .iter()
        .rev()
        .find(|label| !GENERIC_LABELS.contains(label))
        .map(|label| label.to_string())
        .unwrap_or_else(|| labels[0].to_string())
}
