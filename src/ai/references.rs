use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// News outlets whose articles may be cited back to users. Subdomains count.
pub const ALLOWED_NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "bbc.com",
    "bbc.co.uk",
    "apnews.com",
    "nytimes.com",
    "theguardian.com",
    "washingtonpost.com",
    "wsj.com",
    "bloomberg.com",
    "ft.com",
    "cnn.com",
    "npr.org",
    "aljazeera.com",
    "economist.com",
    "techcrunch.com",
    "theverge.com",
    "wired.com",
    "arstechnica.com",
    "cnbc.com",
    "forbes.com",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleReference {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub date: String,
}

fn host_is_allowed(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    ALLOWED_NEWS_DOMAINS.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Whether `raw` is an http(s) URL on an allow-listed news domain.
pub fn is_trusted_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    url.host_str().is_some_and(host_is_allowed)
}

/// Keeps only references pointing at trusted outlets. Dropping everything is fine.
pub fn filter_references(references: Vec<ArticleReference>) -> Vec<ArticleReference> {
    let before = references.len();
    let kept: Vec<_> = references
        .into_iter()
        .filter(|r| is_trusted_url(&r.url))
        .collect();
    if kept.len() != before {
        debug!(dropped = before - kept.len(), kept = kept.len(), "untrusted references removed");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(url: &str) -> ArticleReference {
        ArticleReference {
            title: "t".into(),
            url: url.into(),
            source: "s".into(),
            date: "2025-08-01".into(),
        }
    }

    #[test]
    fn keeps_allow_listed_outlets_and_drops_the_rest() {
        let kept = filter_references(vec![
            reference("https://www.reuters.com/technology/ai-chips"),
            reference("https://evil.example.com/reuters.com"),
            reference("https://bbc.com/news/123"),
        ]);
        let urls: Vec<_> = kept.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://www.reuters.com/technology/ai-chips", "https://bbc.com/news/123"]
        );
    }

    #[test]
    fn lookalike_hosts_are_rejected() {
        assert!(!is_trusted_url("https://notreuters.com/a"));
        assert!(!is_trusted_url("https://reuters.com.evil.io/a"));
        assert!(!is_trusted_url("https://evil.io/?u=https://reuters.com"));
    }

    #[test]
    fn scheme_and_parse_failures_are_rejected() {
        assert!(!is_trusted_url("ftp://reuters.com/file"));
        assert!(!is_trusted_url("javascript:alert(1)"));
        assert!(!is_trusted_url("not a url"));
        assert!(!is_trusted_url(""));
        assert!(is_trusted_url("http://news.bbc.co.uk/story"));
        assert!(is_trusted_url("https://WWW.NYTIMES.COM/2025/x.html"));
    }

    #[test]
    fn empty_result_is_not_an_error() {
        assert!(filter_references(vec![reference("https://evil.example.com")]).is_empty());
        assert!(filter_references(Vec::new()).is_empty());
    }
}
