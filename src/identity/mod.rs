//! Outbound request identity rotation
//!
//! Generates randomized, plausible browser fingerprints (header sets)
//! so consecutive requests do not all look like the same automated
//! client. Pure generation, no state: the session pool asks for a
//! fresh fingerprint every time it lends a session out.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const ACCEPT_VALUES: &[&str] = &[
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
];

const ACCEPT_LANGUAGE_VALUES: &[&str] = &[
    "en-US,en;q=0.9,de;q=0.8",
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9,de;q=0.8",
    "de-DE,de;q=0.9,en;q=0.8",
    "en,de;q=0.9,fr;q=0.8",
];

const REFERERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
];

/// A randomized outbound request fingerprint
///
/// Holds the header set applied to one loan of a pooled session.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Optional headers included by coin flip, in insertion order
    pub extra: Vec<(String, String)>,
}

impl Fingerprint {
    /// Generates a new random fingerprint
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();

        let mut extra: Vec<(String, String)> = vec![
            ("Accept-Encoding".into(), "gzip, deflate, br".into()),
            (
                "DNT".into(),
                if rng.gen_bool(0.5) { "1" } else { "0" }.into(),
            ),
            ("Connection".into(), "keep-alive".into()),
            ("Upgrade-Insecure-Requests".into(), "1".into()),
            (
                "Sec-Fetch-Dest".into(),
                pick(&mut rng, &["document", "empty"]).into(),
            ),
            (
                "Sec-Fetch-Mode".into(),
                pick(&mut rng, &["navigate", "cors"]).into(),
            ),
            (
                "Sec-Fetch-Site".into(),
                pick(&mut rng, &["none", "same-origin", "cross-site"]).into(),
            ),
            (
                "Cache-Control".into(),
                pick(&mut rng, &["max-age=0", "no-cache"]).into(),
            ),
        ];

        if rng.gen_bool(0.5) {
            extra.push(("Sec-Fetch-User".into(), "?1".into()));
        }
        if rng.gen_bool(0.5) {
            extra.push(("Pragma".into(), "no-cache".into()));
        }
        if rng.gen_bool(0.5) {
            extra.push(("Referer".into(), pick(&mut rng, REFERERS).into()));
        }

        Self {
            user_agent: pick(&mut rng, USER_AGENTS).into(),
            accept: pick(&mut rng, ACCEPT_VALUES).into(),
            accept_language: pick(&mut rng, ACCEPT_LANGUAGE_VALUES).into(),
            extra,
        }
    }

    /// Converts the fingerprint into a reqwest header map
    ///
    /// Header values that fail validation are skipped rather than
    /// failing the request; they all come from static pools anyway.
    pub fn header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        insert(&mut headers, "User-Agent", &self.user_agent);
        insert(&mut headers, "Accept", &self.accept);
        insert(&mut headers, "Accept-Language", &self.accept_language);
        for (name, value) in &self.extra {
            insert(&mut headers, name, value);
        }

        headers
    }
}

fn pick<'a, R: Rng>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or(values[0])
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}
