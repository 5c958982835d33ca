use url::Url;

use crate::error::PipelineError;

/// Query parameters that only carry referral or campaign tracking.
const TRACKING_PARAMS: &[&str] = &[
    "ref", "source", "src", "gh_src", "fbclid", "gclid", "mc_eid", "mc_cid", "_ga", "_gl",
];

/// Prefixes of tracking parameter families (utm_source, rx_campaign, _hsenc, ...).
const TRACKING_PREFIXES: &[&str] = &["utm_", "rx_", "_"];

/// Hosts whose apply page lives at `<posting>/apply`.
const APPLY_SUFFIX_HOSTS: &[&str] = &["lever.co", "workable.com"];

/// Canonicalize a posting URL into its identity key.
///
/// The key is https-only, has a lowercased host without `www.`/`m.`, no default
/// port, no fragment, no trailing slash and no tracking parameters. Remaining
/// query parameters keep their original order and encoding. The function is
/// idempotent: `normalize_url(&normalize_url(u)?)? == normalize_url(u)?`.
pub fn normalize_url(raw: &str) -> Result<String, PipelineError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| invalid(trimmed, &e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(trimmed, &format!("unsupported scheme '{}'", other))),
    }

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid(trimmed, "missing host"))?
        .to_lowercase();
    let host = collapse_host_prefix(&host);

    let port = match parsed.port() {
        Some(443) | None => String::new(),
        Some(p) => format!(":{}", p),
    };

    let path = canonical_path(&host, parsed.path());

    let kept: Vec<&str> = parsed
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && !is_tracking_pair(pair))
        .collect();

    let mut normalized = format!("https://{}{}{}", host, port, path);
    if !kept.is_empty() {
        normalized.push('?');
        normalized.push_str(&kept.join("&"));
    }

    Ok(normalized)
}

fn invalid(url: &str, reason: &str) -> PipelineError {
    PipelineError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn collapse_host_prefix(host: &str) -> String {
    let mut host = host;
    loop {
        match host.strip_prefix("www.").or_else(|| host.strip_prefix("m.")) {
            // keep at least one dot-separated label after the prefix
            Some(rest) if rest.contains('.') => host = rest,
            _ => return host.to_string(),
        }
    }
}

fn canonical_path(host: &str, path: &str) -> String {
    let strip_apply = APPLY_SUFFIX_HOSTS
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)));

    let mut path = path.trim_end_matches('/');
    if strip_apply {
        while let Some(rest) = path.strip_suffix("/apply") {
            path = rest.trim_end_matches('/');
        }
    }
    path.to_string()
}

fn is_tracking_pair(pair: &str) -> bool {
    let key = pair.split('=').next().unwrap_or(pair).to_lowercase();
    TRACKING_PARAMS.contains(&key.as_str())
        || TRACKING_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_params_and_trailing_slash_collapse() {
        let a = normalize_url("https://Example.com/job/?utm_source=x").unwrap();
        let b = normalize_url("https://example.com/job").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "https://example.com/job");
    }

    #[test]
    fn test_end_to_end_key() {
        assert_eq!(
            normalize_url("https://jobs.example.com/google-swe?utm_source=fb").unwrap(),
            "https://jobs.example.com/google-swe"
        );
    }

    #[test]
    fn test_preserves_other_params_in_order() {
        let url = "https://boards.greenhouse.io/acme/jobs?gh_jid=42&utm_medium=email&lang=en&ref=abc";
        assert_eq!(
            normalize_url(url).unwrap(),
            "https://boards.greenhouse.io/acme/jobs?gh_jid=42&lang=en"
        );
    }

    #[test]
    fn test_strips_www_mobile_port_and_fragment() {
        assert_eq!(
            normalize_url("HTTP://WWW.Example.com:80/careers/123#apply").unwrap(),
            "https://example.com/careers/123"
        );
        assert_eq!(
            normalize_url("https://m.example.com:443/careers/123").unwrap(),
            "https://example.com/careers/123"
        );
        assert_eq!(
            normalize_url("https://example.com:8443/careers").unwrap(),
            "https://example.com:8443/careers"
        );
    }

    #[test]
    fn test_lever_apply_page_shares_key_with_description() {
        let description = normalize_url("https://jobs.lever.co/acme/abc-123").unwrap();
        let apply = normalize_url("https://jobs.lever.co/acme/abc-123/apply?lever-source=x").unwrap();
        assert_eq!(
            apply,
            "https://jobs.lever.co/acme/abc-123?lever-source=x"
        );
        assert!(apply.starts_with(&description));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://Example.com/job/?utm_source=x",
            "http://www.example.com//a//",
            "https://example.com/?b=2&a=1&_ga=3",
            "https://jobs.lever.co/acme/x/apply/",
            "https://example.com",
            "https://m.www.example.org/path%20with%20space",
        ];
        for input in inputs {
            let once = normalize_url(input).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    #[test]
    fn test_distinct_postings_do_not_collide() {
        let a = normalize_url("https://example.com/jobs?id=1").unwrap();
        let b = normalize_url("https://example.com/jobs?id=2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_urls() {
        for input in ["", "not a url", "/relative/path", "mailto:jobs@example.com", "ftp://example.com/x"] {
            let err = normalize_url(input).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidUrl { .. }), "{} should be invalid", input);
        }
    }
}
