//! Reward destinations: where a winning ticket's payout or refund is sent.
//!
//! Three forms are accepted:
//!
//! - an LNURL-pay endpoint, either bech32-encoded (`lnurl1...`), as an
//!   `lnurlp://` link or as a plain `https://` URL;
//! - a Lightning address (`name@domain`), resolved through
//!   `/.well-known/lnurlp/<name>` on the domain;
//! - a local wallet (`wallet:<id>`), paid by internal transfer.

use std::fmt;
use std::str::FromStr;

use url::Url;

use super::error::DomainError;
use super::AccountId;

const INTERNAL_PREFIX: &str = "wallet:";
const LIGHTNING_URI_PREFIX: &str = "lightning:";
const LNURL_HRP: &str = "lnurl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardDestination {
    /// LNURL-pay endpoint queried directly.
    LnurlPay(Url),
    /// Human-readable address that needs a discovery lookup.
    LightningAddress { name: String, domain: String },
    /// Account on the same wallet backend.
    Internal(AccountId),
}

impl RewardDestination {
    /// URL that returns the LNURL-pay parameters, for the external forms.
    ///
    /// # Errors
    /// Returns an error if a Lightning address does not form a valid URL.
    pub fn discovery_url(&self) -> Result<Option<Url>, DomainError> {
        match self {
            Self::LnurlPay(url) => Ok(Some(url.clone())),
            Self::LightningAddress { name, domain } => {
                let scheme = scheme_for(domain);
                let raw = format!("{scheme}://{domain}/.well-known/lnurlp/{name}");
                Url::parse(&raw)
                    .map(Some)
                    .map_err(|_| malformed(&self.to_string(), "address does not form a URL"))
            }
            Self::Internal(_) => Ok(None),
        }
    }
}

impl fmt::Display for RewardDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LnurlPay(url) => write!(f, "{url}"),
            Self::LightningAddress { name, domain } => write!(f, "{name}@{domain}"),
            Self::Internal(account) => write!(f, "{INTERNAL_PREFIX}{account}"),
        }
    }
}

impl FromStr for RewardDestination {
    type Err = DomainError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let code = strip_prefix_ignore_case(trimmed, LIGHTNING_URI_PREFIX).unwrap_or(trimmed);

        if let Some(account) = code.strip_prefix(INTERNAL_PREFIX) {
            if account.is_empty() {
                return Err(malformed(input, "empty wallet id"));
            }
            return Ok(Self::Internal(AccountId::new(account)));
        }

        if code.len() > LNURL_HRP.len() && strip_prefix_ignore_case(code, LNURL_HRP).is_some() {
            if let Some(url) = decode_lnurl(code) {
                return pay_url(input, &url);
            }
            if !code.contains("://") {
                return Err(malformed(input, "invalid bech32 lnurl"));
            }
        }

        if let Some(rest) = strip_prefix_ignore_case(code, "lnurlp://") {
            let host = rest.split(['/', '?']).next().unwrap_or_default();
            return pay_url(input, &format!("{}://{rest}", scheme_for(host)));
        }

        if code.starts_with("https://") || code.starts_with("http://") {
            return pay_url(input, code);
        }

        if let Some((name, domain)) = code.split_once('@') {
            let valid_name = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_.+".contains(c));
            let labels: Vec<&str> = domain.split('.').collect();
            let valid_domain = labels.len() >= 2 && labels.iter().all(|l| !l.is_empty());
            if valid_name && valid_domain {
                return Ok(Self::LightningAddress {
                    name: name.to_ascii_lowercase(),
                    domain: domain.to_ascii_lowercase(),
                });
            }
        }

        Err(malformed(input, "not an lnurl, lightning address or wallet id"))
    }
}

fn malformed(input: &str, reason: &'static str) -> DomainError {
    DomainError::MalformedDestination {
        input: input.to_string(),
        reason,
    }
}

fn scheme_for(host: &str) -> &'static str {
    if host.ends_with(".onion") {
        "http"
    } else {
        "https"
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match (s.get(..prefix.len()), s.get(prefix.len()..)) {
        (Some(head), Some(rest)) if head.eq_ignore_ascii_case(prefix) => Some(rest),
        _ => None,
    }
}

fn pay_url(input: &str, raw: &str) -> Result<RewardDestination, DomainError> {
    let url = Url::parse(raw).map_err(|_| malformed(input, "unparsable url"))?;
    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(malformed(input, "unsupported url"));
    }
    if url.query_pairs().any(|(k, v)| k == "tag" && v == "login") {
        return Err(malformed(input, "this is a login lnurl"));
    }
    Ok(RewardDestination::LnurlPay(url))
}

/// Decode a bech32 `lnurl1...` string into the URL it wraps.
fn decode_lnurl(code: &str) -> Option<String> {
    let (hrp, bytes) = bech32::decode(code).ok()?;
    if hrp.to_lowercase() != LNURL_HRP {
        return None;
    }
    String::from_utf8(bytes).ok()
}
