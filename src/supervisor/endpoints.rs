use url::Url;

use crate::app::Result;

/// Public Jetstream instances operated by Bluesky.
pub const PUBLIC_JETSTREAMS: [&str; 4] = [
    "jetstream1.us-east.bsky.network",
    "jetstream2.us-east.bsky.network",
    "jetstream1.us-west.bsky.network",
    "jetstream2.us-west.bsky.network",
];

pub const DEFAULT_COLLECTION: &str = "app.bsky.feed.post";

/// Which feed endpoint the next dial goes to.
///
/// Owned by the caller and threaded through the supervisor, so the cursor
/// survives restarts of the run loop and can be inspected in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointRotation {
    /// Always dial the same endpoint.
    Fixed(String),
    /// Cycle through `endpoints`, one step per dial.
    RoundRobin { endpoints: Vec<String>, next: usize },
}

impl EndpointRotation {
    /// An override wins; otherwise rotate through `endpoints`, falling back
    /// to the public instances when the list is empty.
    pub fn new(endpoint_override: Option<String>, endpoints: Vec<String>) -> Self {
        match endpoint_override {
            Some(endpoint) => Self::Fixed(endpoint),
            None if endpoints.is_empty() => Self::public(),
            None => Self::RoundRobin { endpoints, next: 0 },
        }
    }

    pub fn public() -> Self {
        Self::RoundRobin {
            endpoints: public_endpoints(),
            next: 0,
        }
    }

    pub fn next_endpoint(&mut self) -> String {
        match self {
            Self::Fixed(endpoint) => endpoint.clone(),
            Self::RoundRobin { endpoints, next } => {
                if endpoints.is_empty() {
                    *endpoints = public_endpoints();
                    *next = 0;
                }
                let endpoint = endpoints[*next % endpoints.len()].clone();
                *next = (*next + 1) % endpoints.len();
                endpoint
            }
        }
    }

    /// Index the next round-robin dial will use.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Fixed(_) => None,
            Self::RoundRobin { next, .. } => Some(*next),
        }
    }
}

fn public_endpoints() -> Vec<String> {
    PUBLIC_JETSTREAMS.iter().map(|s| s.to_string()).collect()
}

/// Subscription URL for an endpoint. Bare hosts get the standard
/// `/subscribe` path; full URLs are used verbatim.
pub fn subscribe_url(endpoint: &str, collection: &str) -> Result<Url> {
    if endpoint.contains("://") {
        return Ok(Url::parse(endpoint)?);
    }

    let mut url = Url::parse(&format!("wss://{}/subscribe", endpoint.trim_end_matches('/')))?;
    url.query_pairs_mut()
        .append_pair("wantedCollections", collection);
    Ok(url)
}
