//! Canonical bsky.app and CDN URLs.

use url::Url;

pub const APP_BASE_URL: &str = "https://bsky.app";
pub const CDN_FULLSIZE_URL: &str = "https://cdn.bsky.app/img/feed_fullsize/plain";

/// `https://bsky.app/profile/{actor}` where actor is a handle or DID.
pub fn profile_url(actor: &str) -> String {
    join_segments(APP_BASE_URL, &["profile", actor])
}

pub fn hashtag_url(tag: &str) -> String {
    join_segments(APP_BASE_URL, &["hashtag", tag])
}

pub fn post_url(actor: &str, record_key: &str) -> String {
    join_segments(APP_BASE_URL, &["profile", actor, "post", record_key])
}

pub fn image_url(author_did: &str, cid: &str) -> String {
    join_segments(CDN_FULLSIZE_URL, &[author_did, cid])
}

/// Appends percent-escaped path segments to `base`.
fn join_segments(base: &str, segments: &[&str]) -> String {
    let mut url = match Url::parse(base) {
        Ok(url) => url,
        Err(_) => return format!("{}/{}", base, segments.join("/")),
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_url() {
        assert_eq!(profile_url("abc"), "https://bsky.app/profile/abc");
        assert_eq!(
            profile_url("did:plc:abc"),
            "https://bsky.app/profile/did:plc:abc"
        );
    }

    #[test]
    fn test_post_url_escapes_segments() {
        assert_eq!(
            post_url("erisa.uk", "3lbxyz"),
            "https://bsky.app/profile/erisa.uk/post/3lbxyz"
        );
        assert_eq!(
            post_url("a b", "x/y"),
            "https://bsky.app/profile/a%20b/post/x%2Fy"
        );
    }

    #[test]
    fn test_hashtag_url() {
        assert_eq!(hashtag_url("rust"), "https://bsky.app/hashtag/rust");
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url("did:plc:abc", "bafkrei"),
            "https://cdn.bsky.app/img/feed_fullsize/plain/did:plc:abc/bafkrei"
        );
    }
}
