//! Rich-text segmentation.
//!
//! Posts carry their links, mentions and hashtags as facets: byte ranges
//! over the UTF-8 encoding of the text, each with a list of features.
//! [`segment`] overlays those ranges onto the text and yields the text as
//! an ordered run of [`TextFragment`]s, which [`render_markup`] turns into
//! Slack `mrkdwn`.
//!
//! Facets may arrive unsorted and overlapping. They are stably sorted by
//! start offset and the first facet to claim a byte wins; a facet starting
//! inside an already consumed region is dropped.

use std::borrow::Cow;
use std::fmt::Write;

use html_escape::encode_text;

use crate::domain::links;
use crate::domain::{Facet, Feature};

/// A contiguous slice of post text, optionally carrying facet features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment<'a> {
    pub text: Cow<'a, str>,
    pub features: Option<&'a [Feature]>,
}

impl<'a> TextFragment<'a> {
    fn plain(bytes: &'a [u8]) -> Self {
        Self {
            text: String::from_utf8_lossy(bytes),
            features: None,
        }
    }

    /// Link target for this fragment: the first feature that resolves to one.
    pub fn target_uri(&self) -> Option<Cow<'a, str>> {
        self.features.and_then(feature_uri)
    }
}

/// Splits `text` into fragments following `facets`, in reading order.
pub fn segment<'a>(text: &'a str, facets: &'a [Facet]) -> Vec<TextFragment<'a>> {
    let bytes = text.as_bytes();
    let mut fragments = Vec::new();

    let mut ordered: Vec<&Facet> = facets
        .iter()
        .filter(|f| f.byte_start() <= f.byte_end() && f.byte_end() <= bytes.len())
        .collect();
    // Stable: facets sharing a start offset keep their received order.
    ordered.sort_by_key(|f| f.byte_start());

    let mut cursor = 0;
    for facet in ordered {
        let (start, end) = (facet.byte_start(), facet.byte_end());

        if cursor > start {
            continue;
        }
        if cursor < start {
            fragments.push(TextFragment::plain(&bytes[cursor..start]));
        }

        if start < end {
            let mut fragment = TextFragment::plain(&bytes[start..end]);
            if !fragment.text.trim().is_empty() {
                fragment.features = Some(facet.features.as_slice());
            }
            fragments.push(fragment);
        }
        cursor = end;
    }

    if cursor < bytes.len() {
        fragments.push(TextFragment::plain(&bytes[cursor..]));
    }

    fragments
}

/// Resolves the first recognized feature to a URI.
pub fn feature_uri(features: &[Feature]) -> Option<Cow<'_, str>> {
    features.iter().find_map(|feature| match feature {
        Feature::Link { uri } if !uri.is_empty() => Some(Cow::Borrowed(uri.as_str())),
        Feature::Mention { subject_did } => Some(Cow::Owned(links::profile_url(subject_did))),
        Feature::Tag { label } => Some(Cow::Owned(links::hashtag_url(label))),
        _ => None,
    })
}

/// Renders fragments as Slack markup: `<uri|text>` for linked fragments,
/// escaped plain text otherwise.
pub fn render_markup(fragments: &[TextFragment<'_>]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        let text = encode_text(&fragment.text);
        match fragment.target_uri() {
            Some(uri) => {
                let _ = write!(out, "<{}|{}>", escape_link_target(&uri), text);
            }
            None => out.push_str(&text),
        }
    }
    out
}

/// Escapes a link target so it cannot close the `<uri|text>` wrapper.
/// `|` separates the target from its label, so it is percent-encoded.
fn escape_link_target(uri: &str) -> String {
    encode_text(uri).replace('|', "%7C")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(did: &str) -> Feature {
        Feature::Mention {
            subject_did: did.into(),
        }
    }

    fn link(uri: &str) -> Feature {
        Feature::Link { uri: uri.into() }
    }

    fn texts(fragments: &[TextFragment<'_>]) -> Vec<String> {
        fragments.iter().map(|f| f.text.to_string()).collect()
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(segment("", &[]).is_empty());
    }

    #[test]
    fn test_no_facets_yields_whole_text() {
        let fragments = segment("just words", &[]);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "just words");
        assert_eq!(fragments[0].features, None);
    }

    #[test]
    fn test_mention_in_the_middle() {
        let facets = vec![Facet::new(6, 15, vec![mention("abc")])];
        let fragments = segment("hello tailscale world", &facets);

        assert_eq!(texts(&fragments), vec!["hello ", "tailscale", " world"]);
        assert_eq!(fragments[0].features, None);
        assert_eq!(fragments[1].features, Some(&facets[0].features[..]));
        assert_eq!(fragments[2].features, None);

        assert_eq!(
            render_markup(&fragments),
            "hello <https://bsky.app/profile/abc|tailscale> world"
        );
    }

    #[test]
    fn test_unsorted_facets_cover_text_in_order() {
        let text = "see a.com and b.com";
        let facets = vec![
            Facet::new(14, 19, vec![link("https://b.com")]),
            Facet::new(4, 9, vec![link("https://a.com")]),
        ];
        let fragments = segment(text, &facets);

        assert_eq!(texts(&fragments), vec!["see ", "a.com", " and ", "b.com"]);
        assert_eq!(texts(&fragments).concat(), text);
        assert_eq!(
            render_markup(&fragments),
            "see <https://a.com|a.com> and <https://b.com|b.com>"
        );
    }

    #[test]
    fn test_overlapping_facet_is_dropped() {
        let text = "abcdefghij";
        let facets = vec![
            Facet::new(2, 6, vec![link("https://first")]),
            Facet::new(4, 8, vec![link("https://second")]),
        ];
        let fragments = segment(text, &facets);

        assert_eq!(texts(&fragments), vec!["ab", "cdef", "ghij"]);
        assert_eq!(fragments[1].target_uri().as_deref(), Some("https://first"));
        assert!(fragments
            .iter()
            .all(|f| f.target_uri().as_deref() != Some("https://second")));
    }

    #[test]
    fn test_same_start_keeps_received_order() {
        let facets = vec![
            Facet::new(0, 3, vec![link("https://one")]),
            Facet::new(0, 5, vec![link("https://two")]),
        ];
        let fragments = segment("hello", &facets);

        assert_eq!(texts(&fragments), vec!["hel", "lo"]);
        assert_eq!(fragments[0].target_uri().as_deref(), Some("https://one"));
        assert_eq!(fragments[1].features, None);
    }

    #[test]
    fn test_empty_facet_contributes_nothing() {
        let facets = vec![
            Facet::new(2, 2, vec![link("https://empty")]),
            Facet::new(3, 5, vec![link("https://x")]),
        ];
        let fragments = segment("abcdefg", &facets);

        assert_eq!(texts(&fragments), vec!["ab", "c", "de", "fg"]);
        assert_eq!(fragments[2].target_uri().as_deref(), Some("https://x"));
        assert!(fragments.iter().all(|f| f.text != ""));
    }

    #[test]
    fn test_whitespace_facet_drops_features() {
        let facets = vec![Facet::new(1, 4, vec![link("https://blank")])];
        let fragments = segment("a   b", &facets);

        assert_eq!(texts(&fragments), vec!["a", "   ", "b"]);
        assert_eq!(fragments[1].features, None);
        assert_eq!(render_markup(&fragments), "a   b");
    }

    #[test]
    fn test_offsets_are_bytes_not_chars() {
        // "café " is 6 bytes: the é takes two.
        let text = "café #rust";
        let facets = vec![Facet::new(6, 11, vec![Feature::Tag {
            label: "rust".into(),
        }])];
        let fragments = segment(text, &facets);

        assert_eq!(texts(&fragments), vec!["café ", "#rust"]);
        assert_eq!(
            render_markup(&fragments),
            "café <https://bsky.app/hashtag/rust|#rust>"
        );
    }

    #[test]
    fn test_out_of_range_facets_are_ignored() {
        let facets = vec![
            Facet::new(2, 40, vec![link("https://past-end")]),
            Facet::new(3, 1, vec![link("https://backwards")]),
        ];
        let fragments = segment("short", &facets);
        assert_eq!(texts(&fragments), vec!["short"]);
    }

    #[test]
    fn test_split_multibyte_char_does_not_panic() {
        let facets = vec![Facet::new(0, 1, vec![link("https://x")])];
        let fragments = segment("é", &facets);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "\u{FFFD}");
    }

    #[test]
    fn test_first_recognized_feature_wins() {
        let features = vec![
            Feature::Unknown,
            Feature::Tag {
                label: "bsky".into(),
            },
            link("https://ignored"),
        ];
        assert_eq!(
            feature_uri(&features).as_deref(),
            Some("https://bsky.app/hashtag/bsky")
        );
    }

    #[test]
    fn test_unrecognized_features_render_plain() {
        let facets = vec![Facet::new(0, 4, vec![Feature::Unknown, link("")])];
        let fragments = segment("text", &facets);

        assert!(fragments[0].features.is_some());
        assert_eq!(fragments[0].target_uri(), None);
        assert_eq!(render_markup(&fragments), "text");
    }

    #[test]
    fn test_markup_escapes_control_characters() {
        let fragments = segment("a <b> & c", &[]);
        assert_eq!(render_markup(&fragments), "a &lt;b&gt; &amp; c");
    }

    #[test]
    fn test_markup_escapes_link_target() {
        let facets = [Facet::new(0, 4, vec![link("https://evil.example/?a=1&b=<x>|y")])];
        let fragments = segment("here", &facets);
        assert_eq!(
            render_markup(&fragments),
            "<https://evil.example/?a=1&amp;b=&lt;x&gt;%7Cy|here>"
        );
    }
}
