use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Event kind carrying repository commits.
pub const KIND_COMMIT: &str = "commit";

/// One message from the Jetstream firehose.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEvent {
    #[serde(rename = "did")]
    pub author_did: String,
    pub kind: String,
    #[serde(default)]
    pub commit: Option<Commit>,
    #[serde(rename = "time_us", default)]
    pub emitted_at_micros: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub rev: String,
    #[serde(default)]
    pub operation: Operation,
    #[serde(rename = "rkey", default)]
    pub record_key: String,
    #[serde(default)]
    pub record: Option<Record>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub text: String,
    /// RFC 3339 timestamp chosen by the author's client.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub embed: Option<Embed>,
    #[serde(default)]
    pub facets: Vec<Facet>,
}

impl Record {
    pub fn embedded_images(&self) -> &[ImageRef] {
        self.embed
            .as_ref()
            .map(|e| e.images.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// An image blob attached to a post, addressed by content id.
/// Missing pieces decode as an empty cid rather than failing the frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    image: BlobRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BlobRef {
    #[serde(rename = "ref", default)]
    link: CidLink,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CidLink {
    #[serde(rename = "$link", default)]
    cid: String,
}

impl ImageRef {
    pub fn new(cid: impl Into<String>) -> Self {
        Self {
            image: BlobRef {
                link: CidLink { cid: cid.into() },
            },
        }
    }

    pub fn cid(&self) -> &str {
        &self.image.link.cid
    }
}

/// A byte-range annotation over `Record::text`.
#[derive(Debug, Clone, Deserialize)]
pub struct Facet {
    #[serde(default)]
    pub index: ByteSlice,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Facet {
    pub fn new(byte_start: usize, byte_end: usize, features: Vec<Feature>) -> Self {
        Self {
            index: ByteSlice {
                byte_start,
                byte_end,
            },
            features,
        }
    }

    pub fn byte_start(&self) -> usize {
        self.index.byte_start
    }

    pub fn byte_end(&self) -> usize {
        self.index.byte_end
    }
}

/// Half-open `[byte_start, byte_end)` range into the UTF-8 bytes of a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "$type")]
pub enum Feature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link {
        #[serde(default)]
        uri: String,
    },
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention {
        #[serde(rename = "did", default)]
        subject_did: String,
    },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag {
        #[serde(rename = "tag", default)]
        label: String,
    },
    #[serde(other)]
    Unknown,
}

/// A commit that passed the eligibility filters: a freshly created post.
#[derive(Debug, Clone)]
pub struct Post {
    pub author_did: String,
    pub record_key: String,
    pub record: Record,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn first_image_cid(&self) -> Option<&str> {
        self.record
            .embedded_images()
            .first()
            .map(ImageRef::cid)
            .filter(|cid| !cid.is_empty())
    }
}
