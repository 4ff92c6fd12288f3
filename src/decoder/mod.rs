//! Jetstream frame decoding and post filtering.
//!
//! A frame is decompressed (when the stream is zstd encoded), parsed into a
//! [`FeedEvent`] and run through the eligibility, staleness and watch-word
//! filters. Filter misses are [`Verdict::Ignored`], not errors.

use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use zstd::dict::DecoderDictionary;

use crate::domain::event::KIND_COMMIT;
use crate::domain::{FeedEvent, Operation, Post};

/// Posts older than this are treated as backfill and ignored.
pub const DEFAULT_MAX_POST_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Bytes of a rejected frame included in log lines.
const PREVIEW_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decompress frame: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("malformed event: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unparsable createdAt {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

/// Why an event was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    NotCommit,
    NotCreate,
    MissingRecord,
    Stale,
    NoMatch,
}

#[derive(Debug)]
pub enum Verdict {
    Matched(Post),
    Ignored(Ignored),
}

/// Frame compression. The zstd dictionary is prepared once and only ever
/// read, so a single decoder is shared by every connection.
enum Compression {
    None,
    Zstd(DecoderDictionary<'static>),
}

pub struct EventDecoder {
    compression: Compression,
    /// Lowercased once at construction.
    watch_word: String,
    max_post_age: Duration,
}

impl fmt::Debug for EventDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDecoder")
            .field("compressed", &self.is_compressed())
            .field("watch_word", &self.watch_word)
            .field("max_post_age", &self.max_post_age)
            .finish()
    }
}

impl EventDecoder {
    /// Decoder for uncompressed JSON frames.
    pub fn new(watch_word: &str, max_post_age: Duration) -> Self {
        Self {
            compression: Compression::None,
            watch_word: watch_word.trim().to_lowercase(),
            max_post_age,
        }
    }

    /// Decompress every frame with the shared zstd dictionary.
    pub fn with_dictionary(mut self, dictionary: &[u8]) -> Self {
        self.compression = Compression::Zstd(DecoderDictionary::copy(dictionary));
        self
    }

    pub fn load_dictionary(path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.compression, Compression::Zstd(_))
    }

    pub fn decompress<'a>(&self, frame: &'a [u8]) -> Result<Cow<'a, [u8]>, DecodeError> {
        match &self.compression {
            Compression::None => Ok(Cow::Borrowed(frame)),
            Compression::Zstd(dictionary) => {
                let mut decoder =
                    zstd::stream::read::Decoder::with_prepared_dictionary(frame, dictionary)
                        .map_err(DecodeError::Decompress)?;
                let mut out = Vec::with_capacity(frame.len() * 4);
                decoder
                    .read_to_end(&mut out)
                    .map_err(DecodeError::Decompress)?;
                Ok(Cow::Owned(out))
            }
        }
    }

    /// Decodes one frame and decides whether it is a post worth notifying.
    pub fn decode(&self, frame: &[u8], now: DateTime<Utc>) -> Result<Verdict, DecodeError> {
        let json = self.decompress(frame)?;
        let event: FeedEvent = serde_json::from_slice(&json)?;
        self.filter(event, now)
    }

    pub fn filter(&self, event: FeedEvent, now: DateTime<Utc>) -> Result<Verdict, DecodeError> {
        if event.kind != KIND_COMMIT {
            return Ok(Verdict::Ignored(Ignored::NotCommit));
        }
        let Some(commit) = event.commit else {
            return Ok(Verdict::Ignored(Ignored::NotCommit));
        };
        if commit.operation != Operation::Create {
            return Ok(Verdict::Ignored(Ignored::NotCreate));
        }
        let record = match commit.record {
            Some(record) if !commit.record_key.is_empty() => record,
            _ => return Ok(Verdict::Ignored(Ignored::MissingRecord)),
        };

        let created_at = DateTime::parse_from_rfc3339(&record.created_at)
            .map_err(|source| DecodeError::Timestamp {
                value: record.created_at.clone(),
                source,
            })?
            .with_timezone(&Utc);

        if self.is_stale(created_at, now) {
            return Ok(Verdict::Ignored(Ignored::Stale));
        }

        if !self.matches(&record.text) {
            return Ok(Verdict::Ignored(Ignored::NoMatch));
        }

        Ok(Verdict::Matched(Post {
            author_did: event.author_did,
            record_key: commit.record_key,
            record,
            created_at,
        }))
    }

    /// Case-insensitive substring match against the watch-word.
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.watch_word)
    }

    fn is_stale(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // Negative ages (clock skew, future timestamps) are not stale.
        match now.signed_duration_since(created_at).to_std() {
            Ok(age) => age > self.max_post_age,
            Err(_) => false,
        }
    }
}

/// Short, printable prefix of a frame for log context.
pub fn frame_preview(frame: &[u8]) -> String {
    let end = frame.len().min(PREVIEW_LEN);
    format!("{:?}", String::from_utf8_lossy(&frame[..end]))
}
