pub mod event;
pub mod links;
pub mod message;
pub mod profile;

pub use event::{
    ByteSlice, Commit, Embed, Facet, Feature, FeedEvent, ImageRef, Operation, Post, Record,
};
pub use message::OutboundMessage;
pub use profile::{Profile, INVALID_HANDLE};
