use crate::domain::{links, OutboundMessage, Post, Profile};
use crate::richtext::{render_markup, segment, TextFragment};

pub const VIEW_POST_LABEL: &str = "View post on Bluesky ↗";

/// Builds the notification for a matched post.
pub fn format(
    post: &Post,
    profile: &Profile,
    fragments: &[TextFragment<'_>],
    image_url: Option<String>,
) -> OutboundMessage {
    let post_url = links::post_url(&profile.handle, &post.record_key);

    OutboundMessage {
        body_markup: format!(
            "{}\n<{}|{}>",
            render_markup(fragments),
            post_url,
            VIEW_POST_LABEL
        ),
        author_line: profile.author_line(),
        author_link: links::profile_url(&profile.handle),
        author_icon: profile.avatar_url.clone(),
        image_url,
        posted_at_epoch_seconds: post.created_at.timestamp(),
    }
}

/// CDN URL of the post's first embedded image, if any.
pub fn first_image_url(post: &Post) -> Option<String> {
    post.first_image_cid()
        .map(|cid| links::image_url(&post.author_did, cid))
}

/// Segments the post text and formats it in one step.
pub fn render(post: &Post, profile: &Profile) -> OutboundMessage {
    let fragments = segment(&post.record.text, &post.record.facets);
    format(post, profile, &fragments, first_image_url(post))
}
