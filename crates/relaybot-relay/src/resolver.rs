//! Channel resolution — configured links to channels the bot can see.
//!
//! Link grammar: anything containing `/channels/`, followed by
//! `<community id>/<channel id>`, e.g. `https://discord.com/channels/111/222`.
//! A trailing message id, query string, or fragment is ignored.

use std::collections::HashSet;

use tracing::{debug, warn};

use relaybot_channels::ChannelDirectory;
use relaybot_core::error::ResolutionError;
use relaybot_core::types::{ResolvedChannel, Snowflake};

const CHANNELS_SEGMENT: &str = "/channels/";

/// The ids carried by a well-formed link. Not yet checked against the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelLink {
    pub community_id: Snowflake,
    pub channel_id: Snowflake,
}

/// Parse a channel link without touching the network.
pub fn parse_link(link: &str) -> Result<ChannelLink, ResolutionError> {
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return Err(ResolutionError::malformed(link, "empty link"));
    }

    let Some(pos) = trimmed.rfind(CHANNELS_SEGMENT) else {
        return Err(ResolutionError::malformed(link, "missing '/channels/' segment"));
    };
    let rest = &trimmed[pos + CHANNELS_SEGMENT.len()..];
    let rest = rest.split(['?', '#']).next().unwrap_or_default();

    let mut parts = rest.split('/');
    let community = parts.next().unwrap_or_default();
    let channel = parts.next().unwrap_or_default();

    if community == "@me" {
        return Err(ResolutionError::malformed(link, "direct-message links are not supported"));
    }
    if channel.is_empty() {
        return Err(ResolutionError::malformed(link, "missing channel id"));
    }

    Ok(ChannelLink {
        community_id: parse_snowflake(link, "community", community)?,
        channel_id: parse_snowflake(link, "channel", channel)?,
    })
}

fn parse_snowflake(link: &str, what: &str, raw: &str) -> Result<Snowflake, ResolutionError> {
    match raw.parse::<Snowflake>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ResolutionError::malformed(link, format!("invalid {what} id '{raw}'"))),
    }
}

/// Resolve one link against the live directory. Side-effect free.
pub async fn resolve<D>(link: &str, directory: &D) -> Result<ResolvedChannel, ResolutionError>
where
    D: ChannelDirectory + ?Sized,
{
    let ids = parse_link(link)?;

    let community = directory
        .community(ids.community_id)
        .await
        .map_err(|e| ResolutionError::Lookup(e.to_string()))?
        .ok_or(ResolutionError::CommunityNotFound(ids.community_id))?;

    let not_found = ResolutionError::ChannelNotFound {
        community_id: ids.community_id,
        channel_id: ids.channel_id,
    };
    let channel = directory
        .channel(ids.channel_id)
        .await
        .map_err(|e| ResolutionError::Lookup(e.to_string()))?
        .ok_or_else(|| not_found.clone())?;

    if channel.community_id != Some(ids.community_id) {
        return Err(not_found);
    }

    Ok(ResolvedChannel {
        community_id: ids.community_id,
        channel_id: ids.channel_id,
        display_name: format!("{} / #{}", community.name, channel.name),
    })
}

/// Outcome of resolving every configured link.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Deduplicated by channel id, in first-seen order.
    pub channels: Vec<ResolvedChannel>,
    /// Each failed link with its reason.
    pub failures: Vec<(String, ResolutionError)>,
    ids: HashSet<Snowflake>,
}

impl Resolution {
    /// Whether events from `channel_id` should be forwarded.
    pub fn contains(&self, channel_id: Snowflake) -> bool {
        self.ids.contains(&channel_id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn push(&mut self, channel: ResolvedChannel) {
        if self.ids.insert(channel.channel_id) {
            self.channels.push(channel);
        }
    }
}

/// Resolve all links. One bad link never prevents the others from resolving.
pub async fn resolve_all<D>(links: &[String], directory: &D) -> Resolution
where
    D: ChannelDirectory + ?Sized,
{
    let mut resolution = Resolution::default();

    for link in links {
        match resolve(link, directory).await {
            Ok(channel) => {
                debug!(channel = %channel.display_name, id = channel.channel_id, "resolved channel link");
                resolution.push(channel);
            }
            Err(e) => {
                warn!(link = %link, error = %e, "could not resolve channel link");
                resolution.failures.push((link.clone(), e));
            }
        }
    }

    resolution
}
