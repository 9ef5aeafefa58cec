//! Discord REST channel directory — guild and channel lookups.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use relaybot_core::error::SourceError;
use relaybot_core::types::{ChannelInfo, CommunityInfo, Snowflake};

use crate::base::ChannelDirectory;

/// Looks up guilds and channels with the bot's token.
///
/// 403 and 404 both mean "not visible to this bot".
#[derive(Clone)]
pub struct DiscordDirectory {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize)]
struct GuildPayload {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl DiscordDirectory {
    pub fn new(http: reqwest::Client, api_base: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// GET `{api_base}{path}`; `Ok(None)` on 403/404.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, SourceError> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = resp.status();
        match status.as_u16() {
            403 | 404 => {
                debug!(path = %path, status = %status, "discord resource not visible");
                Ok(None)
            }
            401 => Err(SourceError::Auth(format!("GET {path} returned 401"))),
            _ if status.is_success() => resp
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| SourceError::Protocol(format!("GET {path}: {e}"))),
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(SourceError::Request(format!("GET {path} returned {status}: {body}")))
            }
        }
    }
}

fn snowflake(raw: &str) -> Result<Snowflake, SourceError> {
    raw.parse()
        .map_err(|_| SourceError::Protocol(format!("invalid snowflake '{raw}'")))
}

#[async_trait]
impl ChannelDirectory for DiscordDirectory {
    async fn community(&self, id: Snowflake) -> Result<Option<CommunityInfo>, SourceError> {
        let Some(guild) = self.get::<GuildPayload>(&format!("/guilds/{id}")).await? else {
            return Ok(None);
        };
        Ok(Some(CommunityInfo {
            id: snowflake(&guild.id)?,
            name: guild.name,
        }))
    }

    async fn channel(&self, id: Snowflake) -> Result<Option<ChannelInfo>, SourceError> {
        let Some(channel) = self.get::<ChannelPayload>(&format!("/channels/{id}")).await? else {
            return Ok(None);
        };
        Ok(Some(ChannelInfo {
            id: snowflake(&channel.id)?,
            community_id: channel.guild_id.as_deref().map(snowflake).transpose()?,
            name: channel.name.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn directory(server: &MockServer) -> DiscordDirectory {
        DiscordDirectory::new(reqwest::Client::new(), &format!("{}/api/v10/", server.uri()), "tok")
    }

    #[tokio::test]
    async fn test_community_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v10/guilds/111"))
            .and(header("Authorization", "Bot tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "111", "name": "Rustaceans", "owner_id": "1"
            })))
            .mount(&server)
            .await;

        let dir = directory(&server).await;
        let guild = dir.community(111).await.unwrap().unwrap();
        assert_eq!(guild.id, 111);
        assert_eq!(guild.name, "Rustaceans");
    }

    #[tokio::test]
    async fn test_community_not_visible() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v10/guilds/111"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "Missing Access", "code": 50001
            })))
            .mount(&server)
            .await;

        let dir = directory(&server).await;
        assert!(dir.community(111).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_found_with_guild() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v10/channels/222"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "222", "type": 0, "guild_id": "111", "name": "announcements"
            })))
            .mount(&server)
            .await;

        let dir = directory(&server).await;
        let channel = dir.channel(222).await.unwrap().unwrap();
        assert_eq!(channel.community_id, Some(111));
        assert_eq!(channel.name, "announcements");
    }

    #[tokio::test]
    async fn test_channel_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v10/channels/222"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = directory(&server).await;
        assert!(dir.channel(222).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let dir = directory(&server).await;
        let err = dir.channel(222).await.unwrap_err();
        assert!(matches!(err, SourceError::Request(ref m) if m.contains("502")));
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = directory(&server).await;
        assert!(matches!(dir.community(1).await, Err(SourceError::Auth(_))));
    }
}
