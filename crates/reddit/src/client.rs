use std::time::Duration;

use async_trait::async_trait;
use safepost_core::config::RedditConfig;
use safepost_core::{
    ActivityItem, Author, ContentItem, Identity, PlatformClient, PlatformError, PostedItem,
    TimeWindow,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::listing::{
    absolute_permalink, flatten_authors, CommentData, CommentNode, LinkData, Listing,
};

#[derive(Clone, Debug)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
}

#[derive(Clone, Debug)]
pub struct RedditEndpoints {
    pub api_base_url: String,
    pub auth_base_url: String,
}

/// Script-app client for the Reddit API. Holds the bearer token obtained by
/// [`PlatformClient::authenticate`]; every other call requires it.
pub struct RedditClient {
    http: reqwest::Client,
    endpoints: RedditEndpoints,
    credentials: RedditCredentials,
    token: RwLock<Option<SecretString>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct MeResponse {
    name: String,
}

#[derive(Deserialize)]
struct CommentResponse {
    json: CommentResponseBody,
}

#[derive(Deserialize)]
struct CommentResponseBody {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    #[serde(default)]
    data: Option<CommentResponseData>,
}

#[derive(Deserialize)]
struct CommentResponseData {
    #[serde(default)]
    things: Vec<CreatedThing>,
}

#[derive(Deserialize)]
struct CreatedThing {
    data: CreatedComment,
}

#[derive(Deserialize)]
struct CreatedComment {
    id: String,
    #[serde(default)]
    permalink: String,
}

impl RedditClient {
    pub fn new(
        credentials: RedditCredentials,
        endpoints: RedditEndpoints,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|error| PlatformError::Transport(error.to_string()))?;

        Ok(Self { http, endpoints, credentials, token: RwLock::new(None) })
    }

    pub fn from_config(config: &RedditConfig) -> Result<Self, PlatformError> {
        Self::new(
            RedditCredentials {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            },
            RedditEndpoints {
                api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
                auth_base_url: config.auth_base_url.trim_end_matches('/').to_string(),
            },
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.api_base_url, path)
    }

    async fn bearer(&self) -> Result<String, PlatformError> {
        let token = self.token.read().await;
        token
            .as_ref()
            .map(|token| token.expose_secret().to_string())
            .ok_or(PlatformError::Unauthenticated)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let bearer = self.bearer().await?;
        let response = self
            .http
            .get(self.api_url(path))
            .bearer_auth(bearer)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PlatformError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(PlatformError::Unauthenticated);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PlatformError::Status { status: status.as_u16(), body });
    }
    response.json::<T>().await.map_err(|error| PlatformError::Decode(error.to_string()))
}

fn transport_error(error: reqwest::Error) -> PlatformError {
    PlatformError::Transport(error.to_string())
}

#[async_trait]
impl PlatformClient for RedditClient {
    fn platform_name(&self) -> &'static str {
        "reddit"
    }

    async fn authenticate(&self) -> Result<Identity, PlatformError> {
        let response = self
            .http
            .post(format!("{}/api/v1/access_token", self.endpoints.auth_base_url))
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.expose_secret()),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.expose_secret()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let token: TokenResponse = match decode(response).await {
            Err(PlatformError::Unauthenticated) => {
                return Err(PlatformError::Status {
                    status: status.as_u16(),
                    body: "client credentials rejected".to_string(),
                })
            }
            other => other?,
        };
        // Bad user credentials come back as 200 with an `error` field.
        let access_token = match (token.access_token, token.error) {
            (Some(access_token), None) => access_token,
            (_, error) => {
                return Err(PlatformError::Status {
                    status: status.as_u16(),
                    body: error.unwrap_or_else(|| "missing access_token".to_string()),
                })
            }
        };
        *self.token.write().await = Some(access_token.into());

        let me: MeResponse = self.get_json("/api/v1/me", &[]).await?;
        info!(
            event_name = "safepost.reddit.authenticated",
            account = %me.name,
            "authenticated with reddit"
        );
        Ok(Identity::new(me.name))
    }

    async fn fetch_recent_activity(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<ActivityItem>, PlatformError> {
        let query = [("sort", "new".to_string()), ("limit", limit.to_string())];
        let name = identity.as_str();

        let comments: Listing<CommentData> =
            self.get_json(&format!("/user/{name}/comments"), &query).await?;
        let submitted: Listing<LinkData> =
            self.get_json(&format!("/user/{name}/submitted"), &query).await?;

        let mut activity: Vec<ActivityItem> = comments
            .into_items()
            .map(CommentData::into_activity)
            .chain(submitted.into_items().map(LinkData::into_activity))
            .collect();
        activity.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        debug!(
            event_name = "safepost.reddit.activity_fetched",
            items = activity.len(),
            "fetched recent account activity"
        );
        Ok(activity)
    }

    async fn search(
        &self,
        scope: &str,
        query: &str,
        window: TimeWindow,
        limit: usize,
    ) -> Result<Vec<ContentItem>, PlatformError> {
        let params = [
            ("q", query.to_string()),
            ("restrict_sr", "1".to_string()),
            ("sort", "relevance".to_string()),
            ("t", window.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        let listing: Listing<LinkData> =
            self.get_json(&format!("/r/{scope}/search"), &params).await?;

        Ok(listing.into_items().take(limit).map(|link| link.into_content_item(scope)).collect())
    }

    async fn list_repliers(
        &self,
        item: &ContentItem,
        limit: usize,
    ) -> Result<Vec<Author>, PlatformError> {
        let params = [("limit", limit.to_string()), ("sort", "new".to_string())];
        // The response is `[link listing, comment listing]`.
        let (_, comments): (serde_json::Value, Listing<CommentNode>) =
            self.get_json(&format!("/comments/{}", item.id), &params).await?;

        Ok(flatten_authors(comments, limit))
    }

    async fn post_reply(&self, item: &ContentItem, text: &str) -> Result<PostedItem, PlatformError> {
        let bearer = self.bearer().await?;
        let thing_id = format!("t3_{}", item.id);
        let response = self
            .http
            .post(self.api_url("/api/comment"))
            .bearer_auth(bearer)
            .form(&[("thing_id", thing_id.as_str()), ("text", text), ("api_type", "json")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let created: CommentResponse = decode(response).await?;
        if !created.json.errors.is_empty() {
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body: serde_json::Value::Array(created.json.errors).to_string(),
            });
        }

        let comment = created
            .json
            .data
            .and_then(|data| data.things.into_iter().next())
            .map(|thing| thing.data)
            .ok_or_else(|| PlatformError::Decode("comment response had no things".to_string()))?;

        Ok(PostedItem { id: comment.id, permalink: absolute_permalink(&comment.permalink) })
    }
}
