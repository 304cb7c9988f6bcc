//! HTTP client for the request/response half of the API.
//!
//! Durable writes (comments) and initial fetches go through here; the
//! real-time stream only carries live updates.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use memeshare_shared::{
    ApiError, CommentsPage, CreateCommentRequest, CreateCommentResponse, Meme, UserProfile,
};

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// GET a JSON resource.
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// POST a JSON body, expecting a JSON response.
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    // --- typed endpoints ---

    /// The main feed, personalized when a user id is known.
    pub async fn fetch_memes(&self, user_id: Option<&str>) -> Result<Vec<Meme>, ApiError> {
        match user_id {
            Some(id) => {
                self.get_json(&format!("/memes?userId={}", urlencoding::encode(id)))
                    .await
            }
            None => self.get_json("/memes/trending").await,
        }
    }

    pub async fn fetch_liked(&self, username: &str) -> Result<Vec<Meme>, ApiError> {
        self.get_json(&format!(
            "/memes/liked/{}",
            urlencoding::encode(username)
        ))
        .await
    }

    pub async fn fetch_saved(&self, username: &str) -> Result<Vec<Meme>, ApiError> {
        self.get_json(&format!(
            "/memes/saved/{}",
            urlencoding::encode(username)
        ))
        .await
    }

    pub async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        self.get_json(&format!("/users/{}", urlencoding::encode(user_id)))
            .await
    }

    pub async fn fetch_comments(
        &self,
        meme_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<CommentsPage, ApiError> {
        self.get_json(&format!(
            "/memes/{}/comments?page={page}&limit={limit}",
            urlencoding::encode(meme_id)
        ))
        .await
    }

    /// Persist a comment. The server assigns the id synchronously; the
    /// matching broadcast echo is deduplicated against it.
    pub async fn post_comment(
        &self,
        meme_id: &str,
        request: &CreateCommentRequest,
    ) -> Result<CreateCommentResponse, ApiError> {
        self.post_json(
            &format!("/memes/{}/comments", urlencoding::encode(meme_id)),
            request,
        )
        .await
    }
}
