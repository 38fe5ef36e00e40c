use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Access denied")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Invalid response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// REST client for the ERP backend. Cheap to clone; clones share the token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: String,
    client: Client,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(ApiClient {
            inner: Arc::new(ApiClientInner {
                base_url: base_url.trim_end_matches('/').to_string(),
                client,
                token: RwLock::new(None),
            }),
        })
    }

    pub fn with_token(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let client = Self::new(base_url)?;
        client.set_token(Some(token.to_string()));
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        let mut guard = self.inner.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token;
    }

    pub fn get_token(&self) -> Option<String> {
        self.inner.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.get_token() {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request = self.authorize(self.inner.client.get(&url));

        let response = request.send().await?;
        self.handle_response(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request = self.authorize(self.inner.client.post(&url).json(body));

        let response = request.send().await?;
        self.handle_response(response).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let request = self.authorize(self.inner.client.patch(&url).json(body));

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();

        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                response.json::<T>().await.map_err(|e| ApiError::Parse(e.to_string()))
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            StatusCode::NOT_FOUND => {
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::NotFound(text))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::Server(format!("{}: {}", status, text)))
            }
        }
    }
}
