use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by [`IdpotClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Pot not found: {0}")]
    NotFound(String),

    #[error("Pot already exists: {0}")]
    AlreadyExists(String),

    #[error("Unexpected status {status} from server: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to parse server response: {0}")]
    Parse(String),
}

/// HTTP convenience client for an idpot server.
pub struct IdpotClient {
    base_url: String,
    client: reqwest::Client,
}

impl IdpotClient {
    /// Creates a client for the server at `base_url`
    /// (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates the pot `pot` with its counter initialized to `min`.
    pub async fn create_pot(&self, pot: &str, min: u64) -> Result<(), ClientError> {
        let min = min.to_string();
        let res = self
            .client
            .post(self.url("/pot/create"))
            .form(&[("name", pot), ("min", min.as_str())])
            .send()
            .await?;

        match res.status() {
            StatusCode::CREATED => Ok(()),
            StatusCode::CONFLICT => Err(ClientError::AlreadyExists(pot.to_string())),
            status => Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Checks whether the pot `pot` exists.
    pub async fn pot_exists(&self, pot: &str) -> Result<bool, ClientError> {
        let res = self
            .client
            .get(self.url(&format!("/pot/{}", pot)))
            .send()
            .await?;

        match res.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Returns the pot's current counter value without advancing it.
    pub async fn current_id(&self, pot: &str) -> Result<u64, ClientError> {
        let res = self
            .client
            .get(self.url(&format!("/id/{}", pot)))
            .send()
            .await?;

        Self::parse_id_response(pot, res).await
    }

    /// Allocates the next value from the pot.
    pub async fn next_id(&self, pot: &str) -> Result<u64, ClientError> {
        let res = self
            .client
            .post(self.url(&format!("/id/{}", pot)))
            .send()
            .await?;

        Self::parse_id_response(pot, res).await
    }

    async fn parse_id_response(
        pot: &str,
        res: reqwest::Response,
    ) -> Result<u64, ClientError> {
        match res.status() {
            StatusCode::OK => {
                let body = res.text().await?;
                body.trim()
                    .parse::<u64>()
                    .map_err(|e| ClientError::Parse(format!("{:?}: {}", body, e)))
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(pot.to_string())),
            status => Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body: res.text().await.unwrap_or_default(),
            }),
        }
    }
}
