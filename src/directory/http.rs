//! JSON-over-HTTP directory client.
//!
//! Objects live in one collection under a base URL:
//!
//! - `POST {base}/{collection}` creates
//! - `PUT {base}/{collection}/{id}` replaces
//! - `DELETE {base}/{collection}/{id}` removes
//!
//! Status classification: 404 is `NotFound`, 409 is `ObjectExists`, 429 and
//! 5xx are `Transient` (honouring `Retry-After` seconds), as are connection
//! failures and timeouts. Everything else is `Rejected`.
//!
//! A successful create takes its id from the response, falling back to the
//! sent document's fallback field. When neither is present the result is
//! `CreatedWithoutId`, never `Rejected`, because the remote object exists.

use crate::config::ConfigError;
use crate::directory::{DirectoryClient, DirectoryError};
use crate::schema::ExternalDocument;
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Connection settings for [`HttpDirectoryClient`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpDirectoryConfig {
    pub base_url: String,
    /// Collection path segment, e.g. `users` or `groups`.
    pub collection: String,
    /// Response field holding the assigned identifier.
    pub id_field: String,
    /// Response field used when `id_field` is absent.
    pub fallback_id_field: String,
    pub bearer_token: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpDirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            collection: "users".to_string(),
            id_field: "id".to_string(),
            fallback_id_field: "primaryEmail".to_string(),
            bearer_token: None,
            timeout_secs: 30,
            user_agent: concat!("directory-sync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpDirectoryConfig {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_id_fields(mut self, id_field: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self.fallback_id_field = fallback.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::invalid("base_url", "URL cannot be a base"));
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid("base_url", "scheme must be http or https"));
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::invalid("collection", "must not be empty"));
        }
        if self.id_field.is_empty() {
            return Err(ConfigError::invalid("id_field", "must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }
}

/// [`DirectoryClient`] speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDirectoryClient {
    config: HttpDirectoryConfig,
    base_url: Url,
    http_client: Client,
}

impl HttpDirectoryClient {
    pub fn new(config: HttpDirectoryConfig) -> Result<Self, ConfigError> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                ConfigError::invalid("http_client", format!("Failed to build HTTP client: {}", e))
            })?;
        Self::with_http_client(config, http_client)
    }

    /// Use a pre-built `reqwest::Client`.
    pub fn with_http_client(config: HttpDirectoryConfig, http_client: Client) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;
        Ok(Self {
            config,
            base_url,
            http_client,
        })
    }

    pub fn config(&self) -> &HttpDirectoryConfig {
        &self.config
    }

    fn url(&self, external_id: Option<&str>) -> Result<Url, DirectoryError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DirectoryError::rejected(None, "base URL cannot hold a path"))?;
            segments.pop_if_empty().push(&self.config.collection);
            if let Some(id) = external_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        [&self.config.id_field, &self.config.fallback_id_field]
            .into_iter()
            .filter(|field| !field.is_empty())
            .find_map(|field| match body.get(field.as_str()) {
                Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            })
    }
}

fn transport_error(error: reqwest::Error) -> DirectoryError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        DirectoryError::transient(error.to_string())
    } else {
        DirectoryError::rejected(error.status().map(|s| s.as_u16()), error.to_string())
    }
}

async fn classify_failure(response: Response) -> DirectoryError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        body
    };

    match status {
        StatusCode::NOT_FOUND => DirectoryError::not_found(message),
        StatusCode::CONFLICT => DirectoryError::object_exists(message),
        StatusCode::TOO_MANY_REQUESTS => {
            debug!("Directory rate limited, retry after {:?}", retry_after);
            DirectoryError::Transient {
                message,
                retry_after,
            }
        }
        s if s.is_server_error() => DirectoryError::Transient {
            message,
            retry_after,
        },
        s => DirectoryError::rejected(Some(s.as_u16()), message),
    }
}

impl DirectoryClient for HttpDirectoryClient {
    async fn create(&self, document: &ExternalDocument) -> Result<String, DirectoryError> {
        let url = self.url(None)?;
        debug!("Directory POST {}", url);
        let response = self
            .authorize(self.http_client.post(url))
            .json(document)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_failure(response).await);
        }

        let body = match response.text().await {
            Ok(text) if text.trim().is_empty() => Value::Null,
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Directory create returned {} with an unparseable body: {}", status, e);
                Value::Null
            }),
            Err(e) => {
                warn!("Failed to read directory create response ({}): {}", status, e);
                Value::Null
            }
        };

        // The remote object exists from here on; the fallback field was sent.
        if let Some(id) = self.extract_id(&body) {
            return Ok(id);
        }
        match document.get(self.config.fallback_id_field.as_str()) {
            Some(Value::String(id)) if !id.is_empty() => {
                debug!(
                    "Create response carried no '{}', using sent '{}'",
                    self.config.id_field, self.config.fallback_id_field
                );
                Ok(id.clone())
            }
            _ => Err(DirectoryError::CreatedWithoutId {
                message: format!(
                    "HTTP {} response carried neither '{}' nor '{}'",
                    status.as_u16(),
                    self.config.id_field,
                    self.config.fallback_id_field
                ),
            }),
        }
    }

    async fn update(&self, external_id: &str, document: &ExternalDocument) -> Result<(), DirectoryError> {
        let url = self.url(Some(external_id))?;
        debug!("Directory PUT {}", url);
        let response = self
            .authorize(self.http_client.put(url))
            .json(document)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify_failure(response).await)
        }
    }

    async fn delete(&self, external_id: &str) -> Result<(), DirectoryError> {
        let url = self.url(Some(external_id))?;
        debug!("Directory DELETE {}", url);
        let response = self
            .authorize(self.http_client.delete(url))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(classify_failure(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> HttpDirectoryClient {
        HttpDirectoryClient::new(HttpDirectoryConfig::new(base_url, "users")).unwrap()
    }

    #[test]
    fn test_object_url_keeps_base_path() {
        let client = client("https://directory.example.com/admin/v1/");
        assert_eq!(
            client.url(None).unwrap().as_str(),
            "https://directory.example.com/admin/v1/users"
        );
        assert_eq!(
            client.url(Some("a/b")).unwrap().as_str(),
            "https://directory.example.com/admin/v1/users/a%2Fb"
        );
    }

    #[test]
    fn test_extract_id_prefers_id_field() {
        let client = client("https://directory.example.com");
        assert_eq!(
            client.extract_id(&json!({"id": "123", "primaryEmail": "a@example.com"})),
            Some("123".to_string())
        );
        assert_eq!(
            client.extract_id(&json!({"primaryEmail": "a@example.com"})),
            Some("a@example.com".to_string())
        );
        assert_eq!(client.extract_id(&json!({"id": 7})), Some("7".to_string()));
        assert_eq!(client.extract_id(&json!({"id": ""})), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(HttpDirectoryConfig::new("https://x.example.com", "users").validate().is_ok());
        assert!(HttpDirectoryConfig::new("not a url", "users").validate().is_err());
        assert!(HttpDirectoryConfig::new("ftp://x.example.com", "users").validate().is_err());
        assert!(HttpDirectoryConfig::new("https://x.example.com", " ").validate().is_err());

        let config: HttpDirectoryConfig =
            serde_json::from_value(json!({"base_url": "https://x.example.com"})).unwrap();
        assert_eq!(config.collection, "users");
        assert_eq!(config.id_field, "id");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }
}
