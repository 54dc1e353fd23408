use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::{AuthType, Config};
use crate::error::StoreError;

use super::api_types::{decode_list, decode_one};
use super::{RecordStore, WireRecord};

/// JSON-over-HTTP client for the shop backend.
///
/// Collections live at `{base}/{collection}` and single records at
/// `{base}/{collection}/{id}`.
#[derive(Clone)]
pub struct HttpStore {
  client: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl HttpStore {
  pub fn new(config: &Config) -> Result<Self> {
    let token = match config.store.auth_type {
      AuthType::Bearer => Some(Config::get_api_token()?),
      AuthType::None => None,
    };

    Self::with_token(
      &config.store.url,
      token,
      Duration::from_secs(config.store.timeout_secs),
    )
  }

  pub fn with_token(url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
    let base = Url::parse(url).map_err(|e| eyre!("Invalid store url {}: {}", url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Store url {} cannot have paths appended", url));
    }

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("stockroom/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  /// Build `{base}/{segments...}`, percent-encoding each segment.
  pub fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
    let mut url = self.base.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|_| StoreError::InvalidUrl(self.base.to_string()))?;
      path.pop_if_empty().extend(segments);
    }
    Ok(url)
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  /// Send a request and return the status and body text.
  async fn send(&self, request: RequestBuilder, url: &Url) -> Result<(StatusCode, String), StoreError> {
    let response = self
      .authorize(request)
      .send()
      .await
      .map_err(|source| StoreError::Transport {
        url: url.to_string(),
        source,
      })?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|source| StoreError::Transport {
        url: url.to_string(),
        source,
      })?;

    debug!(%url, status = status.as_u16(), bytes = body.len(), "store response");
    Ok((status, body))
  }
}

fn status_error(url: &Url, status: StatusCode, body: String) -> StoreError {
  StoreError::Status {
    url: url.to_string(),
    status: status.as_u16(),
    body: body.chars().take(200).collect(),
  }
}

#[async_trait]
impl<R: WireRecord> RecordStore<R> for HttpStore {
  async fn fetch_all(&self) -> Result<Vec<R>, StoreError> {
    let url = self.endpoint(&[R::collection()])?;
    let (status, body) = self.send(self.client.get(url.clone()), &url).await?;

    if !status.is_success() {
      return Err(status_error(&url, status, body));
    }

    decode_list::<R::Wire, R>(&body).map_err(|source| StoreError::Decode {
      url: url.to_string(),
      source,
    })
  }

  /// Backends disagree on what a PATCH returns (the record, a partial record,
  /// or a bare acknowledgement), so the echo is never trusted and the relay
  /// re-reads the record instead.
  async fn update_status(&self, id: &str, status: R::Status) -> Result<Option<R>, StoreError> {
    let url = self.endpoint(&[R::collection(), id])?;
    let body = serde_json::json!({ "status": status });
    let request = self.client.patch(url.clone()).json(&body);
    let (code, text) = self.send(request, &url).await?;

    if !code.is_success() {
      return Err(status_error(&url, code, text));
    }

    Ok(None)
  }

  async fn find_by_id(&self, id: &str) -> Result<Option<R>, StoreError> {
    let url = self.endpoint(&[R::collection(), id])?;
    let (status, body) = self.send(self.client.get(url.clone()), &url).await?;

    if status == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !status.is_success() {
      return Err(status_error(&url, status, body));
    }

    decode_one::<R::Wire, R>(&body)
      .map(Some)
      .map_err(|source| StoreError::Decode {
        url: url.to_string(),
        source,
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store(url: &str) -> HttpStore {
    HttpStore::with_token(url, None, Duration::from_secs(5)).unwrap()
  }

  #[test]
  fn test_endpoint_appends_to_base_path() {
    let store = store("https://shop.example.com/api");
    let url = store.endpoint(&["parts", "p-1"]).unwrap();
    assert_eq!(url.as_str(), "https://shop.example.com/api/parts/p-1");
  }

  #[test]
  fn test_endpoint_handles_trailing_slash() {
    let store = store("https://shop.example.com/api/");
    let url = store.endpoint(&["invoices"]).unwrap();
    assert_eq!(url.as_str(), "https://shop.example.com/api/invoices");
  }

  #[test]
  fn test_endpoint_encodes_ids() {
    let store = store("https://shop.example.com");
    let url = store.endpoint(&["parts", "a/b c"]).unwrap();
    assert_eq!(url.as_str(), "https://shop.example.com/parts/a%2Fb%20c");
  }

  #[test]
  fn test_rejects_non_base_url() {
    assert!(HttpStore::with_token("mailto:shop@example.com", None, Duration::from_secs(5)).is_err());
  }
}
