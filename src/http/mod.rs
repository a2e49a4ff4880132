use crate::error::{MediaError, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Shared reqwest client. Cheap to clone; carries no credentials, so one
/// instance may serve any number of servers.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("mediaplex/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<Response> {
        debug!("Making GET request");
        let response = self.client.get(url).headers(headers).send().await?;
        check_response(response)
    }

    /// GET and decode. An empty or unparsable body on success decodes to `T::default()`.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned + Default>(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<T> {
        let response = self.get(url, headers).await?;
        decode_lenient(response).await
    }

    #[instrument(skip(self, headers, body), fields(url = %url))]
    pub async fn post_json<T: DeserializeOwned + Default, B: serde::Serialize>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
    ) -> Result<T> {
        debug!("Making POST request");
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let response = check_response(response)?;
        decode_lenient(response).await
    }

    /// Send a request whose response body is irrelevant.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn send(&self, method: Method, url: &str, headers: HeaderMap) -> Result<()> {
        debug!("Making {} request", method);
        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .send()
            .await?;

        check_response(response)?;
        Ok(())
    }

    #[instrument(skip(self, headers, body), fields(url = %url))]
    pub async fn send_json<B: serde::Serialize>(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: &B,
    ) -> Result<()> {
        debug!("Making {} request with body", method);
        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        check_response(response)?;
        Ok(())
    }
}

fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        error!("HTTP request failed with status: {}", status);
        return Err(MediaError::Http {
            status,
            url: redact(response.url()),
        });
    }
    Ok(response)
}

async fn decode_lenient<T: DeserializeOwned + Default>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        debug!("Empty response body, using default");
        return Ok(T::default());
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Discarding unparsable response body ({} bytes): {}", bytes.len(), e);
            Ok(T::default())
        }
    }
}

/// URL with credential-bearing query parameters masked, for errors and logs.
pub fn redact(url: &url::Url) -> String {
    const SECRET_KEYS: [&str; 3] = ["api_key", "X-Plex-Token", "ApiKey"];

    if !url.query_pairs().any(|(k, _)| SECRET_KEYS.contains(&k.as_ref())) {
        return url.to_string();
    }

    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if SECRET_KEYS.contains(&k.as_ref()) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_tokens_in_query() {
        let url = url::Url::parse("http://plex:32400/library?X-Plex-Token=secret&type=1").unwrap();
        let out = redact(&url);
        assert!(!out.contains("secret"));
        assert!(out.contains("type=1"));
    }

    #[test]
    fn leaves_plain_urls_alone() {
        let url = url::Url::parse("http://jf:8096/Users/u/Items?Limit=5").unwrap();
        assert_eq!(redact(&url), "http://jf:8096/Users/u/Items?Limit=5");
    }
}
