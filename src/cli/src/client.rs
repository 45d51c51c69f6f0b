//! HTTP client for communicating with the servicekit admin API.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// API response wrapper matching the server's ApiResponse format.
#[derive(Debug, serde::Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

/// Basic auth credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// HTTP client for the servicekit API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    admin_path: String,
    credentials: Option<Credentials>,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    ///
    /// Admin routes are resolved under `admin_path`, e.g. `/admin`.
    pub fn new(base_url: &str, admin_path: &str, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_path: format!("/{}", admin_path.trim_matches('/')),
            credentials,
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.admin_path, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.user, Some(&c.password)),
            None => request,
        }
    }

    /// GET an admin route and deserialize the response data.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.admin_url(path);
        let request = self.authorize(self.client.get(&url).query(query));
        let resp = send(request, "GET", &url).await?;
        parse_data(resp, &url).await
    }

    /// POST a JSON body to an admin route and deserialize the response data.
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.admin_url(path);
        let request = self.authorize(self.client.post(&url).json(body));
        let resp = send(request, "POST", &url).await?;
        parse_data(resp, &url).await
    }

    /// DELETE an admin route. Accepts both `204 No Content` and an envelope.
    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let url = self.admin_url(path);
        let request = self.authorize(self.client.delete(&url).query(query));
        let resp = send(request, "DELETE", &url).await?;
        expect_ack(resp, &url).await
    }

    /// DELETE an admin route with a JSON body.
    pub async fn delete_with<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.admin_url(path);
        let request = self.authorize(self.client.delete(&url).json(body));
        let resp = send(request, "DELETE", &url).await?;
        expect_ack(resp, &url).await
    }

    /// DELETE with a JSON body, returning the response data.
    pub async fn delete_returning<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.admin_url(path);
        let request = self.authorize(self.client.delete(&url).json(body));
        let resp = send(request, "DELETE", &url).await?;
        parse_data(resp, &url).await
    }

    /// Perform a raw GET request outside the admin path and return the full
    /// JSON value (for health endpoint).
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = send(self.client.get(&url), "GET", &url).await?;

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

/// Percent-encode `raw` as a single URL path segment, so names containing
/// `/`, `?` or `#` stay inside one route parameter.
pub fn path_segment(raw: &str) -> Result<String> {
    let mut url = Url::parse("http://localhost/").context("Failed to build URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("URL cannot hold path segments"))?
        .push(raw);
    Ok(url.path().trim_start_matches('/').to_string())
}

async fn send(request: RequestBuilder, method: &str, url: &str) -> Result<Response> {
    let resp = request
        .send()
        .await
        .with_context(|| format!("{} {} failed", method, url))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiResponse<serde_json::Value>>(&body) {
        Ok(envelope) => anyhow::bail!(
            "API error ({}{}): {}",
            status,
            envelope
                .error_code
                .map(|c| format!(", {}", c))
                .unwrap_or_default(),
            envelope.error.unwrap_or_else(|| "Unknown error".into())
        ),
        Err(_) => anyhow::bail!("API error ({}): {}", status, body),
    }
}

async fn parse_data<T: DeserializeOwned>(resp: Response, url: &str) -> Result<T> {
    let api_resp: ApiResponse<T> = resp
        .json()
        .await
        .with_context(|| format!("Failed to parse response from {}", url))?;

    if api_resp.success {
        api_resp
            .data
            .ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
    } else {
        Err(anyhow::anyhow!(
            "API error: {}",
            api_resp.error.unwrap_or_else(|| "Unknown error".into())
        ))
    }
}

async fn expect_ack(resp: Response, url: &str) -> Result<()> {
    if resp.status() == StatusCode::NO_CONTENT {
        return Ok(());
    }
    parse_data::<serde_json::Value>(resp, url).await.map(|_| ())
}
