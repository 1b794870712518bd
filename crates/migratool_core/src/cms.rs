//! Thin read/edit client for the destination CMS.
//!
//! The engine assumes these calls either succeed or raise; retry policy
//! and timeouts are bounded here and overridable through the environment.

use std::env;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde_json::{Value, json};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RETRIES: usize = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 350;

#[derive(Debug, Clone)]
pub enum CmsAuth {
    ApiKey(String),
    Basic { username: String, password: String },
}

pub struct CmsClient {
    base_url: String,
    auth: CmsAuth,
    client: Client,
    retries: usize,
    retry_delay_ms: u64,
}

impl CmsClient {
    pub fn new(base_url: &str, auth: CmsAuth) -> Result<Self> {
        let timeout_ms = env_u64("MIGRATE_HTTP_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT_MS);
        let retries = env_u64("MIGRATE_HTTP_RETRIES")
            .map(|value| value as usize)
            .unwrap_or(DEFAULT_RETRIES);
        let retry_delay_ms = env_u64("MIGRATE_HTTP_RETRY_DELAY_MS").unwrap_or(DEFAULT_RETRY_DELAY_MS);
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("failed to build CMS HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            client,
            retries,
            retry_delay_ms,
        })
    }

    /// Read one page asset; returns the page object.
    pub fn read_page(&self, page_id: &str) -> Result<Value> {
        let url = format!("{}/read/page/{page_id}", self.base_url);
        let payload = self.request(&url, None)?;
        payload
            .get("asset")
            .and_then(|asset| asset.get("page"))
            .cloned()
            .with_context(|| format!("CMS read response for {page_id} has no page asset"))
    }

    /// Write one page asset back.
    pub fn edit_page(&self, page_id: &str, page: &Value) -> Result<()> {
        let url = format!("{}/edit/page/{page_id}", self.base_url);
        let body = json!({ "asset": { "page": page } });
        self.request(&url, Some(&body))?;
        Ok(())
    }

    fn request(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let mut last_error = None::<String>;
        for attempt in 0..=self.retries {
            let mut builder = match body {
                Some(body) => self.client.post(url).json(body),
                None => self.client.get(url),
            };
            builder = match &self.auth {
                CmsAuth::ApiKey(key) => builder.bearer_auth(key),
                CmsAuth::Basic { username, password } => {
                    builder.basic_auth(username, Some(password))
                }
            };

            match builder.send() {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        last_error = Some(format!("HTTP {} from {url}", status.as_u16()));
                    } else {
                        let payload: Value = response
                            .json()
                            .with_context(|| format!("failed to decode response from {url}"))?;
                        if payload.get("success").and_then(Value::as_bool) == Some(false) {
                            let message = payload
                                .get("message")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown CMS error");
                            last_error = Some(format!("CMS error from {url}: {message}"));
                        } else {
                            return Ok(payload);
                        }
                    }
                }
                Err(error) => last_error = Some(error.to_string()),
            }

            if attempt < self.retries {
                sleep(Duration::from_millis(
                    self.retry_delay_ms.saturating_mul(attempt as u64 + 1),
                ));
            }
        }
        bail!(last_error.unwrap_or_else(|| format!("CMS request to {url} failed")))
    }
}

/// Structured-data nodes of a page read from the CMS.
pub fn structured_nodes(page: &Value) -> Result<Vec<Value>> {
    page.get("structuredData")
        .and_then(|data| data.get("structuredDataNodes"))
        .and_then(Value::as_array)
        .cloned()
        .context("page has no structuredDataNodes")
}

pub fn set_structured_nodes(page: &mut Value, nodes: Vec<Value>) -> Result<()> {
    let data = page
        .get_mut("structuredData")
        .and_then(Value::as_object_mut)
        .context("page has no structuredData object")?;
    data.insert("structuredDataNodes".to_string(), Value::Array(nodes));
    Ok(())
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{set_structured_nodes, structured_nodes};

    #[test]
    fn structured_nodes_round_trip() {
        let mut page = json!({
            "id": "p-1",
            "structuredData": {
                "definitionPath": "site/page",
                "structuredDataNodes": [
                    { "type": "text", "identifier": "page-type", "text": "standard" }
                ]
            }
        });
        let nodes = structured_nodes(&page).expect("nodes");
        assert_eq!(nodes.len(), 1);

        set_structured_nodes(&mut page, vec![]).expect("set");
        assert_eq!(structured_nodes(&page).expect("nodes").len(), 0);
        // Sibling fields of the nodes array survive.
        assert_eq!(
            page["structuredData"]["definitionPath"],
            json!("site/page")
        );
    }

    #[test]
    fn missing_structure_is_an_error() {
        let page = json!({ "id": "p-1" });
        assert!(structured_nodes(&page).is_err());
    }
}
