use anyhow::bail;
use serde_json::json;
use tracing::warn;

use crate::util::excerpt;

pub const MIN_BLUR: u8 = 1;
pub const MAX_BLUR: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Blur(u8),
    Grayscale,
}

impl Filter {
    pub fn endpoint(self) -> String {
        match self {
            Filter::Blur(intensity) => format!("blur/{intensity}"),
            Filter::Grayscale => "grayscale".into(),
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Filter::Blur(_) => "blur.png",
            Filter::Grayscale => "grayscale.png",
        }
    }
}

/// Client for the Jeyy image manipulation API.
pub struct JeyyClient {
    http: reqwest::Client,
    base: String,
}

impl JeyyClient {
    pub fn new(http: reqwest::Client, base: String) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, filter: Filter) -> String {
        format!("{}/{}", self.base, filter.endpoint())
    }

    /// Applies `filter` to the image at `image_url` and returns the resulting image bytes.
    pub async fn apply(
        &self,
        filter: Filter,
        image_url: &str,
        api_key: &str,
    ) -> anyhow::Result<Vec<u8>> {
        let resp = self
            .http
            .post(self.url(filter))
            .header(reqwest::header::AUTHORIZATION, api_key)
            .json(&json!({ "image": image_url }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                "Jeyy `{}` failed: {status} {}",
                filter.endpoint(),
                excerpt(&body, 200)
            );
            bail!("HTTP {}", status.as_u16());
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
