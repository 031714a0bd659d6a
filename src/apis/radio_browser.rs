use std::{fmt, time::Duration};

use anyhow::bail;
use serde::{de::DeserializeOwned, Deserialize};
use tap::TapFallible;
use tracing::error;

use crate::util::excerpt;

const API_BASE: &str = "https://api.radio-browser.info/json";
const WS_BASE: &str = "https://www.radio-browser.info/webservice/json";
const TIMEOUT: Duration = Duration::from_secs(8);
pub const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Station {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub url_resolved: String,
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "Unknown"
    } else {
        value
    }
}

impl Station {
    pub fn display_name(&self) -> &str {
        or_unknown(&self.name)
    }

    pub fn display_country(&self) -> &str {
        or_unknown(&self.country)
    }

    pub fn display_language(&self) -> &str {
        or_unknown(&self.language)
    }

    pub fn stream_url(&self) -> &str {
        [&self.url_resolved, &self.url]
            .into_iter()
            .find(|url| !url.is_empty())
            .map_or("No URL available", String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Name,
    Country,
    Tag,
    Language,
}

impl SearchField {
    fn parse(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "country" => Some(Self::Country),
            "tag" => Some(Self::Tag),
            "language" => Some(Self::Language),
            _ => None,
        }
    }

    pub fn param(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Country => "country",
            Self::Tag => "tag",
            Self::Language => "language",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let param = self.param();
        let mut chars = param.chars();
        if let Some(first) = chars.next() {
            write!(f, "{}{}", first.to_uppercase(), chars.as_str())?;
        }
        Ok(())
    }
}

/// A search query: an optional leading field keyword, then the search text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub field: SearchField,
    pub text: String,
}

impl SearchQuery {
    /// `None` when there is nothing to search for. A lone field keyword is searched
    /// for as a name.
    pub fn parse(input: &str) -> Option<Self> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let (first, rest) = words.split_first()?;
        match SearchField::parse(first) {
            Some(field) if !rest.is_empty() => Some(Self {
                field,
                text: rest.join(" "),
            }),
            _ => Some(Self {
                field: SearchField::Name,
                text: words.join(" "),
            }),
        }
    }
}

/// The random-station endpoint answers with either a station or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Station>),
    One(Station),
}

impl OneOrMany {
    fn into_first(self) -> Option<Station> {
        match self {
            OneOrMany::Many(stations) => stations.into_iter().next(),
            OneOrMany::One(station) => Some(station),
        }
    }
}

/// Client for the Radio Browser directory, falling back to the legacy webservice
/// when the primary API can't be reached.
pub struct RadioBrowser {
    http: reqwest::Client,
    bases: Vec<String>,
}

impl RadioBrowser {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_bases(http, vec![API_BASE.into(), WS_BASE.into()])
    }

    pub fn with_bases(http: reqwest::Client, bases: Vec<String>) -> Self {
        Self { http, bases }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let resp = self
            .http
            .get(format!("{base}{path}"))
            .query(params)
            .timeout(TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            bail!("HTTP {status} @ {base}: {}", excerpt(&text, 200));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Tries each base in turn and returns the first successful response.
    async fn first_success<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Option<T> {
        for base in &self.bases {
            if let Ok(value) = self
                .get_json(base, path, params)
                .await
                .tap_err(|e| error!("Radio Browser request for {path} failed: {e:#}"))
            {
                return Some(value);
            }
        }
        None
    }

    /// `None` when no endpoint could be reached.
    pub async fn search(&self, query: &SearchQuery) -> Option<Vec<Station>> {
        let params = [
            (query.field.param(), query.text.clone()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        self.first_success("/stations/search", &params).await
    }

    pub async fn random(&self) -> Option<Station> {
        self.first_success::<OneOrMany>("/stations/random", &[])
            .await
            .and_then(OneOrMany::into_first)
    }
}
