use std::fmt;

use ab_glyph::FontArc;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{info, warn};

use crate::{
    apis::{
        jeyy::JeyyClient,
        radio_browser::{RadioBrowser, Station},
    },
    config::Config,
    database::{self, DbPool},
    wheel::{ImageCache, WheelRenderer},
};

// Shared state
pub struct Data {
    pub config: Config,
    pub pool: DbPool,
    pub wheel: WheelRenderer,
    pub jeyy: JeyyClient,
    pub radio: RadioBrowser,
    /// Each user's most recent station search, for `radio pick`.
    pub radio_searches: DashMap<serenity::UserId, Vec<Station>>,
}

impl Data {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let pool = database::open_pool(SqliteConnectionManager::file(&config.database_url))?;
        info!("Opened database at {}", config.database_url);

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let font = match load_font(&config.font_path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Could not load the wheel font; wheels will be drawn without labels. Detailed error:\n{e:#}");
                None
            }
        };

        Ok(Data {
            wheel: WheelRenderer::new(font, config.wheel_palette, ImageCache::new(http.clone())),
            jeyy: JeyyClient::new(http.clone(), config.jeyy_api_base.clone()),
            radio: RadioBrowser::new(http),
            radio_searches: DashMap::new(),
            pool,
            config,
        })
    }
}

// Needed for `FrameworkError: Debug` in the webhook report. Handles and clients are left out.
impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("dev", &self.config.dev)
            .field("cached_images", &self.wheel.images().len())
            .field("radio_searches", &self.radio_searches.len())
            .finish_non_exhaustive()
    }
}

fn load_font(path: &str) -> anyhow::Result<FontArc> {
    let bytes = std::fs::read(path)?;
    Ok(FontArc::try_from_vec(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_skips_handles_and_secrets() {
        let config = Config::from_iter([
            ("BOT_TOKEN".to_string(), "very-secret".to_string()),
            ("DATABASE_URL".to_string(), ":memory:".to_string()),
            ("DEFAULT_EMBED_COLOR".to_string(), "#ff8800".to_string()),
            ("FONT_PATH".to_string(), "/nonexistent/font.ttf".to_string()),
        ])
        .unwrap();
        let data = Data::from_config(config).unwrap();

        let shown = format!("{data:?}");
        assert!(shown.starts_with("Data {"));
        assert!(shown.contains("cached_images: 0"));
        assert!(shown.ends_with(".. }"));
        assert!(!shown.contains("very-secret"));
    }
}
