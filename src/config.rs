use anyhow::Context;
use poise::serenity_prelude as serenity;
use serde::{de::Error, Deserialize, Deserializer};

use crate::wheel::Palette;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub dev: bool,
    #[serde(flatten)]
    pub secrets: Secrets,
    pub database_url: String,
    #[serde(deserialize_with = "hex_color")]
    pub default_embed_color: serenity::Color,
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_font_path")]
    pub font_path: String,
    #[serde(default)]
    pub wheel_palette: Palette,
    #[serde(default = "default_jeyy_api_base")]
    pub jeyy_api_base: String,
    pub repository_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Secrets {
    pub bot_token: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_prefix() -> String {
    "!".into()
}

fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".into()
}

fn default_jeyy_api_base() -> String {
    "https://api.jeyy.xyz".into()
}

fn hex_color<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<serenity::Color, D::Error> {
    let s: String = Deserialize::deserialize(d)?;
    let result =
        u32::from_str_radix(s.trim_start_matches('#'), 16).map_err(D::Error::custom)?;
    Ok(serenity::Colour(result))
}

impl Config {
    /// Loads `.env` (or `.dev.env` when `DEV` is set) and reads the configuration
    /// from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        if std::env::var("DEV").is_ok() {
            dotenvy::from_filename(".dev.env").context(".dev.env should exist")?;
        } else {
            dotenvy::dotenv().context(".env should exist")?;
        }
        Self::from_iter(std::env::vars())
    }

    pub fn from_iter(vars: impl IntoIterator<Item = (String, String)>) -> anyhow::Result<Self> {
        envy::from_iter::<_, Config>(vars).context("Configuration is invalid")
    }
}
