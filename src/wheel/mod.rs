//! Animated spinning-wheel GIFs.
//!
//! A render takes the wheel's labels and a winner chosen by the caller, and produces a
//! looping animation that spins a few full turns before stopping with the winner's
//! slice under the pointer at the top of the frame.

mod cache;
mod draw;
mod palette;
mod plan;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use ab_glyph::FontArc;
use futures::future::join_all;
use image::RgbaImage;
use tap::TapFallible;
use tracing::{debug, warn};

pub use cache::ImageCache;
pub use palette::Palette;

use draw::{encode_gif, Scene};
use plan::SpinPlan;

#[derive(Debug, thiserror::Error)]
pub enum WheelError {
    #[error("invalid wheel input: {0}")]
    InvalidInput(String),
    #[error("could not fetch slice image from {url}: {reason}")]
    ImageFetch { url: String, reason: String },
    #[error("could not encode the wheel animation: {0}")]
    Encoding(String),
    #[error("wheel rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub struct WheelRenderer {
    font: Option<FontArc>,
    palette: Palette,
    images: ImageCache,
}

impl WheelRenderer {
    /// Without a font the wheel is drawn with no labels.
    pub fn new(font: Option<FontArc>, palette: Palette, images: ImageCache) -> Self {
        Self {
            font,
            palette,
            images,
        }
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    /// Renders a spin landing on `labels[winner]` and returns the encoded GIF.
    ///
    /// `image_map` maps labels to background image URLs. Slices whose image is
    /// missing or fails to load are drawn in their solid color.
    pub async fn render(
        &self,
        labels: &[String],
        winner: usize,
        frame_count: usize,
        duration_secs: f64,
        image_map: Option<&HashMap<String, String>>,
    ) -> Result<Vec<u8>, WheelError> {
        let plan = SpinPlan::new(labels.len(), winner, frame_count, duration_secs)?;
        let backgrounds = match image_map {
            Some(map) => self.resolve_backgrounds(labels, map).await,
            None => vec![None; labels.len()],
        };
        let scene = Scene::new(
            labels.to_vec(),
            self.palette.colors(labels.len()),
            backgrounds,
            self.font.clone(),
        );

        debug!(
            "Rendering {} slices over {} frames, winner {}",
            plan.slices, plan.frame_count, plan.winner
        );
        tokio::task::spawn_blocking(move || encode_gif(scene.frames(&plan), &plan)).await?
    }

    async fn resolve_backgrounds(
        &self,
        labels: &[String],
        image_map: &HashMap<String, String>,
    ) -> Vec<Option<Arc<RgbaImage>>> {
        let urls: HashSet<&str> = labels
            .iter()
            .filter_map(|label| image_map.get(label))
            .map(String::as_str)
            .collect();

        let fetched: HashMap<&str, Arc<RgbaImage>> =
            join_all(urls.into_iter().map(|url| async move {
                self.images
                    .fetch(url)
                    .await
                    .tap_err(|e| warn!("Falling back to a solid slice: {e}"))
                    .ok()
                    .map(|image| (url, image))
            }))
            .await
            .into_iter()
            .flatten()
            .collect();

        labels
            .iter()
            .map(|label| {
                image_map
                    .get(label)
                    .and_then(|url| fetched.get(url.as_str()))
                    .cloned()
            })
            .collect()
    }
}
