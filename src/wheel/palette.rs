use rand::Rng;
use serde::Deserialize;

pub type Rgb = [u8; 3];

const BLACK: Rgb = [0, 0, 0];
const WHITE: Rgb = [255, 255, 255];

/// How slice colors are picked for a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Evenly spaced hues, identical on every render.
    #[default]
    Rainbow,
    /// Uniformly random hues with saturation and value kept in a vibrant band.
    Random,
}

impl Palette {
    pub fn colors(self, n: usize) -> Vec<Rgb> {
        self.colors_with(n, &mut rand::thread_rng())
    }

    pub fn colors_with<R: Rng + ?Sized>(self, n: usize, rng: &mut R) -> Vec<Rgb> {
        match self {
            Palette::Rainbow => (0..n)
                .map(|i| hsv_to_rgb(i as f64 / n as f64, 0.8, 0.9))
                .collect(),
            Palette::Random => (0..n)
                .map(|_| {
                    hsv_to_rgb(
                        rng.gen_range(0.0..1.0),
                        rng.gen_range(0.65..=0.9),
                        rng.gen_range(0.75..=0.95),
                    )
                })
                .collect(),
        }
    }
}

/// `h`, `s` and `v` are all in `0.0..=1.0`.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector as u8 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [r, g, b].map(|c| (c * 255.0).round() as u8)
}

/// Perceived brightness on a 0–255 scale.
pub fn brightness([r, g, b]: Rgb) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

/// Text color and the halo drawn around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contrast {
    pub fg: Rgb,
    pub bg: Rgb,
}

pub fn contrast_color(background: Rgb) -> Contrast {
    if brightness(background) > 128.0 {
        Contrast { fg: BLACK, bg: WHITE }
    } else {
        Contrast { fg: WHITE, bg: BLACK }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn saturation_value([r, g, b]: Rgb) -> (f64, f64) {
        let max = f64::from(r.max(g).max(b)) / 255.0;
        let min = f64::from(r.min(g).min(b)) / 255.0;
        let saturation = if max == 0.0 { 0.0 } else { (max - min) / max };
        (saturation, max)
    }

    fn assert_vibrant(colors: &[Rgb]) {
        for &color in colors {
            let (s, v) = saturation_value(color);
            assert!(s > 0.5 && v > 0.6, "{color:?} is too dull (s={s}, v={v})");
        }
    }

    #[test]
    fn rainbow_is_deterministic_and_distinct() {
        let colors = Palette::Rainbow.colors(6);
        assert_eq!(colors, Palette::Rainbow.colors(6));
        // first hue is red
        assert!(colors[0][0] > colors[0][1] && colors[0][1] == colors[0][2]);
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_vibrant(&colors);
    }

    #[test]
    fn random_palette_is_seedable_and_vibrant() {
        let first = Palette::Random.colors_with(20, &mut StdRng::seed_from_u64(7));
        let second = Palette::Random.colors_with(20, &mut StdRng::seed_from_u64(7));
        assert_eq!(first, second);
        assert_eq!(first.len(), 20);
        assert_vibrant(&first);
        assert_vibrant(&Palette::Random.colors(50));
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), [0, 0, 255]);
        assert_eq!(hsv_to_rgb(0.5, 0.0, 0.5), [128, 128, 128]);
    }

    #[test]
    fn contrast_picks_inverse_tones() {
        assert_eq!(
            contrast_color([255, 255, 0]),
            Contrast { fg: BLACK, bg: WHITE }
        );
        assert_eq!(
            contrast_color([20, 20, 120]),
            Contrast { fg: WHITE, bg: BLACK }
        );
        // pure green is bright, pure blue is not
        assert_eq!(contrast_color([0, 255, 0]).fg, BLACK);
        assert_eq!(contrast_color([0, 0, 255]).fg, WHITE);
    }
}
