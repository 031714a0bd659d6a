use std::{io::Cursor, sync::Arc};

use ab_glyph::{FontArc, PxScale};
use image::{
    codecs::gif::{GifEncoder, Repeat},
    imageops, Delay, Frame, Pixel, Rgba, RgbaImage,
};
use imageproc::{
    drawing::{
        draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut, text_size,
    },
    geometric_transformations::{rotate_about_center, Interpolation},
    point::Point,
};

use super::{
    palette::{contrast_color, Rgb},
    plan::SpinPlan,
    WheelError,
};

pub const FRAME_SIZE: u32 = 500;
pub const WHEEL_DIAMETER: u32 = FRAME_SIZE - 2 * MARGIN;
/// Labels longer than this many characters are cut and suffixed with an ellipsis.
pub const LABEL_BUDGET: usize = 12;

const MARGIN: u32 = 10;
const CENTER: f32 = FRAME_SIZE as f32 / 2.0;
const RADIUS: f32 = WHEEL_DIAMETER as f32 / 2.0;
const LABEL_RADIUS: f32 = RADIUS * 0.6;
const FONT_SIZE: f32 = 20.0;
const HALO_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
const GIF_SPEED: i32 = 10;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);
const POINTER_FILL: Rgba<u8> = Rgba([220, 20, 60, 255]);

pub fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_BUDGET {
        label.to_string()
    } else {
        label.chars().take(LABEL_BUDGET).chain(['…']).collect()
    }
}

fn opaque([r, g, b]: Rgb) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

/// Everything needed to draw one spin, independent of the frame being drawn.
pub(crate) struct Scene {
    labels: Vec<String>,
    colors: Vec<Rgb>,
    backgrounds: Vec<Option<Arc<RgbaImage>>>,
    // color each label's contrast is computed against
    tones: Vec<Rgb>,
    font: Option<FontArc>,
}

impl Scene {
    pub fn new(
        labels: Vec<String>,
        colors: Vec<Rgb>,
        backgrounds: Vec<Option<Arc<RgbaImage>>>,
        font: Option<FontArc>,
    ) -> Self {
        let tones = colors
            .iter()
            .zip(&backgrounds)
            .map(|(&color, background)| match background {
                Some(image) => average_color(image, color),
                None => color,
            })
            .collect();
        Self {
            labels,
            colors,
            backgrounds,
            tones,
            font,
        }
    }

    pub fn frames(&self, plan: &SpinPlan) -> Vec<RgbaImage> {
        (0..plan.frame_count)
            .map(|frame| self.frame(plan, plan.offset_at(frame)))
            .collect()
    }

    pub fn frame(&self, plan: &SpinPlan, offset: f64) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(FRAME_SIZE, FRAME_SIZE, TRANSPARENT);
        self.fill_slices(&mut canvas, plan, offset);
        draw_separators(&mut canvas, plan, offset);

        if let Some(font) = &self.font {
            for (slice, label) in self.labels.iter().enumerate() {
                draw_label(
                    &mut canvas,
                    font,
                    label,
                    self.tones[slice],
                    plan.midpoint(slice, offset),
                );
            }
        }

        draw_pointer(&mut canvas);
        canvas
    }

    fn fill_slices(&self, canvas: &mut RgbaImage, plan: &SpinPlan, offset: f64) {
        // rotates screen space back into the resting wheel, for sampling backgrounds
        let (sin, cos) = (-offset.to_radians()).sin_cos();
        let radius = f64::from(RADIUS);
        let center = f64::from(CENTER);

        for (x, y, pixel) in canvas.enumerate_pixels_mut() {
            let dx = f64::from(x) + 0.5 - center;
            let dy = f64::from(y) + 0.5 - center;
            if dx * dx + dy * dy > radius * radius {
                continue;
            }

            let slice = plan.slice_at(dy.atan2(dx).to_degrees(), offset);
            let mut fill = opaque(self.colors[slice]);

            if let Some(background) = &self.backgrounds[slice] {
                let wx = (dx * cos - dy * sin + radius).max(0.0) as u32;
                let wy = (dx * sin + dy * cos + radius).max(0.0) as u32;
                let sample = background.get_pixel(
                    wx.min(background.width() - 1),
                    wy.min(background.height() - 1),
                );
                fill.blend(sample);
            }

            *pixel = fill;
        }
    }
}

fn average_color(image: &RgbaImage, fallback: Rgb) -> Rgb {
    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for pixel in image.pixels().filter(|p| p[3] > 0) {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(channel);
        }
        count += 1;
    }
    if count == 0 {
        return fallback;
    }
    sums.map(|sum| (sum / count) as u8)
}

fn draw_separators(canvas: &mut RgbaImage, plan: &SpinPlan, offset: f64) {
    for slice in 0..plan.slices {
        let angle = (slice as f64 * plan.sector_angle() + offset).to_radians() as f32;
        let rim = (
            CENTER + RADIUS * angle.cos(),
            CENTER + RADIUS * angle.sin(),
        );
        draw_line_segment_mut(canvas, (CENTER, CENTER), rim, OUTLINE);
    }
    let center = CENTER as i32;
    draw_hollow_circle_mut(canvas, (center, center), RADIUS as i32, OUTLINE);
    draw_hollow_circle_mut(canvas, (center, center), RADIUS as i32 - 1, OUTLINE);
}

/// Draws `label` along the slice midline, flipped on the left half so it never
/// reads upside down.
fn draw_label(canvas: &mut RgbaImage, font: &FontArc, label: &str, tone: Rgb, midpoint: f64) {
    let text = truncate_label(label);
    let contrast = contrast_color(tone);
    let scale = PxScale::from(FONT_SIZE);

    let (width, height) = text_size(scale, font, &text);
    let padding = FONT_SIZE as u32 / 2;
    let side = ((width + 2 * padding) as f32).hypot((height + 2 * padding) as f32).ceil() as u32;

    let mut tile = RgbaImage::from_pixel(side, side, TRANSPARENT);
    let x = ((side - width) / 2) as i32;
    let y = ((side - height) / 2) as i32;
    for (dx, dy) in HALO_OFFSETS {
        draw_text_mut(&mut tile, opaque(contrast.bg), x + dx, y + dy, scale, font, &text);
    }
    draw_text_mut(&mut tile, opaque(contrast.fg), x, y, scale, font, &text);

    let mut rotation = midpoint.rem_euclid(360.0);
    if rotation > 90.0 && rotation < 270.0 {
        rotation -= 180.0;
    }
    let tile = rotate_about_center(
        &tile,
        rotation.to_radians() as f32,
        Interpolation::Bilinear,
        TRANSPARENT,
    );

    let direction = midpoint.to_radians() as f32;
    let cx = CENTER + LABEL_RADIUS * direction.cos();
    let cy = CENTER + LABEL_RADIUS * direction.sin();
    let half = side as f32 / 2.0;
    imageops::overlay(canvas, &tile, (cx - half) as i64, (cy - half) as i64);
}

/// Downward triangle at top-centre, its tip just inside the rim.
fn draw_pointer(canvas: &mut RgbaImage) {
    let center = CENTER as i32;
    let top = 2;
    let tip = MARGIN as i32 + 24;
    let corners = [
        Point::new(center - 14, top),
        Point::new(center + 14, top),
        Point::new(center, tip),
    ];
    draw_polygon_mut(canvas, &corners, POINTER_FILL);
    for (start, end) in [(0, 1), (1, 2), (2, 0)] {
        draw_line_segment_mut(
            canvas,
            (corners[start].x as f32, corners[start].y as f32),
            (corners[end].x as f32, corners[end].y as f32),
            OUTLINE,
        );
    }
}

/// Encodes `frames` as an endlessly looping GIF timed by `plan.frame_delays_cs()`.
pub(crate) fn encode_gif(frames: Vec<RgbaImage>, plan: &SpinPlan) -> Result<Vec<u8>, WheelError> {
    if frames.is_empty() {
        return Err(WheelError::Encoding("no frames were rendered".into()));
    }

    let delays = plan.frame_delays_cs();
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buffer, GIF_SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| WheelError::Encoding(e.to_string()))?;
        encoder
            .encode_frames(
                frames.into_iter().zip(delays).map(|(frame, cs)| {
                    Frame::from_parts(frame, 0, 0, Delay::from_numer_denom_ms(cs * 10, 1))
                }),
            )
            .map_err(|e| WheelError::Encoding(e.to_string()))?;
    }
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use image::{codecs::gif::GifDecoder, AnimationDecoder};

    use super::*;
    use crate::wheel::{palette::Palette, plan::POINTER_ANGLE};

    fn scene(labels: &[&str], backgrounds: Vec<Option<Arc<RgbaImage>>>) -> Scene {
        Scene::new(
            labels.iter().map(|s| s.to_string()).collect(),
            Palette::Rainbow.colors(labels.len()),
            backgrounds,
            None,
        )
    }

    /// Pixel halfway out along `angle` (screen degrees).
    fn pixel_at(frame: &RgbaImage, angle: f64) -> Rgba<u8> {
        let distance = f64::from(RADIUS) / 2.0;
        let (sin, cos) = angle.to_radians().sin_cos();
        let x = f64::from(CENTER) + distance * cos;
        let y = f64::from(CENTER) + distance * sin;
        *frame.get_pixel(x as u32, y as u32)
    }

    #[test]
    fn labels_are_truncated_past_the_budget() {
        assert_eq!(truncate_label("Pizza"), "Pizza");
        assert_eq!(truncate_label("twelve chars"), "twelve chars");
        assert_eq!(truncate_label("thirteen char"), "thirteen cha…");
        assert_eq!(truncate_label("ééééééééééééé"), "éééééééééééé…");
        assert_eq!(truncate_label(""), "");
    }

    #[test]
    fn frames_have_a_fixed_size_and_transparent_corners() {
        let plan = SpinPlan::new(3, 1, 4, 1.0).unwrap();
        let frames = scene(&["Pizza", "Tacos", "Sushi"], vec![None, None, None]).frames(&plan);
        assert_eq!(frames.len(), 4);
        for frame in &frames {
            assert_eq!(frame.dimensions(), (FRAME_SIZE, FRAME_SIZE));
            assert_eq!(frame.get_pixel(0, FRAME_SIZE - 1), &TRANSPARENT);
        }
    }

    #[test]
    fn winner_is_under_the_pointer_in_the_last_frame() {
        let labels = ["a", "b", "c", "d", "e"];
        let scene = scene(&labels, vec![None; labels.len()]);
        let colors = Palette::Rainbow.colors(labels.len());
        for winner in 0..labels.len() {
            let plan = SpinPlan::new(labels.len(), winner, 6, 1.0).unwrap();
            let last = scene.frame(&plan, plan.offset_at(plan.frame_count - 1));
            assert_eq!(pixel_at(&last, POINTER_ANGLE), opaque(colors[winner]));
        }
    }

    #[test]
    fn first_frame_is_at_rest() {
        let plan = SpinPlan::new(4, 2, 5, 1.0).unwrap();
        let colors = Palette::Rainbow.colors(4);
        let first = scene(&["a", "b", "c", "d"], vec![None; 4]).frame(&plan, plan.offset_at(0));
        // slice i spans [90i, 90i + 90) at rest
        for (slice, color) in colors.iter().enumerate() {
            assert_eq!(pixel_at(&first, 45.0 + 90.0 * slice as f64), opaque(*color));
        }
    }

    #[test]
    fn backgrounds_replace_the_solid_fill() {
        let blue = Arc::new(RgbaImage::from_pixel(
            WHEEL_DIAMETER,
            WHEEL_DIAMETER,
            Rgba([0, 0, 255, 255]),
        ));
        let plan = SpinPlan::new(2, 0, 2, 1.0).unwrap();
        let colors = Palette::Rainbow.colors(2);
        let frame = scene(&["a", "b"], vec![Some(blue), None]).frame(&plan, 0.0);
        assert_eq!(pixel_at(&frame, 90.0), Rgba([0, 0, 255, 255]));
        assert_eq!(pixel_at(&frame, 270.0), opaque(colors[1]));
    }

    #[test]
    fn pointer_is_drawn_over_the_wheel() {
        let plan = SpinPlan::new(2, 0, 2, 1.0).unwrap();
        let frame = scene(&["a", "b"], vec![None, None]).frame(&plan, 123.0);
        let center = CENTER as u32;
        assert_eq!(frame.get_pixel(center, MARGIN + 10), &POINTER_FILL);
    }

    #[test]
    fn labels_stay_inside_the_frame() {
        // only runs where the usual system font is installed
        let Ok(bytes) = std::fs::read("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf")
        else {
            return;
        };
        let font = FontArc::try_from_vec(bytes).unwrap();
        let labels = ["A very long option name indeed", "Short", "Medium label"];
        let plan = SpinPlan::new(3, 0, 2, 1.0).unwrap();

        let bare = scene(&labels, vec![None; 3]).frame(&plan, 77.0);
        let labelled = Scene::new(
            labels.iter().map(|s| s.to_string()).collect(),
            Palette::Rainbow.colors(3),
            vec![None; 3],
            Some(font),
        )
        .frame(&plan, 77.0);

        assert_eq!(labelled.dimensions(), bare.dimensions());
        assert_ne!(labelled, bare);
        // text never spills past the rim
        for (x, y, pixel) in labelled.enumerate_pixels() {
            let dx = f64::from(x) + 0.5 - f64::from(CENTER);
            let dy = f64::from(y) + 0.5 - f64::from(CENTER);
            if dx.hypot(dy) > f64::from(RADIUS) + 2.0 && y > MARGIN + 30 {
                assert_eq!(pixel, &TRANSPARENT, "text drawn outside the wheel at ({x}, {y})");
            }
        }
    }

    fn decoded_delays(frame_count: usize, secs: f64) -> Vec<(u32, u32)> {
        let plan = SpinPlan::new(2, 0, frame_count, secs).unwrap();
        let frames = scene(&["Pizza", "Tacos"], vec![None; 2]).frames(&plan);
        let bytes = encode_gif(frames, &plan).unwrap();
        GifDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
            .iter()
            .map(|frame| {
                assert_eq!(frame.buffer().dimensions(), (FRAME_SIZE, FRAME_SIZE));
                frame.delay().numer_denom_ms()
            })
            .collect()
    }

    fn total_ms(delays: &[(u32, u32)]) -> f64 {
        delays
            .iter()
            .map(|&(numer, denom)| f64::from(numer) / f64::from(denom))
            .sum()
    }

    #[test]
    fn encoded_gif_keeps_frames_and_timing() {
        let delays = decoded_delays(10, 2.0);
        assert_eq!(delays.len(), 10);
        assert!((total_ms(&delays) - 2000.0).abs() <= 10.0);
    }

    #[test]
    fn uneven_frame_delays_keep_the_total_duration() {
        for (frames, secs) in [(45, 3.0), (60, 2.0), (60, 1.2)] {
            let delays = decoded_delays(frames, secs);
            assert_eq!(delays.len(), frames);
            let total = total_ms(&delays);
            assert!(
                (total - secs * 1000.0).abs() <= 10.0,
                "{frames} frames over {secs}s played for {total}ms"
            );
            assert!(
                delays.iter().all(|&(numer, _)| numer > 0),
                "{frames} frames over {secs}s has a zero delay"
            );
        }
    }

    #[test]
    fn encoding_nothing_fails() {
        let plan = SpinPlan::new(2, 0, 2, 1.0).unwrap();
        assert!(matches!(
            encode_gif(Vec::new(), &plan),
            Err(WheelError::Encoding(_))
        ));
    }
}
