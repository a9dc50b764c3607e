use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Frame, Rgba, RgbaImage, imageops};
use imageproc::drawing::draw_text_mut;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::AvatarError;
use crate::icons::IconCache;
use crate::model::{Artifact, ArtifactKind, WeatherSnapshot};

/// Canvas is a fixed 200x200 square; the remote profile crops to a circle.
pub const CANVAS_SIZE: u32 = 200;

const ICON_OFFSET: (i64, i64) = (50, 15);
const TEMPERATURE_XY: (i32, i32) = (65, 100);
const INFO_XY: (i32, i32) = (55, 130);
const TEMPERATURE_SCALE: f32 = 30.0;
const INFO_SCALE: f32 = 15.0;

/// Rendering knobs, fixed for the life of the renderer.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub text_color: [u8; 3],
    pub background_color: [u8; 3],
    pub font_file: PathBuf,
    /// Presence selects the animated-video render path.
    pub background_animation: Option<PathBuf>,
    pub output_dir: PathBuf,
}

/// Seam between the polling loop and the concrete renderer.
#[async_trait]
pub trait AvatarRender: Send + Sync {
    async fn render(&self, snapshot: &WeatherSnapshot) -> Result<Artifact, AvatarError>;
}

/// Composites the weather snapshot into `avatar.png`, or — when an
/// animated background is configured — into `avatar.gif` transcoded to
/// `avatar.mp4` by ffmpeg.
pub struct AvatarRenderer {
    config: RenderConfig,
    icons: IconCache,
    font: FontVec,
    /// Decoded once at construction, not per cycle.
    background_frames: Option<Vec<RgbaImage>>,
}

impl AvatarRenderer {
    pub fn new(config: RenderConfig, icons: IconCache) -> Result<Self, AvatarError> {
        let font_data = std::fs::read(&config.font_file)
            .with_context(|| format!("Failed to read font file {}", config.font_file.display()))
            .map_err(AvatarError::Render)?;

        let font = FontVec::try_from_vec(font_data)
            .map_err(|_| {
                AvatarError::Render(anyhow!(
                    "Font file {} is not a valid TTF/OTF font",
                    config.font_file.display()
                ))
            })?;

        let background_frames = match &config.background_animation {
            Some(path) => Some(load_animation_frames(path).map_err(AvatarError::Render)?),
            None => None,
        };

        Ok(Self { config, icons, font, background_frames })
    }

    /// Fully rendered overlay layer: background fill, icon, both text
    /// lines. On the animated path the fill is transparent so only the
    /// icon and text cover the background frames.
    fn draw_overlay(&self, snapshot: &WeatherSnapshot) -> Result<RgbaImage, AvatarError> {
        let [r, g, b] = self.config.background_color;
        let alpha = if self.background_frames.is_some() { 0 } else { 255 };
        let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([r, g, b, alpha]));

        let icon_path = self.icons.icon_path(&snapshot.condition_code);
        let icon = image::open(&icon_path)
            .with_context(|| format!("Failed to open cached icon {}", icon_path.display()))
            .map_err(AvatarError::Render)?
            .into_rgba8();
        imageops::overlay(&mut canvas, &icon, ICON_OFFSET.0, ICON_OFFSET.1);

        let [tr, tg, tb] = self.config.text_color;
        let text_color = Rgba([tr, tg, tb, 255]);

        draw_text_mut(
            &mut canvas,
            text_color,
            TEMPERATURE_XY.0,
            TEMPERATURE_XY.1,
            PxScale::from(TEMPERATURE_SCALE),
            &self.font,
            &format_temperature(snapshot.temperature_celsius),
        );
        draw_text_mut(
            &mut canvas,
            text_color,
            INFO_XY.0,
            INFO_XY.1,
            PxScale::from(INFO_SCALE),
            &self.font,
            &format_info_line(snapshot),
        );

        Ok(canvas)
    }
}

#[async_trait]
impl AvatarRender for AvatarRenderer {
    async fn render(&self, snapshot: &WeatherSnapshot) -> Result<Artifact, AvatarError> {
        let overlay = self.draw_overlay(snapshot)?;

        match &self.background_frames {
            None => {
                let path = self.config.output_dir.join("avatar.png");
                overlay
                    .save(&path)
                    .with_context(|| format!("Failed to save avatar to {}", path.display()))
                    .map_err(AvatarError::Render)?;

                info!(path = %path.display(), "static avatar rendered");
                Ok(Artifact { path, kind: ArtifactKind::Image })
            }
            Some(frames) => {
                let composited = composite_frames(frames, &overlay);
                debug!(frames = composited.len(), "background frames composited");

                let gif_path = self.config.output_dir.join("avatar.gif");
                encode_gif(&gif_path, &composited).map_err(AvatarError::Render)?;

                let video_path = self.config.output_dir.join("avatar.mp4");
                transcode_to_video(&gif_path, &video_path)
                    .await
                    .map_err(AvatarError::Render)?;

                info!(path = %video_path.display(), "animated avatar rendered");
                Ok(Artifact { path: video_path, kind: ArtifactKind::Video })
            }
        }
    }
}

/// Temperature line, e.g. "+23 C" or "-5 C". The Celsius value is
/// integer-truncated; non-negative values (zero included) carry an
/// explicit plus sign.
pub fn format_temperature(celsius: f64) -> String {
    let truncated = celsius.trunc() as i64;
    if truncated >= 0 {
        format!("+{truncated} C")
    } else {
        format!("{truncated} C")
    }
}

/// Second text line: humidity and wind speed, e.g. "46%   0.67 m/c".
pub fn format_info_line(snapshot: &WeatherSnapshot) -> String {
    format!("{}%   {} m/c", snapshot.humidity_percent, snapshot.wind_speed_mps)
}

/// Resize every background frame to the canvas and alpha-composite the
/// overlay on top. Pure; exercised directly by tests.
fn composite_frames(frames: &[RgbaImage], overlay: &RgbaImage) -> Vec<RgbaImage> {
    frames
        .iter()
        .map(|frame| {
            let mut resized =
                imageops::resize(frame, CANVAS_SIZE, CANVAS_SIZE, imageops::FilterType::Triangle);
            imageops::overlay(&mut resized, overlay, 0, 0);
            resized
        })
        .collect()
}

fn load_animation_frames(path: &Path) -> Result<Vec<RgbaImage>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open background animation {}", path.display()))?;

    let decoder = GifDecoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode background animation {}", path.display()))?;

    let frames = decoder
        .into_frames()
        .collect_frames()
        .context("Failed to read background animation frames")?;

    if frames.is_empty() {
        return Err(anyhow!("Background animation {} has no frames", path.display()));
    }

    Ok(frames.into_iter().map(Frame::into_buffer).collect())
}

/// Encode the intermediate looping GIF. The trailing boundary frame is
/// dropped from the published sequence.
fn encode_gif(path: &Path, frames: &[RgbaImage]) -> Result<()> {
    let kept = if frames.len() > 1 { &frames[..frames.len() - 1] } else { frames };

    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut encoder = GifEncoder::new(file);
    encoder
        .set_repeat(Repeat::Infinite)
        .context("Failed to set GIF repeat mode")?;

    for frame in kept {
        encoder
            .encode_frame(Frame::new(frame.clone()))
            .context("Failed to encode animation frame")?;
    }

    Ok(())
}

/// Transcode the intermediate GIF to an MP4 without an audio track.
async fn transcode_to_video(input: &Path, output: &Path) -> Result<()> {
    let status = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-y") // overwrite last cycle's artifact
        .arg("-i")
        .arg(input)
        .arg("-movflags")
        .arg("faststart")
        .arg("-pix_fmt")
        .arg("yuv420p") // broadest player compatibility
        .arg("-an") // no audio track
        .arg(output)
        .status()
        .await
        .context("Failed to spawn ffmpeg")?;

    if !status.success() {
        return Err(anyhow!("ffmpeg exited with {status}"));
    }

    Ok(())
}
