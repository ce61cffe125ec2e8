//! Parameter model for the four generation workflows.
//!
//! Every run builds one immutable parameter struct up front and passes it by
//! value through the pipeline. Numeric inputs arrive as raw strings and go
//! through [`clamp_int`]/[`clamp_float`]: out-of-range values are silently
//! clamped to the nearest bound, malformed values fall back to the documented
//! default. Only hard requirements (prompt, images, task types, the
//! text-to-video seed) produce validation errors.
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Resolution presets for the `z-image-turbo` image generator.
pub const Z_RESOLUTIONS: &[(&str, (u32, u32))] = &[
    ("1:1 (2048x2048)", (2048, 2048)),
    ("1:1 (1024x1024)", (1024, 1024)),
    ("3:4 (768x1024)", (768, 1024)),
    ("4:3 (1024x768)", (1024, 768)),
    ("16:9 (1024x576)", (1024, 576)),
    ("9:16 (576x1024)", (576, 1024)),
];

/// Edit task-type tags accepted by `Qwen-Image-Edit-2511`.
pub const EDIT_TASK_TYPES: &[&str] = &["id", "style", "pose", "layout", "color", "background"];

/// Length of one generated video segment in seconds. The backend produces
/// fixed 5-second clips; longer requests are split into that many tasks.
pub const SEGMENT_SECONDS: f64 = 5.0;

/// Parse a raw integer field, clamping into `[lo, hi]`.
///
/// A value that does not parse as a number yields `default`. Fractional input
/// is truncated toward zero first, so "12.9" reads as 12.
pub fn clamp_int(raw: &str, lo: i64, hi: i64, default: i64) -> i64 {
    let trimmed = raw.trim();
    let parsed = trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    });
    match parsed {
        Some(v) => v.clamp(lo, hi),
        None => default,
    }
}

/// Parse a raw float field, clamping into `[lo, hi]`; `default` on malformed
/// or non-finite input.
pub fn clamp_float(raw: &str, lo: f64, hi: f64, default: f64) -> f64 {
    match raw.trim().parse::<f64>().ok().filter(|f| f.is_finite()) {
        Some(v) => v.clamp(lo, hi),
        None => default,
    }
}

fn require_prompt(prompt: &str) -> AppResult<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("prompt is required".to_string()));
    }
    Ok(trimmed.to_string())
}

fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// One generation run, tagged by mode. Constructed once, then handed to
/// [`crate::workflow::run`].
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    TextToImage(TextToImageParams),
    ImageEdit(ImageEditParams),
    ImageToVideo(ImageToVideoParams),
    TextToVideo(TextToVideoParams),
}

impl GenerationRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            GenerationRequest::TextToImage(_) => "text-to-image",
            GenerationRequest::ImageEdit(_) => "image-edit",
            GenerationRequest::ImageToVideo(_) => "image-to-video",
            GenerationRequest::TextToVideo(_) => "text-to-video",
        }
    }
}

/// `z-image-turbo` parameters. `n` is [1,4] default 1; the resolution comes
/// from the [`Z_RESOLUTIONS`] preset table.
#[derive(Debug, Clone)]
pub struct TextToImageParams {
    pub prompt: String,
    pub n: i64,
    pub width: u32,
    pub height: u32,
}

impl TextToImageParams {
    pub fn new(prompt: &str, n: Option<&str>, resolution: Option<&str>) -> AppResult<Self> {
        let prompt = require_prompt(prompt)?;
        let n = clamp_int(n.unwrap_or(""), 1, 4, 1);
        let (width, height) = match resolution {
            None => Z_RESOLUTIONS[0].1,
            Some(key) => {
                Z_RESOLUTIONS
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, wh)| *wh)
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "unknown resolution '{}'; expected one of: {}",
                            key,
                            Z_RESOLUTIONS
                                .iter()
                                .map(|(name, _)| *name)
                                .collect::<Vec<_>>()
                                .join(", ")
                        ))
                    })?
            }
        };
        Ok(TextToImageParams {
            prompt,
            n,
            width,
            height,
        })
    }

    /// Size string the upstream expects, e.g. `1024x1024`.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// `Qwen-Image-Edit-2511` parameters. Exactly two input images and at least
/// one task-type tag are required.
#[derive(Debug, Clone)]
pub struct ImageEditParams {
    pub prompt: String,
    pub images: Vec<PathBuf>,
    pub task_types: Vec<String>,
    pub steps: i64,
    pub guidance: f64,
}

impl ImageEditParams {
    pub fn new(
        prompt: &str,
        images: Vec<PathBuf>,
        task_types: Vec<String>,
        steps: Option<&str>,
        guidance: Option<&str>,
    ) -> AppResult<Self> {
        let prompt = require_prompt(prompt)?;
        if images.len() != 2 {
            return Err(AppError::Validation(format!(
                "image edit needs exactly 2 input images, got {}",
                images.len()
            )));
        }
        if task_types.is_empty() {
            return Err(AppError::Validation(
                "choose at least one task type".to_string(),
            ));
        }
        for t in &task_types {
            if !EDIT_TASK_TYPES.contains(&t.as_str()) {
                return Err(AppError::Validation(format!(
                    "unknown task type '{}'; expected one of: {}",
                    t,
                    EDIT_TASK_TYPES.join(", ")
                )));
            }
        }
        Ok(ImageEditParams {
            prompt,
            images,
            task_types,
            steps: clamp_int(steps.unwrap_or(""), 1, 50, 4),
            guidance: clamp_float(guidance.unwrap_or(""), 0.0, 10.0, 1.0),
        })
    }
}

/// `Wan2_2-I2V-A14B` image-to-video parameters.
///
/// `num_frames` can be derived from fps (`fps * 5`, clamped to [1,300]) or
/// given explicitly. A negative seed means "let the backend pick".
#[derive(Debug, Clone)]
pub struct ImageToVideoParams {
    pub image: PathBuf,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: i64,
    pub height: i64,
    pub steps: i64,
    pub guidance: f64,
    pub fps: i64,
    pub duration: f64,
    pub num_frames: i64,
    pub seed: Option<i64>,
    pub watermark: bool,
    pub prompt_extend: bool,
}

#[allow(clippy::too_many_arguments)]
impl ImageToVideoParams {
    pub fn new(
        image: PathBuf,
        prompt: &str,
        negative_prompt: Option<&str>,
        width: Option<&str>,
        height: Option<&str>,
        steps: Option<&str>,
        guidance: Option<&str>,
        fps: Option<&str>,
        duration: Option<&str>,
        num_frames: Option<&str>,
        seed: Option<&str>,
        watermark: bool,
        prompt_extend: bool,
    ) -> AppResult<Self> {
        let prompt = require_prompt(prompt)?;
        let fps_v = clamp_int(fps.unwrap_or(""), 1, 60, 24);
        // Explicit frame count wins; otherwise derive 5 seconds' worth.
        let num_frames_v = match num_frames {
            Some(raw) if !raw.trim().is_empty() => clamp_int(raw, 1, 300, 30),
            _ => (fps_v * 5).clamp(1, 300),
        };
        let seed_v = clamp_int(seed.unwrap_or("-1"), -1, i32::MAX as i64, -1);

        Ok(ImageToVideoParams {
            image,
            prompt,
            negative_prompt: optional_text(negative_prompt),
            width: clamp_int(width.unwrap_or(""), 64, 2048, 832),
            height: clamp_int(height.unwrap_or(""), 64, 2048, 480),
            steps: clamp_int(steps.unwrap_or(""), 1, 100, 30),
            guidance: clamp_float(guidance.unwrap_or(""), 0.0, 20.0, 5.0),
            fps: fps_v,
            duration: clamp_float(duration.unwrap_or(""), 0.5, 60.0, 5.0),
            num_frames: num_frames_v,
            seed: if seed_v < 0 { None } else { Some(seed_v) },
            watermark,
            prompt_extend,
        })
    }

    /// How many independent segment tasks the requested duration needs.
    pub fn segment_count(&self) -> usize {
        ((self.duration / SEGMENT_SECONDS).ceil() as usize).max(1)
    }
}

/// `HunyuanVideo-1.5` text-to-video parameters.
///
/// The seed is the one field this endpoint rejects instead of clamping: it
/// must parse as a positive integer.
#[derive(Debug, Clone)]
pub struct TextToVideoParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub aspect_ratio: String,
    pub steps: i64,
    pub num_frames: i64,
    pub seed: i64,
    pub fps: i64,
}

impl TextToVideoParams {
    pub fn new(
        prompt: &str,
        negative_prompt: Option<&str>,
        aspect_ratio: Option<&str>,
        steps: Option<&str>,
        num_frames: Option<&str>,
        seed: &str,
        fps: Option<&str>,
    ) -> AppResult<Self> {
        let prompt = require_prompt(prompt)?;
        let seed = seed
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| AppError::Validation("seed must be a positive integer".to_string()))?;

        Ok(TextToVideoParams {
            prompt,
            negative_prompt: optional_text(negative_prompt).unwrap_or_default(),
            aspect_ratio: optional_text(aspect_ratio).unwrap_or_else(|| "16:9".to_string()),
            steps: clamp_int(steps.unwrap_or(""), 1, 10, 10),
            num_frames: clamp_int(num_frames.unwrap_or(""), 81, 241, 241),
            seed,
            fps: clamp_int(fps.unwrap_or(""), 1, 24, 24),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_int_keeps_in_range_values() {
        assert_eq!(clamp_int("30", 1, 100, 30), 30);
        assert_eq!(clamp_int("1", 1, 100, 30), 1);
        assert_eq!(clamp_int("100", 1, 100, 30), 100);
    }

    #[test]
    fn clamp_int_clamps_to_nearest_bound() {
        assert_eq!(clamp_int("0", 1, 100, 30), 1);
        assert_eq!(clamp_int("9999", 1, 100, 30), 100);
        assert_eq!(clamp_int("-5", 1, 100, 30), 1);
    }

    #[test]
    fn clamp_int_defaults_on_malformed_input() {
        assert_eq!(clamp_int("", 1, 100, 30), 30);
        assert_eq!(clamp_int("abc", 1, 100, 30), 30);
        assert_eq!(clamp_int("NaN", 1, 100, 30), 30);
    }

    #[test]
    fn clamp_int_truncates_fractions() {
        assert_eq!(clamp_int("12.9", 1, 100, 30), 12);
    }

    #[test]
    fn clamp_float_behaves_like_clamp_int() {
        assert!((clamp_float("5.5", 0.0, 10.0, 1.0) - 5.5).abs() < f64::EPSILON);
        assert!((clamp_float("-1", 0.0, 10.0, 1.0) - 0.0).abs() < f64::EPSILON);
        assert!((clamp_float("11", 0.0, 10.0, 1.0) - 10.0).abs() < f64::EPSILON);
        assert!((clamp_float("x", 0.0, 10.0, 1.0) - 1.0).abs() < f64::EPSILON);
        assert!((clamp_float("inf", 0.0, 10.0, 1.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn text_to_image_requires_prompt() {
        assert!(matches!(
            TextToImageParams::new("   ", None, None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn text_to_image_defaults() {
        let p = TextToImageParams::new("a cat", None, None).unwrap();
        assert_eq!(p.n, 1);
        assert_eq!(p.size(), "2048x2048");
        let p = TextToImageParams::new("a cat", Some("9"), Some("9:16 (576x1024)")).unwrap();
        assert_eq!(p.n, 4);
        assert_eq!(p.size(), "576x1024");
    }

    #[test]
    fn image_edit_requires_two_images_and_task_types() {
        let err = ImageEditParams::new("p", vec![PathBuf::from("a.png")], vec!["id".into()], None, None);
        assert!(matches!(err, Err(AppError::Validation(_))));

        let two = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let err = ImageEditParams::new("p", two.clone(), vec![], None, None);
        assert!(matches!(err, Err(AppError::Validation(_))));

        let err = ImageEditParams::new("p", two.clone(), vec!["bogus".into()], None, None);
        assert!(matches!(err, Err(AppError::Validation(_))));

        let ok = ImageEditParams::new("p", two, vec!["id".into(), "style".into()], Some("200"), Some("abc")).unwrap();
        assert_eq!(ok.steps, 50);
        assert!((ok.guidance - 1.0).abs() < f64::EPSILON);
    }

    fn i2v(duration: &str) -> ImageToVideoParams {
        ImageToVideoParams::new(
            PathBuf::from("in.png"),
            "p",
            None,
            None,
            None,
            None,
            None,
            None,
            Some(duration),
            None,
            None,
            false,
            false,
        )
        .unwrap()
    }

    #[test]
    fn segment_count_rounds_up() {
        assert_eq!(i2v("12").segment_count(), 3);
        assert_eq!(i2v("5").segment_count(), 1);
        assert_eq!(i2v("5.001").segment_count(), 2);
        // duration clamps to at least 0.5, so count is never zero
        assert_eq!(i2v("0").segment_count(), 1);
    }

    #[test]
    fn i2v_defaults_and_auto_frames() {
        let p = i2v("5");
        assert_eq!(p.width, 832);
        assert_eq!(p.height, 480);
        assert_eq!(p.steps, 30);
        assert_eq!(p.fps, 24);
        assert_eq!(p.num_frames, 120); // 24 fps * 5 s
        assert_eq!(p.seed, None);
    }

    #[test]
    fn i2v_explicit_frames_and_seed() {
        let p = ImageToVideoParams::new(
            PathBuf::from("in.png"),
            "p",
            Some("  blurry  "),
            Some("4096"),
            Some("10"),
            None,
            None,
            Some("120"),
            None,
            Some("500"),
            Some("42"),
            true,
            false,
        )
        .unwrap();
        assert_eq!(p.width, 2048);
        assert_eq!(p.height, 64);
        assert_eq!(p.fps, 60);
        assert_eq!(p.num_frames, 300);
        assert_eq!(p.seed, Some(42));
        assert_eq!(p.negative_prompt.as_deref(), Some("blurry"));
    }

    #[test]
    fn text_to_video_seed_is_strict() {
        assert!(matches!(
            TextToVideoParams::new("p", None, None, None, None, "0", None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            TextToVideoParams::new("p", None, None, None, None, "-3", None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            TextToVideoParams::new("p", None, None, None, None, "seed", None),
            Err(AppError::Validation(_))
        ));
        let ok = TextToVideoParams::new("p", None, None, Some("99"), Some("10"), "7", None).unwrap();
        assert_eq!(ok.seed, 7);
        assert_eq!(ok.steps, 10);
        assert_eq!(ok.num_frames, 81);
        assert_eq!(ok.aspect_ratio, "16:9");
    }

    #[test]
    fn request_mode_labels() {
        let req = GenerationRequest::TextToImage(TextToImageParams::new("p", None, None).unwrap());
        assert_eq!(req.mode(), "text-to-image");
    }
}
