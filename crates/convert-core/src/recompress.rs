//! Image recompression for PDF size reduction
//!
//! Embedded JPEG images are decoded, resized and re-encoded at a lower
//! quality. With a target size, a bounded schedule of ever more aggressive
//! settings is tried until the packed document fits or the attempts run out.
//! Without one, a single pass runs at the settings of a [`QualityTier`].

use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat};
use lopdf::{Document, Object, ObjectId, Stream};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ConvertError, Result};
use crate::pdf::{load_document, name_value, number_value, pack_document};

/// JPEG quality and resize factor for one recompression pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncodeSettings {
    pub quality: u8,
    pub resize_ratio: f64,
}

impl EncodeSettings {
    pub const MIN_QUALITY: u8 = 10;
    pub const MAX_QUALITY: u8 = 100;
    pub const MIN_RATIO: f64 = 0.2;
    pub const MAX_RATIO: f64 = 1.0;

    /// Build settings, clamping both values into their legal ranges
    pub fn new(quality: i64, resize_ratio: f64) -> Self {
        let quality = quality.clamp(Self::MIN_QUALITY as i64, Self::MAX_QUALITY as i64) as u8;
        let resize_ratio = if resize_ratio.is_nan() {
            Self::MAX_RATIO
        } else {
            resize_ratio.clamp(Self::MIN_RATIO, Self::MAX_RATIO)
        };
        Self {
            quality,
            resize_ratio,
        }
    }

    /// Pixel size of an image after resizing, never below 1x1
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |d: u32| ((d as f64 * self.resize_ratio).round() as u32).max(1);
        (scale(width), scale(height))
    }
}

/// Preset settings offered to callers who do not ask for a target size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    pub fn settings(self) -> EncodeSettings {
        match self {
            QualityTier::Low => EncodeSettings::new(30, 0.5),
            QualityTier::Medium => EncodeSettings::new(60, 0.75),
            QualityTier::High => EncodeSettings::new(85, 0.9),
        }
    }
}

impl FromStr for QualityTier {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            other => Err(ConvertError::InvalidOption(format!(
                "Unknown quality '{}'. Must be 'low', 'medium', or 'high'",
                other
            ))),
        }
    }
}

/// Attempt budget and step schedule for target-size compression
#[derive(Debug, Clone, PartialEq)]
pub struct RecompressPolicy {
    pub max_attempts: u32,
    pub start: EncodeSettings,
    pub quality_step: u8,
    pub ratio_step: f64,
    pub min_quality: u8,
    pub min_ratio: f64,
}

impl Default for RecompressPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            start: EncodeSettings::new(70, 0.8),
            quality_step: 15,
            ratio_step: 0.15,
            min_quality: EncodeSettings::MIN_QUALITY,
            min_ratio: EncodeSettings::MIN_RATIO,
        }
    }
}

impl RecompressPolicy {
    /// Settings for the zero-based attempt `n`.
    ///
    /// Computed from the start point rather than by repeated subtraction so
    /// the ratio does not drift.
    pub fn settings_for_attempt(&self, n: u32) -> EncodeSettings {
        let quality = (self.start.quality as i64 - self.quality_step as i64 * n as i64)
            .max(self.min_quality as i64);
        let ratio = (self.start.resize_ratio - self.ratio_step * n as f64).max(self.min_ratio);
        // Snap to 1/1000 so 0.8 - 4 * 0.15 lands on 0.2 exactly
        EncodeSettings::new(quality, (ratio * 1000.0).round() / 1000.0)
    }

    /// The full sequence of settings this policy will try, in order
    pub fn schedule(&self) -> Vec<EncodeSettings> {
        (0..self.attempt_budget())
            .map(|n| self.settings_for_attempt(n))
            .collect()
    }

    fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Why an image was left as it was
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Not a self-contained JPEG payload; never touched
    Ineligible(String),
    InvalidDimensions,
    DecodeFailed(String),
    EncodeFailed(String),
}

impl SkipReason {
    /// True when an eligible image could not be processed
    pub fn is_failure(&self) -> bool {
        !matches!(self, SkipReason::Ineligible(_))
    }
}

/// What happened to one image XObject during a pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Reencoded {
        id: ObjectId,
        original: (u32, u32),
        resized: (u32, u32),
        bytes_before: usize,
        bytes_after: usize,
    },
    Skipped {
        id: ObjectId,
        reason: SkipReason,
    },
}

impl ImageOutcome {
    pub fn is_reencoded(&self) -> bool {
        matches!(self, ImageOutcome::Reencoded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ImageOutcome::Skipped { reason, .. } if reason.is_failure())
    }
}

/// One pass of the compression loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    pub settings: EncodeSettings,
    pub size_bytes: usize,
    pub reencoded_images: usize,
    pub skipped_images: usize,
}

/// Output bytes and per-image results of one pass
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub bytes: Vec<u8>,
    pub images: Vec<ImageOutcome>,
}

/// Summary of a compression run
#[derive(Debug, Clone, Serialize)]
pub struct CompressionReport {
    pub original_size: usize,
    pub output_size: usize,
    pub target_bytes: Option<usize>,
    pub attempts: Vec<CompressionAttempt>,
    /// Image results of the pass that produced the output
    pub images: Vec<ImageOutcome>,
}

impl CompressionReport {
    /// Missing the target is a soft outcome, reported here
    pub fn target_reached(&self) -> bool {
        self.target_bytes
            .map_or(true, |target| self.output_size <= target)
    }

    pub fn reencoded_images(&self) -> usize {
        self.images.iter().filter(|i| i.is_reencoded()).count()
    }

    /// Eligible images that failed to decode or encode
    pub fn failed_images(&self) -> usize {
        self.images.iter().filter(|i| i.is_failure()).count()
    }

    pub fn skipped_images(&self) -> usize {
        self.images.len() - self.reencoded_images()
    }
}

/// Caller-facing compression options
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub quality: QualityTier,
    pub target_bytes: Option<usize>,
    pub policy: RecompressPolicy,
}

impl CompressOptions {
    /// Options from request values: a size budget in KB wins over the tier
    pub fn from_request(quality: Option<&str>, target_size_kb: Option<u64>) -> Result<Self> {
        let quality = match quality {
            Some(q) => q.parse()?,
            None => QualityTier::default(),
        };
        let target_bytes = match target_size_kb {
            Some(0) => {
                return Err(ConvertError::InvalidOption(
                    "target size must be at least 1 KB".into(),
                ))
            }
            Some(kb) => Some(kb.saturating_mul(1024) as usize),
            None => None,
        };
        Ok(Self {
            quality,
            target_bytes,
            policy: RecompressPolicy::default(),
        })
    }
}

/// Compress a PDF, either to a target size or at a quality tier
pub fn compress(bytes: &[u8], options: &CompressOptions) -> Result<(Vec<u8>, CompressionReport)> {
    match options.target_bytes {
        Some(target) => recompress_to_target(bytes, target, &options.policy),
        None => compress_with_settings(bytes, options.quality.settings()),
    }
}

/// Run exactly one recompression pass at fixed settings
pub fn compress_with_settings(
    bytes: &[u8],
    settings: EncodeSettings,
) -> Result<(Vec<u8>, CompressionReport)> {
    let source = load_document(bytes)?;
    let output = recompress_pass(&source, settings)?;

    let report = CompressionReport {
        original_size: bytes.len(),
        output_size: output.bytes.len(),
        target_bytes: None,
        attempts: vec![attempt_record(1, settings, &output)],
        images: output.images,
    };
    info!(
        "Compressed {} -> {} bytes at quality {} ratio {}",
        report.original_size, report.output_size, settings.quality, settings.resize_ratio
    );
    Ok((output.bytes, report))
}

/// Shrink a PDF towards `target_bytes` within the policy's attempt budget.
///
/// Each attempt starts again from the parsed source, so image sizes are always
/// derived from the original pixels. When the budget runs out the last
/// attempt's bytes are returned and the report says the target was missed.
pub fn recompress_to_target(
    bytes: &[u8],
    target_bytes: usize,
    policy: &RecompressPolicy,
) -> Result<(Vec<u8>, CompressionReport)> {
    let source = load_document(bytes)?;

    let (output, attempts) =
        run_attempts(policy, target_bytes, |settings| recompress_pass(&source, settings))?;

    let report = CompressionReport {
        original_size: bytes.len(),
        output_size: output.bytes.len(),
        target_bytes: Some(target_bytes),
        attempts,
        images: output.images,
    };

    if report.target_reached() {
        info!(
            "Reached target {} bytes after {} attempt(s): {} bytes",
            target_bytes,
            report.attempts.len(),
            report.output_size
        );
    } else {
        warn!(
            "Target {} bytes not reached after {} attempts, best effort is {} bytes",
            target_bytes,
            report.attempts.len(),
            report.output_size
        );
    }

    Ok((output.bytes, report))
}

/// Drive `pass` through the policy's schedule until the output fits.
///
/// Returns the last pass output together with a record of every attempt.
pub fn run_attempts<F>(
    policy: &RecompressPolicy,
    target_bytes: usize,
    mut pass: F,
) -> Result<(PassOutput, Vec<CompressionAttempt>)>
where
    F: FnMut(EncodeSettings) -> Result<PassOutput>,
{
    let mut attempts = Vec::new();
    let mut last = None;

    for (n, settings) in policy.schedule().into_iter().enumerate() {
        let output = pass(settings)?;
        let record = attempt_record(n as u32 + 1, settings, &output);
        debug!(
            "Attempt {}: quality {} ratio {} -> {} bytes",
            record.attempt, settings.quality, settings.resize_ratio, record.size_bytes
        );
        attempts.push(record);

        let fits = output.bytes.len() <= target_bytes;
        last = Some(output);
        if fits {
            break;
        }
    }

    // The schedule always holds at least one entry
    let output = last.ok_or_else(|| ConvertError::OperationError("no attempt was run".into()))?;
    Ok((output, attempts))
}

fn attempt_record(attempt: u32, settings: EncodeSettings, output: &PassOutput) -> CompressionAttempt {
    let reencoded_images = output.images.iter().filter(|i| i.is_reencoded()).count();
    CompressionAttempt {
        attempt,
        settings,
        size_bytes: output.bytes.len(),
        reencoded_images,
        skipped_images: output.images.len() - reencoded_images,
    }
}

/// Re-encode a copy of `source` at `settings` and pack it
fn recompress_pass(source: &Document, settings: EncodeSettings) -> Result<PassOutput> {
    let mut doc = source.clone();
    let images = recompress_images(&mut doc, settings);
    let bytes = pack_document(&mut doc)?;
    Ok(PassOutput { bytes, images })
}

/// Re-encode every eligible image XObject of `doc` in place.
///
/// Never fails: images that cannot be handled are reported and left alone.
pub fn recompress_images(doc: &mut Document, settings: EncodeSettings) -> Vec<ImageOutcome> {
    let mut outcomes = Vec::new();

    for (&id, object) in doc.objects.iter_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if !is_image_xobject(stream) {
            continue;
        }

        let outcome = match reencode_image(stream, settings) {
            Ok((original, resized, bytes_before, bytes_after)) => ImageOutcome::Reencoded {
                id,
                original,
                resized,
                bytes_before,
                bytes_after,
            },
            Err(reason) => {
                if reason.is_failure() {
                    warn!("Skipping image {:?}: {:?}", id, reason);
                } else {
                    debug!("Leaving image {:?} untouched: {:?}", id, reason);
                }
                ImageOutcome::Skipped { id, reason }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}

fn is_image_xobject(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(name_value)
        .is_some_and(|name| name == b"Image")
}

/// Check that a stream holds an embedded JPEG this module can rewrite
fn check_eligible(stream: &Stream) -> std::result::Result<(), SkipReason> {
    if stream.dict.has(b"F") {
        return Err(SkipReason::Ineligible("external file data".into()));
    }
    if let Ok(Object::Boolean(true)) = stream.dict.get(b"ImageMask") {
        return Err(SkipReason::Ineligible("stencil mask".into()));
    }

    match stream.dict.get(b"Filter") {
        Ok(filter) => match name_value(filter) {
            Some(b"DCTDecode") => Ok(()),
            Some(other) => Err(SkipReason::Ineligible(format!(
                "filter {}",
                String::from_utf8_lossy(other)
            ))),
            None => Err(SkipReason::Ineligible("filter chain".into())),
        },
        Err(_) => Err(SkipReason::Ineligible("uncompressed samples".into())),
    }
}

fn dimension(stream: &Stream, key: &[u8]) -> Option<u32> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(number_value)
        .filter(|v| *v >= 1.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32)
}

type Reencoded = ((u32, u32), (u32, u32), usize, usize);

fn reencode_image(
    stream: &mut Stream,
    settings: EncodeSettings,
) -> std::result::Result<Reencoded, SkipReason> {
    check_eligible(stream)?;

    let (width, height) = match (dimension(stream, b"Width"), dimension(stream, b"Height")) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(SkipReason::InvalidDimensions),
    };

    let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
        .map_err(|e| SkipReason::DecodeFailed(e.to_string()))?;

    // Size from the dictionary is authoritative; the sample data may disagree
    let (new_width, new_height) = settings.target_dimensions(width, height);
    let img = if (img.width(), img.height()) == (new_width, new_height) {
        img
    } else {
        img.resize_exact(new_width, new_height, FilterType::Triangle)
    };

    let (encoded, color_space) =
        encode_jpeg(&img, settings.quality).map_err(SkipReason::EncodeFailed)?;

    let bytes_before = stream.content.len();
    let bytes_after = encoded.len();

    stream.dict.set("Width", new_width as i64);
    stream.dict.set("Height", new_height as i64);
    stream.dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    stream.dict.set("BitsPerComponent", 8);
    stream.dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    stream.dict.remove(b"DecodeParms");
    stream.dict.remove(b"Decode");
    stream.set_content(encoded);
    stream.allows_compression = false;

    Ok((
        (width, height),
        (new_width, new_height),
        bytes_before,
        bytes_after,
    ))
}

/// Encode as baseline JPEG, keeping grayscale images single-channel
fn encode_jpeg(
    img: &DynamicImage,
    quality: u8,
) -> std::result::Result<(Vec<u8>, &'static [u8]), String> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);

    let color_space: &'static [u8] = match img {
        DynamicImage::ImageLuma8(gray) => {
            encoder
                .encode(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)
                .map_err(|e| e.to_string())?;
            b"DeviceGray"
        }
        other => {
            let rgb = other.to_rgb8();
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(|e| e.to_string())?;
            b"DeviceRGB"
        }
    };

    Ok((bytes, color_space))
}
