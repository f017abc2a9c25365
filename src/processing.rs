use crate::constants::{
    DEFAULT_QUALITY, FLATTEN_BACKGROUND, LIBDEFLATER_HIGH_LEVEL, MAX_QUALITY,
    MAX_UPLOAD_DIMENSION, MAX_UPLOAD_FILE_SIZE, MIN_QUALITY,
};
use crate::error::{HoistError, Result};
use crate::utils::format_file_size;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgb, RgbImage};
use oxipng::{Deflaters, Options};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Thresholds and encoder settings used to shrink images before upload.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub max_file_size: u64,
    pub max_dimension: u32,
    pub quality: u8,
    pub background: [u8; 3],
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_file_size: MAX_UPLOAD_FILE_SIZE,
            max_dimension: MAX_UPLOAD_DIMENSION,
            quality: DEFAULT_QUALITY,
            background: FLATTEN_BACKGROUND,
        }
    }
}

impl NormalizeOptions {
    pub fn new(
        max_file_size: Option<u64>,
        max_dimension: Option<u32>,
        quality: Option<u8>,
    ) -> Result<Self> {
        let quality = quality.unwrap_or(DEFAULT_QUALITY);
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(HoistError::InvalidQuality(quality));
        }

        let max_dimension = max_dimension.unwrap_or(MAX_UPLOAD_DIMENSION);
        if max_dimension == 0 {
            return Err(HoistError::InvalidDimension(max_dimension));
        }

        Ok(Self {
            max_file_size: max_file_size.unwrap_or(MAX_UPLOAD_FILE_SIZE),
            max_dimension,
            quality,
            background: FLATTEN_BACKGROUND,
        })
    }

    fn exceeds(&self, file_size: u64, width: u32, height: u32) -> bool {
        file_size > self.max_file_size || width.max(height) > self.max_dimension
    }
}

/// Bytes ready to be sent to the image host.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub original_size: u64,
    /// `true` when the bytes were re-encoded rather than passed through.
    pub reencoded: bool,
}

impl NormalizedImage {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn passthrough(bytes: Vec<u8>) -> Self {
        let original_size = bytes.len() as u64;
        Self {
            bytes,
            original_size,
            reencoded: false,
        }
    }
}

/// Loads `path` and, when it is over the size or dimension limits, downscales
/// and re-encodes it as JPEG with transparency flattened.
///
/// Works entirely in memory; the source file is never modified. Files whose
/// header cannot be decoded (SVG, truncated files) are passed through
/// unchanged. Only a failure to read the file is an error.
pub fn normalize_for_upload(path: &Path, options: &NormalizeOptions) -> Result<NormalizedImage> {
    let bytes = fs::read(path)?;
    let file_size = bytes.len() as u64;

    let (width, height) = match read_dimensions(&bytes) {
        Ok(dimensions) => dimensions,
        Err(e) => {
            tracing::warn!("cannot read dimensions of {:?}, sending as-is: {}", path, e);
            return Ok(NormalizedImage::passthrough(bytes));
        }
    };

    if !options.exceeds(file_size, width, height) {
        return Ok(NormalizedImage::passthrough(bytes));
    }

    crate::verbose!(
        "Compressing {:?} (size: {}, dimensions: {}x{})",
        path.file_name().unwrap_or_default(),
        format_file_size(file_size),
        width,
        height
    );

    let img = match decode(&bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("cannot decode {:?}, sending as-is: {}", path, e);
            return Ok(NormalizedImage::passthrough(bytes));
        }
    };

    let img = shrink_to_fit(img, options.max_dimension);
    let flattened = flatten_onto(&img, options.background);
    let encoded = encode_jpeg(&flattened, options.quality)?;

    crate::verbose!(
        "Compressed from {} to {}",
        format_file_size(file_size),
        format_file_size(encoded.len() as u64)
    );

    Ok(NormalizedImage {
        bytes: encoded,
        original_size: file_size,
        reencoded: true,
    })
}

fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.decode()?)
}

/// Downscales so the longer side is at most `max_dimension`, keeping the
/// aspect ratio. Smaller images are returned untouched.
pub fn shrink_to_fit(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width.max(height) <= max_dimension {
        return img;
    }

    let resized = img.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    crate::verbose!(
        "Resized {}x{} to {}x{}",
        width,
        height,
        resized.width(),
        resized.height()
    );
    resized
}

/// Composites the image over a solid background, dropping the alpha channel.
pub fn flatten_onto(img: &DynamicImage, background: [u8; 3]) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |channel: u8, bg: u8| -> u8 {
            ((u16::from(channel) * alpha + u16::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(r, background[0]),
                blend(g, background[1]),
                blend(b, background[2]),
            ]),
        );
    }
    out
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder.encode_image(img)?;
    Ok(buffer)
}

/// Encodes `img` as PNG (RGBA when it carries alpha, RGB otherwise), runs it
/// through oxipng and writes the result. Returns the written size.
pub fn save_png_optimized(img: &DynamicImage, output: &Path) -> Result<u64> {
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let mut raw = Vec::new();
    normalized.write_to(&mut Cursor::new(&mut raw), ImageFormat::Png)?;

    let mut oxipng_options = Options::from_preset(4);
    oxipng_options.force = true;
    oxipng_options.deflate = Deflaters::Libdeflater {
        compression: LIBDEFLATER_HIGH_LEVEL,
    };

    let optimized = oxipng::optimize_from_memory(&raw, &oxipng_options)
        .map_err(|e| HoistError::PngOptimization(e.to_string()))?;

    write_output(output, &optimized)
}

/// Encodes `img` with the lossless WebP encoder and writes the result.
pub fn save_webp(img: &DynamicImage, output: &Path) -> Result<u64> {
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let mut buffer = Vec::new();
    normalized.write_with_encoder(WebPEncoder::new_lossless(&mut buffer))?;

    write_output(output, &buffer)
}

fn write_output(output: &Path, data: &[u8]) -> Result<u64> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, data)?;
    Ok(data.len() as u64)
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    crate::utils::validate_file_exists(path)?;
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        });
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_normalize_options_default() {
        let options = NormalizeOptions::new(None, None, None).unwrap();
        assert_eq!(options.max_file_size, 10 * 1024 * 1024);
        assert_eq!(options.max_dimension, 2048);
        assert_eq!(options.quality, 85);
        assert_eq!(options.background, [255, 255, 255]);
    }

    #[test]
    fn test_normalize_options_invalid_quality() {
        let result = NormalizeOptions::new(None, None, Some(0));
        assert!(matches!(result, Err(HoistError::InvalidQuality(0))));

        let result = NormalizeOptions::new(None, None, Some(101));
        assert!(matches!(result, Err(HoistError::InvalidQuality(101))));
    }

    #[test]
    fn test_normalize_options_invalid_dimension() {
        let result = NormalizeOptions::new(None, Some(0), None);
        assert!(matches!(result, Err(HoistError::InvalidDimension(0))));
    }

    #[test]
    fn test_normalize_within_limits_is_identity() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("small.png");
        write_png(&path, 64, 48);

        let original = fs::read(&path).unwrap();
        let normalized = normalize_for_upload(&path, &NormalizeOptions::default()).unwrap();

        assert!(!normalized.reencoded);
        assert_eq!(normalized.bytes, original);
        assert_eq!(normalized.len(), original.len() as u64);
    }

    #[test]
    fn test_normalize_oversized_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wide.png");
        write_png(&path, 400, 100);

        let options = NormalizeOptions::new(None, Some(200), None).unwrap();
        let normalized = normalize_for_upload(&path, &options).unwrap();

        assert!(normalized.reencoded);
        let (w, h) = image::load_from_memory(&normalized.bytes).unwrap().dimensions();
        assert_eq!((w, h), (200, 50));
        assert_eq!(
            image::guess_format(&normalized.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_normalize_oversized_bytes_keeps_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("heavy.png");
        write_png(&path, 120, 80);

        let options = NormalizeOptions::new(Some(16), None, None).unwrap();
        let normalized = normalize_for_upload(&path, &options).unwrap();

        assert!(normalized.reencoded);
        let decoded = image::load_from_memory(&normalized.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (120, 80));
    }

    #[test]
    fn test_normalize_undecodable_passes_through() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("drawing.svg");
        fs::write(&path, b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap();

        let options = NormalizeOptions::new(Some(1), None, None).unwrap();
        let normalized = normalize_for_upload(&path, &options).unwrap();

        assert!(!normalized.reencoded);
        assert_eq!(normalized.bytes, fs::read(&path).unwrap());
    }

    #[test]
    fn test_normalize_missing_file() {
        let result = normalize_for_upload(Path::new("missing.png"), &NormalizeOptions::default());
        assert!(matches!(result, Err(HoistError::Io(_))));
    }

    #[test]
    fn test_shrink_to_fit_portrait() {
        let img = DynamicImage::new_rgb8(1000, 3000);
        let resized = shrink_to_fit(img, 1500);
        assert_eq!(resized.dimensions(), (500, 1500));
    }

    #[test]
    fn test_shrink_to_fit_leaves_small_images() {
        let img = DynamicImage::new_rgb8(300, 200);
        let resized = shrink_to_fit(img, 2048);
        assert_eq!(resized.dimensions(), (300, 200));
    }

    #[test]
    fn test_flatten_onto_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));

        let flat = flatten_onto(&DynamicImage::ImageRgba8(rgba), [255, 255, 255]);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_save_png_optimized_keeps_alpha() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("nested").join("out.png");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 128])));

        let written = save_png_optimized(&img, &output).unwrap();
        assert_eq!(written, fs::metadata(&output).unwrap().len());

        let decoded = image::open(&output).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_save_webp_roundtrips_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.webp");
        let img = DynamicImage::new_rgb8(16, 9);

        save_webp(&img, &output).unwrap();
        assert_eq!(image::open(&output).unwrap().dimensions(), (16, 9));
    }
}
