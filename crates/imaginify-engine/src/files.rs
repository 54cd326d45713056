use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imaginify_contracts::Artifact;

use crate::timestamp_millis;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadFormat {
    #[default]
    Png,
    Jpeg,
}

impl DownloadFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DownloadFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(format!("unknown download format '{other}' (png, jpeg)")),
        }
    }
}

/// Reads an image file into an artifact. The MIME type comes from the file
/// content; the extension is only a fallback.
pub fn ingest_file(path: &Path) -> Result<Artifact> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let mime = match image::guess_format(&bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => match mime_for_path(path) {
            Some(mime) => mime,
            None => bail!("{} is not a recognised image", path.display()),
        },
    };
    Ok(Artifact::new(bytes, mime))
}

/// Writes `artifact` into `dir` as `imaginify-<millis>.<ext>`.
pub fn export_artifact(artifact: &Artifact, format: DownloadFormat, dir: &Path) -> Result<PathBuf> {
    let bytes = encode_for_download(artifact, format)?;
    fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
    let path = dir.join(download_file_name(format, timestamp_millis()));
    fs::write(&path, bytes).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(path)
}

pub fn encode_for_download(artifact: &Artifact, format: DownloadFormat) -> Result<Vec<u8>> {
    if artifact.mime_type() == format.mime_type() {
        return Ok(artifact.bytes().to_vec());
    }
    let decoded =
        image::load_from_memory(artifact.bytes()).context("failed decoding image for export")?;
    let mut bytes = Vec::new();
    match format {
        DownloadFormat::Png => {
            decoded
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .context("failed encoding png")?;
        }
        DownloadFormat::Jpeg => {
            let flattened = flatten_on_white(&decoded);
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
            encoder
                .encode_image(&flattened)
                .context("failed encoding jpeg")?;
        }
    }
    Ok(bytes)
}

fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

fn download_file_name(format: DownloadFormat, millis: u128) -> String {
    format!("imaginify-{millis}.{}", format.extension())
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
