use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::canvas::PixelBuffer;
use crate::error::{EngineError, Result};

/// Output formats the engine can write. Chosen from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl SaveFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "webp" => Some(SaveFormat::Webp),
            "bmp" => Some(SaveFormat::Bmp),
            _ => None,
        }
    }
}

/// Decode any raster the `image` crate understands (PNG, JPEG, WEBP, BMP)
/// into a BGR buffer. Alpha is dropped.
pub fn load_image_sync(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path)?.to_rgb8();
    log::info!("loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(PixelBuffer::from_rgb_image(&img))
}

/// Encode `pixels` to `path` in the format implied by its extension.
/// `quality` only affects JPEG.
pub fn encode_and_write(pixels: &PixelBuffer, path: &Path, quality: u8) -> Result<()> {
    let format = SaveFormat::from_path(path).ok_or_else(|| {
        EngineError::InvalidArgument(format!("unsupported output format: {}", path.display()))
    })?;
    if pixels.is_empty() {
        return Err(EngineError::EmptyImage);
    }
    let rgb = pixels.to_rgb_image();

    match format {
        SaveFormat::Webp => {
            // The WebP encoder wants a seekable sink; let DynamicImage manage the file.
            DynamicImage::ImageRgb8(rgb).save(path)?;
        }
        SaveFormat::Png => {
            let mut writer = BufWriter::new(File::create(path)?);
            PngEncoder::new(&mut writer).write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
        }
        SaveFormat::Jpeg => {
            let mut writer = BufWriter::new(File::create(path)?);
            JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            let mut writer = BufWriter::new(File::create(path)?);
            BmpEncoder::new(&mut writer).write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
        }
    }
    log::info!("wrote {:?} to {}", format, path.display());
    Ok(())
}

/// Read an image from the system clipboard: raw image data first, then
/// clipboard text naming an image file.
pub fn clipboard_image() -> Result<PixelBuffer> {
    let mut clip = arboard::Clipboard::new().map_err(|e| EngineError::Clipboard(e.to_string()))?;

    if let Ok(img_data) = clip.get_image() {
        // arboard hands back RGBA rows.
        if let Some(img) =
            image::RgbaImage::from_raw(img_data.width as u32, img_data.height as u32, img_data.bytes.into_owned())
        {
            return Ok(PixelBuffer::from_rgba_image(&img));
        }
    }

    if let Ok(text) = clip.get_text() {
        let path = Path::new(text.trim());
        if path.is_file() {
            return load_image_sync(path);
        }
    }

    Err(EngineError::Clipboard("no image on the clipboard".to_string()))
}
