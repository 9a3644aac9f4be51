//! Image file codecs, plus loading of files dropped on the window.
//! Nothing here touches the tool loop.

use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use log::{debug, info, warn};

use crate::color::{
    graya_geta, graya_getv, rgba, rgba_geta, rgba_getb, rgba_getg, rgba_getr, ColorValue, PixelFormat,
};
use crate::error::CodecError;
use crate::image::Image;
use crate::palette::Palette;

/// Largest side accepted when decoding
pub const MAX_IMAGE_SIDE: u32 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Keep the alpha channel. Formats without alpha ignore it.
    pub with_alpha: bool,
    /// Indexed pixels with this value are written fully transparent
    pub transparent_index: Option<ColorValue>,
}

impl SaveOptions {
    /// Options for `image`, keeping alpha only when a pixel needs it
    pub fn for_image(image: &Image, palette: &Palette, transparent_index: Option<ColorValue>) -> Self {
        let mut options = Self {
            with_alpha: false,
            transparent_index,
        };
        options.with_alpha = uses_alpha(image, palette, &options);
        options
    }
}

/// Loads an image file as an RGB image
pub fn load(path: impl AsRef<Path>) -> Result<Image, CodecError> {
    let path = path.as_ref();
    let format = format_from_path(path)?;
    let bytes = std::fs::read(path)?;
    let image = decode(image::load_from_memory_with_format(&bytes, format)?)?;
    info!(
        "Loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Decodes an in-memory image file, guessing its format
pub fn load_from_memory(bytes: &[u8]) -> Result<Image, CodecError> {
    decode(image::load_from_memory(bytes)?)
}

fn decode(img: DynamicImage) -> Result<Image, CodecError> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 || width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
        return Err(CodecError::Dimensions { width, height });
    }
    debug!("Decoded {}x{} {:?}", width, height, img.color());
    let pixels = img
        .to_rgba8()
        .pixels()
        .map(|p| rgba(p[0], p[1], p[2], p[3]))
        .collect();
    Ok(Image::from_pixels(PixelFormat::Rgb, width as i32, height as i32, pixels))
}

/// Writes `image` in the format given by the extension of `path`
pub fn save(path: impl AsRef<Path>, image: &Image, palette: &Palette, options: &SaveOptions) -> Result<(), CodecError> {
    let path = path.as_ref();
    let format = format_from_path(path)?;
    let (width, height) = (image.width() as u32, image.height() as u32);
    if width == 0 || height == 0 {
        return Err(CodecError::Dimensions { width, height });
    }

    let rgba_bytes: Vec<u8> = image
        .pixels()
        .iter()
        .flat_map(|&c| {
            let c = to_rgba(image.format(), c, palette, options);
            [rgba_getr(c), rgba_getg(c), rgba_getb(c), rgba_geta(c)]
        })
        .collect();
    let buffer = RgbaImage::from_raw(width, height, rgba_bytes).ok_or(CodecError::Dimensions { width, height })?;

    let with_alpha = options.with_alpha && supports_alpha(format);
    let output = if with_alpha {
        DynamicImage::ImageRgba8(buffer)
    } else {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let p = buffer.get_pixel(x, y);
            image::Rgb([p[0], p[1], p[2]])
        }))
    };
    output.save_with_format(path, format)?;
    info!(
        "Saved {} ({}x{}, {})",
        path.display(),
        width,
        height,
        if with_alpha { "RGBA" } else { "RGB" }
    );
    Ok(())
}

/// Whether any pixel of `image` would be written with alpha below 255
pub fn uses_alpha(image: &Image, palette: &Palette, options: &SaveOptions) -> bool {
    image
        .pixels()
        .iter()
        .any(|&c| rgba_geta(to_rgba(image.format(), c, palette, options)) < 255)
}

fn to_rgba(format: PixelFormat, c: ColorValue, palette: &Palette, options: &SaveOptions) -> ColorValue {
    match format {
        PixelFormat::Rgb => c,
        PixelFormat::Grayscale => {
            let v = graya_getv(c);
            rgba(v, v, v, graya_geta(c))
        }
        PixelFormat::Indexed if options.transparent_index == Some(c) => 0,
        PixelFormat::Indexed => palette.entry(c as usize),
    }
}

fn format_from_path(path: &Path) -> Result<ImageFormat, CodecError> {
    ImageFormat::from_path(path).map_err(|_| {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        CodecError::UnsupportedFormat(ext)
    })
}

fn supports_alpha(format: ImageFormat) -> bool {
    !matches!(format, ImageFormat::Jpeg | ImageFormat::Pnm)
}

/// Collects image files dropped on the window
#[derive(Debug, Default)]
pub struct FileHandler {
    dropped_files: Vec<egui::DroppedFile>,
    processed_files: Vec<String>,
}

impl FileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process any newly dropped files from the UI context
    /// Returns true if any new files were dropped
    pub fn check_for_dropped_files(&mut self, ctx: &egui::Context) -> bool {
        let mut new_dropped_files = false;
        ctx.input(|i| {
            if !i.raw.dropped_files.is_empty() {
                self.dropped_files = i.raw.dropped_files.clone();
                new_dropped_files = true;
            }
        });
        new_dropped_files
    }

    /// Decodes the dropped image files not processed yet
    pub fn take_dropped_images(&mut self) -> Vec<(String, Result<Image, CodecError>)> {
        let mut images = Vec::new();
        for file in std::mem::take(&mut self.dropped_files) {
            let name = file_name(&file);
            if self.processed_files.contains(&name) {
                continue;
            }
            if !is_image_file(&file) {
                warn!("Dropped file is not a supported type: {}", name);
                continue;
            }
            let result = match (&file.bytes, &file.path) {
                (Some(bytes), _) => load_from_memory(bytes),
                (None, Some(path)) => load(path),
                (None, None) => {
                    warn!("Dropped file has no accessible data: {}", name);
                    continue;
                }
            };
            if let Err(err) = &result {
                warn!("Failed to load {}: {}", name, err);
            }
            self.processed_files.push(name.clone());
            images.push((name, result));
        }
        images
    }

    /// Clear all processed files
    pub fn clear_processed_files(&mut self) {
        self.dropped_files.clear();
        self.processed_files.clear();
    }
}

fn file_name(file: &egui::DroppedFile) -> String {
    if let Some(path) = &file.path {
        path.display().to_string()
    } else if !file.name.is_empty() {
        file.name.clone()
    } else {
        "unknown".to_owned()
    }
}

/// Check if a file is an image based on MIME type or extension
fn is_image_file(file: &egui::DroppedFile) -> bool {
    if !file.mime.is_empty() {
        file.mime.starts_with("image/")
    } else if let Some(path) = &file.path {
        ImageFormat::from_path(path).is_ok()
    } else {
        false
    }
}
