use crate::error::ImageError;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

/// Encodings accepted for an uploaded X-ray.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XrayFormat {
    Jpeg,
    Png,
}

impl XrayFormat {
    /// Maps a file extension to a format. `jpg` is treated as `jpeg`.
    pub fn from_extension(ext: &str) -> Result<Self, ImageError> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(XrayFormat::Jpeg),
            "png" => Ok(XrayFormat::Png),
            other => Err(ImageError::UnsupportedFormat(other.to_string())),
        }
    }

    fn from_image_format(format: ImageFormat) -> Result<Self, ImageError> {
        match format {
            ImageFormat::Jpeg => Ok(XrayFormat::Jpeg),
            ImageFormat::Png => Ok(XrayFormat::Png),
            other => Err(ImageError::UnsupportedFormat(format!("{other:?}"))),
        }
    }

    /// Lower-case extension used in the upload filename, `jpeg` or `png`.
    pub fn extension(&self) -> &'static str {
        match self {
            XrayFormat::Jpeg => "jpeg",
            XrayFormat::Png => "png",
        }
    }

    /// MIME type sent with the upload part.
    pub fn mime_type(&self) -> &'static str {
        match self {
            XrayFormat::Jpeg => "image/jpeg",
            XrayFormat::Png => "image/png",
        }
    }

    /// The `image` codec for this format.
    pub fn image_format(&self) -> ImageFormat {
        match self {
            XrayFormat::Jpeg => ImageFormat::Jpeg,
            XrayFormat::Png => ImageFormat::Png,
        }
    }
}

/// A decoded X-ray together with the format it was uploaded in.
#[derive(Clone, Debug)]
pub struct XrayImage {
    pub format: XrayFormat,
    pub image: DynamicImage,
}

impl XrayImage {
    /// Decodes an uploaded image, detecting its format from the content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::Decode(image::ImageError::IoError(e)))?;

        let format = match reader.format() {
            Some(format) => XrayFormat::from_image_format(format)?,
            None => return Err(ImageError::UnsupportedFormat("unknown".to_string())),
        };

        let image = reader.decode().map_err(ImageError::Decode)?;
        log::debug!(
            "Decoded {} image of {}x{}",
            format.extension(),
            image.width(),
            image.height()
        );

        Ok(Self { format, image })
    }

    /// Reads an image from disk. The extension must name a supported format.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ImageError::UnsupportedFormat("missing file extension".to_string()))?;
        XrayFormat::from_extension(extension)?;

        let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Serializes the image in its own format.
    ///
    /// JPEG carries neither alpha nor 16-bit samples, so other color types are
    /// flattened to 8-bit RGB before encoding.
    pub fn encode(&self) -> Result<Vec<u8>, ImageError> {
        let converted;
        let image = match (self.format, self.image.color()) {
            (XrayFormat::Jpeg, ColorType::L8 | ColorType::Rgb8) => &self.image,
            (XrayFormat::Jpeg, _) => {
                converted = DynamicImage::ImageRgb8(self.image.to_rgb8());
                &converted
            }
            (XrayFormat::Png, ColorType::Rgb32F | ColorType::Rgba32F) => {
                converted = DynamicImage::ImageRgba8(self.image.to_rgba8());
                &converted
            }
            (XrayFormat::Png, _) => &self.image,
        };

        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, self.format.image_format())
            .map_err(|source| ImageError::Encode {
                format: self.format.extension(),
                source,
            })?;
        Ok(buf.into_inner())
    }
}
