//! Loading images from uploads, files and URLs.

use std::fmt;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use thiserror::Error;

/// Formats accepted for uploads.
pub const UPLOAD_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

/// Image loading errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Unsupported image format for {0} (expected PNG or JPEG)")]
    UnsupportedFormat(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to read image file: {0}")]
    Io(String),
    #[error("Failed to fetch image: {0}")]
    Fetch(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Where the selected image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Upload(String),
    Url(String),
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Upload(name) => write!(f, "{}", name),
            ImageSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// A decoded image selected for the conversation.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub image: DynamicImage,
    pub source: ImageSource,
}

impl SelectedImage {
    pub fn new(image: DynamicImage, source: ImageSource) -> Self {
        Self { image, source }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA pixels for on-screen previews.
    pub fn preview_rgba(&self) -> (u32, u32, Vec<u8>) {
        let rgba = self.image.to_rgba8();
        (rgba.width(), rgba.height(), rgba.into_raw())
    }
}

/// Decode an uploaded PNG or JPEG.
pub fn load_upload(bytes: &[u8], file_name: impl Into<String>) -> Result<SelectedImage, ImageError> {
    let file_name = file_name.into();
    let format = image::guess_format(bytes)
        .ok()
        .filter(|f| UPLOAD_FORMATS.contains(f))
        .ok_or_else(|| ImageError::UnsupportedFormat(file_name.clone()))?;

    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    Ok(SelectedImage::new(image, ImageSource::Upload(file_name)))
}

/// Read and decode an image file from disk.
pub async fn load_path(path: impl AsRef<Path>) -> Result<SelectedImage, ImageError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ImageError::Io(format!("{}: {}", path.display(), e)))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    load_upload(&bytes, name)
}

/// Download and decode an image from a URL.
pub async fn fetch_url(client: &Client, url: &str) -> Result<SelectedImage, ImageError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ImageError::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImageError::Fetch(format!("HTTP {} from {}", status, url)));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImageError::Fetch(e.to_string()))?;

    let image = image::load_from_memory(&bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
    Ok(SelectedImage::new(image, ImageSource::Url(url.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use mockito::Server;
    use std::io::Cursor;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let image =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10])));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_load_png_and_jpeg_uploads() {
        let png = load_upload(&encoded(8, 6, ImageFormat::Png), "cat.png").unwrap();
        assert_eq!((png.width(), png.height()), (8, 6));
        assert_eq!(png.source, ImageSource::Upload("cat.png".into()));

        let jpeg = load_upload(&encoded(5, 9, ImageFormat::Jpeg), "dog.jpg").unwrap();
        assert_eq!((jpeg.width(), jpeg.height()), (5, 9));
    }

    #[test]
    fn test_reject_other_upload_formats() {
        let bmp = encoded(4, 4, ImageFormat::Bmp);
        assert_eq!(
            load_upload(&bmp, "scan.bmp").unwrap_err(),
            ImageError::UnsupportedFormat("scan.bmp".into())
        );
        assert!(matches!(
            load_upload(b"not an image", "notes.txt"),
            Err(ImageError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_truncated_upload_fails_to_decode() {
        let png = encoded(16, 16, ImageFormat::Png);
        assert!(matches!(
            load_upload(&png[..40], "broken.png"),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn test_preview_rgba() {
        let png = load_upload(&encoded(3, 2, ImageFormat::Png), "p.png").unwrap();
        let (w, h, pixels) = png.preview_rgba();
        assert_eq!((w, h), (3, 2));
        assert_eq!(pixels.len(), 3 * 2 * 4);
        assert_eq!(&pixels[..4], &[200, 10, 10, 255]);
    }

    #[tokio::test]
    async fn test_load_missing_path() {
        let err = load_path("/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, ImageError::Io(_)));
    }

    #[tokio::test]
    async fn test_fetch_url() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/cat.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(encoded(10, 4, ImageFormat::Png))
            .create_async()
            .await;
        server
            .mock("GET", "/missing.png")
            .with_status(404)
            .create_async()
            .await;

        let client = Client::new();
        let url = format!("{}/cat.png", server.url());
        let image = fetch_url(&client, &url).await.unwrap();
        assert_eq!((image.width(), image.height()), (10, 4));
        assert_eq!(image.source, ImageSource::Url(url));

        let err = fetch_url(&client, &format!("{}/missing.png", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::Fetch(_)));
    }
}
