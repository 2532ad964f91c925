//! Image attachments: loading user images and preparing them for the model.

mod encode;
mod loader;

pub use encode::{prepare_for_upload, target_dimensions, EncodedImage, DEFAULT_MAX_DIMENSION};
pub use loader::{
    fetch_url, load_path, load_upload, ImageError, ImageSource, SelectedImage, UPLOAD_FORMATS,
};
