//! Image use cases: the content-hash cache and the hosting client built on it.

pub mod cache;
pub mod hosting;

pub use cache::ImageCache;
pub use hosting::{
    content_hash, is_allowed_image_type, ImageFile, ImageHostingService, ALLOWED_IMAGE_TYPES,
    MAX_IMAGE_SIZE,
};
