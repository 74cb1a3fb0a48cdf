mod handler;

pub use handler::{MAX_IMAGE_BYTES, delete_image, get_image, upload_image};
