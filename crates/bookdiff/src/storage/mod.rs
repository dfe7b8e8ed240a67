//! Image store gateway: uploaded page images keyed by project and folder role.

pub mod image_store;

pub use image_store::{FolderRole, ImageStore};
