//! Filenames shared by every writer and reader of the shard directories.

use tessera_core::{ImageFit, ImageId, ImageType};

/// `<id>.<ext>`
pub fn default_filename(id: &ImageId, image_type: ImageType) -> String {
    format!("{}.{}", id, image_type.extension())
}

/// `<id>_<maxWidth>_<maxHeight>_<fit>.<ext>`
pub fn copy_filename(
    id: &ImageId,
    max_width: u32,
    max_height: u32,
    fit: ImageFit,
    image_type: ImageType,
) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        id,
        max_width,
        max_height,
        fit,
        image_type.extension()
    )
}

/// Hidden name a file is written under until it is promoted.
pub fn staged_filename(filename: &str) -> String {
    format!(".{}.partial", filename)
}

/// Filenames must be a single plain path component.
pub fn is_valid_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
}
