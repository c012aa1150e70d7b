//! Test fixtures: encoded images and upload forms.

use std::io::Cursor;

use axum_test::multipart::{MultipartForm, Part};
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};

/// A solid-color PNG of the given dimensions.
pub fn create_test_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode test PNG");
    out.into_inner()
}

/// Upload form with an `image` part and, when given, a `copies` field.
pub fn upload_form(image: Vec<u8>, copies: Option<&str>) -> MultipartForm {
    let part = Part::bytes(image)
        .file_name("upload.png")
        .mime_type("image/png");
    let form = MultipartForm::new().add_part("image", part);
    match copies {
        Some(copies) => form.add_text("copies", copies.to_string()),
        None => form,
    }
}

/// A default contain rendition plus a 400x300 contain copy and a 100x100 cover copy.
pub const STANDARD_COPIES: &str = r#"[
    {"maxWidth": 1000, "maxHeight": 1000, "default": true},
    {"maxWidth": 400, "maxHeight": 300, "imageFit": "contain"},
    {"maxWidth": 100, "maxHeight": 100, "imageFit": "cover"}
]"#;
