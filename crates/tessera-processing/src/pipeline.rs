//! Rendition pipeline
//!
//! Turns one upload and its requested renditions into encoded files: the default
//! rendition plus every copy that is not a duplicate. Contain-fit copies are sized
//! analytically against the source dimensions and skipped when a contain-fit rendition
//! of the same realized size was already produced. Cover-fit copies are always produced.

use std::sync::Arc;

use bytes::Bytes;
use tessera_core::{
    fit_size, validate_specs, AppError, ImageFit, ImageSize, ImageType, ImageVariant,
    RenditionSpec, Rgb,
};

use crate::codec::ImageCodec;
use crate::color::average_color;

/// One encoded rendition ready to be written.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub spec: RenditionSpec,
    /// Realized pixel dimensions
    pub size: ImageSize,
    pub data: Bytes,
}

impl Rendition {
    pub fn byte_size(&self) -> i64 {
        self.data.len() as i64
    }

    pub fn to_variant(&self) -> ImageVariant {
        ImageVariant {
            w: self.size.width,
            h: self.size.height,
            mw: self.spec.max_width,
            mh: self.spec.max_height,
            fit: self.spec.fit,
            size: self.byte_size(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub output_type: ImageType,
    pub source_size: ImageSize,
    pub uploaded_size: i64,
    pub default: Rendition,
    /// Non-duplicate copies in request order
    pub copies: Vec<Rendition>,
    /// Sampled from the default rendition
    pub average_color: Rgb,
}

pub struct VariantPipeline {
    codec: Arc<dyn ImageCodec>,
    output_type: ImageType,
}

impl VariantPipeline {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            codec,
            output_type: ImageType::Jpeg,
        }
    }

    /// Produce every rendition for `source`.
    ///
    /// Validation happens first; an empty buffer or a spec list without exactly one
    /// default fails before any codec work.
    pub fn run(&self, source: &[u8], specs: &[RenditionSpec]) -> Result<PipelineOutput, AppError> {
        if source.is_empty() {
            return Err(AppError::InvalidInput("Image buffer is empty".to_string()));
        }
        let default_spec = validate_specs(specs)?;

        let converted = self.codec.convert_format(source, self.output_type)?;
        let source_size = self.codec.get_size(source)?;

        let default = self.render(&converted, source_size, default_spec)?;

        let mut contain_sizes: Vec<ImageSize> = Vec::new();
        if default_spec.fit == ImageFit::Contain {
            contain_sizes.push(default.size);
        }

        let mut copies = Vec::new();
        for spec in specs.iter().filter(|s| !s.is_default) {
            if spec.fit == ImageFit::Contain {
                let target = fit_size(source_size, spec.bounds(), ImageFit::Contain);
                if contain_sizes.contains(&target) {
                    tracing::debug!(
                        max_width = spec.max_width,
                        max_height = spec.max_height,
                        width = target.width,
                        height = target.height,
                        "Skipping duplicate contain rendition"
                    );
                    continue;
                }
            }

            let copy = self.render(&converted, source_size, *spec)?;
            if spec.fit == ImageFit::Contain {
                contain_sizes.push(copy.size);
            }
            copies.push(copy);
        }

        let pixels = self.codec.decode_pixels(&default.data)?;
        let average_color = average_color(&pixels);

        Ok(PipelineOutput {
            output_type: self.output_type,
            source_size,
            uploaded_size: source.len() as i64,
            default,
            copies,
            average_color,
        })
    }

    fn render(
        &self,
        converted: &[u8],
        source_size: ImageSize,
        spec: RenditionSpec,
    ) -> Result<Rendition, AppError> {
        let size = fit_size(source_size, spec.bounds(), spec.fit);
        let data = self.codec.resize_and_crop(converted, size)?;
        Ok(Rendition { spec, size, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCodec;

    fn pipeline() -> (VariantPipeline, Arc<FakeCodec>) {
        let codec = Arc::new(FakeCodec::default());
        (VariantPipeline::new(codec.clone()), codec)
    }

    fn contain(w: u32, h: u32, default: bool) -> RenditionSpec {
        RenditionSpec::new(w, h, ImageFit::Contain, default)
    }

    fn cover(w: u32, h: u32) -> RenditionSpec {
        RenditionSpec::new(w, h, ImageFit::Cover, false)
    }

    #[test]
    fn test_large_source_example() {
        let (pipeline, _) = pipeline();
        let source = FakeCodec::encode_png(4000, 3000);
        let out = pipeline
            .run(&source, &[contain(1080, 720, false), contain(5000, 5000, true)])
            .unwrap();

        assert_eq!(out.source_size, ImageSize::new(4000, 3000));
        // contain never upscales
        assert_eq!(out.default.size, ImageSize::new(4000, 3000));
        assert_eq!(out.copies.len(), 1);
        assert_eq!(out.copies[0].size, ImageSize::new(960, 720));
        assert_eq!(out.copies[0].to_variant().mw, 1080);
        assert_eq!(out.uploaded_size, source.len() as i64);
    }

    #[test]
    fn test_contain_duplicates_of_default_are_skipped() {
        let (pipeline, codec) = pipeline();
        let source = FakeCodec::encode_png(800, 600);
        let specs = [
            contain(1000, 1000, true),
            contain(800, 600, false),
            contain(2000, 2000, false),
            contain(801, 900, false),
        ];
        let out = pipeline.run(&source, &specs).unwrap();
        assert_eq!(out.default.size, ImageSize::new(800, 600));
        assert!(out.copies.is_empty());
        // one resize for the default only
        assert_eq!(codec.resize_calls(), 1);
    }

    #[test]
    fn test_duplicate_copies_collapse_to_first() {
        let (pipeline, _) = pipeline();
        let source = FakeCodec::encode_png(4000, 3000);
        let specs = [
            contain(4000, 3000, true),
            contain(400, 1000, false),
            // 400x300 again via the height bound
            contain(1000, 300, false),
            contain(200, 200, false),
        ];
        let out = pipeline.run(&source, &specs).unwrap();
        let sizes: Vec<_> = out.copies.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![ImageSize::new(400, 300), ImageSize::new(200, 150)]);
        assert_eq!(out.copies[0].spec.max_height, 1000);
    }

    #[test]
    fn test_cover_copies_are_never_deduplicated() {
        let (pipeline, _) = pipeline();
        let source = FakeCodec::encode_png(500, 500);
        let specs = [cover(200, 200), contain(500, 500, true), cover(200, 200)];
        let out = pipeline.run(&source, &specs).unwrap();
        assert_eq!(out.copies.len(), 2);
        assert!(out.copies.iter().all(|c| c.size == ImageSize::new(200, 200)));
    }

    #[test]
    fn test_cover_default_does_not_suppress_contain_copy() {
        let (pipeline, _) = pipeline();
        let source = FakeCodec::encode_png(300, 300);
        let specs = [
            RenditionSpec::new(300, 300, ImageFit::Cover, true),
            contain(300, 300, false),
        ];
        let out = pipeline.run(&source, &specs).unwrap();
        assert_eq!(out.copies.len(), 1);
    }

    #[test]
    fn test_validation_happens_before_codec_work() {
        let (pipeline, codec) = pipeline();
        let source = FakeCodec::encode_png(10, 10);

        let err = pipeline.run(&source, &[contain(10, 10, false)]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = pipeline.run(&[], &[contain(10, 10, true)]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(codec.total_calls(), 0);
    }

    #[test]
    fn test_thin_source_keeps_one_pixel_copy() {
        let (pipeline, codec) = pipeline();
        let source = FakeCodec::encode_png(4000, 30);
        let out = pipeline
            .run(&source, &[contain(5000, 5000, true), contain(100, 100, false)])
            .unwrap();

        assert_eq!(out.default.size, ImageSize::new(4000, 30));
        assert_eq!(out.copies.len(), 1);
        assert_eq!(out.copies[0].size, ImageSize::new(100, 1));
        assert_eq!(codec.resize_calls(), 2);
    }

    #[test]
    fn test_thin_source_with_image_codec() {
        let mut png = Vec::new();
        ::image::RgbImage::from_pixel(4000, 30, ::image::Rgb([10, 20, 30]))
            .write_to(&mut std::io::Cursor::new(&mut png), ::image::ImageFormat::Png)
            .unwrap();

        let codec = Arc::new(crate::ImageCrateCodec::default());
        let out = VariantPipeline::new(codec.clone())
            .run(&png, &[contain(5000, 5000, true), contain(100, 100, false)])
            .unwrap();

        assert_eq!(out.copies[0].size, ImageSize::new(100, 1));
        assert_eq!(
            codec.get_size(&out.copies[0].data).unwrap(),
            ImageSize::new(100, 1)
        );
    }

    #[test]
    fn test_unsupported_source() {
        let (pipeline, _) = pipeline();
        let err = pipeline
            .run(b"not an image", &[contain(10, 10, true)])
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_average_color_comes_from_default() {
        let (pipeline, _) = pipeline();
        let source = FakeCodec::encode_png(50, 50);
        let out = pipeline.run(&source, &[contain(50, 50, true)]).unwrap();
        assert_eq!(out.average_color, Rgb { r: 255, g: 0, b: 0 });
    }
}
