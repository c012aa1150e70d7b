use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::constants::IMAGE_URL_PREFIX;
use crate::error::AppError;
use crate::geometry::ImageSize;
use crate::id::ImageId;

/// Stored output format. Every rendition is re-encoded to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "image_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Jpeg,
}

impl ImageType {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpg",
        }
    }
}

impl Display for ImageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageType::Jpeg => write!(f, "jpeg"),
        }
    }
}

/// How a rendition is fitted into its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    /// Scale down to fit, no cropping, no upscaling.
    #[default]
    Contain,
    /// Fill the box exactly, cropping as needed.
    Cover,
}

impl FromStr for ImageFit {
    type Err = AppError;

    /// An empty string selects the default (`contain`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contain" | "" => Ok(ImageFit::Contain),
            "cover" => Ok(ImageFit::Cover),
            _ => Err(AppError::InvalidInput(format!("Invalid image fit: {}", s))),
        }
    }
}

impl<'de> Deserialize<'de> for ImageFit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Display for ImageFit {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageFit::Contain => write!(f, "contain"),
            ImageFit::Cover => write!(f, "cover"),
        }
    }
}

/// Representative color, each channel in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A stored copy rendition, embedded in its image's catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImageVariant {
    /// Realized width
    pub w: u32,
    /// Realized height
    pub h: u32,
    /// Requested bounding width
    pub mw: u32,
    /// Requested bounding height
    pub mh: u32,
    pub fit: ImageFit,
    /// Encoded size in bytes
    pub size: i64,
}

impl ImageVariant {
    pub fn bounds(&self) -> ImageSize {
        ImageSize::new(self.mw, self.mh)
    }
}

/// One requested rendition of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenditionSpec {
    #[validate(range(min = 1, max = 10000, message = "maxWidth must be between 1 and 10000"))]
    pub max_width: u32,
    #[validate(range(min = 1, max = 10000, message = "maxHeight must be between 1 and 10000"))]
    pub max_height: u32,
    #[serde(default, rename = "imageFit")]
    pub fit: ImageFit,
    #[serde(default, rename = "default")]
    pub is_default: bool,
}

impl RenditionSpec {
    pub fn new(max_width: u32, max_height: u32, fit: ImageFit, is_default: bool) -> Self {
        Self {
            max_width,
            max_height,
            fit,
            is_default,
        }
    }

    pub fn bounds(&self) -> ImageSize {
        ImageSize::new(self.max_width, self.max_height)
    }
}

/// Check a rendition list and return its default entry.
///
/// Exactly one spec must be the default, and every bound must lie in `1..=10000`.
pub fn validate_specs(specs: &[RenditionSpec]) -> Result<RenditionSpec, AppError> {
    for spec in specs {
        spec.validate()?;
    }

    let mut defaults = specs.iter().filter(|s| s.is_default);
    let default = defaults
        .next()
        .copied()
        .ok_or_else(|| AppError::InvalidInput("No default image was provided".to_string()))?;
    if defaults.next().is_some() {
        return Err(AppError::InvalidInput(
            "Only one rendition may be marked default".to_string(),
        ));
    }
    Ok(default)
}

/// Authoritative metadata for one uploaded image.
///
/// The default rendition's dimensions and size live on the record itself;
/// `copies` holds every other stored rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    #[schema(value_type = String, example = "0181c2c1d5e8a9f01a2b3c4d")]
    pub id: ImageId,
    pub shard_id: i32,
    #[serde(rename = "type")]
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub size: i64,
    #[serde(skip)]
    pub uploaded_size: i64,
    pub average_color: Rgb,
    pub copies: Vec<ImageVariant>,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

impl ImageRecord {
    /// Path of the default rendition, `/images/{shard}/{id}.jpg`.
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}/{}.{}",
            IMAGE_URL_PREFIX,
            self.shard_id,
            self.id,
            self.image_type.extension()
        )
    }

    /// Populate `url` and `urls`: the base path, then one query form per copy.
    pub fn generate_urls(&mut self) {
        let base = self.base_url();
        let mut urls = Vec::with_capacity(self.copies.len() + 1);
        urls.push(base.clone());
        for copy in &self.copies {
            urls.push(format!("{}?size={}&fit={}", base, copy.bounds(), copy.fit));
        }
        self.url = Some(base);
        self.urls = Some(urls);
    }

    pub fn with_urls(mut self) -> Self {
        self.generate_urls();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> ImageRecord {
        ImageRecord {
            id: "0102030405060708aabbccdd".parse().unwrap(),
            shard_id: 3,
            image_type: ImageType::Jpeg,
            width: 4000,
            height: 3000,
            max_width: 5000,
            max_height: 5000,
            size: 1234,
            uploaded_size: 999,
            average_color: Rgb { r: 10, g: 20, b: 30 },
            copies: vec![
                ImageVariant {
                    w: 1080,
                    h: 810,
                    mw: 1080,
                    mh: 720,
                    fit: ImageFit::Contain,
                    size: 100,
                },
                ImageVariant {
                    w: 200,
                    h: 200,
                    mw: 200,
                    mh: 200,
                    fit: ImageFit::Cover,
                    size: 50,
                },
            ],
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            deleted: false,
            deleted_at: None,
            url: None,
            urls: None,
        }
    }

    #[test]
    fn test_generate_urls() {
        let rec = record().with_urls();
        assert_eq!(
            rec.url.as_deref(),
            Some("/images/3/0102030405060708aabbccdd.jpg")
        );
        assert_eq!(
            rec.urls.unwrap(),
            vec![
                "/images/3/0102030405060708aabbccdd.jpg".to_string(),
                "/images/3/0102030405060708aabbccdd.jpg?size=1080x720&fit=contain".to_string(),
                "/images/3/0102030405060708aabbccdd.jpg?size=200&fit=cover".to_string(),
            ]
        );
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["id"], "0102030405060708aabbccdd");
        assert_eq!(json["shardId"], 3);
        assert_eq!(json["type"], "jpeg");
        assert_eq!(json["maxWidth"], 5000);
        assert_eq!(json["averageColor"]["g"], 20);
        assert_eq!(json["copies"][0]["mw"], 1080);
        assert_eq!(json["copies"][1]["fit"], "cover");
        assert_eq!(json["deleted"], false);
        assert!(json.get("uploadedSize").is_none());
        assert!(json.get("deletedAt").is_none());
        assert!(json.get("url").is_none());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_image_fit_parse() {
        assert_eq!("".parse::<ImageFit>().unwrap(), ImageFit::Contain);
        assert_eq!("contain".parse::<ImageFit>().unwrap(), ImageFit::Contain);
        assert_eq!("cover".parse::<ImageFit>().unwrap(), ImageFit::Cover);
        assert!("Cover".parse::<ImageFit>().is_err());
        assert!("fill".parse::<ImageFit>().is_err());
    }

    #[test]
    fn test_rendition_spec_json() {
        let specs: Vec<RenditionSpec> = serde_json::from_str(
            r#"[{"maxWidth":1080,"maxHeight":720,"imageFit":"cover"},
                {"maxWidth":5000,"maxHeight":5000,"imageFit":"","default":true}]"#,
        )
        .unwrap();
        assert_eq!(specs[0], RenditionSpec::new(1080, 720, ImageFit::Cover, false));
        assert_eq!(specs[1], RenditionSpec::new(5000, 5000, ImageFit::Contain, true));
    }

    #[test]
    fn test_validate_specs() {
        let default = RenditionSpec::new(100, 100, ImageFit::Contain, true);
        let copy = RenditionSpec::new(50, 50, ImageFit::Cover, false);
        assert_eq!(validate_specs(&[copy, default]).unwrap(), default);

        let err = validate_specs(&[copy]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(validate_specs(&[]).is_err());
        assert!(validate_specs(&[default, default]).is_err());

        let zero = RenditionSpec::new(0, 100, ImageFit::Contain, false);
        assert!(validate_specs(&[default, zero]).is_err());
        let huge = RenditionSpec::new(100, 10001, ImageFit::Contain, true);
        assert!(validate_specs(&[huge]).is_err());
    }
}
