//! Values shared between the storage, service and HTTP layers.

/// Maximum number of default images routed into one shard directory.
pub const DEFAULT_SHARD_CAPACITY: i32 = 4000;

/// Path prefix under which stored renditions are served.
pub const IMAGE_URL_PREFIX: &str = "/images";

pub const DEFAULT_JPEG_QUALITY: u8 = 85;
