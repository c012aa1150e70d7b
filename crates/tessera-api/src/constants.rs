//! Route prefixes and fixed HTTP values

/// JSON API base path
pub const API_PREFIX: &str = "/api";

/// Public path under which stored renditions are served
pub const IMAGES_PATH: &str = "/images";

/// Multipart field carrying the upload bytes
pub const IMAGE_FIELD: &str = "image";

/// Multipart field carrying the JSON rendition list
pub const COPIES_FIELD: &str = "copies";

/// Two weeks; rendition files never change once written.
pub const IMAGE_CACHE_CONTROL: &str = "max-age=1209600, no-transform";

pub const CROSS_ORIGIN_RESOURCE_POLICY: &str = "cross-origin";

/// Upper bound for a readiness probe round trip, in seconds
pub const READINESS_TIMEOUT_SECS: u64 = 5;
