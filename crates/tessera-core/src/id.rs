//! Image identifiers
//!
//! An [`ImageId`] is 12 bytes: the creation time as big-endian UTC nanoseconds since the
//! epoch, followed by a 4-byte random tiebreaker. Its text form is 24 lowercase hex digits,
//! which is also the filename stem of every file belonging to the image.
//!
//! Ordering by id approximates creation order only. Two ids minted in the same nanosecond
//! are ordered by their random suffix.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const ID_LEN: usize = 12;
pub const ID_HEX_LEN: usize = ID_LEN * 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("image id must be 24 hex characters, got {0}")]
    Length(usize),
    #[error("image id contains non-hex characters")]
    NotHex,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId([u8; ID_LEN]);

impl ImageId {
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an id from its two components.
    pub fn from_parts(at: DateTime<Utc>, random: u32) -> Self {
        // Out of the i64 nanosecond range (year 2262) saturates instead of wrapping.
        let nanos = at
            .timestamp_nanos_opt()
            .map(|n| n as u64)
            .unwrap_or(u64::MAX);

        let mut bytes = [0u8; ID_LEN];
        bytes[..8].copy_from_slice(&nanos.to_be_bytes());
        bytes[8..].copy_from_slice(&random.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Creation time encoded in the first 8 bytes.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let mut nanos = [0u8; 8];
        nanos.copy_from_slice(&self.0[..8]);
        let nanos = u64::from_be_bytes(nanos).min(i64::MAX as u64) as i64;
        Utc.timestamp_nanos(nanos)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self.to_hex())
    }
}

impl FromStr for ImageId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_HEX_LEN {
            return Err(IdParseError::Length(s.len()));
        }
        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| IdParseError::NotHex)?;
        Ok(Self(bytes))
    }
}

impl Serialize for ImageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ImageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An optional id reference with an explicit validity flag.
///
/// Serializes as `null` when not valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullableImageId {
    pub id: ImageId,
    pub valid: bool,
}

impl Default for ImageId {
    fn default() -> Self {
        Self([0u8; ID_LEN])
    }
}

impl NullableImageId {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<ImageId> {
        self.valid.then_some(self.id)
    }
}

impl From<ImageId> for NullableImageId {
    fn from(id: ImageId) -> Self {
        Self { id, valid: true }
    }
}

impl From<Option<ImageId>> for NullableImageId {
    fn from(id: Option<ImageId>) -> Self {
        id.map(Self::from).unwrap_or_default()
    }
}

impl Serialize for NullableImageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NullableImageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<ImageId>::deserialize(deserializer)?.into())
    }
}

#[cfg(feature = "sqlx")]
mod pg {
    use super::{ImageId, NullableImageId, ID_LEN};
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
    use sqlx::{Decode, Encode, Postgres, Type, ValueRef};

    impl Type<Postgres> for ImageId {
        fn type_info() -> PgTypeInfo {
            <Vec<u8> as Type<Postgres>>::type_info()
        }
    }

    impl Encode<'_, Postgres> for ImageId {
        fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
            <&[u8] as Encode<Postgres>>::encode_by_ref(&self.0.as_slice(), buf)
        }
    }

    impl<'r> Decode<'r, Postgres> for ImageId {
        fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
            let bytes = <&[u8] as Decode<Postgres>>::decode(value)?;
            let bytes: [u8; ID_LEN] = bytes
                .try_into()
                .map_err(|_| format!("image id column holds {} bytes", bytes.len()))?;
            Ok(ImageId(bytes))
        }
    }

    impl Type<Postgres> for NullableImageId {
        fn type_info() -> PgTypeInfo {
            <Vec<u8> as Type<Postgres>>::type_info()
        }
    }

    impl Encode<'_, Postgres> for NullableImageId {
        fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
            match self.get() {
                Some(id) => id.encode_by_ref(buf),
                None => Ok(IsNull::Yes),
            }
        }
    }

    impl<'r> Decode<'r, Postgres> for NullableImageId {
        fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
            if value.is_null() {
                return Ok(NullableImageId::null());
            }
            Ok(ImageId::decode(value)?.into())
        }
    }
}

/// Mints [`ImageId`]s from an owned random source.
///
/// Seeding is explicit: [`IdGenerator::from_entropy`] for production,
/// [`IdGenerator::from_seed`] when tests need reproducible suffixes.
pub struct IdGenerator {
    rng: Mutex<StdRng>,
}

impl IdGenerator {
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    pub fn from_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// New id stamped with the current UTC time, returned with that time.
    pub fn generate(&self) -> (ImageId, DateTime<Utc>) {
        let now = Utc::now();
        (self.generate_at(now), now)
    }

    pub fn generate_at(&self, at: DateTime<Utc>) -> ImageId {
        let random = {
            // A poisoned lock still holds a usable generator.
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.next_u32()
        };
        ImageId::from_parts(at, random)
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_big_endian_nanos_then_random() {
        let at = Utc.timestamp_nanos(0x0102_0304_0506_0708);
        let id = ImageId::from_parts(at, 0xAABB_CCDD);
        assert_eq!(
            id.as_bytes(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 0xAA, 0xBB, 0xCC, 0xDD]
        );
        assert_eq!(id.to_string(), "0102030405060708aabbccdd");
        assert_eq!(id.timestamp(), at);
    }

    #[test]
    fn test_hex_round_trip() {
        let ids = IdGenerator::from_seed(7);
        let (id, created_at) = ids.generate();
        let text = id.to_string();
        assert_eq!(text.len(), ID_HEX_LEN);
        assert_eq!(text, text.to_lowercase());
        assert_eq!(text.parse::<ImageId>().unwrap(), id);
        assert_eq!(id.timestamp(), created_at);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("abc".parse::<ImageId>(), Err(IdParseError::Length(3)));
        assert_eq!(
            "0102030405060708aabbccdd00".parse::<ImageId>(),
            Err(IdParseError::Length(26))
        );
        assert_eq!(
            "0102030405060708aabbccdz".parse::<ImageId>(),
            Err(IdParseError::NotHex)
        );
    }

    #[test]
    fn test_same_instant_differs_by_suffix() {
        let ids = IdGenerator::from_seed(42);
        let at = Utc::now();
        let a = ids.generate_at(at);
        let b = ids.generate_at(at);
        assert_ne!(a, b);
        assert_eq!(a.as_bytes()[..8], b.as_bytes()[..8]);
    }

    #[test]
    fn test_seeded_generators_are_reproducible() {
        let at = Utc::now();
        let a = IdGenerator::from_seed(9).generate_at(at);
        let b = IdGenerator::from_seed(9).generate_at(at);
        assert_eq!(a, b);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id: ImageId = "0102030405060708aabbccdd".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0102030405060708aabbccdd\"");
        let back: ImageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_nullable_id() {
        let null = NullableImageId::null();
        assert!(!null.valid);
        assert_eq!(serde_json::to_string(&null).unwrap(), "null");

        let id: ImageId = "0102030405060708aabbccdd".parse().unwrap();
        let some = NullableImageId::from(id);
        assert_eq!(some.get(), Some(id));
        let back: NullableImageId =
            serde_json::from_str(&serde_json::to_string(&some).unwrap()).unwrap();
        assert_eq!(back, some);
        let back: NullableImageId = serde_json::from_str("null").unwrap();
        assert_eq!(back, null);
    }
}
