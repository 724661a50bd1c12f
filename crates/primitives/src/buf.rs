//! Fixed-size byte buffers used as hashes, ids and signature material.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

macro_rules! fixed_buf {
    ($name:ident, $len:expr) => {
        #[derive(
            Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, BorshDeserialize, BorshSerialize,
        )]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn zero() -> Self {
                Self([0u8; $len])
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(buf: [u8; $len]) -> Self {
                Self(buf)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
                Ok(Self(buf.try_into()?))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                hex::encode(self.0).serialize(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s = String::deserialize(d)?;
                let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
                Self::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
            }
        }
    };
}

// 32-byte buf, used for state hashes, essence hashes and chain/request ids.
fixed_buf!(Buf32, 32);

// 48-byte buf, a compressed BLS12-381 G1 point (our public key encoding).
fixed_buf!(Buf48, 48);

// 96-byte buf, a compressed BLS12-381 G2 point (our signature/share encoding).
fixed_buf!(Buf96, 96);
