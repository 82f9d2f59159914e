//! Bit-flag newtypes for memory properties and resource usage.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Declares a `u32` flag newtype with set operations.
macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u32);

        impl $name {
            /// Empty set.
            pub const NONE: Self = Self(0);

            /// Raw bits.
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// True when every bit of `other` is set in `self`.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// True when `self` and `other` share at least one bit.
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// True when no bit is set.
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

flag_set!(
    /// Memory property flags of a memory type.
    ///
    /// Bit values follow the usual GPU API layout so layouts captured from a
    /// real driver can be pasted in unchanged.
    MemoryPropertyFlags
);

flag_set!(
    /// Buffer usage flags.
    BufferUsage
);

flag_set!(
    /// Image usage flags.
    ImageUsage
);

/// (flag, short name, long name), in display order.
const PROPERTY_NAMES: [(MemoryPropertyFlags, &str, &str); 6] = [
    (MemoryPropertyFlags::DEVICE_LOCAL, "DL", "device_local"),
    (MemoryPropertyFlags::HOST_VISIBLE, "HV", "host_visible"),
    (MemoryPropertyFlags::HOST_COHERENT, "HCO", "host_coherent"),
    (MemoryPropertyFlags::HOST_CACHED, "HCA", "host_cached"),
    (MemoryPropertyFlags::LAZILY_ALLOCATED, "LZ", "lazily_alloc"),
    (MemoryPropertyFlags::PROTECTED, "PT", "protected"),
];

impl MemoryPropertyFlags {
    pub const DEVICE_LOCAL: Self = Self(0x01);
    pub const HOST_VISIBLE: Self = Self(0x02);
    pub const HOST_COHERENT: Self = Self(0x04);
    pub const HOST_CACHED: Self = Self(0x08);
    pub const LAZILY_ALLOCATED: Self = Self(0x10);
    pub const PROTECTED: Self = Self(0x20);

    pub const fn is_device_local(self) -> bool {
        self.contains(Self::DEVICE_LOCAL)
    }

    pub const fn is_host_visible(self) -> bool {
        self.contains(Self::HOST_VISIBLE)
    }

    /// Abbreviated name, e.g. `DL` or `HV|HCO`. Empty flags print `none`.
    pub fn short_name(self) -> String {
        self.join_names(|&(_, short, _)| short)
    }

    /// Spelled-out name, e.g. `host_visible|host_coherent`.
    pub fn long_name(self) -> String {
        self.join_names(|&(_, _, long)| long)
    }

    /// Parse a `|`-separated list of short or long names (case-insensitive).
    ///
    /// `none` parses to the empty set.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("none") {
            return Some(Self::NONE);
        }
        let mut flags = Self::NONE;
        for part in text.split('|').map(str::trim) {
            let (flag, _, _) = PROPERTY_NAMES.iter().find(|(_, short, long)| {
                part.eq_ignore_ascii_case(short) || part.eq_ignore_ascii_case(long)
            })?;
            flags |= *flag;
        }
        Some(flags)
    }

    fn join_names(self, pick: impl Fn(&(Self, &'static str, &'static str)) -> &'static str) -> String {
        let names: Vec<&str> = PROPERTY_NAMES
            .iter()
            .filter(|entry| self.contains(entry.0))
            .map(pick)
            .collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join("|")
        }
    }
}

impl fmt::Display for MemoryPropertyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Serialized as the short name, e.g. `"HV|HCO"`.
impl Serialize for MemoryPropertyFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.short_name())
    }
}

impl<'de> Deserialize<'de> for MemoryPropertyFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| D::Error::custom(format!("unknown memory property flags '{}'", text)))
    }
}

impl BufferUsage {
    pub const TRANSFER_SRC: Self = Self(0x01);
    pub const TRANSFER_DST: Self = Self(0x02);
}

impl ImageUsage {
    pub const TRANSFER_SRC: Self = Self(0x01);
    pub const TRANSFER_DST: Self = Self(0x02);
    pub const SAMPLED: Self = Self(0x04);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_names() {
        let flags = MemoryPropertyFlags::HOST_VISIBLE
            | MemoryPropertyFlags::HOST_COHERENT
            | MemoryPropertyFlags::HOST_CACHED;
        assert_eq!(flags.short_name(), "HV|HCO|HCA");
        assert_eq!(flags.long_name(), "host_visible|host_coherent|host_cached");
        assert_eq!(MemoryPropertyFlags::NONE.to_string(), "none");
        assert_eq!(MemoryPropertyFlags::DEVICE_LOCAL.to_string(), "DL");
        println!("[PASS] Property flag names");
    }

    #[test]
    fn test_parse_accepts_both_spellings() {
        assert_eq!(
            MemoryPropertyFlags::parse("hv|HCA"),
            Some(MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED)
        );
        assert_eq!(
            MemoryPropertyFlags::parse("device_local"),
            Some(MemoryPropertyFlags::DEVICE_LOCAL)
        );
        assert_eq!(MemoryPropertyFlags::parse("none"), Some(MemoryPropertyFlags::NONE));
        assert_eq!(MemoryPropertyFlags::parse("DL|bogus"), None);
        println!("[PASS] Property flag parsing");
    }

    #[test]
    fn test_contains_and_intersects() {
        let dl_hv = MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE;
        assert!(dl_hv.contains(MemoryPropertyFlags::DEVICE_LOCAL));
        assert!(!MemoryPropertyFlags::DEVICE_LOCAL.contains(dl_hv));
        assert!(dl_hv.intersects(MemoryPropertyFlags::HOST_VISIBLE));
        assert!(dl_hv.contains(MemoryPropertyFlags::NONE));
        assert!(BufferUsage::NONE.is_empty());
    }

    #[test]
    fn test_serde_uses_short_names() {
        let flags = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT;
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, "\"HV|HCO\"");
        let back: MemoryPropertyFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
        assert!(serde_json::from_str::<MemoryPropertyFlags>("\"XX\"").is_err());
    }
}
