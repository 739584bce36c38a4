//! 32-bit unique identifiers with type-safe wrappers and separate atomic counters per type.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Base 32-bit unique identifier type. Value 0 is reserved as nil.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid32(u32);

impl Uid32 {
    pub const fn nil() -> Self {
        Self(0)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub const fn is_nil(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Uid32 {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for Uid32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid32({:08x})", self.0)
    }
}

impl fmt::Display for Uid32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl Serialize for Uid32 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Uid32 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u32::deserialize(deserializer).map(Self)
    }
}

/// Declares a typed id wrapper around [`Uid32`] with its own atomic counter.
/// `new()` hands out sequential non-nil values, so ids double as arena slots.
macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident) => {
        static $counter: AtomicU32 = AtomicU32::new(1);

        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        pub struct $name(Uid32);

        impl $name {
            pub fn new() -> Self {
                Self(Uid32::from_u32($counter.fetch_add(1, Ordering::Relaxed)))
            }

            pub const fn nil() -> Self {
                Self(Uid32::nil())
            }

            pub const fn from_u32(value: u32) -> Self {
                Self(Uid32::from_u32(value))
            }

            pub const fn as_u32(&self) -> u32 {
                self.0.as_u32()
            }

            pub const fn as_uid32(&self) -> Uid32 {
                self.0
            }

            pub const fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:08x})"), self.0.as_u32())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id!(
    /// Handle of a scene node stored in the [`crate::node_arena::NodeArena`].
    NodeID,
    NODE_ID_COUNTER
);

typed_id!(
    /// Handle of a material registered with the material registry.
    MaterialID,
    MATERIAL_ID_COUNTER
);

typed_id!(
    /// Handle of an uploaded GPU mesh.
    MeshID,
    MESH_ID_COUNTER
);

typed_id!(
    /// Handle of an uploaded GPU texture (transfer-function LUTs included).
    TextureID,
    TEXTURE_ID_COUNTER
);
