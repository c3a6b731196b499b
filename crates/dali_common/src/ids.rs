//! Opaque ID newtypes for circuit entities.
//!
//! Every persistent entity in the circuit model ([`Tech`](crate), `Design`,
//! `Circuit`) is referenced by a `u32`-backed index, never by address. This
//! keeps cross-references stable across `Vec` growth and reallocation, so a
//! `Net`'s cached pin list never dangles when new `Block`s are appended.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize` for `Vec` indexing.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a [`CellType`](crate) template.
    CellTypeId
);

define_id!(
    /// Opaque, copyable ID for a [`PinTemplate`](crate) on a `CellType`.
    PinTemplateId
);

define_id!(
    /// Opaque, copyable ID for a `Block` (cell instance).
    BlockId
);

define_id!(
    /// Opaque, copyable ID for an `IoPin`.
    IoPinId
);

define_id!(
    /// Opaque, copyable ID for a `Net`.
    NetId
);

define_id!(
    /// Opaque, copyable ID for a `Row`.
    RowId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn roundtrip() {
        let id = BlockId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(id.index(), 42usize);
    }

    #[test]
    fn equality_and_ordering() {
        let a = NetId::from_raw(3);
        let b = NetId::from_raw(3);
        let c = NetId::from_raw(4);
        assert_eq!(a, b);
        assert!(a < c);
    }

    #[test]
    fn hash_in_set() {
        let mut set = HashSet::new();
        set.insert(CellTypeId::from_raw(1));
        set.insert(CellTypeId::from_raw(2));
        set.insert(CellTypeId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let id = PinTemplateId::from_raw(7);
        let json = serde_json::to_string(&id).unwrap();
        let restored: PinTemplateId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn display() {
        let id = RowId::from_raw(5);
        assert_eq!(format!("{id}"), "5");
    }
}
