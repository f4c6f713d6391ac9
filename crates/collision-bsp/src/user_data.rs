//! Keys for the opaque metadata a tree carries alongside its geometry.

use std::fmt;

/// Identifies one user data entry of a [`crate::BspTree`].
///
/// Keys below [`UserDataKey::USER_DEFINED`] are reserved. Entries with keys
/// the tree does not know about are stored and written back unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserDataKey(pub u32);

impl UserDataKey {
    /// Content digest of the source mesh the tree was built from.
    pub const MD5_DIGEST: Self = Self(0);
    /// Build time of the tree.
    pub const TIME_STAMP: Self = Self(1);
    /// First key available to callers.
    pub const USER_DEFINED: Self = Self(0x1000);

    #[inline]
    pub fn is_user_defined(self) -> bool {
        self >= Self::USER_DEFINED
    }
}

impl From<u32> for UserDataKey {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for UserDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MD5_DIGEST => f.write_str("MD5_DIGEST"),
            Self::TIME_STAMP => f.write_str("TIME_STAMP"),
            Self(k) if k >= Self::USER_DEFINED.0 => write!(f, "USER_DEFINED+{:#x}", k - Self::USER_DEFINED.0),
            Self(k) => write!(f, "UserDataKey({k:#x})"),
        }
    }
}

impl fmt::Display for UserDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
