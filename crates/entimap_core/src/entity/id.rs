//! Entity instance identifier.

use std::fmt;
use uuid::Uuid;

/// Identity of one in-memory entity instance.
///
/// Instance ids are assigned when a handle is created and are:
/// - Unique per instance, not per row
/// - Immutable for the life of the instance
/// - Unrelated to the row's primary key
///
/// Two handles loaded for the same row have different instance ids; the
/// identity map tracks them independently.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Creates a new random instance id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an instance id from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first group is enough to tell instances apart in logs
        let text = self.0.simple().to_string();
        f.write_str(&text[..8])
    }
}

impl From<Uuid> for InstanceId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        let id1 = InstanceId::new();
        let id2 = InstanceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn from_uuid_keeps_value() {
        let uuid = Uuid::new_v4();
        let id = InstanceId::from(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn display_is_short() {
        let id = InstanceId::new();
        assert_eq!(id.to_string().len(), 8);
        assert!(format!("{id:?}").starts_with("InstanceId("));
    }
}
