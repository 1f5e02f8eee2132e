//! Explicit type registry injected into encoders and decoders.
//!
//! A [`Scheme`] is built once at startup from the API groups the process
//! supports, then shared read-only (behind an `Arc`) by any number of
//! concurrent decoders and encoders. There is no global registry.

use crate::meta::TypeTag;
use crate::resources::{apps_v1, core_v1, Object};
use crate::{Result, WatchError};
use std::collections::HashMap;

/// Decodes one serialized object of a known type.
pub type DecodeFn = fn(&[u8]) -> Result<Object>;

/// Mutable collection phase of a [`Scheme`].
#[derive(Default)]
pub struct SchemeBuilder {
    types: HashMap<TypeTag, DecodeFn>,
}

impl SchemeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a decode target for `tag`. Each tag must resolve to exactly
    /// one target, so a second registration is rejected.
    pub fn register(&mut self, tag: TypeTag, decode: DecodeFn) -> Result<()> {
        if self.types.contains_key(&tag) {
            return Err(WatchError::DuplicateType(tag));
        }
        self.types.insert(tag, decode);
        Ok(())
    }

    pub fn build(self) -> Scheme {
        Scheme { types: self.types }
    }
}

/// Immutable mapping from type tags to decode targets and back.
#[derive(Debug)]
pub struct Scheme {
    types: HashMap<TypeTag, DecodeFn>,
}

impl Scheme {
    /// Builds a scheme covering the requested API group versions.
    ///
    /// Unknown group versions are an error rather than a panic; the caller
    /// decides whether a partial capability set is acceptable.
    pub fn for_groups(groups: &[&str]) -> Result<Self> {
        let mut builder = SchemeBuilder::new();
        for group in groups {
            match *group {
                core_v1::GROUP_VERSION => core_v1::register(&mut builder)?,
                apps_v1::GROUP_VERSION => apps_v1::register(&mut builder)?,
                other => {
                    return Err(WatchError::UnsupportedGroupVersion(other.to_string()));
                }
            }
        }
        Ok(builder.build())
    }

    /// Scheme covering every API group this build knows about.
    pub fn all_groups() -> Result<Self> {
        Self::for_groups(&[core_v1::GROUP_VERSION, apps_v1::GROUP_VERSION])
    }

    pub fn resolve(&self, tag: &TypeTag) -> Option<DecodeFn> {
        self.types.get(tag).copied()
    }

    pub fn recognizes(&self, tag: &TypeTag) -> bool {
        self.types.contains_key(tag)
    }

    /// Maps an object back to its tag, verifying it is registered here.
    pub fn tag_of(&self, object: &Object) -> Result<TypeTag> {
        let tag = object.type_tag();
        if !self.recognizes(&tag) {
            return Err(WatchError::UnknownType(tag));
        }
        Ok(tag)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Pod;

    #[test]
    fn test_all_groups_resolve() {
        let scheme = Scheme::all_groups().unwrap();
        assert_eq!(scheme.len(), 3);
        assert!(scheme.recognizes(&core_v1::pod()));
        assert!(scheme.recognizes(&apps_v1::deployment()));
    }

    #[test]
    fn test_unsupported_group_version_is_an_error() {
        let err = Scheme::for_groups(&["batch/v2alpha1"]).unwrap_err();
        assert!(matches!(err, WatchError::UnsupportedGroupVersion(_)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = SchemeBuilder::new();
        core_v1::register(&mut builder).unwrap();
        let err = core_v1::register(&mut builder).unwrap_err();
        assert!(matches!(err, WatchError::DuplicateType(_)));
    }

    #[test]
    fn test_partial_scheme_does_not_resolve_other_groups() {
        let scheme = Scheme::for_groups(&[core_v1::GROUP_VERSION]).unwrap();
        assert!(scheme.resolve(&apps_v1::deployment()).is_none());

        let err = scheme
            .tag_of(&Object::Deployment(Default::default()))
            .unwrap_err();
        assert!(matches!(err, WatchError::UnknownType(_)));

        assert!(scheme.tag_of(&Object::Pod(Pod::default())).is_ok());
    }
}
