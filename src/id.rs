//! String-backed ID types and lookup of IDs in keyed collections.
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::borrow::Borrow;
use std::fmt::Display;
use std::hash::Hash;

/// Declare a cheaply clonable ID type wrapping an `Rc<str>`.
///
/// IDs serialise as plain strings and can be used to look up maps keyed by them with a `&str`.
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            std::hash::Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        /// An ID type (e.g. `TechnologyID`)
        pub struct $name(pub std::rc::Rc<str>);

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                Self(id.into())
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}
pub(crate) use define_id_type;

/// A collection keyed by IDs which can be searched by name
pub trait IDCollection<ID> {
    /// Get the collection's own copy of the ID matching `id`, or an error naming it
    fn get_id_by_str(&self, id: &str) -> Result<ID>;
}

impl<ID, V> IDCollection<ID> for IndexMap<ID, V>
where
    ID: Eq + Hash + Borrow<str> + Clone + Display,
{
    fn get_id_by_str(&self, id: &str) -> Result<ID> {
        let (found, _) = self
            .get_key_value(id)
            .with_context(|| format!("Unknown technology ID {id}"))?;

        Ok(found.clone())
    }
}
