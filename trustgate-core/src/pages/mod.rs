//! Page store
//!
//! Minimal view of the platform's document/object storage: the
//! field-provenance recorder only needs to read a string property from an
//! object on a page, write it back and save the page. Everything else
//! about the document model stays on the platform's side of the trait.

mod memory;

pub use memory::MemoryPageStore;

use anyhow::Result;

/// Opaque document-store operations for provenance recording.
///
/// `class_name` empty means "the first object carrying the property";
/// `object_number` unset means "the first object of the class".
pub trait PageStore: Send + Sync {
    /// Read a string property from an object on a page.
    ///
    /// `Ok(None)` means no matching object/property exists.
    fn field_value(
        &self,
        page: &str,
        class_name: &str,
        object_number: Option<u32>,
        property: &str,
    ) -> Result<Option<String>>;

    /// Write a string property on an object, without saving the page
    fn set_field_value(
        &mut self,
        page: &str,
        class_name: &str,
        object_number: Option<u32>,
        property: &str,
        value: &str,
    ) -> Result<()>;

    /// Persist all pending modifications of a page
    fn save(&mut self, page: &str, comment: &str) -> Result<()>;
}
