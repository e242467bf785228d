use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;

use super::PageStore;

#[derive(Debug, Default)]
struct PageData {
    // (class name, object number, property name) -> value
    fields: HashMap<(String, u32, String), String>,
    saves: usize,
}

/// In-memory [`PageStore`] for tests and embedding without a real
/// document backend. Pages are created on first write.
#[derive(Debug, Default, Clone)]
pub struct MemoryPageStore {
    pages: Arc<RwLock<HashMap<String, PageData>>>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a property value, creating the page if needed.
    pub fn seed_field(
        &self,
        page: &str,
        class_name: &str,
        object_number: u32,
        property: &str,
        value: &str,
    ) {
        let mut pages = self.pages.write().unwrap();
        pages.entry(page.to_string()).or_default().fields.insert(
            (
                class_name.to_string(),
                object_number,
                property.to_string(),
            ),
            value.to_string(),
        );
    }

    /// How many times a page was saved. Zero for unknown pages.
    pub fn save_count(&self, page: &str) -> usize {
        self.pages
            .read()
            .unwrap()
            .get(page)
            .map(|p| p.saves)
            .unwrap_or(0)
    }

    /// Current value of a property, ignoring save state.
    pub fn stored_value(
        &self,
        page: &str,
        class_name: &str,
        object_number: u32,
        property: &str,
    ) -> Option<String> {
        self.pages.read().unwrap().get(page).and_then(|p| {
            p.fields
                .get(&(
                    class_name.to_string(),
                    object_number,
                    property.to_string(),
                ))
                .cloned()
        })
    }

    fn lookup_key(
        data: &PageData,
        class_name: &str,
        object_number: Option<u32>,
        property: &str,
    ) -> Option<(String, u32, String)> {
        let mut keys: Vec<_> = data
            .fields
            .keys()
            .filter(|(class, number, prop)| {
                prop == property
                    && (class_name.is_empty() || class == class_name)
                    && object_number.map_or(true, |n| *number == n)
            })
            .cloned()
            .collect();
        keys.sort();
        keys.into_iter().next()
    }
}

impl PageStore for MemoryPageStore {
    fn field_value(
        &self,
        page: &str,
        class_name: &str,
        object_number: Option<u32>,
        property: &str,
    ) -> Result<Option<String>> {
        let pages = self.pages.read().unwrap();
        let Some(data) = pages.get(page) else {
            return Ok(None);
        };
        let Some(key) = Self::lookup_key(data, class_name, object_number, property) else {
            return Ok(None);
        };
        Ok(data.fields.get(&key).cloned())
    }

    fn set_field_value(
        &mut self,
        page: &str,
        class_name: &str,
        object_number: Option<u32>,
        property: &str,
        value: &str,
    ) -> Result<()> {
        let mut pages = self.pages.write().unwrap();
        let data = pages.entry(page.to_string()).or_default();
        let key = Self::lookup_key(data, class_name, object_number, property).unwrap_or((
            class_name.to_string(),
            object_number.unwrap_or(0),
            property.to_string(),
        ));
        data.fields.insert(key, value.to_string());
        Ok(())
    }

    fn save(&mut self, page: &str, _comment: &str) -> Result<()> {
        let mut pages = self.pages.write().unwrap();
        pages.entry(page.to_string()).or_default().saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trip() {
        let mut store = MemoryPageStore::new();
        store
            .set_field_value("XWiki.Roles", "XWiki.RolesClass", Some(0), "values", "a=b")
            .unwrap();
        assert_eq!(
            store
                .field_value("XWiki.Roles", "XWiki.RolesClass", Some(0), "values")
                .unwrap()
                .as_deref(),
            Some("a=b")
        );
        assert_eq!(store.save_count("XWiki.Roles"), 0);
        store.save("XWiki.Roles", "updated").unwrap();
        assert_eq!(store.save_count("XWiki.Roles"), 1);
    }

    #[test]
    fn test_empty_class_matches_any_object() {
        let store = MemoryPageStore::new();
        store.seed_field("Space.Page", "App.SomeClass", 2, "values", "x");
        assert_eq!(
            store
                .field_value("Space.Page", "", None, "values")
                .unwrap()
                .as_deref(),
            Some("x")
        );
        assert_eq!(
            store.field_value("Space.Page", "", None, "other").unwrap(),
            None
        );
    }

    #[test]
    fn test_missing_page_reads_none() {
        let store = MemoryPageStore::new();
        assert_eq!(
            store.field_value("No.Page", "Any.Class", None, "p").unwrap(),
            None
        );
    }
}
