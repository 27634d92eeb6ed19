//! Inventory catalog lookup used to resolve an item's category and type.

use crate::models::{CatalogEntry, CatalogLevel, RawDocument};
use crate::services::fields::{self, first_text};
use serde_json::Value;
use std::collections::HashMap;

/// Parent links are followed at most this many times. The catalog is three
/// levels deep, so anything longer is a cycle or corrupt data.
const MAX_PARENT_HOPS: usize = 4;

/// Which ancestor a report groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryVariant {
    /// Level-1 ancestor (a main entry is accepted when no level 1 exists).
    Category,
    /// Main ancestor.
    Type,
}

impl CategoryVariant {
    pub fn sentinel(&self) -> &'static str {
        match self {
            Self::Category => "بدون فئة",
            Self::Type => "بدون تصنيف",
        }
    }

    fn accepts(&self, level: CatalogLevel) -> bool {
        match self {
            Self::Category => matches!(level, CatalogLevel::LevelOne | CatalogLevel::Main),
            Self::Type => level == CatalogLevel::Main,
        }
    }
}

/// Catalog entries addressable by name, code and id-as-string. Source
/// documents reference items by any of the three. On alias collisions the
/// entry seen first keeps the alias.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: Vec<CatalogEntry>,
    by_alias: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl CatalogIndex {
    pub fn build(documents: &[Value]) -> Self {
        let mut index = Self::default();
        for entry in documents
            .iter()
            .filter_map(Value::as_object)
            .filter_map(parse_entry)
        {
            index.insert(entry);
        }
        tracing::debug!(entries = index.entries.len(), "Built catalog index");
        index
    }

    fn insert(&mut self, entry: CatalogEntry) {
        let position = self.entries.len();
        self.by_id.entry(entry.id.clone()).or_insert(position);

        let mut aliases = vec![entry.name.clone(), entry.id.clone()];
        aliases.extend(entry.code.clone());
        for alias in aliases.into_iter().filter(|a| !a.is_empty()) {
            self.by_alias.entry(alias).or_insert(position);
        }

        self.entries.push(entry);
    }

    pub fn lookup(&self, key: &str) -> Option<&CatalogEntry> {
        self.by_alias
            .get(key.trim())
            .map(|&position| &self.entries[position])
    }

    fn parent_of(&self, entry: &CatalogEntry) -> Option<&CatalogEntry> {
        entry
            .parent_id
            .as_deref()
            .and_then(|id| self.by_id.get(id))
            .map(|&position| &self.entries[position])
    }

    /// Resolve the group name for a sold item. The item name is tried first,
    /// then the item number. Unmatched items and broken parent chains resolve
    /// to the variant's sentinel.
    pub fn resolve(&self, item_name: &str, item_number: &str, variant: CategoryVariant) -> String {
        let start = self
            .lookup(item_name)
            .or_else(|| self.lookup(item_number));

        let mut current = start;
        for _ in 0..=MAX_PARENT_HOPS {
            match current {
                Some(entry) if variant.accepts(entry.level) => return entry.name.clone(),
                Some(entry) => current = self.parent_of(entry),
                None => break,
            }
        }

        variant.sentinel().to_string()
    }
}

fn parse_entry(document: &RawDocument) -> Option<CatalogEntry> {
    let id = first_text(document, &fields::CATALOG_ID)?;
    let name = first_text(document, &fields::CATALOG_NAME).unwrap_or_default();
    let level = first_text(document, &fields::CATALOG_TYPE)
        .map(|tag| CatalogLevel::parse(&tag))
        .unwrap_or(CatalogLevel::Other);

    Some(CatalogEntry {
        id,
        code: first_text(document, &fields::CATALOG_CODE),
        parent_id: first_text(document, &fields::CATALOG_PARENT),
        name,
        level,
    })
}
