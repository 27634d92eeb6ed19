use serde::Serialize;

/// Position of an inventory catalog record in the main -> level 1 -> level 2 tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CatalogLevel {
    Main,
    LevelOne,
    LevelTwo,
    Other,
}

impl CatalogLevel {
    /// Parse the `type` tag. Arabic tags are what the ERP writes; the English
    /// spellings show up in imported data.
    pub fn parse(tag: &str) -> Self {
        match tag.trim() {
            "رئيسي" => Self::Main,
            "مستوى أول" => Self::LevelOne,
            "مستوى ثاني" => Self::LevelTwo,
            other => match other.to_lowercase().replace([' ', '_', '-'], "").as_str() {
                "main" => Self::Main,
                "level1" | "levelone" => Self::LevelOne,
                "level2" | "leveltwo" => Self::LevelTwo,
                _ => Self::Other,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub code: Option<String>,
    pub parent_id: Option<String>,
    pub name: String,
    pub level: CatalogLevel,
}
