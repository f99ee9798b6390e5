use serde::{Deserialize, Serialize};

/// Legacy prefix carried by option weight columns (`weight_ti`, `weight_enfermagem`, ...).
pub const WEIGHT_KEY_PREFIX: &str = "weight_";

/// A recommendable field of study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub key: String,
    pub name: String,
}

/// Ordered set of course keys. Order decides tie-breaks and the fallback course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCatalog {
    courses: Vec<Course>,
}

impl CourseCatalog {
    /// Builds a catalog from `(key, display name)` pairs. Duplicate keys keep the first entry.
    pub fn new<K, N>(courses: impl IntoIterator<Item = (K, N)>) -> Self
    where
        K: Into<String>,
        N: Into<String>,
    {
        let mut out: Vec<Course> = Vec::new();
        for (key, name) in courses {
            let key = key.into();
            if out.iter().any(|c| c.key == key) {
                continue;
            }
            out.push(Course {
                key,
                name: name.into(),
            });
        }
        Self { courses: out }
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.courses.iter().map(|c| c.key.as_str())
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.courses.iter().position(|c| c.key == key)
    }

    pub fn get(&self, index: usize) -> Option<&Course> {
        self.courses.get(index)
    }

    /// Display name for a course key; unknown keys are echoed back unchanged.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.courses
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.name.as_str())
            .unwrap_or(key)
    }

    /// Maps a raw weight key (`ti` or `weight_ti`) onto its catalog key.
    pub fn canonical_key<'a>(&'a self, raw: &str) -> Option<&'a str> {
        let bare = raw.strip_prefix(WEIGHT_KEY_PREFIX).unwrap_or(raw);
        self.courses
            .iter()
            .find(|c| c.key == bare)
            .map(|c| c.key.as_str())
    }
}

impl Default for CourseCatalog {
    fn default() -> Self {
        Self::new([
            ("ti", "Tecnologia da Informação"),
            ("enfermagem", "Enfermagem"),
            ("logistica", "Logística"),
            ("administracao", "Administração"),
            ("estetica", "Estética"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let catalog = CourseCatalog::default();
        let keys: Vec<&str> = catalog.keys().collect();
        assert_eq!(
            keys,
            vec!["ti", "enfermagem", "logistica", "administracao", "estetica"]
        );
    }

    #[test]
    fn test_canonical_key_strips_legacy_prefix() {
        let catalog = CourseCatalog::default();
        assert_eq!(catalog.canonical_key("weight_ti"), Some("ti"));
        assert_eq!(catalog.canonical_key("estetica"), Some("estetica"));
        assert_eq!(catalog.canonical_key("weight_medicina"), None);
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let catalog = CourseCatalog::new([("a", "First"), ("b", "B"), ("a", "Second")]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.display_name("a"), "First");
    }

    #[test]
    fn test_display_name_falls_back_to_key() {
        let catalog = CourseCatalog::default();
        assert_eq!(catalog.display_name("ti"), "Tecnologia da Informação");
        assert_eq!(catalog.display_name("unknown"), "unknown");
    }
}
