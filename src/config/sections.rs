use serde::Deserialize;

pub(crate) const FALLBACK_NAME: &str = "Other";

/// A named, independently paginated feed stream (one tab in the UI).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionConfig {
    pub tag: String,
    pub name: String,
}

impl SectionConfig {
    pub fn new(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
        }
    }
}

pub(crate) fn default_sections() -> Vec<SectionConfig> {
    [
        ("tech", "Technology"),
        ("economy", "Economy"),
        ("sports", "Sports"),
        ("health", "Health"),
        ("entertainment", "Entertainment"),
        ("education", "Education"),
        ("environment", "Environment"),
        ("food", "Food"),
    ]
    .into_iter()
    .map(|(tag, name)| SectionConfig::new(tag, name))
    .collect()
}
