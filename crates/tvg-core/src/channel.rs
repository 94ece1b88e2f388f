//! Channel catalog model.
//!
//! A [`ChannelDescriptor`] names one selectable live-video source; the
//! [`ChannelCatalog`] is the ordered, id-indexed collection built from the
//! `[[channels]]` section of the config file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A selectable live-video source.
///
/// Descriptors are defined statically in configuration and never mutated in
/// place; replacing a player's channel fully supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Stable identifier, unique within the catalog.
    pub id: String,
    /// Display name; the only metadata field with an invariant (non-empty).
    pub name: String,
    /// Optional logo image URL.
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Optional grouping category.
    #[serde(default)]
    pub category: Option<String>,
    /// Absolute URL of the upstream stream entry point.
    pub source_url: String,
}

/// Ordered collection of channels with id lookup.
#[derive(Debug, Default)]
pub struct ChannelCatalog {
    channels: Vec<ChannelDescriptor>,
    index: HashMap<String, usize>,
}

impl ChannelCatalog {
    /// Build a catalog from descriptors, preserving order.
    ///
    /// A duplicated id keeps the first descriptor; config validation warns
    /// about the duplicate separately.
    pub fn new(channels: Vec<ChannelDescriptor>) -> Self {
        let mut index = HashMap::with_capacity(channels.len());
        let mut kept = Vec::with_capacity(channels.len());
        for channel in channels {
            if index.contains_key(&channel.id) {
                continue;
            }
            index.insert(channel.id.clone(), kept.len());
            kept.push(channel);
        }
        Self {
            channels: kept,
            index,
        }
    }

    /// Look up a channel by id.
    pub fn get(&self, id: &str) -> Option<&ChannelDescriptor> {
        self.index.get(id).map(|&i| &self.channels[i])
    }

    /// All channels in catalog order.
    pub fn all(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, name: &str) -> ChannelDescriptor {
        ChannelDescriptor {
            id: id.into(),
            name: name.into(),
            logo_url: None,
            category: None,
            source_url: format!("http://origin.example/live/{id}.ts"),
        }
    }

    #[test]
    fn lookup_by_id() {
        let catalog = ChannelCatalog::new(vec![channel("a", "Alpha"), channel("b", "Beta")]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("b").unwrap().name, "Beta");
        assert!(catalog.get("c").is_none());
    }

    #[test]
    fn preserves_order() {
        let catalog = ChannelCatalog::new(vec![channel("z", "Z"), channel("a", "A")]);
        let ids: Vec<&str> = catalog.all().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[test]
    fn duplicate_id_keeps_first() {
        let catalog = ChannelCatalog::new(vec![channel("a", "First"), channel("a", "Second")]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("a").unwrap().name, "First");
    }

    #[test]
    fn empty_catalog() {
        let catalog = ChannelCatalog::new(Vec::new());
        assert!(catalog.is_empty());
        assert!(catalog.get("anything").is_none());
    }

    #[test]
    fn descriptor_round_trips_through_toml() {
        let toml_str = r#"
            id = "film-1"
            name = "Film One"
            logo_url = "http://cdn.example/logo.png"
            source_url = "http://origin.example/play/film1"
        "#;
        let parsed: ChannelDescriptor = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.id, "film-1");
        assert_eq!(parsed.logo_url.as_deref(), Some("http://cdn.example/logo.png"));
        assert!(parsed.category.is_none());
    }
}
