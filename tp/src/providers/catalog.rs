//! File-backed attraction catalog with lexical scoring

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{KnowledgeBase, KnowledgeRecord, ProviderError};

/// One catalog row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    pub name: String,
    pub city: String,
    pub country: String,
    pub category: String,
    pub price: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl CatalogEntry {
    fn haystack(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.name,
            self.city,
            self.country,
            self.category,
            self.tags.join(" "),
            self.description
        )
        .to_lowercase()
    }
}

/// Knowledge base over a static list of attractions
///
/// A record's score is the fraction of query terms found in its text, so a
/// query naming the city and country scores every attraction there at 1.0.
#[derive(Debug, Clone, Default)]
pub struct CatalogKnowledgeBase {
    entries: Vec<CatalogEntry>,
    source: String,
}

impl CatalogKnowledgeBase {
    pub fn new(entries: Vec<CatalogEntry>, source: impl Into<String>) -> Self {
        debug!(entry_count = entries.len(), "CatalogKnowledgeBase::new: called");
        Self {
            entries,
            source: source.into(),
        }
    }

    /// Catalog with no entries; every search comes back empty
    pub fn empty() -> Self {
        Self::new(Vec::new(), "empty")
    }

    /// Load a YAML or JSON list of entries
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        debug!(?path, "CatalogKnowledgeBase::load: called");
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<CatalogEntry> =
            serde_yaml::from_str(&content).map_err(|e| ProviderError::Parse(e.to_string()))?;
        info!("Loaded {} catalog entries from {}", entries.len(), path.display());
        Ok(Self::new(entries, path.display().to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn terms(query: &str) -> Vec<String> {
        query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 2)
            .map(|t| {
                let lower = t.to_lowercase();
                match lower.strip_suffix('s') {
                    Some(stem) if stem.chars().count() >= 3 => stem.to_string(),
                    _ => lower,
                }
            })
            .collect()
    }

    fn score(terms: &[String], entry: &CatalogEntry) -> f64 {
        if terms.is_empty() {
            return 0.0;
        }
        let haystack = entry.haystack();
        let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        hits as f64 / terms.len() as f64
    }
}

#[async_trait]
impl KnowledgeBase for CatalogKnowledgeBase {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<KnowledgeRecord>, ProviderError> {
        debug!(%query, max_results, "CatalogKnowledgeBase::search: called");
        let terms = Self::terms(query);
        let mut scored: Vec<(f64, &CatalogEntry)> = self
            .entries
            .iter()
            .map(|e| (Self::score(&terms, e), e))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let records: Vec<KnowledgeRecord> = scored
            .into_iter()
            .take(max_results)
            .map(|(score, e)| KnowledgeRecord {
                name: e.name.clone(),
                category: e.category.clone(),
                price: e.price.clone(),
                description: e.description.clone(),
                score,
                source: self.source.clone(),
            })
            .collect();
        debug!(count = records.len(), "CatalogKnowledgeBase::search: returning");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn entry(name: &str, city: &str, country: &str, tags: &[&str]) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            city: city.to_string(),
            country: country.to_string(),
            category: "attraction".to_string(),
            price: "$10".to_string(),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_search_scores_by_term_overlap() {
        let kb = CatalogKnowledgeBase::new(
            vec![
                entry("Fushimi Inari", "Kyoto", "Japan", &["shrine"]),
                entry("Senso-ji", "Tokyo", "Japan", &["temple"]),
                entry("Louvre", "Paris", "France", &["museum"]),
            ],
            "test",
        );

        let results = kb.search("Kyoto, Japan", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Fushimi Inari");
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.5);
    }

    #[tokio::test]
    async fn test_search_respects_max_results() {
        let kb = CatalogKnowledgeBase::new(
            (0..5).map(|i| entry(&format!("Spot {}", i), "Rome", "Italy", &[])).collect(),
            "test",
        );
        assert_eq!(kb.search("Rome", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_plural_terms_match_singular_tags() {
        let kb = CatalogKnowledgeBase::new(vec![entry("Kinkaku-ji", "Kyoto", "Japan", &["temple"])], "test");
        let results = kb.search("Kyoto temples", 5).await.unwrap();
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn test_load_yaml_catalog() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- name: Belem Tower
  city: Lisbon
  country: Portugal
  category: landmark
  price: "€8"
- name: Time Out Market
  city: Lisbon
  country: Portugal
  category: dining
  price: "$20"
"#
        )
        .unwrap();

        let kb = CatalogKnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let kb = CatalogKnowledgeBase::empty();
        assert!(kb.is_empty());
        assert!(kb.search("anything", 5).await.unwrap().is_empty());
    }
}
