use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, EmbeddingClient};
use crate::error::StageError;

/// Persisted visual signature for one character.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CharacterRecord {
    pub name: String,
    pub visual_description: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
    pub frame_count: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Keeps character appearances stable across storyboard frames by pinning
/// each character to an embedded visual description. The whole store is a
/// single JSON file rewritten on every update.
pub struct ConsistencyManager {
    client: Box<dyn EmbeddingClient>,
    path: PathBuf,
    records: HashMap<String, CharacterRecord>,
}

impl ConsistencyManager {
    /// Open the store, loading any previously saved records.
    pub fn open(client: Box<dyn EmbeddingClient>, path: &Path) -> Result<Self, StageError> {
        let records = if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))
                .map_err(|e| StageError::Config(e.to_string()))?;
            serde_json::from_str(&data).map_err(|e| StageError::Parse(e.to_string()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            client,
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn character_id(name: &str) -> String {
        name.to_lowercase().replace(' ', "_")
    }

    /// Embed the description and upsert the character record. Returns the
    /// character id the record is stored under.
    pub async fn store_character(
        &mut self,
        name: &str,
        visual_description: &str,
        metadata: serde_json::Value,
    ) -> Result<String, StageError> {
        let embedding = self
            .client
            .embed(visual_description)
            .await
            .map_err(StageError::generation)?;

        let id = Self::character_id(name);
        self.records.insert(
            id.clone(),
            CharacterRecord {
                name: name.to_string(),
                visual_description: visual_description.to_string(),
                embedding,
                metadata,
                frame_count: 0,
                last_updated: Some(Utc::now()),
            },
        );

        self.save()?;
        Ok(id)
    }

    /// Canonical description for image prompts. Bumps the usage counter.
    /// The scene context is accepted for future description adaptation but
    /// does not change the result yet.
    pub fn character_description(
        &mut self,
        name: &str,
        _context: Option<&str>,
    ) -> Result<String, StageError> {
        let id = Self::character_id(name);
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StageError::NotFound(format!("character {name} not found")))?;

        record.frame_count += 1;
        Ok(record.visual_description.clone())
    }

    /// Compare a new description against the stored signature. Unknown
    /// characters are reported inconsistent with zero similarity rather
    /// than as an error.
    pub async fn validate_consistency(
        &self,
        name: &str,
        new_description: &str,
        threshold: f32,
    ) -> Result<(bool, f32), StageError> {
        let id = Self::character_id(name);
        let Some(record) = self.records.get(&id) else {
            return Ok((false, 0.0));
        };

        let new_embedding = self
            .client
            .embed(new_description)
            .await
            .map_err(StageError::generation)?;
        let similarity = cosine_similarity(&record.embedding, &new_embedding);

        Ok((similarity >= threshold, similarity))
    }

    pub fn character_names(&self) -> Vec<String> {
        self.records.values().map(|r| r.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(&Self::character_id(name))
    }

    fn save(&self) -> Result<(), StageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StageError::Config(e.to_string()))?;
        }
        let data = serde_json::to_string_pretty(&self.records)
            .map_err(|e| StageError::Parse(e.to_string()))?;
        fs::write(&self.path, data)
            .with_context(|| format!("writing {}", self.path.display()))
            .map_err(|e| StageError::Config(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    /// Deterministic embedder: a fixed vector per known phrase so that
    /// similarity comparisons are predictable.
    #[derive(Debug)]
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(if text.contains("dark hair") {
                vec![1.0, 0.1, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            })
        }
    }

    fn manager(dir: &tempfile::TempDir) -> ConsistencyManager {
        ConsistencyManager::open(Box::new(StubEmbedder), &dir.path().join("embeddings.json"))
            .unwrap()
    }

    #[test]
    fn test_character_id_slug() {
        assert_eq!(ConsistencyManager::character_id("Mara Voss"), "mara_voss");
    }

    #[tokio::test]
    async fn test_store_and_describe() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);

        let id = manager
            .store_character("Mara Voss", "Tall, dark hair", serde_json::json!({"role": "protagonist"}))
            .await
            .unwrap();
        assert_eq!(id, "mara_voss");

        let description = manager.character_description("Mara Voss", None).unwrap();
        assert_eq!(description, "Tall, dark hair");
        assert_eq!(manager.records["mara_voss"].frame_count, 1);
        manager.character_description("mara voss", Some("rooftop")).unwrap();
        assert_eq!(manager.records["mara_voss"].frame_count, 2);
    }

    #[tokio::test]
    async fn test_unknown_character_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);
        let err = manager.character_description("Nobody", None).unwrap_err();
        assert!(matches!(err, StageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validate_consistency() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(&dir);
        manager
            .store_character("Mara", "Tall, dark hair", serde_json::Value::Null)
            .await
            .unwrap();

        // Same embedding direction passes the threshold.
        let (ok, score) = manager
            .validate_consistency("Mara", "still dark hair", 0.85)
            .await
            .unwrap();
        assert!(ok);
        assert!(score > 0.99);

        // Orthogonal description fails it.
        let (ok, score) = manager
            .validate_consistency("Mara", "completely different person", 0.85)
            .await
            .unwrap();
        assert!(!ok);
        assert!(score < 0.2);

        // Unknown characters are a soft failure.
        let (ok, score) = manager
            .validate_consistency("Nobody", "anything", 0.85)
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");

        {
            let mut manager =
                ConsistencyManager::open(Box::new(StubEmbedder), &path).unwrap();
            manager
                .store_character("Mara", "Tall, dark hair", serde_json::Value::Null)
                .await
                .unwrap();
        }

        let reopened = ConsistencyManager::open(Box::new(StubEmbedder), &path).unwrap();
        assert!(reopened.contains("Mara"));
        assert_eq!(reopened.character_names(), vec!["Mara"]);
    }
}
