use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::{ResearchError, ResearchResult};

/// 已持久化文档的回执
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    pub document_id: String,
    pub title: String,
    pub date: DateTime<Utc>,
}

/// 文档持久化服务
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save_document(&self, title: &str, content: &str) -> ResearchResult<SavedDocument>;
}

/// 以`<document_id>.md`的形式把报告写入输出目录
pub struct DiskDocumentStore {
    output_dir: PathBuf,
}

impl DiskDocumentStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn document_path(&self, document_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.md", document_id))
    }
}

#[async_trait]
impl DocumentStore for DiskDocumentStore {
    async fn save_document(&self, title: &str, content: &str) -> ResearchResult<SavedDocument> {
        if title.trim().is_empty() {
            return Err(ResearchError::storage("document title must not be empty"));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let document = SavedDocument {
            document_id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            date: Utc::now(),
        };
        let path = self.document_path(&document.document_id);
        tokio::fs::write(&path, content).await?;

        info!("💾 已保存文档: {}", path.display());
        Ok(document)
    }
}

/// 内存中的文档
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub saved: SavedDocument,
    pub content: String,
}

/// 内存文档存储，供嵌入方与测试使用
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, document_id: &str) -> Option<StoredDocument> {
        self.documents.read().await.get(document_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save_document(&self, title: &str, content: &str) -> ResearchResult<SavedDocument> {
        if title.trim().is_empty() {
            return Err(ResearchError::storage("document title must not be empty"));
        }

        let saved = SavedDocument {
            document_id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            date: Utc::now(),
        };
        self.documents.write().await.insert(
            saved.document_id.clone(),
            StoredDocument {
                saved: saved.clone(),
                content: content.to_string(),
            },
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disk_store_writes_markdown_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskDocumentStore::new(temp_dir.path().join("reports"));

        let saved = store
            .save_document("Solar Report", "# Solar\n\nBody")
            .await
            .unwrap();

        let written = std::fs::read_to_string(store.document_path(&saved.document_id)).unwrap();
        assert_eq!(written, "# Solar\n\nBody");
        assert_eq!(saved.title, "Solar Report");
    }

    #[tokio::test]
    async fn test_stores_reject_blank_title() {
        let temp_dir = TempDir::new().unwrap();
        let disk = DiskDocumentStore::new(temp_dir.path());
        assert!(matches!(
            disk.save_document(" ", "body").await,
            Err(ResearchError::Storage(_))
        ));

        let memory = MemoryDocumentStore::new();
        assert!(memory.save_document("", "body").await.is_err());
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryDocumentStore::new();
        let saved = store.save_document("Notes", "content").await.unwrap();

        let stored = store.get(&saved.document_id).await.unwrap();
        assert_eq!(stored.content, "content");
        assert_eq!(stored.saved, saved);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_saved_document_serializes_camel_case() {
        let saved = SavedDocument {
            document_id: "doc-1".to_string(),
            title: "T".to_string(),
            date: Utc::now(),
        };
        let value = serde_json::to_value(&saved).unwrap();
        assert_eq!(value["documentId"], "doc-1");
    }
}
