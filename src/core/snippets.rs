//! User-saved code fragments, persisted independently of any chat session.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::storage::{KeyValueStore, StorageError};
use crate::utils::ids::{generate_id, now_millis};

/// Key under which the serialized collection is stored.
pub const SNIPPETS_KEY: &str = "vibe_code_snippets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    pub title: String,
    pub code: String,
    pub language: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// Most-recent-first snippet collection backed by a [`KeyValueStore`].
///
/// Mutations update the in-memory list first and then persist it; a failed
/// write is reported to the caller but the in-memory change stands.
pub struct SnippetStore {
    store: Box<dyn KeyValueStore>,
    snippets: Vec<Snippet>,
}

impl SnippetStore {
    /// Load the collection. Missing, unreadable or corrupt state yields an
    /// empty library.
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let snippets = match store.get(SNIPPETS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Snippet>>(&raw) {
                Ok(snippets) => snippets,
                Err(err) => {
                    warn!(error = %err, "Discarding corrupt snippet library");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "Could not read snippet library");
                Vec::new()
            }
        };
        Self { store, snippets }
    }

    pub fn list(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn get(&self, id: &str) -> Option<&Snippet> {
        self.snippets.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Insert a new snippet at the head of the list and return its id.
    /// A blank title becomes `<language> snippet`.
    pub fn save(
        &mut self,
        code: impl Into<String>,
        language: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<String, StorageError> {
        let language = language.into();
        let title = title.into();
        let title = if title.trim().is_empty() {
            format!("{language} snippet")
        } else {
            title.trim().to_string()
        };

        let snippet = Snippet {
            id: generate_id(),
            title,
            code: code.into(),
            language,
            timestamp: now_millis(),
        };
        let id = snippet.id.clone();
        self.snippets.insert(0, snippet);
        self.persist()?;
        Ok(id)
    }

    /// Remove the snippet with `id`. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool, StorageError> {
        let before = self.snippets.len();
        self.snippets.retain(|s| s.id != id);
        if self.snippets.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(&self.snippets)?;
        self.store.set(SNIPPETS_KEY, &serialized)
    }
}
