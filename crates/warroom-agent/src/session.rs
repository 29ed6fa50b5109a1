use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key/value state shared by every agent of one run.
///
/// Specialists publish their findings under their output key; later agents
/// read them. Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl SessionState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `value` under `key`, replacing any previous value.
    pub async fn set(&self, key: impl Into<String>, value: Value) {
        self.values.write().await.insert(key.into(), value);
    }

    /// Value published under `key`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.values.read().await.get(key).cloned()
    }

    /// Point-in-time copy of every value.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.values.read().await.clone()
    }

    /// Published keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let state = SessionState::new();
        let other = state.clone();
        other.set("legal_agent_result", serde_json::json!({"ok": true})).await;
        assert_eq!(state.get("legal_agent_result").await.unwrap()["ok"], true);
        assert_eq!(state.keys().await, vec!["legal_agent_result"]);
        assert!(state.get("missing").await.is_none());
    }
}
