//! InMemoryObjectStore - 開発用・テスト用のオブジェクトストア
//!
//! # 学習ポイント
//! - BTreeMap でキー順の一覧を再現（S3 の ListObjectsV2 もキー順）
//! - 削除失敗の注入で partial failure をテストする

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{ObjectStore, StoreError};

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    failing_deletes: HashSet<String>,
    delete_attempts: Vec<String>,
}

/// InMemoryObjectStore はメモリ上のバケット
///
/// # 使用例
/// ```ignore
/// let store = InMemoryObjectStore::with_keys(["backups/app_20200101_000000.zip"]);
/// store.fail_delete_of("backups/app_20200101_000000.zip");
/// ```
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 空の中身でキーを登録した状態で作る
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut state = store.lock();
            for key in keys {
                state.objects.insert(key.into(), Vec::new());
            }
        }
        store
    }

    /// 次回以降 `key` の削除を失敗させる
    pub fn fail_delete_of(&self, key: impl Into<String>) {
        self.lock().failing_deletes.insert(key.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    /// 呼ばれた順の削除要求（失敗したものも含む）
    pub fn delete_attempts(&self) -> Vec<String> {
        self.lock().delete_attempts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.delete_attempts.push(key.to_string());
        if state.failing_deletes.contains(key) {
            return Err(StoreError::Delete {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        // S3 と同じく存在しないキーの削除は成功扱い
        state.objects.remove(key);
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, StoreError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| StoreError::LocalFile {
                path: path.display().to_string(),
                source,
            })?;
        let len = bytes.len() as u64;
        self.lock().objects.insert(key.to_string(), bytes);
        Ok(len)
    }

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.lock().objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock().objects.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_filters_by_prefix_in_key_order() {
        let store = InMemoryObjectStore::with_keys(["b/2.zip", "a/1.zip", "b/1.zip", "b/"]);
        let keys = store.list("b/").await.unwrap();
        assert_eq!(keys, vec!["b/", "b/1.zip", "b/2.zip"]);
    }

    #[tokio::test]
    async fn injected_delete_failure_keeps_object() {
        let store = InMemoryObjectStore::with_keys(["x.zip", "y.zip"]);
        store.fail_delete_of("x.zip");

        assert!(store.delete("x.zip").await.is_err());
        store.delete("y.zip").await.unwrap();

        assert_eq!(store.keys(), vec!["x.zip"]);
        assert_eq!(store.delete_attempts(), vec!["x.zip", "y.zip"]);
    }

    #[tokio::test]
    async fn put_file_copies_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let store = InMemoryObjectStore::new();
        let n = store.put_file("k/hello.txt", &path).await.unwrap();

        assert_eq!(n, 5);
        assert_eq!(store.get("k/hello.txt").as_deref(), Some(&b"hello"[..]));
        assert!(store.exists("k/hello.txt").await.unwrap());
        assert!(!store.exists("k/other.txt").await.unwrap());
    }

    #[tokio::test]
    async fn put_file_missing_source_is_local_error() {
        let store = InMemoryObjectStore::new();
        let err = store
            .put_file("k", Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LocalFile { .. }));
    }
}
