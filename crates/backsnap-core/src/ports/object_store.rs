//! ObjectStore port - オブジェクトストレージ（S3 互換 / InMemory）
//!
//! バックアップのアップロード先であり、クリーンアップ時の一覧・削除対象です。
//!
//! # 実装
//! - `impls::InMemoryObjectStore`（テスト・開発用）
//! - `backsnap-s3::S3ObjectStore`（本番用）

use std::path::Path;

use async_trait::async_trait;

/// ストア操作のエラー（通信・認証・I/O）
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("list {prefix:?} failed: {message}")]
    List { prefix: String, message: String },

    #[error("delete {key:?} failed: {message}")]
    Delete { key: String, message: String },

    #[error("upload to {key:?} failed: {message}")]
    Put { key: String, message: String },

    #[error("head {key:?} failed: {message}")]
    Head { key: String, message: String },

    #[error("read local file {path:?} failed: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// ObjectStore はバケット内のキーを扱う
///
/// # 設計原則
/// - キーはバケット内のフルパス（`backups/app_20251021_095449.zip`）
/// - `/` で終わるキーはディレクトリマーカー
/// - 呼び出し側は各操作を逐次 await する（並行削除はしない）
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `prefix` で始まるキーをすべて返す（ディレクトリマーカーも含む）
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// ローカルファイルをアップロードし、送ったバイト数を返す
    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, StoreError>;

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// `dir` と名前を `/` でつないだキーを作る。`dir` が空ならバケット直下。
pub fn join_key(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// 一覧取得に使う prefix。`dir` が空ならバケット全体。
pub fn dir_prefix(dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    }
}
