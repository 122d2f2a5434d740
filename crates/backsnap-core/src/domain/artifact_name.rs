//! ArtifactName - アップロード名のエンコード／デコード
//!
//! バックアップ対象は `<logical-name>_<YYYYMMDD>_<HHMMSS>.<ext>` という
//! 正規名でアップロードされます。クリーンアップ時はバケットの一覧から
//! この名前をデコードして prefix と timestamp を取り出します。
//!
//! # 学習ポイント
//! - `.+?`（lazy）で最初に見つかった timestamp パターンで prefix を区切る
//! - デコードは失敗しない（不明な形式は `recognized = false` というデータ）

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `YYYYMMDD_HHMMSS` の chrono フォーマット
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// ディレクトリをアーカイブしたときの拡張子
pub const ZIP_EXTENSION: &str = ".zip";

/// `\d` は Unicode の数字にもマッチするので ASCII の `[0-9]` を使う
static ARTIFACT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_([0-9]{8}_[0-9]{6})\..+$").expect("artifact name pattern is valid")
});

/// 生成されたアーティファクト名
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 生成名に付ける拡張子
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactExtension {
    /// ディレクトリを zip にしたもの（常に `.zip`）
    Zip,
    /// 元ファイルの拡張子（先頭の `.` を含む）。拡張子なしは空文字列。
    Original(String),
}

impl ArtifactExtension {
    fn as_suffix(&self) -> &str {
        match self {
            ArtifactExtension::Zip => ZIP_EXTENSION,
            ArtifactExtension::Original(ext) => ext,
        }
    }
}

/// デコード結果
///
/// 一覧から取得したキーごとに作られ、永続化はされません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedArtifact {
    pub prefix: String,
    /// 生の `YYYYMMDD_HHMMSS`
    pub timestamp: String,
    pub recognized: bool,
}

impl DecodedArtifact {
    pub fn unrecognized() -> Self {
        Self {
            prefix: String::new(),
            timestamp: String::new(),
            recognized: false,
        }
    }
}

/// 正規名を生成する
///
/// `logical_name` はパスと（ファイルの場合は）拡張子を取り除いた名前。
pub fn encode(
    logical_name: &str,
    timestamp: &NaiveDateTime,
    extension: &ArtifactExtension,
) -> ArtifactName {
    ArtifactName(format!(
        "{}_{}{}",
        logical_name,
        timestamp.format(TIMESTAMP_FORMAT),
        extension.as_suffix()
    ))
}

/// バックアップ元パスから正規名を生成する
///
/// - ディレクトリ: `<dir-name>_<ts>.zip`
/// - ファイル: 最後の `.` で stem と拡張子に分け、`<stem>_<ts><.ext>`
///
/// ドットで始まるファイル（`.env` など）は `Path::file_stem` と同じく
/// 名前全体を stem として扱います。
pub fn encode_for_source(source: &Path, is_dir: bool, timestamp: &NaiveDateTime) -> ArtifactName {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string_lossy().into_owned());

    if is_dir {
        return encode(&file_name, timestamp, &ArtifactExtension::Zip);
    }

    let file_path = Path::new(&file_name);
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());
    let ext = file_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    encode(&stem, timestamp, &ArtifactExtension::Original(ext))
}

/// 任意の文字列をデコードする。失敗はしない。
pub fn decode(name: &str) -> DecodedArtifact {
    match ARTIFACT_NAME.captures(name) {
        Some(caps) => DecodedArtifact {
            prefix: caps[1].to_string(),
            timestamp: caps[2].to_string(),
            recognized: true,
        },
        None => DecodedArtifact::unrecognized(),
    }
}
