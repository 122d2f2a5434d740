//! Archive - ディレクトリを zip にまとめる
//!
//! # ルール
//! - エントリ名はソースディレクトリからの相対パス（区切りは `/`）
//! - ディレクトリは `name/` エントリとして入れる（空ディレクトリも残る）
//! - ソースのルート自体はエントリにしない
//! - 通常ファイル・ディレクトリ以外（シンボリックリンクなど）はスキップ
//! - `exclude` のディレクトリ（書き出し先の staging）は中に入らない
//!
//! 書き込みは同期 I/O なので、async 側からは `zip_directory_blocking` を使います。

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

/// zip 化の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: usize,
    pub directories: usize,
    pub bytes_in: u64,
}

/// `source` 以下を `target` に zip で書き出す（同期）
pub fn zip_directory(source: &Path, target: &Path, exclude: Option<&Path>) -> Result<ArchiveStats, ArchiveError> {
    let file = File::create(target).map_err(|source_err| ArchiveError::Io {
        path: target.to_path_buf(),
        source: source_err,
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut stats = ArchiveStats::default();
    let exclude = exclude.and_then(|dir| std::fs::canonicalize(dir).ok());

    let walker = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, exclude.as_deref()));

    for entry in walker {
        let entry = entry.map_err(|e| ArchiveError::Walk {
            path: source.to_path_buf(),
            source: e,
        })?;

        let relative = match entry.path().strip_prefix(source) {
            Ok(rel) if rel.as_os_str().is_empty() => continue,
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let name = entry_name(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
            stats.directories += 1;
        } else if file_type.is_file() {
            zip.start_file(name, options)?;
            let mut input = File::open(entry.path()).map_err(|e| ArchiveError::Io {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            let copied = io::copy(&mut input, &mut zip).map_err(|e| ArchiveError::Io {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            stats.files += 1;
            stats.bytes_in += copied;
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer).map_err(|e| ArchiveError::Io {
        path: target.to_path_buf(),
        source: e,
    })?;

    Ok(stats)
}

/// blocking プールで `zip_directory` を実行する
pub async fn zip_directory_blocking(
    source: PathBuf,
    target: PathBuf,
    exclude: Option<PathBuf>,
) -> Result<ArchiveStats, ArchiveError> {
    tokio::task::spawn_blocking(move || zip_directory(&source, &target, exclude.as_deref())).await?
}

fn is_excluded(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    let Some(exclude) = exclude else {
        return false;
    };
    if !entry.file_type().is_dir() {
        return false;
    }
    let excluded = std::fs::canonicalize(entry.path()).is_ok_and(|path| path == exclude);
    if excluded {
        tracing::debug!(path = %entry.path().display(), "skipping staging directory");
    }
    excluded
}

/// OS の区切りに関係なく `/` でつなぐ
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
