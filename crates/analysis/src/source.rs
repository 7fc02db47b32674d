//! 룰셋 소스 파일 수집 -- 디코더, 룰, 리스트 경로를 파일 목록으로 펼칩니다.
//!
//! 설정의 각 경로는 파일 또는 디렉토리입니다.
//! 디렉토리는 한 단계만 스캔하고 파일 이름순으로 정렬해 로딩 순서를 고정합니다.
//! 숨김 파일(`.`으로 시작)은 건너뜁니다.

use std::path::{Path, PathBuf};

use crate::error::AnalysisError;

/// 소스 파일 최대 크기
pub const MAX_SOURCE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// 소스 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Decoder,
    Rule,
    List,
}

impl SourceKind {
    /// 종류에 맞는 로딩 에러를 만듭니다.
    pub fn error(self, path: &Path, reason: impl Into<String>) -> AnalysisError {
        let path = path.display().to_string();
        let reason = reason.into();
        match self {
            Self::Decoder => AnalysisError::DecoderLoad { path, reason },
            Self::Rule => AnalysisError::RuleLoad { path, reason },
            Self::List => AnalysisError::ListLoad { path, reason },
        }
    }

    /// 디렉토리 스캔 시 포함할 파일인지 판단합니다.
    fn accepts(self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| n.starts_with('.'));
        if hidden {
            return false;
        }
        match self {
            Self::Decoder | Self::Rule => path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml"),
            Self::List => true,
        }
    }
}

/// 설정 경로 목록을 파일 목록으로 펼칩니다.
///
/// 명시적으로 지정된 파일은 확장자와 관계없이 포함됩니다.
pub async fn collect_files(
    kind: SourceKind,
    paths: &[String],
) -> Result<Vec<PathBuf>, AnalysisError> {
    let mut files = Vec::new();

    for raw in paths {
        let path = Path::new(raw);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| kind.error(path, format!("failed to read metadata: {e}")))?;

        if metadata.is_file() {
            files.push(path.to_path_buf());
            continue;
        }

        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| kind.error(path, format!("failed to read directory: {e}")))?;

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| kind.error(path, format!("failed to read directory entry: {e}")))?
        {
            let entry_path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file && kind.accepts(&entry_path) {
                found.push(entry_path);
            }
        }
        found.sort();

        tracing::debug!(
            kind = ?kind,
            dir = %path.display(),
            files = found.len(),
            "scanned source directory"
        );
        files.extend(found);
    }

    Ok(files)
}

/// 크기 제한을 확인하고 파일 내용을 읽습니다.
pub async fn read_source(kind: SourceKind, path: &Path) -> Result<String, AnalysisError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| kind.error(path, format!("failed to read file metadata: {e}")))?;

    if metadata.len() > MAX_SOURCE_FILE_SIZE {
        return Err(kind.error(
            path,
            format!(
                "file too large: {} bytes (max: {MAX_SOURCE_FILE_SIZE})",
                metadata.len()
            ),
        ));
    }

    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| kind.error(path, format!("failed to read file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.yml", "a.yaml", "notes.txt", ".hidden.yml"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let paths = vec![dir.path().display().to_string()];

        let files = collect_files(SourceKind::Rule, &paths).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yml"]);

        let lists = collect_files(SourceKind::List, &paths).await.unwrap();
        assert_eq!(lists.len(), 3);
    }

    #[tokio::test]
    async fn explicit_file_is_included_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("local_rules.conf");
        std::fs::write(&file, "[]").unwrap();

        let files = collect_files(SourceKind::Rule, &[file.display().to_string()])
            .await
            .unwrap();
        assert_eq!(files, vec![file]);
    }

    #[tokio::test]
    async fn missing_path_is_kind_specific_error() {
        let err = collect_files(SourceKind::Decoder, &["/nonexistent/decoders".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DecoderLoad { .. }));
    }
}
