//! 디코더 파일 로더

use std::path::Path;

use crate::error::AnalysisError;
use crate::source::{self, SourceKind};

use super::types::DecoderDef;

/// 디코더 파일 로더
pub struct DecoderLoader;

impl DecoderLoader {
    /// 설정된 경로의 디코더 정의를 파일 이름순으로 로드합니다.
    ///
    /// 부모 디코더는 자식보다 먼저 로드되는 파일에 있어야 합니다.
    pub async fn load_paths(paths: &[String]) -> Result<Vec<DecoderDef>, AnalysisError> {
        let files = source::collect_files(SourceKind::Decoder, paths).await?;

        let mut defs = Vec::new();
        for path in &files {
            defs.extend(Self::load_file(path).await?);
        }

        tracing::debug!(files = files.len(), decoders = defs.len(), "loaded decoder files");
        Ok(defs)
    }

    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<DecoderDef>, AnalysisError> {
        let path = path.as_ref();
        let content = source::read_source(SourceKind::Decoder, path).await?;
        Self::parse_yaml(&content, &path.display().to_string())
    }

    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<DecoderDef>, AnalysisError> {
        let defs: Vec<DecoderDef> =
            serde_yaml::from_str(yaml_str).map_err(|e| AnalysisError::DecoderLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        for def in &defs {
            def.validate().map_err(|e| AnalysisError::DecoderLoad {
                path: source.to_owned(),
                reason: e.to_string(),
            })?;
        }

        Ok(defs)
    }
}
