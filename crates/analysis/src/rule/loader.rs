//! 룰 파일 로더 -- YAML 룰 파일을 디스크에서 로드합니다.
//!
//! 설정된 경로의 `.yml`/`.yaml` 파일을 파일 이름순으로 파싱합니다.
//! 파싱이나 검증에 실패한 파일이 하나라도 있으면 전체 로딩이 실패합니다.

use std::path::Path;

use crate::error::AnalysisError;
use crate::source::{self, SourceKind};

use super::types::RuleGroupDef;

/// 세션 하나가 가질 수 있는 최대 룰 수
const MAX_RULES_COUNT: usize = 10_000;

/// 룰 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 설정된 경로에서 모든 룰 그룹 블록을 로드합니다.
    ///
    /// # Errors
    /// - 경로를 읽을 수 없는 경우
    /// - 파일 파싱 또는 룰 검증에 실패한 경우
    /// - 룰 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_paths(paths: &[String]) -> Result<Vec<RuleGroupDef>, AnalysisError> {
        let files = source::collect_files(SourceKind::Rule, paths).await?;

        let mut blocks = Vec::new();
        let mut count = 0usize;
        for path in &files {
            let loaded = Self::load_file(path).await?;
            count += loaded.iter().map(|b| b.rules.len()).sum::<usize>();
            if count > MAX_RULES_COUNT {
                return Err(SourceKind::Rule.error(
                    path,
                    format!("too many rules: max {MAX_RULES_COUNT}"),
                ));
            }
            blocks.extend(loaded);
        }

        tracing::debug!(files = files.len(), rules = count, "loaded rule files");
        Ok(blocks)
    }

    /// 단일 YAML 파일에서 룰 그룹 블록을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<RuleGroupDef>, AnalysisError> {
        let path = path.as_ref();
        let content = source::read_source(SourceKind::Rule, path).await?;
        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하고 각 룰을 검증합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<RuleGroupDef>, AnalysisError> {
        let blocks: Vec<RuleGroupDef> =
            serde_yaml::from_str(yaml_str).map_err(|e| AnalysisError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        for rule in blocks.iter().flat_map(|b| &b.rules) {
            rule.validate().map_err(|e| AnalysisError::RuleLoad {
                path: source.to_owned(),
                reason: e.to_string(),
            })?;
        }

        Ok(blocks)
    }
}
