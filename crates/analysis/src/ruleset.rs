//! 룰셋 -- 세션 하나가 소유하는 디코더 트리, 룰 트리, CDB 리스트
//!
//! 세션마다 디스크에서 새로 로드하므로 수정된 룰 파일은 새 세션부터 적용되고,
//! 로딩에 실패하면 만들어지던 구조는 모두 버려집니다.

use logtest_core::config::AnalysisConfig;

use crate::decoder::{DecoderDef, DecoderLoader, DecoderTree};
use crate::error::AnalysisError;
use crate::lists::CdbLists;
use crate::rule::{RuleGroupDef, RuleLoader, RuleTree};

/// 컴파일된 룰셋
#[derive(Debug)]
pub struct Ruleset {
    pub decoders: DecoderTree,
    pub rules: RuleTree,
    pub lists: CdbLists,
}

impl Ruleset {
    /// 설정된 경로에서 디코더, 리스트, 룰을 순서대로 로드합니다.
    pub async fn load(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let decoder_defs = DecoderLoader::load_paths(&config.decoder_paths).await?;
        let lists = CdbLists::load_paths(&config.list_paths).await?;
        let rule_blocks = RuleLoader::load_paths(&config.rule_paths).await?;
        Self::build(&decoder_defs, &rule_blocks, lists)
    }

    /// 이미 파싱된 정의로 룰셋을 만듭니다.
    pub fn build(
        decoder_defs: &[DecoderDef],
        rule_blocks: &[RuleGroupDef],
        lists: CdbLists,
    ) -> Result<Self, AnalysisError> {
        let decoders = DecoderTree::build(decoder_defs)?;
        let rules = RuleTree::build(rule_blocks)?;

        let mut missing: Vec<&str> = rules
            .referenced_lists()
            .into_iter()
            .filter(|name| !lists.contains(name))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            tracing::warn!(
                lists = ?missing,
                "rules reference lists that are not loaded, lookups treat them as empty"
            );
        }

        Ok(Self {
            decoders,
            rules,
            lists,
        })
    }

    /// YAML 문자열로 룰셋을 만듭니다.
    pub fn from_yaml(
        decoders_yaml: &str,
        rules_yaml: &str,
        lists: CdbLists,
    ) -> Result<Self, AnalysisError> {
        let decoder_defs = DecoderLoader::parse_yaml(decoders_yaml, "<inline decoders>")?;
        let rule_blocks = RuleLoader::parse_yaml(rules_yaml, "<inline rules>")?;
        Self::build(&decoder_defs, &rule_blocks, lists)
    }
}
