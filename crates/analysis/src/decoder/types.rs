//! 디코더 정의 타입
//!
//! YAML 디코더 파일에서 역직렬화되는 구조체들을 정의합니다.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::event::Category;

/// 디코더 정의 -- YAML 파일은 디코더 정의의 목록입니다.
///
/// # YAML 스키마
/// ```yaml
/// - name: sshd
///   program_name: ^sshd
///
/// - name: sshd-failed
///   parent: sshd
///   prematch: ^Failed \S+ for
///   regex: ^Failed (\S+) for (?:invalid user )?(\S+) from (\S+)
///   order: [method, dstuser, srcip]
///   fts: [dstuser, srcip]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderDef {
    /// 디코더 이름
    pub name: String,
    /// 부모 디코더 이름
    #[serde(default)]
    pub parent: Option<String>,
    /// 프로그램 이름 정규식
    #[serde(default)]
    pub program_name: Option<String>,
    /// 메시지 본문에 대한 사전 매칭 정규식
    #[serde(default)]
    pub prematch: Option<String>,
    /// 필드 추출 정규식 (캡처 그룹 순서대로 `order`에 대응)
    #[serde(default)]
    pub regex: Option<String>,
    /// 캡처 그룹에 대응하는 필드 이름
    #[serde(default)]
    pub order: Vec<String>,
    /// 카테고리. 자식 디코더는 생략하면 부모 값을 따릅니다.
    #[serde(default, rename = "type")]
    pub category: Option<Category>,
    /// 누적기 사용 여부
    #[serde(default)]
    pub accumulate: bool,
    /// 자식 디코더가 자기 이름을 출력에 사용할지 여부
    #[serde(default)]
    pub use_own_name: bool,
    /// FTS 키 필드
    #[serde(default)]
    pub fts: Vec<String>,
    /// 플러그인 디코더
    #[serde(default)]
    pub plugin: Option<DecoderPlugin>,
}

/// 내장 플러그인 디코더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderPlugin {
    /// JSON 객체를 점(.) 구분 필드로 평탄화
    Json,
}

impl DecoderDef {
    /// 디코더 정의의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.name.trim().is_empty() {
            return Err(AnalysisError::DecoderValidation {
                name: "(empty)".to_owned(),
                reason: "decoder name must not be empty".to_owned(),
            });
        }

        if self.parent.as_deref() == Some(self.name.as_str()) {
            return Err(AnalysisError::DecoderValidation {
                name: self.name.clone(),
                reason: "decoder cannot be its own parent".to_owned(),
            });
        }

        if !self.order.is_empty() && self.regex.is_none() {
            return Err(AnalysisError::DecoderValidation {
                name: self.name.clone(),
                reason: "'order' requires 'regex'".to_owned(),
            });
        }

        if self.parent.is_none()
            && self.program_name.is_none()
            && self.prematch.is_none()
            && self.plugin.is_none()
        {
            return Err(AnalysisError::DecoderValidation {
                name: self.name.clone(),
                reason: "root decoder needs 'program_name', 'prematch' or 'plugin'".to_owned(),
            });
        }

        if self.order.iter().any(|f| f.trim().is_empty()) {
            return Err(AnalysisError::DecoderValidation {
                name: self.name.clone(),
                reason: "'order' entries must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}
