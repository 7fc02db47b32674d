//! # logtest-analysis
//!
//! 세션별 로그 분석 파이프라인입니다.
//!
//! # 모듈 구성
//!
//! - [`preprocess`]: 요청을 정규화된 라인으로 만들고 syslog 헤더 분리
//! - [`decoder`]: 프로그램 이름 인덱스/폴백 디코더 트리, JSON 플러그인
//! - [`accumulator`]: 여러 줄 이벤트의 필드 병합
//! - [`rule`]: YAML 룰 트리와 매칭 드라이버 (카테고리, ignore, 상관관계)
//! - [`correlation`]: 세션 이벤트 히스토리와 룰/그룹별 매칭 리스트
//! - [`fts`]: first-time-seen 테이블
//! - [`lists`]: CDB 리스트 조회
//! - [`output`]: 응답 `output` 객체 렌더링
//! - [`ruleset`]: 디코더/룰/리스트 로딩
//! - [`session`]: 요청 하나를 파이프라인 전체에 통과시키는 세션 상태
//!
//! # 아키텍처
//!
//! ```text
//! LogRequest -> Preprocessor -> DecoderTree -> Accumulator -> RuleTree -> output
//!                   |               |                           |
//!              syslog header   category/fields        RuleState (history, lists, FTS)
//! ```

pub mod accumulator;
pub mod correlation;
pub mod decoder;
pub mod error;
pub mod event;
pub mod fts;
pub mod lists;
pub mod output;
pub mod preprocess;
pub mod rule;
pub mod ruleset;
pub mod session;

mod source;

// --- 주요 타입 re-export ---

// 세션
pub use session::{AnalysisSession, ProcessOutcome};

// 룰셋
pub use ruleset::Ruleset;

// 에러
pub use error::AnalysisError;

// 이벤트
pub use event::{Category, Event};

// 디코더
pub use decoder::{DecoderDef, DecoderLoader, DecoderTree};

// 룰 엔진
pub use rule::{MatchOutcome, RuleDef, RuleGroupDef, RuleLoader, RuleState, RuleTree};

// 리스트
pub use lists::{CdbList, CdbLists, ListLookup};
