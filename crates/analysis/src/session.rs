//! 분석 세션 -- 요청 하나를 파이프라인 전체에 통과시킵니다.
//!
//! 전처리 → 디코딩 → 누적(디코더가 요구할 때) → 룰 매칭 → 출력 객체
//!
//! [`AnalysisSession`]은 동기화를 하지 않습니다.
//! 동시 접근 직렬화는 세션 테이블의 세션별 잠금이 담당합니다.

use chrono::{DateTime, Utc};
use serde_json::Value;

use logtest_core::config::AnalysisConfig;
use logtest_core::protocol::{Diagnostics, LogRequest};

use crate::accumulator::Accumulator;
use crate::error::AnalysisError;
use crate::output;
use crate::preprocess::Preprocessor;
use crate::rule::RuleState;
use crate::ruleset::Ruleset;

/// 요청 처리 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// 응답의 `output` 객체
    pub output: Value,
    /// 보관된 매칭이 알림 레벨 이상인지 여부
    pub alert: bool,
}

/// 세션 하나의 파이프라인 상태
#[derive(Debug)]
pub struct AnalysisSession {
    ruleset: Ruleset,
    state: RuleState,
    accumulator: Accumulator,
    preprocessor: Preprocessor,
    log_alert_level: u8,
    manager_name: String,
    alert_seq: u64,
}

impl AnalysisSession {
    /// 설정된 경로에서 룰셋을 로드해 세션을 만듭니다.
    ///
    /// 어느 단계에서 실패하든 만들어지던 구조는 모두 버려집니다.
    pub async fn load(config: &AnalysisConfig, now: DateTime<Utc>) -> Result<Self, AnalysisError> {
        let ruleset = Ruleset::load(config).await?;
        Self::new(ruleset, config, now)
    }

    pub fn new(
        ruleset: Ruleset,
        config: &AnalysisConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, AnalysisError> {
        let state = RuleState::new(
            &ruleset.rules,
            config.history_size,
            config.match_list_size,
            config.fts_list_size,
        );
        Ok(Self {
            state,
            accumulator: Accumulator::new(now),
            preprocessor: Preprocessor::new()?,
            log_alert_level: config.log_alert_level,
            manager_name: config.manager_name.clone(),
            alert_seq: 0,
            ruleset,
        })
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    pub fn state(&self) -> &RuleState {
        &self.state
    }

    /// 로그 요청을 처리합니다.
    ///
    /// 전처리 실패나 룰이 없는 경우 에러를 반환하며, 이때 세션 상태는 바뀌지 않습니다.
    pub fn process(
        &mut self,
        request: &LogRequest,
        now: DateTime<Utc>,
        diags: &mut Diagnostics,
    ) -> Result<ProcessOutcome, AnalysisError> {
        let mut event = self.preprocessor.preprocess(request, now)?;
        if self.ruleset.rules.is_empty() {
            return Err(AnalysisError::NoRules);
        }
        event.alert_id = format!("{}.{}", now.timestamp(), self.alert_seq);
        self.alert_seq += 1;

        self.ruleset.decoders.decode(&mut event);

        if event.decoder.as_ref().is_some_and(|d| d.accumulate) {
            self.accumulator.accumulate(&mut event, now);
        }

        let outcome =
            self.ruleset
                .rules
                .evaluate(&mut event, &mut self.state, &self.ruleset.lists)?;

        let alert = outcome.is_some_and(|o| {
            o.kept
                && self
                    .ruleset
                    .rules
                    .get(o.rule)
                    .is_some_and(|rule| rule.level() >= self.log_alert_level)
        });

        let output = output::render(&event, &self.ruleset.rules, &self.state, &self.manager_name);

        tracing::debug!(
            alert_id = %event.alert_id,
            decoder = event.decoder_name().unwrap_or("-"),
            rule_id = outcome.and_then(|o| self.ruleset.rules.get(o.rule)).map(|r| r.id()),
            alert,
            "event processed"
        );

        if let Some(o) = outcome.filter(|o| o.kept) {
            self.state.record(&self.ruleset.rules, o.rule, event, diags);
        }

        Ok(ProcessOutcome { output, alert })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lists::CdbLists;
    use logtest_core::protocol::EventPayload;

    const DECODERS: &str = r#"
- name: sshd
  program_name: ^sshd$

- name: sshd-failed
  parent: sshd
  prematch: ^Failed
  regex: ^Failed (\S+) for (\S+)
  order: [method, dstuser]
"#;

    const RULES: &str = r#"
- group: [syslog, sshd]
  rules:
    - id: 5700
      level: 0
      decoded_as: sshd
      description: sshd messages
    - id: 5710
      level: 2
      if_sid: [5700]
      match: Failed password
      description: "sshd: authentication failed for $(dstuser)"
    - id: 5712
      level: 10
      if_matched_sid: 5710
      frequency: 2
      timeframe: 60
      description: "sshd: repeated authentication failures"
"#;

    fn sample_session() -> AnalysisSession {
        let ruleset = Ruleset::from_yaml(DECODERS, RULES, CdbLists::new()).unwrap();
        AnalysisSession::new(ruleset, &AnalysisConfig::default(), Utc::now()).unwrap()
    }

    fn sample_request(event: &str) -> LogRequest {
        LogRequest {
            event: EventPayload::Text(event.to_owned()),
            location: "/var/log/auth.log".to_owned(),
            log_format: "syslog".to_owned(),
            token: None,
        }
    }

    const FAILED: &str = "Jul 1 12:00:00 host sshd: Failed password for root";

    #[test]
    fn low_level_match_is_not_an_alert() {
        let mut session = sample_session();
        let mut diags = Diagnostics::new();
        let outcome = session
            .process(&sample_request(FAILED), Utc::now(), &mut diags)
            .unwrap();
        assert!(!outcome.alert);
        assert_eq!(outcome.output["rule"]["id"], "5710");
        assert_eq!(outcome.output["data"]["dstuser"], "root");
        assert_eq!(outcome.output["predecoder"]["hostname"], "host");
        assert!(diags.is_empty());
    }

    #[test]
    fn second_failure_raises_alert() {
        let mut session = sample_session();
        let mut diags = Diagnostics::new();
        let now = Utc::now();
        session.process(&sample_request(FAILED), now, &mut diags).unwrap();
        let outcome = session
            .process(&sample_request(FAILED), now, &mut diags)
            .unwrap();
        assert!(outcome.alert);
        assert_eq!(outcome.output["rule"]["id"], "5712");
        assert_eq!(outcome.output["rule"]["frequency"], 2);
        assert_eq!(outcome.output["previous_output"], FAILED);
    }

    #[test]
    fn alert_ids_are_sequential() {
        let mut session = sample_session();
        let mut diags = Diagnostics::new();
        let now = Utc::now();
        let first = session.process(&sample_request("hello"), now, &mut diags).unwrap();
        let second = session.process(&sample_request("hello"), now, &mut diags).unwrap();
        let epoch = now.timestamp();
        assert_eq!(first.output["id"], format!("{epoch}.0"));
        assert_eq!(second.output["id"], format!("{epoch}.1"));
    }

    #[test]
    fn format_error_leaves_state_untouched() {
        let mut session = sample_session();
        let mut diags = Diagnostics::new();
        let mut request = sample_request("   ");
        request.location = "x".to_owned();
        let err = session.process(&request, Utc::now(), &mut diags).unwrap_err();
        assert!(matches!(err, AnalysisError::Format { .. }));
        assert_eq!(session.state().correlation().history_len(), 0);
    }

    #[test]
    fn session_without_rules_fails_processing() {
        let ruleset = Ruleset::from_yaml(DECODERS, "[]", CdbLists::new()).unwrap();
        let mut session =
            AnalysisSession::new(ruleset, &AnalysisConfig::default(), Utc::now()).unwrap();
        let mut diags = Diagnostics::new();
        let err = session
            .process(&sample_request(FAILED), Utc::now(), &mut diags)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoRules));
    }
}
