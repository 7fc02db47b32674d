//! 룰 엔진 -- 룰 트리 구성과 매칭 드라이버
//!
//! # 트리 구성
//! - `if_sid`/`if_group`이 없는 룰은 루트입니다. 루트는 선언 순서대로 평가됩니다.
//! - `if_matched_sid`/`if_matched_group`은 `if_sid`/`if_group`이 없으면 부모 관계도 겸합니다.
//! - 자식은 선언 순서대로 부모에 붙고, 순환 참조는 트리 생성 시 거부됩니다.
//!
//! # 매칭
//! 카테고리가 이벤트와 같은 루트부터 조건을 평가하고, 매칭되면 자식을 먼저 시도합니다.
//! 가장 깊이 매칭된 룰이 결과이며, 첫 번째로 매칭된 루트에서 평가를 멈춥니다.
//!
//! 매칭된 룰은 다음 순서로 보관 여부가 결정됩니다.
//! 1. 레벨 0이면 보관하지 않음
//! 2. `ignore` 창 안에서 다시 매칭되면 억제 (창은 다시 열리지 않음)
//! 3. `ignore_fields` 값 조합이 이미 보관된 적이 있으면 억제
//!
//! 보관된 이벤트만 [`RuleState::record`]로 세션 히스토리와 상관관계 리스트에 들어갑니다.

pub mod loader;
pub mod matcher;
pub mod types;

pub use loader::RuleLoader;
pub use matcher::{MatchPattern, RuleMatcher};
pub use types::{ListCheckDef, RuleDef, RuleGroupDef};

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use logtest_core::protocol::Diagnostics;

use crate::correlation::{CorrelationState, ListKey};
use crate::error::AnalysisError;
use crate::event::{Category, Event};
use crate::fts::{SeenSet, fts_key};
use crate::lists::CdbLists;

/// 빈도 룰의 기본 발생 횟수 (현재 이벤트 포함)
pub const DEFAULT_FREQUENCY: u32 = 2;

/// 보관된 이벤트를 연결할 상관관계 리스트
#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordTarget {
    None,
    Sid(ListKey),
    Groups(Vec<ListKey>),
}

/// 컴파일된 룰
#[derive(Debug)]
pub struct CompiledRule {
    id: u32,
    level: u8,
    description: String,
    category: Category,
    groups: Vec<String>,
    matcher: RuleMatcher,
    matched_key: Option<ListKey>,
    frequency: Option<u32>,
    timeframe: Duration,
    same_fields: Vec<String>,
    different_fields: Vec<String>,
    ignore: Option<Duration>,
    ignore_fields: Vec<String>,
    if_fts: bool,
    children: Vec<usize>,
    record_to: RecordTarget,
}

impl CompiledRule {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// 상관관계 룰이면 설정된 발생 횟수
    pub fn frequency(&self) -> Option<u32> {
        self.matched_key
            .as_ref()
            .map(|_| self.frequency.unwrap_or(DEFAULT_FREQUENCY))
    }

    /// `$(field)`를 이벤트 필드 값으로 치환한 설명
    ///
    /// 이벤트에 없는 필드는 치환하지 않고 그대로 둡니다.
    pub fn render_description(&self, event: &Event) -> String {
        let mut out = String::with_capacity(self.description.len());
        let mut rest = self.description.as_str();
        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find(')') {
                Some(end) => {
                    let name = &after[..end];
                    match event.field(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 1]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// 룰 매칭 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// 매칭된 룰 인덱스
    pub rule: usize,
    /// 억제되지 않아 세션 상태에 보관해야 하는지 여부
    pub kept: bool,
}

#[derive(Debug)]
struct RuleHit {
    rule: usize,
    previous: Vec<String>,
}

/// 세션 룰 트리 (생성 후 불변)
#[derive(Debug, Default)]
pub struct RuleTree {
    rules: Vec<CompiledRule>,
    roots: Vec<usize>,
    list_keys: Vec<ListKey>,
}

impl RuleTree {
    /// 룰 그룹 블록으로 트리를 만듭니다.
    pub fn build(blocks: &[RuleGroupDef]) -> Result<Self, AnalysisError> {
        let defs: Vec<(RuleDef, Vec<String>)> = blocks
            .iter()
            .flat_map(|block| {
                block.rules.iter().map(move |rule| {
                    let mut groups = block.group.clone();
                    for g in &rule.groups {
                        if !groups.contains(g) {
                            groups.push(g.clone());
                        }
                    }
                    (rule.clone(), groups)
                })
            })
            .collect();

        let mut by_id: HashMap<u32, usize> = HashMap::with_capacity(defs.len());
        for (idx, (def, _)) in defs.iter().enumerate() {
            def.validate()?;
            if by_id.insert(def.id, idx).is_some() {
                return Err(AnalysisError::RuleValidation {
                    rule_id: def.id,
                    reason: "duplicate rule id".to_owned(),
                });
            }
        }

        let mut rules = Vec::with_capacity(defs.len());
        for (def, groups) in &defs {
            rules.push(CompiledRule {
                id: def.id,
                level: def.level,
                description: def.description.clone(),
                category: def.category.unwrap_or_default(),
                groups: groups.clone(),
                matcher: RuleMatcher::compile(def)?,
                matched_key: def
                    .if_matched_sid
                    .map(ListKey::Sid)
                    .or_else(|| def.if_matched_group.clone().map(ListKey::Group)),
                frequency: def.frequency,
                timeframe: Duration::seconds(def.timeframe.unwrap_or(0) as i64),
                same_fields: def.same_fields.clone(),
                different_fields: def.different_fields.clone(),
                ignore: def.ignore.map(|s| Duration::seconds(s as i64)),
                ignore_fields: def.ignore_fields.clone(),
                if_fts: def.if_fts,
                children: Vec::new(),
                record_to: RecordTarget::None,
            });
        }

        let mut roots = Vec::new();
        for (idx, (def, _)) in defs.iter().enumerate() {
            let parents = Self::resolve_parents(def, idx, &by_id, &rules)?;
            if parents.is_empty() {
                roots.push(idx);
            }
            for parent in parents {
                rules[parent].children.push(idx);
            }
        }

        Self::check_cycles(&rules)?;

        // 상관관계 리스트 키와 보관 대상
        let mut list_keys: Vec<ListKey> = Vec::new();
        for (def, _) in &defs {
            if let Some(sid) = def.if_matched_sid {
                if !by_id.contains_key(&sid) {
                    return Err(AnalysisError::RuleValidation {
                        rule_id: def.id,
                        reason: format!("if_matched_sid references unknown rule {sid}"),
                    });
                }
            }
            if let Some(key) = def
                .if_matched_sid
                .map(ListKey::Sid)
                .or_else(|| def.if_matched_group.clone().map(ListKey::Group))
            {
                if !list_keys.contains(&key) {
                    list_keys.push(key);
                }
            }
        }

        for rule in &mut rules {
            let sid_key = ListKey::Sid(rule.id);
            rule.record_to = if list_keys.contains(&sid_key) {
                RecordTarget::Sid(sid_key)
            } else {
                let groups: Vec<ListKey> = rule
                    .groups
                    .iter()
                    .map(|g| ListKey::Group(g.clone()))
                    .filter(|k| list_keys.contains(k))
                    .collect();
                if groups.is_empty() {
                    RecordTarget::None
                } else {
                    RecordTarget::Groups(groups)
                }
            };
        }

        tracing::debug!(
            rules = rules.len(),
            roots = roots.len(),
            correlation_lists = list_keys.len(),
            "rule tree built"
        );

        Ok(Self {
            rules,
            roots,
            list_keys,
        })
    }

    fn resolve_parents(
        def: &RuleDef,
        idx: usize,
        by_id: &HashMap<u32, usize>,
        rules: &[CompiledRule],
    ) -> Result<Vec<usize>, AnalysisError> {
        let mut if_sid = def.if_sid.clone();
        let mut if_group = def.if_group.clone();
        if if_sid.is_empty() && if_group.is_empty() {
            if_sid.extend(def.if_matched_sid);
            if_group.extend(def.if_matched_group.clone());
        }

        let mut parents = Vec::new();
        for sid in if_sid {
            let parent = *by_id.get(&sid).ok_or_else(|| AnalysisError::RuleValidation {
                rule_id: def.id,
                reason: format!("if_sid references unknown rule {sid}"),
            })?;
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        for group in if_group {
            let before = parents.len();
            for (candidate, rule) in rules.iter().enumerate() {
                if candidate != idx && rule.groups.contains(&group) && !parents.contains(&candidate)
                {
                    parents.push(candidate);
                }
            }
            if parents.len() == before && !rules.iter().any(|r| r.groups.contains(&group)) {
                return Err(AnalysisError::RuleValidation {
                    rule_id: def.id,
                    reason: format!("if_group references unknown group '{group}'"),
                });
            }
        }
        Ok(parents)
    }

    fn check_cycles(rules: &[CompiledRule]) -> Result<(), AnalysisError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(idx: usize, rules: &[CompiledRule], marks: &mut [Mark]) -> Result<(), u32> {
            match marks[idx] {
                Mark::Done => return Ok(()),
                Mark::Active => return Err(rules[idx].id),
                Mark::New => {}
            }
            marks[idx] = Mark::Active;
            for &child in &rules[idx].children {
                visit(child, rules, marks)?;
            }
            marks[idx] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; rules.len()];
        for idx in 0..rules.len() {
            visit(idx, rules, &mut marks).map_err(|rule_id| AnalysisError::RuleValidation {
                rule_id,
                reason: "circular rule dependency".to_owned(),
            })?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&CompiledRule> {
        self.rules.get(idx)
    }

    /// 룰 ID로 인덱스를 찾습니다.
    pub fn position(&self, id: u32) -> Option<usize> {
        self.rules.iter().position(|r| r.id == id)
    }

    /// 상관관계 리스트 키
    pub fn list_keys(&self) -> &[ListKey] {
        &self.list_keys
    }

    /// 룰이 참조하는 CDB 리스트 이름
    pub fn referenced_lists(&self) -> HashSet<&str> {
        self.rules.iter().flat_map(|r| r.matcher.list_names()).collect()
    }

    /// 이벤트를 룰 트리에 매칭합니다.
    ///
    /// 매칭되면 `generated_rule`, `previous_output`이 기록되고 룰의 발생 횟수가 증가합니다.
    pub fn evaluate(
        &self,
        event: &mut Event,
        state: &mut RuleState,
        lists: &CdbLists,
    ) -> Result<Option<MatchOutcome>, AnalysisError> {
        if self.rules.is_empty() {
            return Err(AnalysisError::NoRules);
        }

        let category = event.category();
        // 내부 알림 이벤트는 매칭하지 않음
        if category == Category::Ossec {
            return Ok(None);
        }

        for &root in &self.roots {
            if self.rules[root].category != category {
                continue;
            }
            let Some(hit) = self.check(root, event, &state.correlation, &mut state.fts_seen, lists)
            else {
                continue;
            };

            state.firedtimes[hit.rule] += 1;
            event.generated_rule = Some(hit.rule);
            event.previous_output = hit.previous;
            let kept = self.admit(hit.rule, event, state);

            tracing::debug!(
                rule_id = self.rules[hit.rule].id,
                level = self.rules[hit.rule].level,
                kept,
                "rule matched"
            );
            return Ok(Some(MatchOutcome {
                rule: hit.rule,
                kept,
            }));
        }

        Ok(None)
    }

    fn check(
        &self,
        idx: usize,
        event: &Event,
        correlation: &CorrelationState,
        fts_seen: &mut SeenSet,
        lists: &CdbLists,
    ) -> Option<RuleHit> {
        let rule = &self.rules[idx];
        if !rule.matcher.matches(event, lists) {
            return None;
        }

        let previous = match &rule.matched_key {
            Some(key) => self.correlate(rule, key, event, correlation)?,
            None => Vec::new(),
        };

        if rule.if_fts && !Self::first_time_seen(event, fts_seen) {
            return None;
        }

        for &child in &rule.children {
            if let Some(hit) = self.check(child, event, correlation, fts_seen, lists) {
                return Some(hit);
            }
        }

        Some(RuleHit {
            rule: idx,
            previous,
        })
    }

    /// 상관관계 리스트에서 시간 창 안의 이전 이벤트를 찾습니다.
    fn correlate(
        &self,
        rule: &CompiledRule,
        key: &ListKey,
        event: &Event,
        correlation: &CorrelationState,
    ) -> Option<Vec<String>> {
        let needed = rule.frequency.unwrap_or(DEFAULT_FREQUENCY).saturating_sub(1) as usize;
        let mut previous = Vec::new();

        for prev in correlation.recent(key) {
            if event.generate_time - prev.generate_time > rule.timeframe {
                break;
            }
            let same = rule
                .same_fields
                .iter()
                .all(|f| matches!((event.field(f), prev.field(f)), (Some(a), Some(b)) if a == b));
            let different = rule
                .different_fields
                .iter()
                .all(|f| matches!((event.field(f), prev.field(f)), (Some(a), b) if Some(a) != b));
            if !same || !different {
                continue;
            }
            previous.push(prev.full_log.clone());
            if previous.len() >= needed {
                return Some(previous);
            }
        }
        None
    }

    fn first_time_seen(event: &Event, fts_seen: &mut SeenSet) -> bool {
        let Some(decoder) = &event.decoder else {
            return false;
        };
        if decoder.fts.is_empty() {
            return false;
        }
        match fts_key(&decoder.name, &decoder.fts, |f| event.field(f)) {
            Some(key) => fts_seen.insert_if_new(&key),
            None => false,
        }
    }

    /// 매칭된 룰의 보관 여부를 결정합니다.
    fn admit(&self, idx: usize, event: &Event, state: &mut RuleState) -> bool {
        let rule = &self.rules[idx];
        if rule.level == 0 {
            return false;
        }

        if let Some(window) = rule.ignore {
            let now = event.generate_time;
            match state.time_ignored[idx] {
                None => state.time_ignored[idx] = Some(now),
                Some(since) if now - since < window => return false,
                Some(_) => state.time_ignored[idx] = None,
            }
        }

        if !rule.ignore_fields.is_empty() {
            let scope = rule.id.to_string();
            if let Some(key) = fts_key(&scope, &rule.ignore_fields, |f| event.field(f)) {
                if !state.ignore_seen.insert_if_new(&key) {
                    return false;
                }
            }
        }

        true
    }
}

/// 세션별 룰 런타임 상태
#[derive(Debug)]
pub struct RuleState {
    firedtimes: Vec<u64>,
    time_ignored: Vec<Option<DateTime<Utc>>>,
    ignore_seen: SeenSet,
    fts_seen: SeenSet,
    correlation: CorrelationState,
}

impl RuleState {
    pub fn new(tree: &RuleTree, history_size: usize, list_size: usize, fts_size: usize) -> Self {
        Self {
            firedtimes: vec![0; tree.len()],
            time_ignored: vec![None; tree.len()],
            ignore_seen: SeenSet::new(history_size),
            fts_seen: SeenSet::new(fts_size),
            correlation: CorrelationState::new(
                history_size,
                list_size,
                tree.list_keys().iter().cloned(),
            ),
        }
    }

    /// 룰이 지금까지 매칭된 횟수
    pub fn firedtimes(&self, rule: usize) -> u64 {
        self.firedtimes.get(rule).copied().unwrap_or(0)
    }

    pub fn correlation(&self) -> &CorrelationState {
        &self.correlation
    }

    /// 보관된 이벤트를 히스토리와 상관관계 리스트에 기록합니다.
    ///
    /// 리스트 연결 실패는 진단 메시지로 남기고 요청은 계속 처리합니다.
    pub fn record(&mut self, tree: &RuleTree, rule: usize, event: Event, diags: &mut Diagnostics) {
        let Some(compiled) = tree.get(rule) else {
            return;
        };
        let id = self.correlation.push_history(event);

        match &compiled.record_to {
            RecordTarget::None => {}
            RecordTarget::Sid(key) => {
                if let Err(e) = self.correlation.link(id, key) {
                    tracing::warn!(rule_id = compiled.id, error = %e, "failed to link event");
                    diags.error("Unable to add data to sig list.");
                }
            }
            RecordTarget::Groups(keys) => {
                for key in keys {
                    if let Err(e) = self.correlation.link(id, key) {
                        tracing::warn!(rule_id = compiled.id, error = %e, "failed to link event");
                        diags.error("Unable to add data to grp list.");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DecoderMatch;

    fn build(yaml: &str) -> RuleTree {
        let blocks: Vec<RuleGroupDef> = serde_yaml::from_str(yaml).unwrap();
        RuleTree::build(&blocks).unwrap()
    }

    fn build_err(yaml: &str) -> String {
        let blocks: Vec<RuleGroupDef> = serde_yaml::from_str(yaml).unwrap();
        RuleTree::build(&blocks).unwrap_err().to_string()
    }

    fn state_for(tree: &RuleTree) -> RuleState {
        RuleState::new(tree, 16, 8, 16)
    }

    fn sample_event(log: &str, at: DateTime<Utc>) -> Event {
        let mut event = Event::new("/var/log/auth.log".to_owned(), log.to_owned(), at);
        event.program_name = Some("sshd".to_owned());
        event.decoder = Some(DecoderMatch {
            name: "sshd".to_owned(),
            parent: None,
            category: Category::Syslog,
            accumulate: false,
            fts: vec!["srcip".to_owned()],
        });
        event
    }

    fn with_field(mut event: Event, name: &str, value: &str) -> Event {
        event.set_field(name, value);
        event
    }

    /// 매칭 후 보관되면 기록까지 수행하고 매칭된 룰 ID를 반환
    fn run(tree: &RuleTree, state: &mut RuleState, mut event: Event) -> Option<(u32, bool)> {
        let outcome = tree
            .evaluate(&mut event, state, &CdbLists::new())
            .unwrap()?;
        if outcome.kept {
            let mut diags = Diagnostics::new();
            state.record(tree, outcome.rule, event, &mut diags);
            assert!(diags.is_empty());
        }
        Some((tree.get(outcome.rule).unwrap().id(), outcome.kept))
    }

    const SSHD_RULES: &str = r#"
- group: [syslog, sshd]
  rules:
    - id: 100
      level: 0
      decoded_as: sshd
      description: sshd messages
    - id: 101
      level: 5
      if_sid: [100]
      match: Failed password
      description: "authentication failed for $(dstuser)"
      groups: [authentication_failed]
    - id: 102
      level: 10
      if_matched_sid: 101
      frequency: 2
      timeframe: 60
      description: brute force
"#;

    #[test]
    fn empty_tree_reports_no_rules() {
        let tree = RuleTree::default();
        let mut state = state_for(&tree);
        let mut event = sample_event("x", Utc::now());
        let err = tree.evaluate(&mut event, &mut state, &CdbLists::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::NoRules));
    }

    #[test]
    fn deepest_matching_child_wins() {
        let tree = build(SSHD_RULES);
        let mut state = state_for(&tree);
        let now = Utc::now();
        let result = run(&tree, &mut state, sample_event("Failed password for root", now));
        assert_eq!(result, Some((101, true)));
    }

    #[test]
    fn level_zero_parent_is_not_kept() {
        let tree = build(SSHD_RULES);
        let mut state = state_for(&tree);
        let result = run(&tree, &mut state, sample_event("Connection closed", Utc::now()));
        assert_eq!(result, Some((100, false)));
        assert_eq!(state.correlation().history_len(), 0);
    }

    #[test]
    fn second_occurrence_fires_frequency_rule() {
        let tree = build(SSHD_RULES);
        let mut state = state_for(&tree);
        let now = Utc::now();

        let first = run(&tree, &mut state, sample_event("Failed password for root", now));
        assert_eq!(first, Some((101, true)));

        let mut second = sample_event("Failed password for root", now + Duration::seconds(5));
        let outcome = tree
            .evaluate(&mut second, &mut state, &CdbLists::new())
            .unwrap()
            .unwrap();
        assert_eq!(tree.get(outcome.rule).unwrap().id(), 102);
        assert_eq!(second.previous_output, vec!["Failed password for root"]);
        assert_eq!(tree.get(outcome.rule).unwrap().frequency(), Some(2));
    }

    #[test]
    fn frequency_rule_ignores_events_outside_timeframe() {
        let tree = build(SSHD_RULES);
        let mut state = state_for(&tree);
        let now = Utc::now();

        run(&tree, &mut state, sample_event("Failed password for root", now));
        let later = now + Duration::seconds(61);
        let result = run(&tree, &mut state, sample_event("Failed password for root", later));
        assert_eq!(result, Some((101, true)));
    }

    #[test]
    fn same_fields_must_match_previous_event() {
        let yaml = r#"
- group: [sshd]
  rules:
    - id: 1
      level: 3
      description: failure
    - id: 2
      level: 10
      if_matched_sid: 1
      timeframe: 60
      same_fields: [srcip]
      description: repeated failure from $(srcip)
"#;
        let tree = build(yaml);
        let mut state = state_for(&tree);
        let now = Utc::now();

        run(&tree, &mut state, with_field(sample_event("a", now), "srcip", "10.0.0.1"));
        let other = run(&tree, &mut state, with_field(sample_event("b", now), "srcip", "10.0.0.2"));
        assert_eq!(other, Some((1, true)));

        let mut again = with_field(sample_event("c", now), "srcip", "10.0.0.1");
        let outcome = tree
            .evaluate(&mut again, &mut state, &CdbLists::new())
            .unwrap()
            .unwrap();
        let rule = tree.get(outcome.rule).unwrap();
        assert_eq!(rule.id(), 2);
        assert_eq!(rule.render_description(&again), "repeated failure from 10.0.0.1");
    }

    #[test]
    fn different_fields_require_new_value() {
        let yaml = r#"
- rules:
    - id: 1
      level: 3
      description: login
    - id: 2
      level: 8
      if_matched_sid: 1
      timeframe: 60
      different_fields: [user]
      description: multiple users
"#;
        let tree = build(yaml);
        let mut state = state_for(&tree);
        let now = Utc::now();

        run(&tree, &mut state, with_field(sample_event("a", now), "user", "alice"));
        let same = run(&tree, &mut state, with_field(sample_event("b", now), "user", "alice"));
        assert_eq!(same, Some((1, true)));
        let new = run(&tree, &mut state, with_field(sample_event("c", now), "user", "bob"));
        assert_eq!(new, Some((2, true)));
    }

    #[test]
    fn group_correlation_links_member_rules() {
        let yaml = r#"
- group: [auth]
  rules:
    - id: 10
      level: 3
      match: denied
      description: access denied
- rules:
    - id: 20
      level: 12
      if_matched_group: auth
      frequency: 3
      timeframe: 120
      description: repeated denials
"#;
        let tree = build(yaml);
        assert_eq!(tree.list_keys(), &[ListKey::Group("auth".to_owned())]);
        let mut state = state_for(&tree);
        let now = Utc::now();

        assert_eq!(run(&tree, &mut state, sample_event("denied", now)), Some((10, true)));
        assert_eq!(run(&tree, &mut state, sample_event("denied", now)), Some((10, true)));
        assert_eq!(run(&tree, &mut state, sample_event("denied", now)), Some((20, true)));
    }

    #[test]
    fn ignore_window_suppresses_without_rearming() {
        let yaml = r#"
- rules:
    - id: 1
      level: 5
      ignore: 60
      description: noisy
"#;
        let tree = build(yaml);
        let mut state = state_for(&tree);
        let now = Utc::now();

        assert_eq!(run(&tree, &mut state, sample_event("x", now)), Some((1, true)));
        let within = now + Duration::seconds(30);
        assert_eq!(run(&tree, &mut state, sample_event("x", within)), Some((1, false)));
        let after = now + Duration::seconds(61);
        assert_eq!(run(&tree, &mut state, sample_event("x", after)), Some((1, true)));
        // 창이 닫힌 뒤 다음 매칭이 창을 다시 연다
        let next = after + Duration::seconds(1);
        assert_eq!(run(&tree, &mut state, sample_event("x", next)), Some((1, true)));
        assert_eq!(
            run(&tree, &mut state, sample_event("x", next + Duration::seconds(1))),
            Some((1, false))
        );
        assert_eq!(state.firedtimes(0), 5);
    }

    #[test]
    fn ignore_fields_suppress_duplicate_values() {
        let yaml = r#"
- rules:
    - id: 1
      level: 5
      ignore_fields: [srcip]
      description: once per source
"#;
        let tree = build(yaml);
        let mut state = state_for(&tree);
        let now = Utc::now();

        let a = with_field(sample_event("x", now), "srcip", "10.0.0.1");
        assert_eq!(run(&tree, &mut state, a.clone()), Some((1, true)));
        assert_eq!(run(&tree, &mut state, a), Some((1, false)));
        let b = with_field(sample_event("x", now), "srcip", "10.0.0.2");
        assert_eq!(run(&tree, &mut state, b), Some((1, true)));
    }

    #[test]
    fn if_fts_matches_only_first_time() {
        let yaml = r#"
- rules:
    - id: 1
      level: 2
      description: any
    - id: 2
      level: 7
      if_sid: [1]
      if_fts: true
      description: first time seen source
"#;
        let tree = build(yaml);
        let mut state = state_for(&tree);
        let now = Utc::now();

        let event = with_field(sample_event("x", now), "srcip", "10.0.0.1");
        assert_eq!(run(&tree, &mut state, event.clone()), Some((2, true)));
        assert_eq!(run(&tree, &mut state, event), Some((1, true)));
    }

    #[test]
    fn root_category_must_match_event() {
        let yaml = r#"
- rules:
    - id: 1
      level: 5
      category: firewall
      description: firewall drop
"#;
        let tree = build(yaml);
        let mut state = state_for(&tree);
        assert_eq!(run(&tree, &mut state, sample_event("drop", Utc::now())), None);
    }

    #[test]
    fn if_group_attaches_to_every_member() {
        let yaml = r#"
- group: [web]
  rules:
    - id: 1
      level: 2
      match: GET
      description: get
    - id: 2
      level: 2
      match: POST
      description: post
- rules:
    - id: 3
      level: 6
      if_group: [web]
      match: /admin
      description: admin access
"#;
        let tree = build(yaml);
        let mut state = state_for(&tree);
        let now = Utc::now();
        assert_eq!(run(&tree, &mut state, sample_event("POST /admin", now)), Some((3, true)));
        assert_eq!(run(&tree, &mut state, sample_event("POST /login", now)), Some((2, true)));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let err = build_err(
            "- rules:\n    - {id: 1, level: 1, description: a}\n    - {id: 1, level: 1, description: b}\n",
        );
        assert!(err.contains("duplicate rule id"));
    }

    #[test]
    fn unknown_if_sid_is_rejected() {
        let err = build_err("- rules:\n    - {id: 2, level: 1, description: a, if_sid: [9]}\n");
        assert!(err.contains("unknown rule 9"));
    }

    #[test]
    fn cycle_is_rejected() {
        let err = build_err(
            "- rules:\n    - {id: 1, level: 1, description: a, if_sid: [2]}\n    - {id: 2, level: 1, description: b, if_sid: [1]}\n",
        );
        assert!(err.contains("circular"));
    }

    #[test]
    fn description_keeps_unknown_placeholders() {
        let tree = build("- rules:\n    - {id: 1, level: 1, description: 'user $(user) from $(srcip)'}\n");
        let event = with_field(sample_event("x", Utc::now()), "user", "root");
        let rule = tree.get(0).unwrap();
        assert_eq!(rule.render_description(&event), "user root from $(srcip)");
    }
}
