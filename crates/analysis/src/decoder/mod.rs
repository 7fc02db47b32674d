//! 디코더 트리 -- 원시 로그를 카테고리와 필드로 변환합니다.
//!
//! 루트 디코더는 두 목록으로 나뉩니다.
//! - 프로그램 이름 인덱스: `program_name`이 지정된 디코더
//! - 폴백: `program_name`이 없는 디코더
//!
//! 프로그램 이름이 추출된 이벤트는 인덱스 목록을 먼저, 그 다음 폴백 목록을 시도합니다.
//! 루트가 매칭되면 자식 디코더를 선언 순서대로 시도하고 첫 번째 매칭을 사용합니다.
//! 아무 디코더도 매칭되지 않는 것은 정상 결과("unclassified")입니다.

pub mod json;
pub mod loader;
pub mod types;

use std::collections::HashMap;

use regex::Regex;

use crate::error::AnalysisError;
use crate::event::{Category, DecoderMatch, Event};

pub use loader::DecoderLoader;
pub use types::{DecoderDef, DecoderPlugin};

/// 컴파일된 디코더
#[derive(Debug)]
struct CompiledDecoder {
    name: String,
    use_own_name: bool,
    program_name: Option<Regex>,
    prematch: Option<Regex>,
    regex: Option<Regex>,
    order: Vec<String>,
    category: Category,
    accumulate: bool,
    fts: Vec<String>,
    plugin: Option<DecoderPlugin>,
    children: Vec<usize>,
}

impl CompiledDecoder {
    fn compile(def: &DecoderDef, parent: Option<&CompiledDecoder>) -> Result<Self, AnalysisError> {
        let compile = |pattern: &Option<String>, what: &str| -> Result<Option<Regex>, AnalysisError> {
            pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| AnalysisError::DecoderValidation {
                    name: def.name.clone(),
                    reason: format!("invalid {what} regex: {e}"),
                })
        };

        let regex = compile(&def.regex, "regex")?;
        if let Some(re) = &regex {
            let captures = re.captures_len() - 1;
            if def.order.len() > captures {
                return Err(AnalysisError::DecoderValidation {
                    name: def.name.clone(),
                    reason: format!(
                        "'order' has {} fields but regex has {captures} capture groups",
                        def.order.len()
                    ),
                });
            }
        }

        Ok(Self {
            name: def.name.clone(),
            use_own_name: def.use_own_name,
            program_name: compile(&def.program_name, "program_name")?,
            prematch: compile(&def.prematch, "prematch")?,
            regex,
            order: def.order.clone(),
            category: def
                .category
                .or(parent.map(|p| p.category))
                .unwrap_or_default(),
            accumulate: def.accumulate || parent.is_some_and(|p| p.accumulate),
            fts: if def.fts.is_empty() {
                parent.map(|p| p.fts.clone()).unwrap_or_default()
            } else {
                def.fts.clone()
            },
            plugin: def.plugin,
            children: Vec::new(),
        })
    }

    /// 프로그램 이름과 prematch 검사
    fn gate(&self, event: &Event) -> bool {
        if let Some(re) = &self.program_name {
            match event.program_name.as_deref() {
                Some(program) if re.is_match(program) => {}
                _ => return false,
            }
        }
        self.prematch
            .as_ref()
            .is_none_or(|re| re.is_match(&event.log))
    }

    fn regex_matches(&self, event: &Event) -> bool {
        self.regex.as_ref().is_none_or(|re| re.is_match(&event.log))
    }
}

/// 세션 디코더 트리
#[derive(Debug, Default)]
pub struct DecoderTree {
    decoders: Vec<CompiledDecoder>,
    with_program: Vec<usize>,
    without_program: Vec<usize>,
}

impl DecoderTree {
    /// 디코더 정의 목록으로 트리를 만듭니다.
    ///
    /// 부모 디코더는 자식보다 먼저 정의되어야 하며, 루트 디코더여야 합니다.
    pub fn build(defs: &[DecoderDef]) -> Result<Self, AnalysisError> {
        let mut tree = Self::default();
        let mut roots_by_name: HashMap<String, usize> = HashMap::new();

        for def in defs {
            def.validate()?;

            match def.parent.as_deref() {
                None => {
                    if roots_by_name.contains_key(&def.name) {
                        return Err(AnalysisError::DecoderValidation {
                            name: def.name.clone(),
                            reason: "duplicate root decoder name".to_owned(),
                        });
                    }
                    let compiled = CompiledDecoder::compile(def, None)?;
                    let idx = tree.decoders.len();
                    if compiled.program_name.is_some() {
                        tree.with_program.push(idx);
                    } else {
                        tree.without_program.push(idx);
                    }
                    tree.decoders.push(compiled);
                    roots_by_name.insert(def.name.clone(), idx);
                }
                Some(parent_name) => {
                    let parent_idx = *roots_by_name.get(parent_name).ok_or_else(|| {
                        AnalysisError::DecoderValidation {
                            name: def.name.clone(),
                            reason: format!("parent decoder '{parent_name}' not found"),
                        }
                    })?;
                    let compiled = CompiledDecoder::compile(def, Some(&tree.decoders[parent_idx]))?;
                    let idx = tree.decoders.len();
                    tree.decoders.push(compiled);
                    tree.decoders[parent_idx].children.push(idx);
                }
            }
        }

        tracing::debug!(
            decoders = tree.decoders.len(),
            with_program = tree.with_program.len(),
            without_program = tree.without_program.len(),
            "decoder tree built"
        );

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// 이벤트를 디코딩합니다. 매칭되는 디코더가 없으면 이벤트를 그대로 둡니다.
    pub fn decode(&self, event: &mut Event) {
        let indexed: &[usize] = if event.program_name.is_some() {
            &self.with_program
        } else {
            &[]
        };

        for &root_idx in indexed.iter().chain(self.without_program.iter()) {
            let root = &self.decoders[root_idx];
            if !root.gate(event) {
                continue;
            }

            let chosen_idx = root
                .children
                .iter()
                .copied()
                .find(|&c| {
                    let child = &self.decoders[c];
                    child.gate(event) && child.regex_matches(event)
                })
                .unwrap_or(root_idx);

            self.apply(root_idx, chosen_idx, event);
            return;
        }
    }

    fn apply(&self, root_idx: usize, chosen_idx: usize, event: &mut Event) {
        let root = &self.decoders[root_idx];
        let chosen = &self.decoders[chosen_idx];

        if let Some(caps) = chosen.regex.as_ref().and_then(|re| re.captures(&event.log)) {
            let extracted: Vec<(String, String)> = chosen
                .order
                .iter()
                .enumerate()
                .filter_map(|(i, field)| {
                    caps.get(i + 1)
                        .map(|m| (field.clone(), m.as_str().to_owned()))
                })
                .collect();
            for (field, value) in extracted {
                event.set_field(field, value);
            }
        }

        if chosen.plugin == Some(DecoderPlugin::Json) {
            if let Some(fields) = json::decode(&event.log) {
                for (field, value) in fields {
                    event.set_field(field, value);
                }
            }
        }

        let is_child = chosen_idx != root_idx;
        let name = if is_child && !chosen.use_own_name {
            root.name.clone()
        } else {
            chosen.name.clone()
        };

        event.decoder = Some(DecoderMatch {
            name,
            parent: is_child.then(|| root.name.clone()),
            category: chosen.category,
            accumulate: chosen.accumulate,
            fts: chosen.fts.clone(),
        });
    }
}
