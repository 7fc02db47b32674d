#![no_main]

use libfuzzer_sys::fuzz_target;

use logtest_analysis::{DecoderLoader, DecoderTree, RuleLoader, RuleTree};

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    let Ok(yaml_str) = std::str::from_utf8(data) else {
        return;
    };

    // 로딩에 성공한 정의는 트리 구성까지 크래시 없이 진행되어야 함
    if let Ok(blocks) = RuleLoader::parse_yaml(yaml_str, "fuzz-input.yml") {
        let _ = RuleTree::build(&blocks);
    }
    if let Ok(defs) = DecoderLoader::parse_yaml(yaml_str, "fuzz-input.yml") {
        let _ = DecoderTree::build(&defs);
    }
});
