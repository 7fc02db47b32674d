#![no_main]

use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use logtest_analysis::preprocess::{LOCALFILE_QUEUE, Preprocessor, build_line};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    location: String,
    message: String,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(preprocessor) = Preprocessor::new() else {
        return;
    };
    let Some(now) = Utc.timestamp_opt(1_719_835_200, 0).single() else {
        return;
    };

    // 정규화된 라인과 원시 메시지 모두 크래시 없이 Ok/Err 반환해야 함
    let line = build_line(LOCALFILE_QUEUE, &input.location, &input.message);
    let _ = preprocessor.clean_message(&line, now);
    let _ = preprocessor.clean_message(&input.message, now);
});
