#![no_main]

use libfuzzer_sys::fuzz_target;

use logtest_core::protocol::{Diagnostics, Request, Response};

fuzz_target!(|data: &[u8]| {
    let mut diags = Diagnostics::new();
    let parsed = Request::parse(data, &mut diags);

    // 거부된 요청은 반드시 에러 코드를 남겨야 함
    if parsed.is_none() {
        assert!(diags.code().is_error());
    }

    // 진단 메시지만 담은 응답은 항상 직렬화 가능해야 함
    let response = Response::from_diagnostics(&diags);
    let bytes = response.to_bytes().expect("response encodes");
    let _ = Response::from_slice(&bytes).expect("response decodes");
});
