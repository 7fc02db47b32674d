//! 요청 파싱 속성 테스트
//!
//! 어떤 입력이 와도 파싱은 패닉 없이 응답 가능한 진단을 남겨야 합니다.

use logtest_core::protocol::{Diagnostics, Request, ResponseCode, is_valid_token};
use proptest::prelude::*;

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut diags = Diagnostics::new();
        let parsed = Request::parse(&raw, &mut diags);
        // 거부된 요청은 반드시 입력 에러 이상의 코드를 남긴다
        if parsed.is_none() {
            prop_assert!(diags.code() >= ResponseCode::InputError);
            prop_assert!(!diags.is_empty());
        }
    }

    #[test]
    fn hex_tokens_of_fixed_length_are_valid(token in "[0-9a-f]{8}") {
        prop_assert!(is_valid_token(&token));
    }

    #[test]
    fn tokens_of_other_lengths_are_invalid(token in "[0-9a-f]{0,7}|[0-9a-f]{9,16}") {
        prop_assert!(!is_valid_token(&token));
    }

    #[test]
    fn well_formed_log_requests_are_accepted(
        event in "[a-zA-Z0-9 :]{1,64}",
        location in "[a-z/]{1,32}",
        log_format in "syslog|json|command",
    ) {
        let raw = serde_json::json!({
            "event": event,
            "location": location,
            "log_format": log_format,
        })
        .to_string();
        let mut diags = Diagnostics::new();
        let parsed = Request::parse(raw.as_bytes(), &mut diags);
        prop_assert!(matches!(parsed, Some(Request::Log(_))));
        prop_assert_eq!(diags.code(), ResponseCode::Success);
    }

    #[test]
    fn truncated_requests_report_a_position(cut in 1usize..60) {
        let full = r#"{"event":"Jul 1 12:00:00 host sshd: Failed password","location":"/var/log/auth.log","log_format":"syslog"}"#;
        let cut = cut.min(full.len() - 1);
        let mut diags = Diagnostics::new();
        prop_assert!(Request::parse(&full.as_bytes()[..cut], &mut diags).is_none());
        prop_assert!(diags.render().iter().any(|m| m.contains("position")));
    }
}
