#![no_main]

use libfuzzer_sys::fuzz_target;
use srcdb::parser::{extract_tokens, terms_from_tokens};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must either tokenize or fail cleanly
    if let Ok(tokens) = extract_tokens(data) {
        let mut prev_end = 0;
        for token in &tokens {
            assert!(token.span.from <= token.span.to);
            assert!(token.span.from >= prev_end);
            assert!(token.span.to as usize <= data.len());
            prev_end = token.span.to;
        }
        let terms = terms_from_tokens(data, &tokens);
        assert!(terms.iter().all(|t| !t.is_error()));
    }
});
