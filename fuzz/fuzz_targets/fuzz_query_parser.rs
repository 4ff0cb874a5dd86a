#![no_main]

use geneql_core::{parse, Parser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to string (ignore invalid UTF-8)
    if let Ok(text) = std::str::from_utf8(data) {
        // Limit query length to prevent timeout
        if text.len() > 10_000 {
            return;
        }

        // Parsing must never panic, and whatever parses must render back
        // to text that parses to the same tree
        if let Ok(mut parser) = Parser::new(text) {
            if let Ok(query) = parser.parse() {
                let rendered = query.to_string();
                assert_eq!(parse(&rendered).ok(), Some(query), "{}", rendered);
            }
        }
    }
});
