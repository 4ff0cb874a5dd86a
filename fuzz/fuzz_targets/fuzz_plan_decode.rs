#![no_main]

use geneql_core::Plan;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Limit input size to prevent timeout
    if data.len() > 1_000_000 {
        return;
    }

    // Decoding must never panic, and anything accepted must encode again
    if let Ok(plan) = Plan::decode(data) {
        assert!(plan.encode().is_ok());
    }
});
