//! Fuzz test for entity path parsing
//!
//! Arbitrary text must parse or fail with a configuration error, never
//! panic. Accepted paths must be stable under re-parsing.
//!
//! Run with: cargo +nightly fuzz run entity_path_fuzz -- -max_total_time=60

#![no_main]

use cachet_core::{CachetError, EntityDescriptor};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        match EntityDescriptor::parse(input) {
            Ok(entity) => {
                assert!(!entity.basename().is_empty(), "basename should not be empty");
                let again = EntityDescriptor::parse(entity.path()).expect("normalised path re-parses");
                assert_eq!(again, entity);
            }
            Err(err) => {
                assert!(matches!(err, CachetError::Config(_)), "unexpected error kind: {err:?}");
            }
        }
    }
});
