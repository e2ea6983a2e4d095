//! Fuzz test for cache key derivation
//!
//! Splits the input into basis, salt and tags and checks that derivation
//! is deterministic and the key keeps its shape for any input.
//!
//! Run with: cargo +nightly fuzz run cache_key_fuzz -- -max_total_time=60

#![no_main]

use cachet_core::EntityDescriptor;
use cachet_storage::CacheKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let mut parts = input.split('\0');
    let basis = parts.next().unwrap_or_default();
    let salt = parts.next().unwrap_or_default();
    let tags: Vec<&str> = parts.collect();

    let entity = EntityDescriptor::parse("App::Models::Order").expect("static path is valid");
    let key = CacheKey::derive(&entity, basis, tags.as_slice(), salt);
    let again = CacheKey::derive(&entity, basis, tags.as_slice(), salt);

    assert_eq!(key, again, "derivation must be deterministic");
    assert!(key.as_str().starts_with("_Order_"));
    assert_eq!(key.digest().len(), 64);
    assert!(key.tags().iter().all(|t| !t.is_empty()));
});
