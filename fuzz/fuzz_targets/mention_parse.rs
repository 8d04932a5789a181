#![no_main]

use libfuzzer_sys::fuzz_target;
use ticket_core::{parse_snowflake, Identity};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(identity) = Identity::parse_mention(&raw) {
        let id = parse_snowflake(identity.as_str()).expect("mention id is a snowflake");
        assert!(id > 0);
        assert_eq!(
            Identity::parse_mention(&identity.mention()).expect("mention round trip"),
            identity
        );
    }
});
