#![no_main]
use libfuzzer_sys::fuzz_target;
use trustgate_core::types::RetryPolicy;

fuzz_target!(|data: &[u8]| {
    if data.len() < 21 {
        return;
    }
    let u64_at = |i: usize| {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[i..i + 8]);
        u64::from_le_bytes(raw)
    };
    let policy = RetryPolicy {
        max_retries: u32::from(data[16]),
        base_delay_ms: u64_at(0),
        max_delay_ms: u64_at(8),
        exponential_backoff: data[17] & 1 == 1,
    };
    let n = u32::from_le_bytes([data[17], data[18], data[19], data[20]]);

    let delay = policy.delay_for_retry(n).as_millis() as u64;
    if policy.validate().is_ok() {
        if policy.exponential_backoff {
            assert!(delay <= policy.max_delay_ms);
        } else {
            assert_eq!(delay, policy.base_delay_ms);
        }
    }
    assert!(policy.max_attempts() >= 1);
});
