#![no_main]
use libfuzzer_sys::fuzz_target;
use trustgate_core::types::{AutomationLevel, GateDecision, HealthSnapshot, HealthStatus};
use trustgate_engine::gates::TrustGate;
use trustgate_engine::health::HealthClassifier;

fuzz_target!(|data: &[u8]| {
    if data.len() < 9 {
        return;
    }
    let (head, rest) = data.split_at(8);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(head);
    let score = f64::from_le_bytes(raw);
    let issue = String::from_utf8_lossy(&rest[1..]).into_owned();

    let classifier = HealthClassifier::with_critical_markers(["outage"]);
    let assessment = classifier.assess(&HealthSnapshot::new(Some(score), vec![issue]));
    if let Some(s) = assessment.score {
        assert!((0.0..=100.0).contains(&s));
    }

    let level = AutomationLevel::ALL[rest[0] as usize % AutomationLevel::ALL.len()];
    let decision = TrustGate::default().evaluate_assessment(&assessment, level);
    if !level.is_gated() {
        assert_eq!(decision, GateDecision::Pass);
    }
    if level.is_gated() && assessment.status == HealthStatus::Unknown {
        assert_eq!(decision, GateDecision::Block);
    }
});
