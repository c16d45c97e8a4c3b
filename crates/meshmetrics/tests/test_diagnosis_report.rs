//! The report printed by `meshmetrics-check`.

use meshmetrics::{diagnose, BackendPreference, BackendResolver, EngineKind, ResolverConfig};
use pretty_assertions::assert_eq;

fn cpu_resolver() -> BackendResolver {
    BackendResolver::new(
        ResolverConfig::builder()
            .preference(BackendPreference::Cpu)
            .build(),
    )
}

#[test]
fn test_text_report_starts_with_engine_name() {
    let diagnosis = diagnose(&cpu_resolver());
    let report = diagnosis.to_string();

    assert_eq!(report.lines().next(), Some("cpu"));
    assert!(report.contains("preference: cpu"));
    assert_eq!(diagnosis.kind(), Some(EngineKind::Cpu));
}

#[cfg(feature = "serde")]
#[test]
fn test_json_report() {
    let diagnosis = diagnose(&cpu_resolver());
    let json: serde_json::Value = serde_json::to_value(&diagnosis).unwrap();

    assert_eq!(json["engine"], "cpu");
    assert_eq!(json["resolution"]["kind"], "cpu");
    assert_eq!(json["resolution"]["reason"], "cpu_requested");
    assert_eq!(json["config"]["preference"], "cpu");
    assert_eq!(json["error"], serde_json::Value::Null);
}

#[test]
fn test_diagnosis_does_not_bind_the_handle() {
    let _ = diagnose(&BackendResolver::default());
    assert!(meshmetrics::resolved().is_none());
}
