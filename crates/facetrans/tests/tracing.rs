use facetrans::{
    ConfigError, DesugarOptions, RecordingTracer, Rule, StatsTracer, SymbolKind, TraceEvent, UnsupportedConstruct,
    desugar_source_traced,
};
use pretty_assertions::assert_eq;

const PICK: &str = "\
@jeeves
def pick(a, b):
    if a:
        r = b
    return r
";

#[test]
fn recording_tracer_sees_every_decision_in_order() {
    let mut tracer = RecordingTracer::new();
    desugar_source_traced(PICK, &DesugarOptions::default(), &mut tracer).unwrap();

    let events = tracer.events();
    assert_eq!(
        events[0],
        TraceEvent::UnitStart {
            unit: "pick".to_owned()
        }
    );
    assert_eq!(
        events[1],
        TraceEvent::Scope {
            function: "pick".to_owned(),
            params: vec!["a".to_owned(), "b".to_owned()],
            locals: vec!["r".to_owned()],
        }
    );
    assert_eq!(
        events.last(),
        Some(&TraceEvent::UnitEnd {
            unit: "pick".to_owned(),
            symbols: 3
        })
    );

    let fresh: Vec<(&str, SymbolKind)> = events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::FreshSymbol { name, kind } => Some((name.as_str(), *kind)),
            _ => None,
        })
        .collect();
    assert_eq!(
        fresh,
        [
            ("_jv_ns0", SymbolKind::Namespace),
            ("_jv_then1", SymbolKind::Then),
            ("_jv_else2", SymbolKind::Else),
        ]
    );

    let rules: Vec<Rule> = tracer.rules().collect();
    assert_eq!(
        rules,
        [
            Rule::Namespace,
            Rule::ConditionalExec,
            Rule::NameIndirection,
            Rule::NameIndirection,
            Rule::NameIndirection,
            Rule::Assign,
            Rule::NameIndirection,
        ]
    );
}

#[test]
fn rejection_is_the_last_event() {
    let mut tracer = RecordingTracer::new();
    let code = "@jeeves\ndef f(a):\n    if a:\n        return 1\n";
    let err = desugar_source_traced(code, &DesugarOptions::default(), &mut tracer).unwrap_err();
    assert_eq!(
        tracer.events().last(),
        Some(&TraceEvent::Rejected {
            construct: UnsupportedConstruct::ControlTransferInBranch,
            position: err.position(),
        })
    );
}

#[test]
fn recording_limit_caps_events() {
    let mut tracer = RecordingTracer::with_limit(2);
    desugar_source_traced(PICK, &DesugarOptions::default(), &mut tracer).unwrap();
    assert_eq!(tracer.events().len(), 2);
}

#[test]
fn stats_tracer_counts_rules() {
    let mut tracer = StatsTracer::new();
    desugar_source_traced(PICK, &DesugarOptions::default(), &mut tracer).unwrap();
    assert_eq!(tracer.count(Rule::NameIndirection), 4);
    assert_eq!(tracer.count(Rule::MapOver), 0);

    let report = tracer.report();
    assert_eq!(report.units, 1);
    assert_eq!(report.scopes, 1);
    assert_eq!(report.symbols, 3);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.rule_counts[0], (Rule::NameIndirection, 4));
    assert!(report.to_string().contains("name_indirection"));
}

#[test]
fn options_from_partial_json_keep_defaults() {
    let options = DesugarOptions::from_json(r#"{"runtime": {"assign": "set"}, "emit_import": true}"#).unwrap();
    assert_eq!(options.runtime.assign, "set");
    assert_eq!(options.runtime.module, "JeevesLib");
    assert_eq!(options.marker.as_deref(), Some("jeeves"));
    assert!(options.emit_import);

    let json = options.to_json().unwrap();
    assert_eq!(DesugarOptions::from_json(&json).unwrap(), options);
}

#[test]
fn options_reject_unknown_fields_and_bad_names() {
    let err = DesugarOptions::from_json(r#"{"markr": "x"}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)), "got: {err}");

    let err = DesugarOptions::from_json(r#"{"runtime": {"module": "facets..rt"}}"#).unwrap_err();
    assert!(
        matches!(&err, ConfigError::InvalidName { field, .. } if *field == "runtime.module"),
        "got: {err}"
    );

    let err = DesugarOptions::from_json(r#"{"runtime": {"map_over": "lambda"}}"#).unwrap_err();
    assert!(
        matches!(&err, ConfigError::InvalidName { field, value } if *field == "map_over" && value == "lambda"),
        "got: {err}"
    );
}

#[test]
fn loading_missing_file_reports_path() {
    let err = DesugarOptions::load(std::path::Path::new("/nonexistent/facetrans.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("/nonexistent/facetrans.json"), "got: {err}");
}
