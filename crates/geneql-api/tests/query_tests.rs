use geneql::{
    CodecError, CompileError, FieldDef, FieldType, GeneQL, GeneQLConfig, GeneQLError, MemoryGraph,
    Operation, Outcome, Principal, Row, RuntimeError, Schema, SemanticErrorKind, Value,
};
use serde_json::json;
use std::sync::Arc;

fn setup() -> (GeneQL, Arc<MemoryGraph>) {
    let (db, graph) = GeneQL::in_memory(&GeneQLConfig::new()).unwrap();
    for (id, active) in [("alice", true), ("bob", false), ("carol", true)] {
        graph
            .insert_row(
                "User",
                Row::new(id)
                    .with("username", id)
                    .with("email", format!("{}@example.com", id))
                    .with("active", active),
            )
            .unwrap();
    }
    graph
        .insert_row("Resource", Row::new("doc1").with("owner", "alice").with("type", "document"))
        .unwrap();
    (db, graph)
}

fn alice() -> Principal {
    Principal::new("User", "alice")
}

#[test]
fn test_get_with_projection() {
    let (db, _graph) = setup();
    let ctx = db.context(alice());

    let outcome = db
        .compile_and_run("GET User : email, username WHERE active = true", &ctx)
        .unwrap();
    let records = outcome.records().unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "carol"]);
    assert_eq!(records[1].get("email"), Some(&Value::from("carol@example.com")));
    assert_eq!(records[0].fields[0].name, "email");
}

#[test]
fn test_get_all_fields_in_schema_order() {
    let (db, _graph) = setup();
    let outcome = db
        .compile_and_run("GET User.bob", &db.context(alice()))
        .unwrap();
    let names: Vec<_> = outcome.records().unwrap()[0]
        .fields
        .iter()
        .map(|f| f.name.clone())
        .collect();
    assert_eq!(names, vec!["id", "username", "email", "active", "created_at"]);
    assert_eq!(outcome.records().unwrap()[0].get("created_at"), Some(&Value::Null));
}

#[test]
fn test_or_conditions() {
    let (db, _graph) = setup();
    let outcome = db
        .compile_and_run(
            r#"GET User : id WHERE username = "bob" OR (active = true AND id != "alice")"#,
            &db.context(alice()),
        )
        .unwrap();
    let ids: Vec<_> = outcome.records().unwrap().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec!["bob", "carol"]);
}

#[test]
fn test_execute_result_shape() {
    let (db, _graph) = setup();
    let ctx = db.context(alice());

    let result = db.execute("GET User.SELF : username", &ctx);
    assert!(result.success);
    assert_eq!(
        result.data,
        Some(json!([{"entity": "User", "id": "alice", "fields": {"username": "alice"}}]))
    );

    let result = db.execute("GET Nothing", &ctx);
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("unknown entity"));
}

#[test]
fn test_parsed_query_binds_self_per_principal() {
    let (db, _graph) = setup();
    let query = db.parse("GET User.SELF : username").unwrap();

    for id in ["alice", "bob"] {
        let principal = Principal::new("User", id);
        let plan = db.prepare(&query, &principal).unwrap();
        let outcome = db.run(&plan, &db.context(principal)).unwrap();
        assert_eq!(outcome.records().unwrap()[0].id, id);
    }
}

#[test]
fn test_update_rows() {
    let (db, _graph) = setup();
    let ctx = db.context(alice());

    let outcome = db
        .compile_and_run(r#"UPDATE User SET active = false WHERE username != "alice""#, &ctx)
        .unwrap();
    assert!(matches!(outcome, Outcome::Updated { count: 2, .. }));

    let active = db
        .compile_and_run("GET User : id WHERE active = true", &ctx)
        .unwrap();
    assert_eq!(active.records().unwrap().len(), 1);
}

#[test]
fn test_mistyped_plan_updates_nothing() {
    let (db, _graph) = setup();
    let ctx = db.context(alice());
    let mut plan = db
        .compile("UPDATE User SET active = false", &alice())
        .unwrap();
    if let Operation::Update { assignments, .. } = &mut plan.operation {
        assignments[0].value = Value::from("no");
    }

    let err = db.run(&plan, &ctx).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeMismatch { ref field, .. } if field == "active"));

    let active = db
        .compile_and_run("GET User : id WHERE active = true", &ctx)
        .unwrap();
    assert_eq!(active.records().unwrap().len(), 2);
}

#[test]
fn test_update_id_rejected() {
    let (db, _graph) = setup();
    let err = db
        .compile(r#"UPDATE User.bob SET id = "robert""#, &alice())
        .unwrap_err();
    let CompileError::Semantic(e) = err else {
        panic!("expected a semantic error");
    };
    assert_eq!(e.kind, SemanticErrorKind::ImmutableField);
}

#[test]
fn test_compile_error_positions() {
    let (db, _graph) = setup();

    let err = db.compile(r#"GET User WHERE name = "open"#, &alice()).unwrap_err();
    assert!(matches!(err, CompileError::Lex(_)));
    let position = err.position().unwrap();
    assert_eq!((position.line, position.column), (1, 23));

    let err = db
        .compile("GET User WHERE id = \"a\" AND active = true OR id = \"b\"", &alice())
        .unwrap_err();
    assert!(matches!(err, CompileError::Syntax(_)));
}

#[test]
fn test_principal_mismatch() {
    let (db, _graph) = setup();
    let plan = db.compile("GET User", &alice()).unwrap();
    let err = db
        .run(&plan, &db.context(Principal::new("User", "bob")))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::PrincipalMismatch { .. }));
}

#[test]
fn test_stale_schema() {
    let (db, _graph) = setup();
    let plan = db.compile("GET User : username", &alice()).unwrap();

    let mut schema = Schema::genesis();
    schema.entities[0]
        .fields
        .push(FieldDef::new("team", FieldType::String));
    let (other, _) = GeneQL::in_memory(&GeneQLConfig::new().with_schema(schema)).unwrap();
    assert_ne!(db.fingerprint(), other.fingerprint());

    let err = other.run(&plan, &other.context(alice())).unwrap_err();
    assert!(matches!(err, RuntimeError::StaleSchema { .. }));
}

#[test]
fn test_encoded_plan() {
    let (db, graph) = setup();
    let ctx = db.context(alice());
    let bytes = db
        .compile("GRANT read ON Resource.doc1 TO User.bob", &alice())
        .unwrap()
        .encode()
        .unwrap();

    let outcome = db.run_encoded(&bytes, &ctx).unwrap();
    assert!(matches!(outcome, Outcome::Granted { created: true, .. }));
    assert_eq!(graph.edge_count().unwrap(), 1);

    let mut corrupted = bytes.clone();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xff;
    let err = db.run_encoded(&corrupted, &ctx).unwrap_err();
    assert!(matches!(
        err,
        GeneQLError::Codec(CodecError::ChecksumMismatch { .. })
    ));
}
