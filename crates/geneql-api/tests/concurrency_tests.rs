use geneql::{GeneQL, GeneQLConfig, MemoryGraph, Outcome, Principal, Row};
use std::sync::Arc;
use std::thread;

const USERS: usize = 8;
const PERMISSIONS: [&str; 4] = ["read", "write", "delete", "share"];

fn setup() -> (GeneQL, Arc<MemoryGraph>) {
    let (db, graph) = GeneQL::in_memory(&GeneQLConfig::new()).unwrap();
    graph.insert_row("User", Row::new("root")).unwrap();
    graph
        .insert_rows("User", (0..USERS).map(|i| Row::new(format!("u{}", i))))
        .unwrap();
    graph
        .insert_row("Resource", Row::new("doc1").with("owner", "root"))
        .unwrap();
    (db, graph)
}

#[test]
fn test_concurrent_grants_all_land() {
    let (db, graph) = setup();

    let handles: Vec<_> = (0..USERS)
        .map(|i| {
            let db = db.clone();
            thread::spawn(move || {
                let ctx = db.context(Principal::new("User", "root"));
                for permission in PERMISSIONS {
                    db.grant_access(&ctx, &format!("u{}", i), "doc1", permission)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(graph.edge_count().unwrap(), USERS * PERMISSIONS.len());
    let ctx = db.context(Principal::new("User", "root"));
    for i in 0..USERS {
        assert!(db.check_access(&ctx, &format!("u{}", i), "doc1", "share").unwrap());
    }
}

#[test]
fn test_same_grant_from_many_threads_creates_one_edge() {
    let (db, graph) = setup();

    let handles: Vec<_> = (0..USERS)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || {
                let ctx = db.context(Principal::new("User", "root"));
                match db.grant_access(&ctx, "u0", "doc1", "read").unwrap() {
                    Outcome::Granted { created, .. } => created,
                    other => panic!("unexpected outcome {:?}", other),
                }
            })
        })
        .collect();
    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|created| *created)
        .count();

    assert_eq!(created, 1);
    assert_eq!(graph.edge_count().unwrap(), 1);
}

#[test]
fn test_readers_see_committed_state() {
    let (db, _graph) = setup();
    let writer = {
        let db = db.clone();
        thread::spawn(move || {
            let ctx = db.context(Principal::new("User", "root"));
            for i in 0..USERS {
                db.grant_access(&ctx, &format!("u{}", i), "doc1", "read").unwrap();
            }
        })
    };

    let ctx = db.context(Principal::new("User", "u0"));
    let mut last = 0;
    for _ in 0..50 {
        let granted = (0..USERS)
            .filter(|i| db.check_access(&ctx, &format!("u{}", i), "doc1", "read").unwrap())
            .count();
        // grants are never lost once observed
        assert!(granted >= last);
        last = granted;
    }
    writer.join().unwrap();
    let granted = (0..USERS)
        .filter(|i| db.check_access(&ctx, &format!("u{}", i), "doc1", "read").unwrap())
        .count();
    assert_eq!(granted, USERS);
}
