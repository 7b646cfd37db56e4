use std::collections::HashSet;
use std::fs;
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use task_cli_core::command::{execute, Command, Report};
use task_cli_core::store::{Loaded, StoreError, TaskStore};
use task_cli_core::task::Status;
use task_cli_core::task_ops::{add_task, delete_task, list_tasks, set_status, TaskError};

#[test]
fn ids_keep_increasing_across_interleaved_deletes() {
    let temp = TempDir::new().expect("tempdir");
    let store = TaskStore::new(temp.path().join("tasks.json"));

    let mut issued = Vec::new();
    for round in 0..5 {
        let first = add_task(&store, &format!("round {round} a")).expect("add");
        let second = add_task(&store, &format!("round {round} b")).expect("add");
        issued.push(first.id);
        issued.push(second.id);
        // Dropping the older task keeps the newest id as the maximum.
        delete_task(&store, first.id).expect("delete");
    }

    assert_eq!(issued, (1..=10).collect::<Vec<u64>>());
    let remaining: Vec<u64> = store.load_all().expect("load").iter().map(|t| t.id).collect();
    assert_eq!(remaining, vec![2, 4, 6, 8, 10]);
}

#[test]
fn store_keeps_insertion_order_rather_than_id_order() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("tasks.json");
    fs::write(
        &path,
        r#"[
  {"id": 7, "description": "late", "status": "done", "createdAt": "2024-03-01T09:00:00+00:00", "modifiedAt": "2024-03-02T09:00:00+00:00"},
  {"id": 2, "description": "early", "status": "to-do", "createdAt": "2024-01-01T09:00:00+00:00", "modifiedAt": null}
]"#,
    )
    .expect("seed");
    let store = TaskStore::new(&path);

    let added = add_task(&store, "newest").expect("add");
    let tasks = store.load_all().expect("load");

    assert_eq!(added.id, 8);
    assert_eq!(
        tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![7, 2, 8]
    );
    assert_eq!(tasks[0].status, Status::Done);
}

#[test]
fn legacy_offsetless_store_is_readable_and_rewritten_as_rfc3339() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("tasks.json");
    fs::write(
        &path,
        r#"[{"id": 1, "description": "old", "status": "in-progress",
            "createdAt": "2024-06-01T12:30:45.123456", "modifiedAt": null}]"#,
    )
    .expect("seed");
    let store = TaskStore::new(&path);

    set_status(&store, 1, Status::Done).expect("mark");

    let text = fs::read_to_string(&path).expect("read");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    let created = value[0]["createdAt"].as_str().expect("createdAt");
    assert!(created.starts_with("2024-06-01T12:30:45.123456"));
    assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
}

#[test]
fn first_load_reports_creation_then_existing() {
    let temp = TempDir::new().expect("tempdir");
    let store = TaskStore::new(temp.path().join("tasks.json"));

    assert_eq!(store.load().expect("load"), Loaded::Created);
    assert_eq!(store.load().expect("load"), Loaded::Existing(Vec::new()));
}

#[test]
fn list_never_changes_store_bytes() {
    let temp = TempDir::new().expect("tempdir");
    let store = TaskStore::new(temp.path().join("tasks.json"));
    add_task(&store, "a").expect("add");
    let before = fs::read(store.path()).expect("read");

    for _ in 0..3 {
        match execute(&store, Command::List { status: None }).expect("list") {
            Report::Listed(tasks) => assert_eq!(tasks.len(), 1),
            other => panic!("unexpected report {other:?}"),
        }
    }

    assert_eq!(fs::read(store.path()).expect("read"), before);
}

#[test]
fn malformed_store_surfaces_as_store_error() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("tasks.json");
    fs::write(&path, r#"[{"id": 1, "description": "x"}]"#).expect("seed");
    let store = TaskStore::new(&path);

    let err = list_tasks(&store, None).unwrap_err();

    assert!(matches!(
        err,
        TaskError::Store(StoreError::MalformedRecord { index: 0, .. })
    ));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn concurrent_adds_get_distinct_ids_and_none_are_lost() {
    let temp = TempDir::new().expect("tempdir");
    let store = TaskStore::new(temp.path().join("tasks.json"));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                (0..10)
                    .map(|n| add_task(&store, &format!("worker {worker} task {n}")).expect("add").id)
                    .collect::<Vec<u64>>()
            })
        })
        .collect();
    let issued: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("join"))
        .collect();

    let unique: HashSet<u64> = issued.iter().copied().collect();
    assert_eq!(unique.len(), 40);
    assert_eq!(unique, (1..=40).collect::<HashSet<u64>>());
    assert_eq!(store.load_all().expect("load").len(), 40);
}
