use miriam_core::db::{open_db, open_db_in_memory};
use miriam_core::repo::id_generator::next_identifier;
use miriam_core::{
    CurationRepository, DataCollection, IdKind, RepoError, Resource, SqliteCurationRepository,
};
use std::collections::HashSet;
use std::thread;

fn collection(name: &str) -> DataCollection {
    let mut collection = DataCollection::new(name, "test", "^\\d+$");
    collection.url = Some(format!("http://identifiers.org/{name}/"));
    collection.resources = vec![Resource::new("http://x/", "", "http://x/")];
    collection
}

#[test]
fn first_identifiers_start_at_one() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(next_identifier(&conn, IdKind::Collection).unwrap(), "MIR:00000001");
    assert_eq!(next_identifier(&conn, IdKind::Resource).unwrap(), "MIR:00100001");
    assert_eq!(
        next_identifier(&conn, IdKind::DraftCollection).unwrap(),
        "MIR:00900001"
    );
    assert_eq!(
        next_identifier(&conn, IdKind::DraftResource).unwrap(),
        "MIR:00100001"
    );
}

#[test]
fn sequential_submissions_get_increasing_identifiers() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();

    let ids: Vec<String> = ["Alpha", "Beta", "Gamma"]
        .iter()
        .map(|name| repo.submit(&collection(name), "").unwrap().target_id)
        .collect();

    assert_eq!(ids, vec!["MIR:00900001", "MIR:00900002", "MIR:00900003"]);
    let draft = repo.retrieve("MIR:00900003").unwrap().unwrap();
    assert_eq!(
        draft.collection.resources[0].id.as_deref(),
        Some("MIR:00100003")
    );
}

#[test]
fn exhausted_sequence_is_an_error() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 99999)
         INSERT INTO cura_datatype (datatype_id, name, pattern, definition)
         SELECT 'seed-' || x, 'seed ' || x, '.*', 'seed' FROM seq;",
    )
    .unwrap();

    let err = next_identifier(&conn, IdKind::DraftCollection).unwrap_err();
    assert!(matches!(
        err,
        RepoError::IdentifierExhausted(IdKind::DraftCollection)
    ));

    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    let err = repo.submit(&collection("Overflow"), "").unwrap_err();
    assert!(matches!(err, RepoError::IdentifierExhausted(_)));
}

#[test]
fn concurrent_submissions_never_share_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.sqlite3");
    drop(open_db(&path).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqliteCurationRepository::try_new(&conn).unwrap();
                (0..5)
                    .map(|index| {
                        repo.submit(&collection(&format!("W{worker}C{index}")), "")
                            .unwrap()
                            .target_id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: Vec<String> = workers
        .into_iter()
        .flat_map(|worker| worker.join().unwrap())
        .collect();
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), 20);
    assert_eq!(unique.len(), 20);

    let conn = open_db(&path).unwrap();
    let resources: i64 = conn
        .query_row("SELECT COUNT(DISTINCT resource_id) FROM cura_resource;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(resources, 20);
}
