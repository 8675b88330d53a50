use miriam_core::db::{open_db, open_db_in_memory};
use miriam_core::{
    ConflictKind, CurationRepository, CurationService, CurationServiceError, CurationState,
    DataCollection, DocumentationId, RepoError, Resource, SqliteCurationRepository,
    UniquenessScope,
};
use std::sync::{Arc, Barrier};
use std::thread;

fn test_db() -> DataCollection {
    let mut collection = DataCollection::new("TestDB", "A collection used by tests", "^\\d+$");
    collection.url = Some("http://identifiers.org/testdb/".to_string());
    collection.urn = Some("urn:miriam:testdb".to_string());
    collection.synonyms = vec!["TDB".to_string()];
    let mut resource = Resource::new("http://x/", "", "http://x/");
    resource.example = "42".to_string();
    resource.info = "TestDB main site".to_string();
    resource.institution = "Test Institute".to_string();
    resource.location = "UK".to_string();
    resource.primary = true;
    collection.resources = vec![resource];
    collection.documentation_urls = vec!["http://x/about".to_string()];
    collection.documentation_ids = vec![DocumentationId {
        id: "12345".to_string(),
        id_type: "PMID".to_string(),
    }];
    collection
}

#[test]
fn submit_and_retrieve_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();

    let report = repo.submit(&test_db(), "submitted by a test").unwrap();
    assert_eq!(report.target_id, "MIR:00900001");
    assert_eq!(report.rows("collection"), Some(1));
    assert_eq!(report.rows("uris"), Some(2));
    assert_eq!(report.rows("documentation"), Some(2));
    assert_eq!(report.rows("curation_state"), Some(1));

    let draft = repo.retrieve("MIR:00900001").unwrap().unwrap();
    assert_eq!(draft.state, CurationState::Submitted);
    assert_eq!(draft.comment, "New submission");
    assert_eq!(draft.sub_info, "submitted by a test");
    assert_eq!(draft.public_id, None);

    let collection = &draft.collection;
    assert_eq!(collection.id.as_deref(), Some("MIR:00900001"));
    assert_eq!(collection.name, "TestDB");
    assert_eq!(collection.synonyms, vec!["TDB"]);
    assert_eq!(collection.url.as_deref(), Some("http://identifiers.org/testdb/"));
    assert_eq!(collection.urn.as_deref(), Some("urn:miriam:testdb"));
    assert_eq!(collection.documentation_urls, vec!["http://x/about"]);
    assert_eq!(collection.documentation_ids[0].id_type, "PMID");
    assert!(collection.date_creation.is_some());

    let resource = &collection.resources[0];
    assert_eq!(resource.id.as_deref(), Some("MIR:00100001"));
    assert_eq!(resource.example, "42");
    assert!(resource.primary);
    assert_eq!(resource.reliability, None);
}

#[test]
fn retrieve_unknown_draft_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    assert!(repo.retrieve("MIR:00999999").unwrap().is_none());
    assert!(!repo.exists_by_id("MIR:00999999").unwrap());
    assert_eq!(repo.state("MIR:00999999").unwrap(), None);
}

#[test]
fn retrieve_tolerates_a_broken_facet() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    repo.submit(&test_db(), "").unwrap();

    conn.execute_batch("DROP TABLE cura_doc;").unwrap();

    let draft = repo.retrieve("MIR:00900001").unwrap().unwrap();
    assert_eq!(draft.collection.name, "TestDB");
    assert!(draft.collection.documentation_urls.is_empty());
    assert!(draft.collection.documentation_ids.is_empty());
    assert_eq!(draft.collection.resources.len(), 1);
}

#[test]
fn retrieve_tolerates_missing_curation_record() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    repo.submit(&test_db(), "submitted by a test").unwrap();
    repo.set_state("MIR:00900001", CurationState::Pending, Some("waiting"))
        .unwrap();

    conn.execute_batch("DELETE FROM cura_material;").unwrap();

    let draft = repo.retrieve("MIR:00900001").unwrap().unwrap();
    assert_eq!(draft.collection.name, "TestDB");
    assert_eq!(draft.collection.resources.len(), 1);
    assert_eq!(draft.state, CurationState::Submitted);
    assert_eq!(draft.comment, "");
    assert_eq!(draft.sub_info, "");
    assert_eq!(draft.public_id, None);
}

#[test]
fn broken_deprecated_uri_keeps_official_uris() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    repo.submit(&test_db(), "").unwrap();

    conn.execute_batch(
        "PRAGMA ignore_check_constraints = ON;
         INSERT INTO cura_uri (uri, uri_type, deprecated, ptr_datatype)
         VALUES ('http://old.testdb.org/', 'LSID', 1, 'MIR:00900001');
         PRAGMA ignore_check_constraints = OFF;",
    )
    .unwrap();

    let draft = repo.retrieve("MIR:00900001").unwrap().unwrap();
    assert!(draft.collection.deprecated_uris.is_empty());
    assert_eq!(
        draft.collection.url.as_deref(),
        Some("http://identifiers.org/testdb/")
    );
    assert_eq!(draft.collection.urn.as_deref(), Some("urn:miriam:testdb"));
}

#[test]
fn invalid_collection_is_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();

    let mut collection = test_db();
    collection.resources.clear();
    let err = repo.submit(&collection, "").unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert!(repo.list_drafts(None).unwrap().is_empty());
}

#[test]
fn failed_step_rolls_back_the_whole_submission() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_docs BEFORE INSERT ON cura_doc
         BEGIN SELECT RAISE(ABORT, 'documentation rejected'); END;",
    )
    .unwrap();

    let err = repo.submit(&test_db(), "").unwrap_err();
    assert!(matches!(err, RepoError::WriteFailed { step: "documentation", .. }));
    let rows: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM cura_datatype)
                  + (SELECT COUNT(*) FROM cura_resource)
                  + (SELECT COUNT(*) FROM cura_material);",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 0);

    conn.execute_batch("DROP TRIGGER reject_docs;").unwrap();
    let report = repo.submit(&test_db(), "").unwrap();
    assert_eq!(report.target_id, "MIR:00900001");
}

#[test]
fn duplicates_are_detected_by_name_synonym_and_uri() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    repo.submit(&test_db(), "").unwrap();

    let mut other_case = DataCollection::new("testdb", "other", ".*");
    other_case.url = Some("http://identifiers.org/other/".to_string());
    other_case.synonyms = vec!["tdb".to_string()];
    assert_eq!(
        repo.find_conflict(&other_case, UniquenessScope::Registry).unwrap(),
        None
    );

    let mut same_name = DataCollection::new("TestDB", "other", ".*");
    same_name.url = Some("http://identifiers.org/other/".to_string());
    let conflict = repo
        .find_conflict(&same_name, UniquenessScope::Draft)
        .unwrap()
        .unwrap();
    assert_eq!(conflict.kind, ConflictKind::NameMatchesName);
    assert_eq!(conflict.existing_id, "MIR:00900001");

    let mut name_is_synonym = same_name.clone();
    name_is_synonym.name = "TDB".to_string();
    let conflict = repo
        .find_conflict(&name_is_synonym, UniquenessScope::Draft)
        .unwrap()
        .unwrap();
    assert_eq!(conflict.kind, ConflictKind::NameMatchesSynonym);

    let mut synonym_is_name = same_name.clone();
    synonym_is_name.name = "Other".to_string();
    synonym_is_name.synonyms = vec!["TestDB".to_string()];
    let conflict = repo
        .find_conflict(&synonym_is_name, UniquenessScope::Draft)
        .unwrap()
        .unwrap();
    assert_eq!(conflict.kind, ConflictKind::SynonymMatchesName);

    let mut uri_taken = same_name.clone();
    uri_taken.name = "Other".to_string();
    uri_taken.urn = Some("urn:miriam:testdb".to_string());
    let conflict = repo
        .find_conflict(&uri_taken, UniquenessScope::Registry)
        .unwrap()
        .unwrap();
    assert_eq!(conflict.kind, ConflictKind::UriInUse);
    assert_eq!(conflict.value, "urn:miriam:testdb");

    let mut unrelated = same_name;
    unrelated.name = "Other".to_string();
    assert!(!repo.exists(&unrelated, UniquenessScope::Registry).unwrap());
    assert!(!repo.exists(&uri_taken, UniquenessScope::Published).unwrap());
}

#[test]
fn uri_comparison_is_case_sensitive() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    repo.submit(&test_db(), "").unwrap();

    let mut candidate = DataCollection::new("Other", "other", ".*");
    candidate.url = Some("http://identifiers.org/TESTDB/".to_string());
    assert!(!repo.exists(&candidate, UniquenessScope::Draft).unwrap());
}

#[test]
fn service_rejects_duplicate_submission() {
    let conn = open_db_in_memory().unwrap();
    let service = CurationService::new(SqliteCurationRepository::try_new(&conn).unwrap());
    service.submit(&test_db(), "").unwrap();

    let err = service.submit(&test_db(), "").unwrap_err();
    match err {
        CurationServiceError::Duplicate(conflict) => {
            assert_eq!(conflict.kind, ConflictKind::NameMatchesName);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.queue(None).unwrap().len(), 1);
}

#[test]
fn repository_rejects_duplicate_submission() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    repo.submit(&test_db(), "").unwrap();

    let mut same_name = test_db();
    same_name.synonyms.clear();
    same_name.url = Some("http://identifiers.org/elsewhere/".to_string());
    same_name.urn = None;
    let err = repo.submit(&same_name, "").unwrap_err();
    assert!(matches!(
        err,
        RepoError::DuplicateName(conflict)
            if conflict.kind == ConflictKind::NameMatchesName
                && conflict.existing_id == "MIR:00900001"
    ));
    assert_eq!(repo.list_drafts(None).unwrap().len(), 1);
}

#[test]
fn concurrent_submissions_of_one_name_store_a_single_draft() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.sqlite3");
    drop(open_db(&path).unwrap());

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = (0..2)
        .map(|worker| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqliteCurationRepository::try_new(&conn).unwrap();
                let mut collection = test_db();
                collection.synonyms.clear();
                collection.url = Some(format!("http://identifiers.org/worker{worker}/"));
                collection.urn = None;
                barrier.wait();
                repo.submit(&collection, "").map(|report| report.target_id)
            })
        })
        .collect();

    let results: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|result| matches!(result, Err(RepoError::DuplicateName(_)))));

    let conn = open_db(&path).unwrap();
    let drafts: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM cura_datatype WHERE name = 'TestDB';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(drafts, 1);
}

#[test]
fn names_differing_only_in_case_are_distinct() {
    let conn = open_db_in_memory().unwrap();
    let service = CurationService::new(SqliteCurationRepository::try_new(&conn).unwrap());
    service.submit(&test_db(), "").unwrap();

    let mut lower = test_db();
    lower.name = "testdb".to_string();
    lower.synonyms = vec!["tdb".to_string()];
    lower.url = Some("http://identifiers.org/testdb-lower/".to_string());
    lower.urn = None;
    let report = service.submit(&lower, "").unwrap();
    assert_eq!(report.target_id, "MIR:00900002");
    assert_eq!(service.queue(None).unwrap().len(), 2);
}

#[test]
fn update_reconciles_resources_and_replaces_lists() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    let mut two_resources = test_db();
    two_resources
        .resources
        .push(Resource::new("http://mirror/", "", "http://mirror/"));
    repo.submit(&two_resources, "").unwrap();
    let old = repo.retrieve("MIR:00900001").unwrap().unwrap();

    let mut new = old.clone();
    new.comment = "checked the primary site".to_string();
    new.state = CurationState::Curation;
    new.collection.synonyms = vec!["TestDatabase".to_string(), "TDB2".to_string()];
    new.collection.definition = "An updated definition".to_string();
    new.collection.resources[0].info = "renamed".to_string();
    new.collection.resources.remove(1);
    new.collection
        .resources
        .push(Resource::new("http://third/", "", "http://third/"));

    let report = repo.update(&new, &old).unwrap();
    assert_eq!(report.rows("synonyms"), Some(2));
    assert_eq!(report.rows("resources"), Some(3));

    let stored = repo.retrieve("MIR:00900001").unwrap().unwrap();
    assert_eq!(stored.state, CurationState::Curation);
    assert_eq!(stored.comment, "checked the primary site");
    assert_eq!(stored.collection.definition, "An updated definition");
    assert_eq!(stored.collection.synonyms, vec!["TestDatabase", "TDB2"]);

    let resources = &stored.collection.resources;
    assert_eq!(resources.len(), 3);
    assert_eq!(resources[0].id.as_deref(), Some("MIR:00100001"));
    assert_eq!(resources[0].info, "renamed");
    assert!(!resources[0].obsolete);
    assert_eq!(resources[1].id.as_deref(), Some("MIR:00100002"));
    assert!(resources[1].obsolete);
    assert_eq!(resources[2].id.as_deref(), Some("MIR:00100003"));
    assert_eq!(resources[2].url_prefix, "http://third/");
}

#[test]
fn update_of_foreign_resource_fails_without_changes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCurationRepository::try_new(&conn).unwrap();
    repo.submit(&test_db(), "").unwrap();
    let mut other = test_db();
    other.name = "Other".to_string();
    other.synonyms.clear();
    other.url = Some("http://identifiers.org/other/".to_string());
    other.urn = None;
    repo.submit(&other, "").unwrap();

    let old = repo.retrieve("MIR:00900001").unwrap().unwrap();
    let foreign = repo.retrieve("MIR:00900002").unwrap().unwrap();
    let mut new = old.clone();
    new.collection.definition = "changed".to_string();
    new.collection.resources = foreign.collection.resources.clone();

    let err = repo.update(&new, &old).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == "MIR:00100002"));

    let stored = repo.retrieve("MIR:00900001").unwrap().unwrap();
    assert_eq!(stored.collection.definition, "A collection used by tests");
}

#[test]
fn state_transitions_follow_the_workflow() {
    let conn = open_db_in_memory().unwrap();
    let service = CurationService::new(SqliteCurationRepository::try_new(&conn).unwrap());
    let id = service.submit(&test_db(), "").unwrap().target_id;

    service
        .transition(&id, CurationState::Curation, Some("looking"))
        .unwrap();
    service.transition(&id, CurationState::Pending, None).unwrap();
    let draft = service.get_draft(&id).unwrap();
    assert_eq!(draft.state, CurationState::Pending);
    assert_eq!(draft.comment, "looking");

    let err = service
        .transition(&id, CurationState::Submitted, None)
        .unwrap_err();
    assert!(matches!(
        err,
        CurationServiceError::InvalidTransition {
            from: CurationState::Pending,
            to: CurationState::Submitted
        }
    ));
    let err = service
        .transition(&id, CurationState::Published, None)
        .unwrap_err();
    assert!(matches!(err, CurationServiceError::InvalidTransition { .. }));

    let err = service
        .transition("MIR:00999999", CurationState::Curation, None)
        .unwrap_err();
    assert!(matches!(err, CurationServiceError::DraftNotFound(_)));
}

#[test]
fn queue_and_workload_count_active_drafts() {
    let conn = open_db_in_memory().unwrap();
    let service = CurationService::new(SqliteCurationRepository::try_new(&conn).unwrap());
    for name in ["Alpha", "Beta", "Gamma"] {
        let mut collection = test_db();
        collection.name = name.to_string();
        collection.synonyms.clear();
        collection.url = Some(format!("http://identifiers.org/{name}/"));
        collection.urn = None;
        service.submit(&collection, "").unwrap();
    }
    service
        .transition("MIR:00900002", CurationState::Canceled, Some("spam"))
        .unwrap();

    let all = service.queue(None).unwrap();
    assert_eq!(all.len(), 3);
    let canceled = service.queue(Some(CurationState::Canceled)).unwrap();
    assert_eq!(canceled.len(), 1);
    assert_eq!(canceled[0].name, "Beta");
    assert_eq!(service.workload().unwrap(), (2, 2));
}

#[test]
fn diff_lists_pending_changes() {
    let conn = open_db_in_memory().unwrap();
    let service = CurationService::new(SqliteCurationRepository::try_new(&conn).unwrap());
    let id = service.submit(&test_db(), "").unwrap().target_id;

    let mut proposed = service.get_draft(&id).unwrap().collection;
    assert!(service.diff(&id, &proposed).unwrap().is_empty());

    proposed.synonyms.push("TestBase".to_string());
    proposed.pattern = "^\\w+$".to_string();
    let diff = service.diff(&id, &proposed).unwrap();
    assert_eq!(diff.changes.len(), 2);
}
