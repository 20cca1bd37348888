// End-to-end behaviour of sessions over the in-memory driver
use std::sync::Arc;
use std::thread;
use mapperust::cache::{CacheLayer, Eviction};
use mapperust::{
    Cache, CacheBuilder, CacheSettings, Configuration, DatabaseError, ExecutorType,
    MappedStatement, MapperDefinition, MemoryDriver, Parameter, ReturnKind, RowBounds,
    SessionFactory, Settings, SqlCommandType, StatementResult, StaticSqlSource, UpdateCount, Value,
};

const FIND_BY_ID: &str = "SELECT * FROM users WHERE id = ?";
const FIND_ALL: &str = "SELECT * FROM users";
const RENAME: &str = "UPDATE users SET name = ? WHERE id = ?";
const INSERT: &str = "INSERT INTO users VALUES (?, ?)";

fn driver() -> MemoryDriver {
    let driver = MemoryDriver::new();
    driver.create_table("users", &["id", "name"]);
    for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
        driver.insert_row("users", vec![Value::Integer(id), Value::from(name)]).unwrap();
    }
    driver.select_by(FIND_BY_ID, "users", "id");
    driver.select_all(FIND_ALL, "users");
    driver.update_by(RENAME, "users", "name", "id");
    driver.insert_into(INSERT, "users");
    driver
}

fn configuration(settings: Settings, cache: Option<Arc<dyn Cache>>) -> Configuration {
    let mut configuration = Configuration::new(settings);
    let cache = match cache {
        Some(cache) => {
            configuration.add_cache(Arc::clone(&cache));
            cache
        }
        None => configuration.namespace_cache("user"),
    };
    let statements = [
        ("user.findById", SqlCommandType::Select, FIND_BY_ID, vec!["id"]),
        ("user.findAll", SqlCommandType::Select, FIND_ALL, vec![]),
        ("user.rename", SqlCommandType::Update, RENAME, vec!["name", "id"]),
        ("user.insert", SqlCommandType::Insert, INSERT, vec!["id", "name"]),
    ];
    for (id, command, sql, mappings) in statements {
        let source = Arc::new(StaticSqlSource::new(sql).with_mappings(mappings));
        configuration
            .add_mapped_statement(MappedStatement::builder(id, command, source).cache(Arc::clone(&cache)).build())
            .unwrap();
    }
    configuration.add_mapper(
        MapperDefinition::new("user")
            .method("findById", "findById", ReturnKind::One)
            .method("findAll", "findAll", ReturnKind::Many)
            .method_with_params("rename", "rename", ReturnKind::Affected, &["name", "id"])
            .method_with_params("insert", "insert", ReturnKind::Affected, &["id", "name"]),
    );
    configuration
}

fn factory() -> (SessionFactory, MemoryDriver) {
    let driver = driver();
    let factory = SessionFactory::new(configuration(Settings::default(), None), Arc::new(driver.clone()));
    (factory, driver)
}

fn rename(id: i64, name: &str) -> Parameter {
    Parameter::named([("name", Value::from(name)), ("id", Value::Integer(id))])
}

#[test]
fn test_write_invalidates_local_cache() {
    let (factory, driver) = factory();
    let mut session = factory.open_session();

    let before = session.select_one("user.findById", 1_i64).unwrap().unwrap();
    assert_eq!(before.column("name"), Some(&Value::from("alice")));
    session.select_one("user.findById", 1_i64).unwrap();
    assert_eq!(driver.executions_of(FIND_BY_ID), 1);

    session.update("user.rename", rename(1, "alison")).unwrap();
    let after = session.select_one("user.findById", 1_i64).unwrap().unwrap();
    assert_eq!(after.column("name"), Some(&Value::from("alison")));
    assert_eq!(driver.executions_of(FIND_BY_ID), 2);
}

#[test]
fn test_shared_cache_visible_after_commit_only() {
    let (factory, driver) = factory();

    let mut first = factory.open_session();
    first.select_list("user.findAll", ()).unwrap();

    let mut second = factory.open_session();
    second.select_list("user.findAll", ()).unwrap();
    assert_eq!(driver.executions_of(FIND_ALL), 2);

    first.commit().unwrap();
    let mut third = factory.open_session();
    third.select_list("user.findAll", ()).unwrap();
    assert_eq!(driver.executions_of(FIND_ALL), 2);
}

#[test]
fn test_rolled_back_session_publishes_nothing() {
    let (factory, driver) = factory();
    let mut session = factory.open_session();
    session.select_list("user.findAll", ()).unwrap();
    session.rollback().unwrap();
    session.close().unwrap();

    let mut next = factory.open_session();
    next.select_list("user.findAll", ()).unwrap();
    assert_eq!(driver.executions_of(FIND_ALL), 2);
}

#[test]
fn test_committed_write_refreshes_other_sessions() {
    let (factory, _driver) = factory();
    let mut reader = factory.open_session();
    reader.select_one("user.findById", 2_i64).unwrap();
    reader.close().unwrap();

    let mut writer = factory.open_session();
    writer.update("user.rename", rename(2, "robert")).unwrap();
    writer.commit().unwrap();

    let mut reader = factory.open_session();
    let row = reader.select_one("user.findById", 2_i64).unwrap().unwrap();
    assert_eq!(row.column("name"), Some(&Value::from("robert")));
}

#[test]
fn test_cancelled_write_keeps_shared_cache() {
    let (factory, driver) = factory();
    let mut reader = factory.open_session();
    reader.select_list("user.findAll", ()).unwrap();
    reader.commit().unwrap();
    let shared = factory.configuration().cache("user").unwrap();
    assert_eq!(shared.size(), 1);

    let mut writer = factory.open_session();
    writer.cancellation_token().cancel();
    assert!(matches!(
        writer.update("user.rename", rename(1, "al")),
        Err(DatabaseError::Cancelled)
    ));
    assert_eq!(shared.size(), 1);
    assert_eq!(driver.executions_of(RENAME), 0);
}

#[test]
fn test_commit_only_when_dirty() {
    let (factory, driver) = factory();
    let mut session = factory.open_session();

    session.commit().unwrap();
    assert_eq!(driver.stats().commits, 0);

    session.update("user.rename", rename(3, "caroline")).unwrap();
    session.commit().unwrap();
    assert_eq!(driver.stats().commits, 1);
    assert!(!session.is_dirty());

    session.commit().unwrap();
    assert_eq!(driver.stats().commits, 1);
}

#[test]
fn test_auto_commit_session_never_commits_transaction() {
    let (factory, driver) = factory();
    let mut session = factory.open_session_with(ExecutorType::Simple, true);
    session.update("user.rename", rename(1, "al")).unwrap();
    session.commit().unwrap();
    session.rollback_force().unwrap();
    assert_eq!(driver.stats().commits, 0);
    assert_eq!(driver.stats().rollbacks, 0);
    assert_eq!(driver.rows("users")[0].column("name"), Some(&Value::from("al")));
}

#[test]
fn test_select_one_cardinality() {
    let (factory, _driver) = factory();
    let mut session = factory.open_session();
    assert!(session.select_one("user.findById", 42_i64).unwrap().is_none());
    assert!(session.select_one("user.findById", 1_i64).unwrap().is_some());
    match session.select_one("user.findAll", ()) {
        Err(DatabaseError::TooManyResults { statement, count }) => {
            assert_eq!(statement, "user.findAll");
            assert_eq!(count, 3);
        }
        other => panic!("expected TooManyResults, got {other:?}"),
    }
}

#[test]
fn test_row_bounds_window() {
    let (factory, _driver) = factory();
    let mut session = factory.open_session();
    let rows = session
        .select_list_with_bounds("user.findAll", (), RowBounds::new(1, 5))
        .unwrap();
    let names: Vec<_> = rows.iter().filter_map(|r| r.column("name").cloned()).collect();
    assert_eq!(names, vec![Value::from("bob"), Value::from("carol")]);
}

#[test]
fn test_mapper_dispatch_uses_real_operations() {
    let (factory, driver) = factory();
    let mut session = factory.open_session();
    let mapper = session.mapper("user").unwrap();

    let inserted = mapper
        .call(&mut session, "insert", vec![Value::Integer(4), Value::from("dave")])
        .unwrap();
    assert_eq!(inserted, StatementResult::Affected(UpdateCount::Rows(1)));
    assert!(session.is_dirty());

    let found = mapper.call(&mut session, "findById", vec![Value::Integer(4)]).unwrap();
    let row = found.into_row().flatten().unwrap();
    assert_eq!(row.column("name"), Some(&Value::from("dave")));

    let all = mapper.call(&mut session, "findAll", vec![]).unwrap();
    assert_eq!(all.into_row_set().unwrap().len(), 4);

    session.commit().unwrap();
    assert_eq!(driver.rows("users").len(), 4);

    assert!(matches!(
        mapper.call(&mut session, "nope", vec![]),
        Err(DatabaseError::StatementNotFound(_))
    ));
    assert!(session.mapper("orders").is_err());
}

#[test]
fn test_batch_session_defers_until_commit() {
    let (factory, driver) = factory();
    let mut session = factory.open_session_with(ExecutorType::Batch, false);
    assert_eq!(
        session.insert("user.insert", Parameter::named([("id", Value::Integer(7)), ("name", Value::from("gus"))])).unwrap(),
        UpdateCount::Deferred
    );
    assert_eq!(driver.rows("users").len(), 3);
    session.commit().unwrap();
    assert_eq!(driver.rows("users").len(), 4);
}

#[test]
fn test_failed_batch_blocks_commit() {
    let (factory, driver) = factory();
    driver.fail(RENAME, "constraint violated");
    let mut session = factory.open_session_with(ExecutorType::Batch, false);
    session
        .insert("user.insert", Parameter::named([("id", Value::Integer(7)), ("name", Value::from("gus"))]))
        .unwrap();
    session.update("user.rename", rename(1, "al")).unwrap();

    match session.commit() {
        Err(DatabaseError::BatchFailed { failed, results }) => {
            assert_eq!(failed, 1);
            assert_eq!(results.len(), 2);
            assert!(results[0].is_applied());
            assert!(!results[1].is_applied());
        }
        other => panic!("expected BatchFailed, got {other:?}"),
    }
    assert_eq!(driver.stats().commits, 0);
    assert!(session.is_dirty());

    session.close().unwrap();
    assert_eq!(driver.rows("users").len(), 3);
    assert_eq!(driver.stats().commits, 0);
}

#[test]
fn test_failed_batch_surfaces_on_query() {
    let (factory, driver) = factory();
    driver.fail(RENAME, "constraint violated");
    let mut session = factory.open_session_with(ExecutorType::Batch, false);
    session.update("user.rename", rename(2, "robert")).unwrap();

    assert!(matches!(
        session.select_list("user.findAll", ()),
        Err(DatabaseError::BatchFailed { failed: 1, .. })
    ));
    assert_eq!(driver.executions_of(FIND_ALL), 0);
    assert!(session.flush_statements().unwrap().is_empty());
}

#[test]
fn test_reuse_session_prepares_once() {
    let (factory, driver) = factory();
    let mut session = factory.open_session_with(ExecutorType::Reuse, false);
    for id in 1..=3_i64 {
        session.select_one("user.findById", id).unwrap();
    }
    assert_eq!(driver.stats().prepares, 1);
}

#[test]
fn test_cursor_streams_and_closes_with_session() {
    let (factory, _driver) = factory();
    let mut session = factory.open_session();
    let cursor = session.select_cursor("user.findAll", (), RowBounds::DEFAULT).unwrap();
    let ids: Vec<_> = cursor.filter_map(|r| r.column("id").and_then(Value::as_int)).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let mut open = session.select_cursor("user.findAll", (), RowBounds::DEFAULT).unwrap();
    session.close().unwrap();
    assert!(!open.is_open());
    assert!(open.next_row().is_none());
}

#[test]
fn test_cache_disabled_by_settings() {
    let driver = driver();
    let settings = Settings {
        cache_enabled: false,
        ..Settings::default()
    };
    let factory = SessionFactory::new(configuration(settings, None), Arc::new(driver.clone()));
    for _ in 0..2 {
        let mut session = factory.open_session();
        session.select_list("user.findAll", ()).unwrap();
        session.commit().unwrap();
    }
    assert_eq!(driver.executions_of(FIND_ALL), 2);
}

#[test]
fn test_lru_settings_bound_shared_cache() {
    let driver = driver();
    let mut settings = Settings::default();
    settings.caches.insert(
        "user".to_string(),
        CacheSettings {
            eviction: Eviction::Lru,
            size: 2,
            ..CacheSettings::default()
        },
    );
    let factory = SessionFactory::new(configuration(settings, None), Arc::new(driver));
    let mut session = factory.open_session();
    for id in 1..=3_i64 {
        session.select_one("user.findById", id).unwrap();
    }
    session.commit().unwrap();
    assert_eq!(factory.configuration().cache("user").unwrap().size(), 2);
}

#[test]
fn test_blocking_cache_single_flight_across_sessions() {
    let driver = driver();
    driver.set_latency(Some(std::time::Duration::from_millis(50)));
    let cache = CacheBuilder::new("user")
        .layer(CacheLayer::Lru(64))
        .layer(CacheLayer::Synchronized)
        .layer(CacheLayer::Blocking(None))
        .build();
    let factory = Arc::new(SessionFactory::new(
        configuration(Settings::default(), Some(cache)),
        Arc::new(driver.clone()),
    ));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let factory = Arc::clone(&factory);
            thread::spawn(move || {
                let mut session = factory.open_session();
                let rows = session.select_list("user.findAll", ()).unwrap();
                session.commit().unwrap();
                rows.len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 3);
    }
    assert_eq!(driver.executions_of(FIND_ALL), 1);
}
