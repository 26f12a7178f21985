//! Registration flow, imports and counter resynchronization

use icct_registry::{Config, NewTeam, RegistryError, TEAM_SERIES, TeamRegistry};

async fn memory_registry() -> TeamRegistry {
    TeamRegistry::open_url("sqlite::memory:").await.unwrap()
}

#[tokio::test]
async fn test_failed_insert_leaves_gap() {
    let registry = memory_registry().await;
    let alloc = registry.allocator();

    let first = registry
        .register(NewTeam::new("Lions", "a@lions.test"))
        .await
        .unwrap();
    assert_eq!(first.team_code, "ICCT-001");

    // Allocation of 2 commits, the insert then hits the unique name.
    let err = registry
        .register(NewTeam::new("Lions", "other@lions.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateTeam(ref name) if name == "Lions"));
    assert_eq!(alloc.current_value(TEAM_SERIES).await.unwrap(), 2);

    let third = registry
        .register(NewTeam::new("Tigers", "b@tigers.test"))
        .await
        .unwrap();
    assert_eq!(third.team_code, "ICCT-003");

    let codes: Vec<String> = registry
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.team_code)
        .collect();
    assert_eq!(codes, ["ICCT-001", "ICCT-003"]);
}

#[tokio::test]
async fn test_resync_after_import() {
    let registry = memory_registry().await;
    let alloc = registry.allocator();
    alloc.reset(TEAM_SERIES, 3).await.unwrap();

    for (code, name) in [("ICCT-001", "Lions"), ("ICCT-002", "Tigers"), ("ICCT-009", "Hawks")] {
        registry
            .import(code, NewTeam::new(name, format!("captain@{name}.test")))
            .await
            .unwrap();
    }

    // Imports bypass the counter; drift is only corrected on resync.
    assert_eq!(alloc.current_value(TEAM_SERIES).await.unwrap(), 3);

    assert_eq!(alloc.resynchronize(TEAM_SERIES).await.unwrap(), 9);
    assert_eq!(alloc.current_value(TEAM_SERIES).await.unwrap(), 9);

    let next = registry
        .register(NewTeam::new("Eagles", "e@eagles.test"))
        .await
        .unwrap();
    assert_eq!(next.seq, 10);
    assert_eq!(next.team_code, "ICCT-010");
}

#[tokio::test]
async fn test_resync_is_idempotent_and_never_lowers() {
    let registry = memory_registry().await;
    let alloc = registry.allocator();

    registry
        .import("ICCT-004", NewTeam::new("Lions", "a@lions.test"))
        .await
        .unwrap();

    let first = alloc.resynchronize(TEAM_SERIES).await.unwrap();
    let second = alloc.resynchronize(TEAM_SERIES).await.unwrap();
    assert_eq!(first, 4);
    assert_eq!(second, 4);

    alloc.reset(TEAM_SERIES, 50).await.unwrap();
    assert_eq!(alloc.resynchronize(TEAM_SERIES).await.unwrap(), 50);
}

#[tokio::test]
async fn test_import_duplicate_code() {
    let registry = memory_registry().await;
    registry
        .register(NewTeam::new("Lions", "a@lions.test"))
        .await
        .unwrap();

    let err = registry
        .import("ICCT-1", NewTeam::new("Tigers", "b@tigers.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateTeam(ref code) if code == "ICCT-001"));
}

#[tokio::test]
async fn test_list_orders_numerically_past_padding() {
    let registry = memory_registry().await;
    registry
        .import("ICCT-1000", NewTeam::new("Lions", "a@lions.test"))
        .await
        .unwrap();
    registry
        .import("ICCT-999", NewTeam::new("Tigers", "b@tigers.test"))
        .await
        .unwrap();
    registry
        .import("ICCT-002", NewTeam::new("Hawks", "c@hawks.test"))
        .await
        .unwrap();

    let codes: Vec<String> = registry
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.team_code)
        .collect();
    assert_eq!(codes, ["ICCT-002", "ICCT-999", "ICCT-1000"]);
}

#[tokio::test]
async fn test_startup_resynchronizes_counter() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("registry.db").display());
    let config = Config::from_url(&url).unwrap();

    {
        let registry = TeamRegistry::open(&config).await.unwrap();
        registry
            .register(NewTeam::new("Lions", "a@lions.test"))
            .await
            .unwrap();
        registry
            .import("ICCT-007", NewTeam::new("Tigers", "b@tigers.test"))
            .await
            .unwrap();
        assert_eq!(
            registry.allocator().current_value(TEAM_SERIES).await.unwrap(),
            1
        );
    }

    let registry = TeamRegistry::open(&config).await.unwrap();
    assert_eq!(
        registry.allocator().current_value(TEAM_SERIES).await.unwrap(),
        7
    );
    let next = registry
        .register(NewTeam::new("Hawks", "c@hawks.test"))
        .await
        .unwrap();
    assert_eq!(next.team_code, "ICCT-008");
}
