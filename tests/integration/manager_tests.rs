//! Table manager tests against a live database

use crate::common::{
    MEASUREMENT_COLUMNS, Measurement, PERSON_COLUMNS, Person, fresh_manager, test_config,
};
use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use pgmanager::config::{FilterJoin, Settings, SslMode};
use pgmanager::db::{CellValue, ManagerRegistry, TableManager};
use pgmanager::error::ManagerError;
use pgmanager::model::Value;
use std::sync::Arc;

async fn people() -> Option<TableManager<Person>> {
    fresh_manager::<Person>("people", PERSON_COLUMNS, &Arc::new(ManagerRegistry::new())).await
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let mut config = test_config();
    config.host = "127.0.0.1".to_string();
    config.port = 1;
    config.ssl_mode = SslMode::Disable;

    let result = TableManager::<Person>::connect(&config, "people").await;
    assert!(matches!(result, Err(ManagerError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_person_round_trip() {
    let Some(manager) = people().await else {
        return;
    };

    let mut ann = Person::new("Ann", 30);
    let id = manager.save_object(&mut ann).await.unwrap();
    assert!(!id.is_empty());
    assert_eq!(ann.id.as_deref(), Some(id.as_str()));

    let loaded = manager.get_object(&id).await.unwrap();
    assert_eq!(loaded.name, "Ann");
    assert_eq!(loaded.age, 30);

    let adults: Vec<Person> = manager
        .query([("age >=", 18)])
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(adults.len(), 1);
    assert_eq!(adults[0].id.as_deref(), Some(id.as_str()));

    manager.delete_object(&ann).await.unwrap();
    let err = manager.get_object(&id).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {}", err);

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_save_assigns_distinct_ids() {
    let Some(manager) = people().await else {
        return;
    };

    let mut ann = Person::new("Ann", 30);
    let mut bob = Person::new("Bob", 41);
    let first = manager.save_object(&mut ann).await.unwrap();
    let second = manager.save_object(&mut bob).await.unwrap();
    assert_ne!(first, second);

    let everyone: Vec<Person> = manager.all().await.unwrap().try_collect().await.unwrap();
    assert_eq!(everyone.len(), 2);

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_save_with_id_updates_only_that_row() {
    let Some(manager) = people().await else {
        return;
    };

    let mut ann = Person::new("Ann", 30);
    let mut bob = Person::new("Bob", 41);
    let ann_id = manager.save_object(&mut ann).await.unwrap();
    let bob_id = manager.save_object(&mut bob).await.unwrap();

    ann.age = 31;
    let saved_id = manager.save_object(&mut ann).await.unwrap();
    assert_eq!(saved_id, ann_id);

    assert_eq!(manager.get_object(&ann_id).await.unwrap().age, 31);
    assert_eq!(manager.get_object(&bob_id).await.unwrap().age, 41);

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_unset_and_hidden_values_are_not_written() {
    let Some(manager) = people().await else {
        return;
    };

    let mut baby = Person::new("Cy", 0);
    baby.nickname = "never stored".to_string();
    let id = manager.save_object(&mut baby).await.unwrap();

    let results = manager
        .query_sql(
            &format!("SELECT age, tags FROM \"{}\" WHERE id = $1", manager.table()),
            &[&id],
        )
        .await
        .unwrap();
    assert_eq!(results.cell(0, "age"), Some(&CellValue::Null));
    assert_eq!(results.cell(0, "tags"), Some(&CellValue::Null));

    let loaded = manager.get_object(&id).await.unwrap();
    assert_eq!(loaded.age, 0);
    assert!(loaded.tags.is_empty());
    assert!(loaded.nickname.is_empty());

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_list_property_round_trip() {
    let Some(manager) = people().await else {
        return;
    };

    let mut ann = Person::new("Ann", 30);
    ann.tags = vec![
        "admin".to_string(),
        "two words".to_string(),
        r#"quote"and\slash"#.to_string(),
    ];
    let id = manager.save_object(&mut ann).await.unwrap();

    let loaded = manager.get_object(&id).await.unwrap();
    assert_eq!(loaded.tags, ann.tags);

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_lookup() {
    let Some(manager) = people().await else {
        return;
    };

    let mut ann = Person::new("Ann", 30);
    manager.save_object(&mut ann).await.unwrap();
    manager.save_object(&mut Person::new("Bob", 41)).await.unwrap();
    manager.save_object(&mut Person::new("Bob", 12)).await.unwrap();

    let found = manager.lookup("name", "Ann").await.unwrap();
    assert_eq!(found.id, ann.id);

    assert!(matches!(
        manager.lookup("name", "Zed").await,
        Err(ManagerError::NotFound)
    ));
    assert!(matches!(
        manager.lookup("name", "Bob").await,
        Err(ManagerError::MultipleResults)
    ));
    assert!(matches!(
        manager.lookup("salary", 10).await,
        Err(ManagerError::InvalidField(f)) if f == "salary"
    ));
    assert!(matches!(
        manager.lookup("nickname", "x").await,
        Err(ManagerError::InvalidField(_))
    ));

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_query_filters() {
    let Some(manager) = people().await else {
        return;
    };

    for (name, age) in [("Ann", 30), ("Abe", 17), ("Bob", 41)] {
        manager.save_object(&mut Person::new(name, age)).await.unwrap();
    }

    let mut names: Vec<String> = manager
        .query([("age >", Value::from(20)), ("name like", Value::from("A%"))])
        .await
        .unwrap()
        .map_ok(|p| p.name)
        .try_collect()
        .await
        .unwrap();
    names.sort();
    assert_eq!(names, vec!["Ann"]);

    let not_bob: Vec<Person> = manager
        .query([("name !=", "Bob")])
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(not_bob.len(), 2);

    assert!(matches!(
        manager.query([("age", 1)]).await,
        Err(ManagerError::InvalidFilter(_))
    ));
    assert!(matches!(
        manager.query([("height >", 1)]).await,
        Err(ManagerError::InvalidField(_))
    ));

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_query_list_operators() {
    let Some(manager) = people().await else {
        return;
    };

    let mut ann = Person::new("Ann", 30);
    ann.tags = vec!["admin".to_string(), "ops".to_string()];
    let mut bob = Person::new("Bob", 41);
    bob.tags = vec!["ops".to_string()];
    manager.save_object(&mut ann).await.unwrap();
    manager.save_object(&mut bob).await.unwrap();

    let admins: Vec<Person> = manager
        .query([("tags @>", vec!["admin"])])
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].id, ann.id);

    let mut overlapping: Vec<String> = manager
        .query([("tags &&", vec!["ops", "dev"])])
        .await
        .unwrap()
        .map_ok(|p| p.name)
        .try_collect()
        .await
        .unwrap();
    overlapping.sort();
    assert_eq!(overlapping, vec!["Ann", "Bob"]);

    let within: Vec<Person> = manager
        .query([("tags <@", vec!["ops", "dev"])])
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(within.len(), 1);
    assert_eq!(within[0].id, bob.id);

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_comma_join_with_single_filter() {
    let Some(manager) = people().await else {
        return;
    };
    let settings = Settings {
        filter_join: FilterJoin::Comma,
        ..manager.settings().clone()
    };
    let manager = manager.with_settings(settings);

    manager.save_object(&mut Person::new("Ann", 30)).await.unwrap();
    let found: Vec<Person> = manager
        .query([("name =", "Ann")])
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_get_and_set_property() {
    let Some(manager) = people().await else {
        return;
    };

    let mut ann = Person::new("Ann", 30);
    manager.save_object(&mut ann).await.unwrap();

    assert_eq!(
        manager.get_property(&ann, "age").await.unwrap(),
        Value::Integer(30)
    );

    manager.set_property(&ann, "age", 35).await.unwrap();
    assert_eq!(manager.get_property(&ann, "age").await.unwrap().as_integer(), Some(35));

    assert!(matches!(
        manager.get_property(&ann, "height").await,
        Err(ManagerError::InvalidField(_))
    ));

    let ghost = Person {
        id: Some("no-such-row".to_string()),
        ..Person::new("Ghost", 1)
    };
    match manager.get_property(&ghost, "age").await {
        Err(ManagerError::Persistence(msg)) => assert_eq!(msg, "problem getting age"),
        other => panic!("Expected Persistence error, got {:?}", other),
    }

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_delete_object_without_id() {
    let Some(manager) = people().await else {
        return;
    };

    let unsaved = Person::new("Ann", 30);
    assert!(matches!(
        manager.delete_object(&unsaved).await,
        Err(ManagerError::Persistence(_))
    ));

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_scalar_types_round_trip() {
    let Some(manager) = fresh_manager::<Measurement>(
        "measurements",
        MEASUREMENT_COLUMNS,
        &Arc::new(ManagerRegistry::new()),
    )
    .await
    else {
        return;
    };

    let mut sample = Measurement {
        label: "gauge".to_string(),
        ratio: 0.25,
        active: true,
        seen_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
        meta: Some(serde_json::json!({"unit": "cm", "values": [1, 2]})),
        ..Default::default()
    };
    let id = manager.save_object(&mut sample).await.unwrap();

    let loaded = manager.get_object(&id).await.unwrap();
    assert_eq!(loaded, sample);

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_timestamps_survive_session_settings() {
    let Some(manager) = fresh_manager::<Measurement>(
        "measurements",
        MEASUREMENT_COLUMNS,
        &Arc::new(ManagerRegistry::new()),
    )
    .await
    else {
        return;
    };

    manager
        .client()
        .batch_execute("SET TIME ZONE 'America/New_York'; SET DateStyle = 'SQL, DMY'")
        .await
        .unwrap();

    for seen_at in [
        Utc.with_ymd_and_hms(1850, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    ] {
        let mut sample = Measurement {
            label: format!("seen {}", seen_at),
            seen_at: Some(seen_at),
            ..Default::default()
        };
        let id = manager.save_object(&mut sample).await.unwrap();

        assert_eq!(manager.get_object(&id).await.unwrap(), sample);

        let matched: Vec<Measurement> = manager
            .query([("seen_at =", seen_at)])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(matched, vec![sample.clone()]);

        assert_eq!(
            manager.get_property(&sample, "seen_at").await.unwrap(),
            Value::Timestamp(seen_at)
        );
    }

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_query_sql_returns_typed_cells() {
    let Some(manager) = people().await else {
        return;
    };

    manager.save_object(&mut Person::new("Ann", 30)).await.unwrap();
    manager.save_object(&mut Person::new("Bob", 12)).await.unwrap();

    let results = manager
        .query_sql(
            &format!(
                "SELECT count(*) AS n FROM \"{}\" WHERE age >= $1",
                manager.table()
            ),
            &[&18i64],
        )
        .await
        .unwrap();
    assert_eq!(results.row_count, 1);
    assert_eq!(results.cell(0, "n").and_then(CellValue::as_integer), Some(1));

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_create_table_from_model_directory() {
    let config = test_config();
    let manager = match TableManager::<Person>::connect(&config, "people").await {
        Ok(m) => m,
        Err(_) => {
            eprintln!("Skipping test: Database not available");
            return;
        }
    };

    manager
        .client()
        .batch_execute("DROP TABLE IF EXISTS people")
        .await
        .unwrap();
    manager.create_table().await.unwrap();

    let mut ann = Person::new("Ann", 30);
    let id = manager.save_object(&mut ann).await.unwrap();
    assert_eq!(manager.get_object(&id).await.unwrap().name, "Ann");

    manager.delete_table().await.unwrap();
}

#[tokio::test]
async fn test_missing_ddl_file() {
    let config = test_config();
    let manager = match TableManager::<Person>::connect(&config, "unused").await {
        Ok(m) => m.with_settings(Settings {
            ddl_dir: Some(std::env::temp_dir().join("pgmanager-no-such-dir")),
            ..Settings::default()
        }),
        Err(_) => {
            eprintln!("Skipping test: Database not available");
            return;
        }
    };

    match manager.create_table().await {
        Err(ManagerError::Ddl { path, .. }) => assert!(path.ends_with("Person.ddl")),
        other => panic!("Expected Ddl error, got {:?}", other),
    }
}
