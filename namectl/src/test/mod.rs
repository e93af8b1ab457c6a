//! End-to-end scenarios through the manager facade.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::data::{CacheStatus, DataSource};
use crate::directory::{InMemoryDirectory, NewUser};
use crate::errors::ErrorKind;
use crate::manager::SelectRequest;
use crate::test_utils::{cached_config, carlos, test_config, test_manager};
use crate::types::{is_valid_candidate, user_data};

#[test_log::test(tokio::test)]
async fn test_e2e_first_suggestions_follow_pattern_order() {
    let manager = test_manager(test_config(), Arc::new(InMemoryDirectory::new()));

    let suggestions = manager.suggest(&carlos()).await.unwrap();

    assert_eq!(suggestions, vec!["carlos.alvarez", "carlosalvarez", "c.alvarez"]);
    let reservations = manager.suggestor().reservations();
    for suggestion in &suggestions {
        assert!(reservations.exists(suggestion), "{suggestion} should be reserved");
    }
}

#[test_log::test(tokio::test)]
async fn test_e2e_repeated_request_continues_the_sequence() {
    let manager = test_manager(test_config(), Arc::new(InMemoryDirectory::new()));

    let first = manager.suggest(&carlos()).await.unwrap();
    let second = manager.suggest(&carlos()).await.unwrap();

    assert_eq!(second, vec!["carlosalvarez1", "carlosalvarez2", "carlosalvarez3"]);
    assert!(first.iter().all(|name| !second.contains(name)));
    assert_eq!(manager.suggestor().reservations().len(), 6);
}

#[test_log::test(tokio::test)]
async fn test_e2e_suggest_select_create() {
    let directory = Arc::new(InMemoryDirectory::new());
    let manager = test_manager(test_config(), directory.clone());

    let suggestions = manager.suggest(&carlos()).await.unwrap();
    let chosen = suggestions[1].clone();
    let request = SelectRequest::from_json_suggestions(&chosen, &serde_json::to_string(&suggestions).unwrap()).unwrap();
    manager.select(&request).unwrap();

    let reservations = manager.suggestor().reservations();
    assert!(reservations.exists(&chosen));
    for released in suggestions.iter().filter(|s| **s != chosen) {
        assert!(!reservations.exists(released));
    }

    let account = user_data([
        ("username", chosen.as_str()),
        ("firstname", "Carlos"),
        ("lastname", "Álvarez"),
        ("password", "s3cret-pass"),
    ]);
    manager.create_from_user_data(&account).await.unwrap();
    assert!(directory.exists(&chosen).await.unwrap());
    assert!(manager.suggestor().reservations().is_empty());

    // The released names come back, the created one never does
    let again = manager.suggest(&carlos()).await.unwrap();
    assert_eq!(again, vec!["carlos.alvarez", "c.alvarez", "carlosalvarez1"]);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_e2e_cached_lookups_and_created_accounts() {
    let directory = Arc::new(InMemoryDirectory::with_usernames(["carlos.alvarez", "carlosalvarez"]).with_page_size(1));
    let manager = test_manager(cached_config(), directory.clone());
    let cache = manager.context().cache().unwrap().clone();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(cache.status(), CacheStatus::Ready);
    assert_eq!(cache.generation_size(), Some(2));

    let suggestions = manager.suggest(&carlos()).await.unwrap();
    assert_eq!(suggestions, vec!["c.alvarez", "carlosalvarez1", "carlosalvarez2"]);

    manager
        .create(&NewUser::new("c.alvarez", "Carlos", "Álvarez", "s3cret-pass"))
        .await
        .unwrap();
    // Known to the cache before the next refresh
    assert!(cache.exists("c.alvarez").await.unwrap());

    // Lookups no longer reach the directory
    directory.set_unavailable(true);
    manager
        .select(&SelectRequest::new("c.alvarez", suggestions.clone()))
        .unwrap();
    let again = manager.suggest(&carlos()).await.unwrap();
    assert_eq!(again, vec!["carlosalvarez1", "carlosalvarez2", "carlosalvarez3"]);

    manager.context().shutdown().await;
}

#[test_log::test(tokio::test)]
async fn test_e2e_account_created_during_refresh_survives_the_swap() {
    let directory = Arc::new(InMemoryDirectory::with_usernames(["m", "n", "o", "p"]).with_page_size(1));
    let mut config = cached_config();
    // Drive refreshes by hand
    config.cache.initial_delay = Duration::from_secs(24 * 60 * 60);
    let manager = test_manager(config, directory.clone());
    let cache = manager.context().cache().unwrap().clone();
    cache.refresh().await.unwrap();

    let gate = directory.pause_next_enumeration();
    let refresh = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.refresh().await })
    };
    gate.paused().await;
    assert_eq!(cache.status(), CacheStatus::Refreshing);

    // Enumeration is already past "carlos.alvarez", only the replay can carry it over
    manager
        .create(&NewUser::new("carlos.alvarez", "Carlos", "Álvarez", "s3cret-pass"))
        .await
        .unwrap();

    gate.release();
    refresh.await.unwrap().unwrap();

    assert_eq!(cache.status(), CacheStatus::Ready);
    assert!(cache.exists("carlos.alvarez").await.unwrap());
    assert_eq!(cache.generation_size(), Some(5));
    assert_eq!(cache.pending_len(), 0);

    let suggestions = manager.suggest(&carlos()).await.unwrap();
    assert_eq!(suggestions, vec!["carlosalvarez", "c.alvarez", "carlosalvarez1"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_e2e_concurrent_callers_get_disjoint_suggestions() {
    let directory = Arc::new(InMemoryDirectory::with_usernames(["carlos.alvarez", "carlosalvarez3"]));
    let manager = Arc::new(test_manager(test_config(), directory));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let suggestions = manager.suggest(&carlos()).await.unwrap();
                // Half the callers pick right away and release the rest
                if i % 2 == 0 {
                    manager
                        .select(&SelectRequest::new(&suggestions[0], suggestions.clone()))
                        .unwrap();
                }
                suggestions
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        let suggestions = handle.await.unwrap();
        assert_eq!(suggestions.len(), 3);
        all.push(suggestions);
    }

    // Names offered to callers that never selected are still exclusively theirs
    let mut held = HashSet::new();
    for (i, suggestions) in all.iter().enumerate() {
        assert!(!suggestions.contains(&"carlos.alvarez".to_string()));
        assert!(!suggestions.contains(&"carlosalvarez3".to_string()));
        if i % 2 == 1 {
            for name in suggestions {
                assert!(held.insert(name.clone()), "{name} offered to two callers at once");
            }
        }
    }
}

#[test_log::test(tokio::test)]
async fn test_e2e_unusual_names() {
    let manager = test_manager(test_config(), Arc::new(InMemoryDirectory::new()));
    let people = [
        user_data([("firstname", "Zoë"), ("lastname", "O'Connor-Ñúñez")]),
        user_data([("firstname", "  Jean Luc "), ("lastname", "Picard")]),
        user_data([("firstname", "李"), ("lastname", "王")]),
    ];

    for person in &people {
        let suggestions = manager.suggest(person).await.unwrap();
        assert_eq!(suggestions.len(), 3);
        for suggestion in &suggestions {
            assert!(!suggestion.is_empty());
            assert!(is_valid_candidate(suggestion), "{suggestion} is not a valid username");
        }
    }

    let first = manager.suggest(&people[0]).await.unwrap();
    assert!(first.iter().all(|s| s.starts_with("zoe") || s.starts_with("z.")));
}

#[test_log::test(tokio::test)]
async fn test_e2e_errors_are_structured() {
    let directory = Arc::new(InMemoryDirectory::new());
    let manager = test_manager(cached_config(), directory.clone());
    directory.set_unavailable(true);

    // The cache has no generation yet, so the directory is consulted and fails
    let outcome = manager.suggest_outcome(&carlos()).await;
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["kind"], ErrorKind::Directory.to_string());
    assert!(!json["error"]["message"].as_str().unwrap().contains("refused"));

    manager.context().shutdown().await;
}
