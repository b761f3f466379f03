//! Concurrent writers against one database file
//!
//! Operations for different accounts must not fail each other.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wordmate_api::models::{NewAccount, ProgressPayload, SyncBatch};
use wordmate_api::services::{AccountService, MergeEngine, Pbkdf2PasswordHasher};
use wordmate_common::config::ProgressSettings;
use wordmate_common::db::init_database;

const ACCOUNTS: usize = 16;
const WORDS_PER_SYNC: usize = 20;

async fn file_pool() -> (sqlx::SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("wordmate.db")).await.unwrap();
    (pool, dir)
}

fn account_service(pool: &sqlx::SqlitePool) -> AccountService {
    AccountService::new(
        pool.clone(),
        Arc::new(Pbkdf2PasswordHasher::with_rounds(1_000)),
        Arc::new(ProgressSettings::default()),
    )
}

fn new_account(n: usize) -> NewAccount {
    NewAccount {
        email: format!("kid{}@example.com", n),
        username: format!("kid{}", n),
        ..NewAccount::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_syncs_for_different_accounts_all_succeed() {
    let (pool, _dir) = file_pool().await;
    let accounts = account_service(&pool);

    let mut user_ids = Vec::new();
    for n in 0..ACCOUNTS {
        user_ids.push(accounts.register(&new_account(n)).await.unwrap().account.id);
    }

    let mut handles = Vec::new();
    for user_id in user_ids.clone() {
        let engine = MergeEngine::new(pool.clone());
        handles.push(tokio::spawn(async move {
            let words = (0..WORDS_PER_SYNC)
                .map(|i| json!({"word_id": format!("word_{}", i), "mastery_level": 1.5, "repetitions": 1}))
                .collect();
            let batch = SyncBatch::from_payload(&ProgressPayload {
                words,
                sessions: Vec::new(),
                stats: Some(json!({"total_words_learned": 20, "current_streak": 1, "max_streak": 1})),
            });
            engine.sync(&user_id, &batch).await
        }));
    }

    let mut failures = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => assert_eq!(outcome.updated_count, WORDS_PER_SYNC),
            Err(e) => failures.push(e.to_string()),
        }
    }
    assert!(failures.is_empty(), "failed syncs: {:?}", failures);

    for user_id in &user_ids {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_words WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, WORDS_PER_SYNC as i64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_all_succeed() {
    let (pool, _dir) = file_pool().await;

    let mut handles = Vec::new();
    for n in 0..ACCOUNTS {
        let accounts = account_service(&pool);
        handles.push(tokio::spawn(async move {
            let mut request = new_account(n);
            request.trial_data = Some(ProgressPayload {
                words: vec![json!({"word_id": "apple", "mastery_level": 2.0})],
                sessions: vec![json!({"practice_type": "typing"})],
                stats: None,
            });
            accounts.register(&request).await
        }));
    }

    for handle in handles {
        let registration = handle.await.unwrap();
        assert!(registration.is_ok(), "{:?}", registration.err());
    }

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, ACCOUNTS as i64);
}
