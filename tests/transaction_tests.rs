mod support;

use std::time::Duration;

use cyflow::prelude::*;
use cyflow_core::ErrorKind;

use support::{connected, Call, MockTransport};

async fn create(client: &GraphClient, pattern: &str) -> Result<(), CyflowError> {
    client.cypher().create(pattern).execute_without_results().await
}

#[tokio::test]
async fn test_failed_statement_aborts_the_batch() {
    let mock = MockTransport::rest("4.4.0");
    mock.fail("(n:Broken)", "Neo.ClientError.Statement.SemanticError", "cannot create");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let ambient = client.current_transaction().unwrap();

            // Queued until commit.
            create(&client, "(n:X)").await.unwrap();
            create(&client, "(n:Broken)").await.unwrap();
            create(&client, "(n:Y)").await.unwrap();
            assert_eq!(mock.calls(), vec![Call::Begin(1)]);

            let err = tx.commit().await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ServerApplication);
            assert_eq!(err.as_server_exception().unwrap().message, "cannot create");
            assert_eq!(ambient.state(), TransactionState::RolledBack);
            assert!(!client.in_transaction());
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Submit(1, vec!["CREATE (n:X)".into(), "CREATE (n:Broken)".into()]),
            Call::Rollback(1),
        ]
    );
}

#[tokio::test]
async fn test_reading_results_flushes_the_queue() {
    let mock = MockTransport::rest("4.4.0");
    mock.respond("count(n)", &["count(n)"], vec![vec![Value::Integer(1)]]);
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            create(&client, "(n:X)").await.unwrap();
            let count = client
                .cypher()
                .match_("(n:X)")
                .return_::<i64>("count(n)")
                .fetch_one()
                .await
                .unwrap();
            assert_eq!(count, 1);
            tx.commit().await.unwrap();
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Submit(1, vec!["CREATE (n:X)".into(), "MATCH (n:X)\nRETURN count(n)".into()]),
            Call::Commit(1),
        ]
    );
}

#[tokio::test]
async fn test_explicit_flush() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            create(&client, "(n:A)").await.unwrap();
            tx.flush().await.unwrap();
            create(&client, "(n:B)").await.unwrap();
            tx.commit().await.unwrap();
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Submit(1, vec!["CREATE (n:A)".into()]),
            Call::Submit(1, vec!["CREATE (n:B)".into()]),
            Call::Commit(1),
        ]
    );
}

#[tokio::test]
async fn test_bolt_runs_statements_immediately() {
    let mock = MockTransport::bolt("4.4.0");
    mock.fail("(n:Broken)", "Neo.ClientError.Statement.SemanticError", "cannot create");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            create(&client, "(n:X)").await.unwrap();
            assert_eq!(mock.calls().len(), 2);

            let err = create(&client, "(n:Broken)").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ServerApplication);
            assert_eq!(tx.state(), TransactionState::RolledBack);

            let err = create(&client, "(n:Y)").await.unwrap_err();
            assert!(matches!(err.as_usage(), Some(UsageError::TransactionNotOpen { .. })));
            assert!(tx.commit().await.is_err());
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Submit(1, vec!["CREATE (n:X)".into()]),
            Call::Submit(1, vec!["CREATE (n:Broken)".into()]),
            Call::Rollback(1),
        ]
    );
}

#[tokio::test]
async fn test_nested_join_shares_one_transaction() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let outer = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let inner = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            assert!(inner.is_joined());
            assert_eq!(inner.id(), outer.id());
            assert_eq!(outer.join_count(), 1);

            create(&client, "(n:Inner)").await.unwrap();
            inner.commit().await.unwrap();
            assert_eq!(outer.join_count(), 0);
            assert_eq!(outer.state(), TransactionState::Open);
            assert!(!mock.calls().contains(&Call::Commit(1)));

            outer.commit().await.unwrap();
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Submit(1, vec!["CREATE (n:Inner)".into()]),
            Call::Commit(1),
        ]
    );
}

#[tokio::test]
async fn test_joined_commit_after_rollback_fails() {
    let mock = MockTransport::rest("4.4.0");
    mock.fail("(n:Broken)", "Neo.ClientError.Statement.SemanticError", "cannot create");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let outer = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let inner = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();

            create(&client, "(n:Broken)").await.unwrap();
            assert!(outer.flush().await.is_err());
            assert_eq!(outer.state(), TransactionState::RolledBack);

            let err = inner.commit().await.unwrap_err();
            assert_eq!(
                err.as_usage(),
                Some(&UsageError::TransactionNotOpen { state: "rolled back" })
            );
            assert_eq!(outer.join_count(), 0);
            drop(outer);
        })
        .await;

    assert!(!mock.calls().iter().any(|c| matches!(c, Call::Commit(_))));
}

#[tokio::test]
async fn test_commit_with_open_joined_scope() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let outer = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let inner = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let err = outer.commit().await.unwrap_err();
            assert_eq!(
                err.as_usage(),
                Some(&UsageError::OutstandingJoinedScopes { count: 1 })
            );
            assert_eq!(inner.state(), TransactionState::RolledBack);
            drop(inner);
        })
        .await;

    assert_eq!(mock.calls(), vec![Call::Begin(1), Call::Rollback(1)]);
}

#[tokio::test]
async fn test_joined_rollback_dooms_the_transaction() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let outer = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let inner = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            create(&client, "(n:X)").await.unwrap();
            inner.rollback().await.unwrap();

            let err = outer.commit().await.unwrap_err();
            assert!(matches!(err.as_usage(), Some(UsageError::TransactionNotOpen { .. })));
        })
        .await;

    assert_eq!(mock.calls(), vec![Call::Begin(1), Call::Rollback(1)]);
}

#[tokio::test]
async fn test_requires_new_suspends_the_ambient_transaction() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let outer = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let inner = client.begin_transaction(TransactionScopeOption::RequiresNew).await.unwrap();
            assert_ne!(inner.id(), outer.id());
            assert_eq!(client.current_transaction().map(|t| t.id()), inner.id());

            create(&client, "(n:Inner)").await.unwrap();
            inner.commit().await.unwrap();

            assert_eq!(client.current_transaction().map(|t| t.id()), outer.id());
            create(&client, "(n:Outer)").await.unwrap();
            outer.commit().await.unwrap();
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Begin(2),
            Call::Submit(2, vec!["CREATE (n:Inner)".into()]),
            Call::Commit(2),
            Call::Submit(1, vec!["CREATE (n:Outer)".into()]),
            Call::Commit(1),
        ]
    );
}

#[tokio::test]
async fn test_suppress_runs_outside_the_transaction() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let suppressed = client.begin_transaction(TransactionScopeOption::Suppress).await.unwrap();
            assert_eq!(suppressed.state(), TransactionState::NoTransaction);
            assert!(!client.in_transaction());

            create(&client, "(n:Audit)").await.unwrap();
            suppressed.commit().await.unwrap();

            assert!(client.in_transaction());
            create(&client, "(n:Work)").await.unwrap();
            tx.commit().await.unwrap();
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Execute("CREATE (n:Audit)".into()),
            Call::Submit(1, vec!["CREATE (n:Work)".into()]),
            Call::Commit(1),
        ]
    );
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let mock = MockTransport::bolt("4.4.0");
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            create(&client, "(n:X)").await.unwrap();
            drop(tx);
            assert!(!client.in_transaction());
        })
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let calls = mock.calls();
    assert!(calls.contains(&Call::Rollback(1)));
    assert!(!calls.contains(&Call::Commit(1)));
}

#[tokio::test]
async fn test_commit_failure_rolls_back() {
    let mock = MockTransport::rest("4.4.0");
    mock.fail_commit();
    let client = connected(&mock).await;

    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            let ambient = client.current_transaction().unwrap();
            create(&client, "(n:X)").await.unwrap();
            assert!(tx.commit().await.is_err());
            assert_eq!(ambient.state(), TransactionState::RolledBack);
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![
            Call::Begin(1),
            Call::Submit(1, vec!["CREATE (n:X)".into()]),
            Call::Commit(1),
            Call::Rollback(1),
        ]
    );
}

#[tokio::test]
async fn test_contexts_are_isolated() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;
    let first = client.context();
    let second = client.context();
    assert!(!first.same_as(&second));

    first
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            assert!(client.in_transaction());

            second
                .scope(async {
                    assert!(!client.in_transaction());
                    create(&client, "(n:Elsewhere)").await.unwrap();
                })
                .await;

            tx.commit().await.unwrap();
        })
        .await;

    assert_eq!(
        mock.calls(),
        vec![Call::Begin(1), Call::Execute("CREATE (n:Elsewhere)".into()), Call::Commit(1)]
    );
}

#[tokio::test]
async fn test_begin_needs_a_call_context() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;
    let err = client.begin_transaction(TransactionScopeOption::Join).await.unwrap_err();
    assert_eq!(err.as_usage(), Some(&UsageError::NoCallContext));

    let ctx = client.context();
    let tx = client
        .begin_transaction_in(&ctx, TransactionScopeOption::Join)
        .await
        .unwrap();
    assert_eq!(ctx.depth(), 1);
    tx.rollback().await.unwrap();
    assert_eq!(ctx.depth(), 0);
}

#[tokio::test]
async fn test_old_servers_have_no_transactions() {
    let mock = MockTransport::rest("1.9.0");
    let client = connected(&mock).await;
    let err = client
        .context()
        .scope(client.begin_transaction(TransactionScopeOption::Join))
        .await
        .unwrap_err();
    assert!(matches!(err.as_usage(), Some(UsageError::UnsupportedFeature { .. })));
    assert!(mock.calls().is_empty());
}

async fn commit_broken_batch(mock: &MockTransport) -> CyflowError {
    mock.fail("(n:Broken)", "Neo.ClientError.Statement.SemanticError", "cannot create");
    mock.fail_rollback();
    let client = connected(mock).await;
    client
        .context()
        .scope(async {
            let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
            create(&client, "(n:Broken)").await.unwrap();
            tx.commit().await.unwrap_err()
        })
        .await
}

#[tokio::test]
async fn test_rollback_of_a_discarded_transaction_keeps_the_statement_error() {
    let mock = MockTransport::rest("4.4.0");
    let err = commit_broken_batch(&mock).await;
    assert_eq!(err.as_server_exception().unwrap().message, "cannot create");
}

#[tokio::test]
async fn test_failed_rollback_is_chained_to_the_statement_error() {
    // 2.1 servers keep the transaction open after a failed statement.
    let mock = MockTransport::rest("2.1.0");
    let err = commit_broken_batch(&mock).await;
    match err {
        CyflowError::RollbackFailed { rollback, original } => {
            assert_eq!(rollback.as_server_exception().unwrap().exception, "TransactionNotFound");
            assert!(original.unwrap().contains("cannot create"));
        }
        other => panic!("expected a rollback failure, got {other:?}"),
    }
}
