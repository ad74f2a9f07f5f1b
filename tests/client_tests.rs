mod support;

use std::sync::{Arc, Mutex};

use cyflow::events::OperationCompletedEvent;
use cyflow::prelude::*;
use cyflow_core::ErrorKind;

use support::{connected, connected_with, node, Call, MockTransport};

#[derive(Debug, CyflowNode)]
#[cyflow(label = "Person")]
struct Person {
    #[cyflow(id)]
    id: i64,
    #[cyflow(prop = "Name")]
    name: String,
    #[cyflow(prop = "Age")]
    age: Option<i64>,
}

#[derive(Debug, PartialEq, FromCyflow)]
struct NameAge {
    #[cyflow(column = "Name")]
    name: String,
    #[cyflow(column = "Age")]
    age: i64,
}

fn alice() -> Value {
    node(
        1,
        "Person",
        &[("Name", Value::from("Alice")), ("Age", Value::Integer(30))],
    )
}

#[tokio::test]
async fn test_node_results_with_legacy_placeholder() {
    let mock = MockTransport::rest("2.3.0");
    mock.respond("MATCH (n:Person)", &["n"], vec![vec![alice()]]);
    let client = connected(&mock).await;

    let people: Vec<Node<Person>> = client
        .cypher()
        .match_("(n:Person)")
        .where_("n.Name = {name}")
        .with_param("name", "Alice")
        .return_::<Node<Person>>("n")
        .fetch_all()
        .await
        .unwrap();

    assert_eq!(people.len(), 1);
    assert_eq!(people[0].name, "Alice");
    assert_eq!(people[0].age, Some(30));
    assert_eq!(people[0].id, 1);
    assert_eq!(people[0].reference().id(), 1);
    assert!(!people[0].reference().is_detached());
    assert_eq!(
        mock.calls(),
        vec![Call::Execute("MATCH (n:Person)\nWHERE n.Name = {name}\nRETURN n".into())]
    );
}

#[tokio::test]
async fn test_entities_start_new_queries() {
    let mock = MockTransport::bolt("4.4.0");
    mock.respond("MATCH (n:Person)", &["n"], vec![vec![alice()]]);
    mock.respond("RETURN f.Name", &["f.Name"], vec![vec!["Bob".into()], vec!["Eve".into()]]);
    let client = connected(&mock).await;

    let alice: Node<Person> = client
        .cypher()
        .match_("(n:Person)")
        .return_::<Node<Person>>("n")
        .fetch_one()
        .await
        .unwrap();

    let friends: Vec<String> = alice
        .start_query("a")
        .unwrap()
        .match_("(a)-[:KNOWS]->(f)")
        .return_::<String>("f.Name")
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(friends, vec!["Bob", "Eve"]);
    assert_eq!(
        mock.statements()[1],
        "MATCH (a)\nWHERE id(a) IN $p0\nMATCH (a)-[:KNOWS]->(f)\nRETURN f.Name"
    );
}

#[tokio::test]
async fn test_detached_reference_is_a_usage_error() {
    let detached = NodeReference::detached(42);
    let err = detached.start_query("n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(matches!(
        err.as_usage(),
        Some(UsageError::DetachedReference { entity: "node", id: 42 })
    ));

    let rel = RelationshipReference::detached(5);
    assert!(matches!(
        rel.start_query("r").unwrap_err().as_usage(),
        Some(UsageError::DetachedReference { .. })
    ));
}

#[tokio::test]
async fn test_reference_outliving_client_is_detached() {
    let mock = MockTransport::bolt("5.0.0");
    mock.respond("RETURN n", &["n"], vec![vec![alice()]]);
    let client = connected(&mock).await;
    let reference = client
        .cypher()
        .match_("(n:Person)")
        .return_::<NodeReference>("n")
        .fetch_one()
        .await
        .unwrap();
    drop(client);
    assert!(matches!(
        reference.start_query("n").unwrap_err().as_usage(),
        Some(UsageError::DetachedReference { .. })
    ));
}

#[tokio::test]
async fn test_projection_is_positional() {
    let mock = MockTransport::rest("3.5.14");
    mock.respond("AS Extra", &["Name", "Age", "Extra"], vec![vec!["A".into(), Value::Integer(1), Value::Null]]);
    mock.respond("AS Name, n.Age AS Age", &["Name", "Age"], vec![vec!["Alice".into(), Value::Integer(30)]]);
    mock.respond("AS Age, n.Name AS Name", &["Age", "Name"], vec![vec![Value::Integer(30), "Alice".into()]]);
    let client = connected(&mock).await;

    let rows: Vec<NameAge> = client
        .cypher()
        .match_("(n:Person)")
        .return_projection::<NameAge>("n.Name AS Name, n.Age AS Age")
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![NameAge {
            name: "Alice".into(),
            age: 30
        }]
    );

    // Reordered columns still fill members by position.
    let err = client
        .cypher()
        .match_("(n:Person)")
        .return_projection::<NameAge>("n.Age AS Age, n.Name AS Name")
        .fetch_all()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialization);
    assert!(matches!(err.root(), CyflowError::TypeMismatch { .. }));

    let err = client
        .cypher()
        .match_("(n:Person)")
        .return_projection::<NameAge>("n.Name AS Name, n.Age AS Age, 1 AS Extra")
        .results()
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        CyflowError::ColumnCountMismatch { expected: 2, actual: 3, .. }
    ));
}

#[tokio::test]
async fn test_projection_by_name() {
    let mock = MockTransport::rest("3.5.14");
    mock.respond("RETURN", &["Age", "Name"], vec![vec![Value::Integer(30), "Alice".into()]]);
    let options = ClientOptions::default().with_projection_matching(ProjectionMatching::ByName);
    let client = connected_with(&mock, options).await;

    let err = client
        .cypher()
        .match_("(n:Person)")
        .return_projection::<NameAge>("n.Age AS Age, n.Name AS Name")
        .fetch_all()
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        CyflowError::ColumnNameMismatch { position: 0, .. }
    ));
}

#[tokio::test]
async fn test_fetch_one_and_optional() {
    let mock = MockTransport::bolt("5.0.0");
    let client = connected(&mock).await;
    let q = client.cypher().match_("(n:Nothing)").return_::<i64>("count(n)");

    assert_eq!(q.fetch_optional().await.unwrap(), None);
    let err = q.fetch_one().await.unwrap_err();
    assert!(matches!(err, CyflowError::MissingField { .. }));
}

#[tokio::test]
async fn test_stream_decodes_row_by_row() {
    let mock = MockTransport::bolt("5.0.0");
    mock.respond(
        "RETURN x",
        &["x"],
        vec![vec![Value::Integer(1)], vec!["two".into()], vec![Value::Integer(3)]],
    );
    let client = connected(&mock).await;

    let mut stream = client
        .cypher()
        .unwind("[1, 'two', 3] AS x")
        .return_::<i64>("x")
        .stream()
        .await
        .unwrap();
    assert_eq!(stream.columns(), ["x"]);
    assert_eq!(stream.next().await.unwrap().unwrap(), 1);
    assert!(stream.next().await.unwrap().is_err());
    assert_eq!(stream.next().await.unwrap().unwrap(), 3);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_not_connected() {
    let mock = MockTransport::bolt("5.0.0");
    let client = GraphClient::new(mock.clone(), ClientOptions::default());
    assert!(!client.is_connected());

    let err = client
        .cypher()
        .match_("(n)")
        .return_::<i64>("count(n)")
        .fetch_all()
        .await
        .unwrap_err();
    assert_eq!(err.as_usage(), Some(&UsageError::NotConnected));

    let err = CypherFluentQuery::new()
        .create("(n:X)")
        .execute_without_results()
        .await
        .unwrap_err();
    assert_eq!(err.as_usage(), Some(&UsageError::NotConnected));
    assert!(mock.calls().is_empty());

    client.connect_transport().await.unwrap();
    assert_eq!(client.server_version().map(|v| v.major), Some(5));
}

#[tokio::test]
async fn test_server_errors_are_structured() {
    let mock = MockTransport::rest("4.4.0");
    mock.fail("CREATE", "Neo.ClientError.Schema.ConstraintValidationFailed", "already exists");
    let client = connected(&mock).await;

    let err = client.cypher().create("(n:X {id: 1})").execute_without_results().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerApplication);
    let exception = err.as_server_exception().unwrap();
    assert_eq!(exception.exception, "ConstraintValidationFailed");
    assert_eq!(exception.message, "already exists");
}

#[tokio::test]
async fn test_errors_carry_query_text_when_enabled() {
    let mock = MockTransport::rest("4.4.0");
    mock.fail("CREATE", "Neo.ClientError.Statement.SyntaxError", "bad");
    let options = ClientOptions::default().include_query_in_errors(true);
    let client = connected_with(&mock, options).await;

    let err = client.cypher().create("(n:X").execute_without_results().await.unwrap_err();
    match &err {
        CyflowError::Query { query, .. } => assert_eq!(query, "CREATE (n:X"),
        other => panic!("expected query context, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::ServerApplication);
    assert!(err.to_string().contains("CREATE (n:X"));
}

#[tokio::test]
async fn test_operation_completed_events() {
    let mock = MockTransport::bolt("5.0.0");
    mock.respond("RETURN n.Name", &["n.Name"], vec![vec!["A".into()], vec!["B".into()]]);
    mock.fail("BROKEN", "Neo.ClientError.Statement.SyntaxError", "bad");
    let client = connected(&mock).await;

    let events: Arc<Mutex<Vec<OperationCompletedEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    client.on_operation_completed(move |e| sink.lock().unwrap().push(e.clone()));

    client
        .cypher()
        .match_("(n:Person)")
        .identifier("names")
        .return_::<String>("n.Name")
        .fetch_all()
        .await
        .unwrap();
    let _ = client.cypher().raw("BROKEN").execute_without_results().await;

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].identifier.as_deref(), Some("names"));
    assert_eq!(events[0].resources_returned, 2);
    assert!(!events[0].has_error());
    assert_eq!(events[1].query_text, "BROKEN");
    assert!(events[1].error.as_deref().unwrap().contains("bad"));
}

#[tokio::test]
async fn test_execution_policy() {
    let mock = MockTransport::bolt("5.0.0");
    let client = connected(&mock).await;

    let err = client
        .cypher()
        .create("(n:X)")
        .execution_policy(TransactionExecutionPolicy::Required)
        .execute_without_results()
        .await
        .unwrap_err();
    assert_eq!(err.as_usage(), Some(&UsageError::TransactionRequired));

    let ctx = client.context();
    ctx.scope(async {
        let tx = client.begin_transaction(TransactionScopeOption::Join).await.unwrap();
        let err = client
            .cypher()
            .create("(n:X)")
            .execution_policy(TransactionExecutionPolicy::Denied)
            .execute_without_results()
            .await
            .unwrap_err();
        assert_eq!(err.as_usage(), Some(&UsageError::TransactionDenied));
        client
            .cypher()
            .create("(n:Y)")
            .execution_policy(TransactionExecutionPolicy::Required)
            .execute_without_results()
            .await
            .unwrap();
        tx.commit().await.unwrap();
    })
    .await;

    assert_eq!(mock.statements(), vec!["CREATE (n:Y)".to_string()]);
}

#[tokio::test]
async fn test_clients_are_shareable() {
    fn assert_send_sync<T: Send + Sync + Clone>() {}
    assert_send_sync::<GraphClient>();

    let mock = MockTransport::bolt("5.0.0");
    let client = connected(&mock).await;
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .cypher()
                    .create(&format!("(:N {{i: {i}}})"))
                    .execute_without_results()
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(mock.statements().len(), 4);
}

#[tokio::test]
async fn test_fragment_from_macro() {
    let mock = MockTransport::bolt("5.0.0");
    mock.respond("RETURN n", &["n"], vec![vec![alice()]]);
    let client = connected(&mock).await;

    let name = "Alice";
    let people = client
        .cypher()
        .fragment(cypher_query! { MATCH (n:Person {Name: $name}) })
        .return_::<Node<Person>>("n")
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(people.len(), 1);
    let sent = &mock.statements()[0];
    assert!(sent.starts_with("MATCH (n:Person"));
    assert!(sent.contains("$name"));
    assert!(sent.ends_with("\nRETURN n"));
}

#[tokio::test]
async fn test_compiled_query_matches_what_is_sent() {
    let mock = MockTransport::rest("4.4.0");
    let client = connected(&mock).await;

    let scalars = client.cypher().match_("(n:Person)").return_::<String>("n.Name").limit(5);
    let compiled = scalars.compile().unwrap();
    assert_eq!(compiled.result_mode, cyflow_core::ResultMode::SingleColumn);
    assert_eq!(compiled.result_format, cyflow_core::ResultFormat::RestGraph);
    assert_eq!(compiled.text, "MATCH (n:Person)\nRETURN n.Name\nLIMIT $p0");

    scalars.fetch_all().await.unwrap();
    assert_eq!(mock.statements(), vec![compiled.text]);

    let entities = client.cypher().match_("(n:Person)").return_::<Node<Person>>("n").compile().unwrap();
    assert_eq!(entities.result_mode, cyflow_core::ResultMode::Set);
    assert_eq!(entities.result_format, cyflow_core::ResultFormat::Rest);
}
