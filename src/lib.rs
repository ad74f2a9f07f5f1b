#![doc = r##"
A typed Neo4j client built around a fluent Cypher builder.

`cyflow` keeps Cypher readable: every clause method takes the Cypher you
would type into Neo4j Browser, while literal values are bound as
parameters and results are decoded into Rust types. Queries run over the
HTTP API (`reqwest`) or Bolt ([`neo4rs`] 0.8).

# Quick start

## Define nodes and relationships

```rust
use cyflow::prelude::*;

#[derive(Debug, CyflowNode)]
#[cyflow(label = "Person")]
struct Person {
    #[cyflow(id)]
    id: i64,
    name: String,
    age: Option<i64>,
}

#[derive(Debug, CyflowRelation)]
#[cyflow(type = "KNOWS", from = "Person", to = "Person")]
struct Knows {
    since: i64,
}
```

Both derives implement `FromCyflowValue`, so a `RETURN n` column can be
read as `Node<Person>` (data plus a reference that can start new queries)
or as `Person` alone.

## Build queries

```rust
use cyflow::fluent::CypherFluentQuery;
use cyflow::predicate::prop;

let base = CypherFluentQuery::new().match_("(n:Person)");
let named = base.where_pred(prop("n", "name").eq("Alice"));

// `base` is unchanged.
assert_eq!(base.query_text().unwrap(), "MATCH (n:Person)");

let compiled = named.compile().unwrap();
assert_eq!(compiled.text, "MATCH (n:Person)\nWHERE (n.name = $p0)");
```

Placeholders written in clause text follow the server: `$name` on 3.0 and
later, `{name}` before that.

```rust
use cyflow::clause::Template;

let t = Template::parse("n.name = $name AND n.tag = '$literal'");
assert_eq!(t.render(false), "n.name = {name} AND n.tag = '$literal'");
```

## Run queries

```rust,no_run
use cyflow::prelude::*;

# #[derive(Debug, CyflowNode)]
# #[cyflow(label = "Person")]
# struct Person { #[cyflow(id)] id: i64, name: String }
#[derive(FromCyflow)]
struct NameAge {
    name: String,
    age: i64,
}

# async fn example() -> Result<(), CyflowError> {
let client = GraphClient::connect("http://localhost:7474", "neo4j", "secret").await?;

let alice: Node<Person> = client
    .cypher()
    .match_("(n:Person)")
    .where_("n.name = $name")
    .with_param("name", "Alice")
    .return_::<Node<Person>>("n")
    .fetch_one()
    .await?;

let rows: Vec<NameAge> = client
    .cypher()
    .match_("(n:Person)")
    .return_projection::<NameAge>("n.name AS name, n.age AS age")
    .fetch_all()
    .await?;

// Continue from a returned entity.
let friends: Vec<String> = alice
    .start_query("a")?
    .match_("(a)-[:KNOWS]->(f)")
    .return_::<String>("f.name")
    .fetch_all()
    .await?;
# Ok(())
# }
```

Projection members are filled by column position.

## Transactions

Transactions are ambient: a [`CallContext`] installed around a block of
async code carries them, and every query issued inside the block joins
the innermost one.

```rust,no_run
use cyflow::prelude::*;

# async fn example(client: GraphClient) -> Result<(), CyflowError> {
client.context().scope(async {
    let tx = client.begin_transaction(TransactionScopeOption::Join).await?;
    client.cypher().create("(:Person {name: 'Bob'})").execute_without_results().await?;
    client.cypher().create("(:Person {name: 'Eve'})").execute_without_results().await?;
    tx.commit().await
}).await?;
# Ok(())
# }
```

Over HTTP, statements are queued and sent together at commit, or earlier
when a query inside the transaction needs its rows. Over Bolt they run
immediately. Either way, a failing statement rolls everything back.

## Parameters from Rust values

```rust
use cyflow::prelude::*;
use cyflow::fragment::CypherFragment;

let name = "Alice";
let fragment: CypherFragment = cypher_query! { MATCH (n:Person {name: $name}) };
assert_eq!(fragment.params().len(), 1);
```

`#[derive(ToCyflowParams)]` turns a struct into named parameters for
`with_params_from`, `set_properties` and `create_entity`.

## Configuration

```rust
use cyflow::config::ClientConfig;
use cyflow::transport::TransportKind;

let config = ClientConfig::from_toml_str(r#"
    uri = "neo4j://db.internal:7687"
    password = "secret"
    max_connections = 32
"#).unwrap();
assert_eq!(config.transport_kind().unwrap(), TransportKind::Bolt);
```

# Error handling

Everything returns [`CyflowError`]. [`CyflowError::kind`] tells usage
mistakes, protocol failures, database errors and decoding errors apart:

```text
Person::age (prop 'age'): type mismatch: expected Integer, got String (i64)
```

[`neo4rs`]: https://docs.rs/neo4rs
"##]

mod blocking;

pub mod capabilities;
pub mod clause;
pub mod client;
pub mod compiler;
pub mod config;
pub mod context;
pub mod direction;
pub mod events;
pub mod fluent;
pub mod fragment;
pub mod predicate;
pub mod prelude;
pub mod query;
pub mod stream;
pub mod transaction;
pub mod transport;

pub use cyflow_core as core;
pub use cyflow_macros::{cypher, cypher_query, CyflowEnum, CyflowNode, CyflowRelation, FromCyflow, ToCyflowParams};

pub use cyflow_core::{CyflowError, ErrorKind, ServerException, UsageError};
pub use capabilities::{CypherCapabilities, ServerVersion};
pub use client::GraphClient;
pub use config::{ClientConfig, ClientOptions};
pub use context::CallContext;
pub use fluent::{CypherFluentQuery, EntityQueryExt};
pub use query::CypherQuery;
pub use transaction::{Transaction, TransactionExecutionPolicy, TransactionScopeOption, TransactionState};
