use cyflow_macros::{cypher, CyflowEnum, CyflowNode, CyflowRelation, FromCyflow, ToCyflowParams};
use cyflow_core::decode::{decode, DecodeContext};
use cyflow_core::deserializer::{projection, ResultSet};
use cyflow_core::record::ProjectionMatching;
use cyflow_core::traits::{CyflowEnum, CyflowNode, CyflowRelation, FromCyflow, FromCyflowValue, TargetKind, ToCyflowParams};
use cyflow_core::value::{NodeCell, RelationshipCell, Value};
use cyflow_core::{CyflowError, Node};

#[derive(Debug, CyflowNode)]
#[cyflow(label = "Person")]
#[allow(dead_code)]
struct Person {
    #[cyflow(id)]
    id: i64,
    #[cyflow(prop = "Name")]
    name: String,
    age: Option<i64>,
}

#[derive(Debug, CyflowRelation)]
#[cyflow(type = "OWNS", from = "Person|Company", to = "Car")]
#[allow(dead_code)]
struct Owns {
    since: i64,
}

#[derive(Debug, CyflowRelation)]
#[cyflow(type = "FRIEND")]
#[allow(dead_code)]
struct Friend {
    since: chrono::NaiveDate,
}

fn ctx() -> DecodeContext {
    DecodeContext::detached()
}

fn person_cell(props: &[(&str, Value)]) -> NodeCell {
    NodeCell {
        id: 12,
        labels: vec!["Person".into()],
        properties: props.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    }
}

#[test]
fn test_cypher_macro() {
    let query = cypher! {
        MATCH (n:Person) RETURN n
    };
    assert!(query.contains("MATCH") && query.contains("(n:Person)") && query.contains("RETURN n"));
}

#[test]
fn test_node_trait_impl() {
    assert_eq!(Person::LABEL, "Person");
    assert_eq!(Person::PROPERTIES, &["Name", "age"]);
}

#[test]
fn test_relation_trait_impl() {
    assert_eq!(Owns::TYPE, "OWNS");
    assert_eq!(Owns::SOURCE_LABELS, &["Person", "Company"]);
    assert_eq!(Owns::TARGET_LABELS, &["Car"]);
    assert!(Friend::SOURCE_LABELS.is_empty());
}

// --- Auto-derived FromCyflowValue for CyflowNode ---

#[test]
fn test_person_from_node() {
    let cell = person_cell(&[("Name", Value::from("Alice")), ("age", Value::Integer(30))]);
    let person = Person::from_value(Value::Node(cell), &ctx()).unwrap();
    assert_eq!(person.id, 12);
    assert_eq!(person.name, "Alice");
    assert_eq!(person.age, Some(30));
}

#[test]
fn test_missing_property_reads_as_null() {
    let cell = person_cell(&[]);
    let person = Person::from_value(Value::Node(cell), &ctx()).unwrap();
    assert_eq!(person.name, "");
    assert_eq!(person.age, None);
}

#[test]
fn test_missing_property_without_default() {
    let rel = RelationshipCell {
        id: 3,
        rel_type: "FRIEND".into(),
        start_node_id: Some(1),
        end_node_id: Some(2),
        properties: Default::default(),
    };
    let err = Friend::from_value(Value::Relationship(rel), &ctx()).unwrap_err();
    assert!(matches!(err, CyflowError::MissingProperty { .. }));
}

#[test]
fn test_person_wrong_type() {
    let err = Person::from_value(Value::Integer(1), &ctx()).unwrap_err();
    match &err {
        CyflowError::TypeMismatch { expected, got, .. } => {
            assert_eq!(expected, "Node");
            assert_eq!(got, "Integer");
        }
        other => panic!("expected TypeMismatch, got: {other}"),
    }
}

#[test]
fn test_property_error_has_context() {
    let cell = person_cell(&[("Name", Value::Integer(5))]);
    let err = Person::from_value(Value::Node(cell), &ctx()).unwrap_err();
    assert!(err.to_string().contains("Person::name (prop 'Name')"));
}

#[test]
fn test_node_wrapper_of_derived_type() {
    let cell = person_cell(&[("Name", Value::from("Alice"))]);
    let node: Node<Person> = decode(Value::Node(cell), &ctx()).unwrap();
    assert_eq!(node.reference().id(), 12);
    assert_eq!(node.name, "Alice");
}

// --- Auto-derived FromCyflowValue for CyflowRelation ---

#[test]
fn test_relation_date_through_converter() {
    let rel = RelationshipCell {
        id: 10,
        rel_type: "FRIEND".into(),
        start_node_id: Some(1),
        end_node_id: Some(2),
        properties: [("since".to_string(), Value::from("/Date(1262304000000)/"))].into_iter().collect(),
    };
    let friend = Friend::from_value(Value::Relationship(rel), &ctx()).unwrap();
    assert_eq!(friend.since, chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
}

// --- Projection ---

#[derive(Debug, FromCyflow)]
#[allow(dead_code)]
struct InnerResult {
    name: String,
}

#[derive(Debug, FromCyflow)]
#[allow(dead_code)]
struct OuterResult {
    age: i64,
    #[cyflow(flatten)]
    inner: InnerResult,
}

#[test]
fn test_projection_members_flatten() {
    let names: Vec<_> = OuterResult::members().iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["age", "name"]);
}

#[test]
fn test_flatten_reads_following_columns() {
    let rs = ResultSet::new(
        vec!["age".into(), "name".into()],
        vec![vec![Value::Integer(30), Value::from("Alice")]],
    );
    let out: Vec<OuterResult> = projection(rs, ctx(), ProjectionMatching::ByName)
        .unwrap()
        .collect_all()
        .unwrap();
    assert_eq!(out[0].age, 30);
    assert_eq!(out[0].inner.name, "Alice");
}

#[derive(Debug, FromCyflow)]
struct NameAge {
    #[cyflow(column = "Name")]
    name: String,
    #[cyflow(column = "Age")]
    age: i64,
}

#[test]
fn test_column_attribute_names_member() {
    let rs = ResultSet::new(
        vec!["Name".into(), "Age".into()],
        vec![vec![Value::from("Alice"), Value::Integer(30)]],
    );
    let out: Vec<NameAge> = projection(rs, ctx(), ProjectionMatching::ByName)
        .unwrap()
        .collect_all()
        .unwrap();
    assert_eq!(out[0].name, "Alice");
    assert_eq!(out[0].age, 30);
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, CyflowEnum)]
enum Status {
    Active,
    #[cyflow(rename = "on_hold")]
    OnHold,
}

#[test]
fn test_enum_trait_impl() {
    assert_eq!(Status::NAME, "Status");
    assert_eq!(Status::VARIANTS, &["Active", "on_hold"]);
    assert_eq!(Status::OnHold.name(), "on_hold");
    assert_eq!(Value::from(Status::Active), Value::from("Active"));
    assert!(matches!(Status::KIND, TargetKind::Enum { name: "Status", .. }));
}

#[test]
fn test_enum_by_name_case_and_ordinal() {
    assert_eq!(decode::<Status>(Value::from("Active"), &ctx()).unwrap(), Status::Active);
    assert_eq!(decode::<Status>(Value::from("ON_HOLD"), &ctx()).unwrap(), Status::OnHold);
    assert_eq!(decode::<Status>(Value::Integer(1), &ctx()).unwrap(), Status::OnHold);
    assert_eq!(decode::<Option<Status>>(Value::Null, &ctx()).unwrap(), None);
    assert!(decode::<Status>(Value::from("Closed"), &ctx()).is_err());
}

// --- ToCyflowParams ---

#[derive(ToCyflowParams)]
#[allow(dead_code)]
struct CreatePerson {
    #[cyflow(id)]
    internal_id: i64,
    name: String,
    age: i64,
    status: Status,
}

#[test]
fn test_to_cyflow_params_basic() {
    let params = CreatePerson {
        internal_id: 999,
        name: "Alice".into(),
        age: 30,
        status: Status::Active,
    };
    let map = params.to_params();
    assert!(!map.contains_key("internal_id"));
    assert_eq!(map["name"], Value::from("Alice"));
    assert_eq!(map["age"], Value::Integer(30));
    assert_eq!(map["status"], Value::from("Active"));
}

#[derive(ToCyflowParams)]
#[allow(dead_code)]
struct UpdatePerson {
    #[cyflow(skip)]
    _ignored: bool,
    #[cyflow(prop = "person_name")]
    name: String,
}

#[test]
fn test_to_cyflow_params_prop_override() {
    let map = UpdatePerson {
        _ignored: true,
        name: "Bob".into(),
    }
    .to_params();
    assert!(!map.contains_key("_ignored"));
    assert!(!map.contains_key("name"));
    assert_eq!(map["person_name"], Value::from("Bob"));
}
