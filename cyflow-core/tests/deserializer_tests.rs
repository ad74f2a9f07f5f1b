use cyflow_core::decode::DecodeContext;
use cyflow_core::deserializer::{projection, single_column, ResultSet};
use cyflow_core::record::{Cells, ProjectionMatching};
use cyflow_core::traits::{FromCyflow, ProjectionMember};
use cyflow_core::value::Value;
use cyflow_core::{decode, CyflowError};

#[derive(Debug, PartialEq)]
struct NameAge {
    name: String,
    age: i64,
}

impl FromCyflow for NameAge {
    fn members() -> Vec<ProjectionMember> {
        vec![
            ProjectionMember { name: "Name", type_name: "String" },
            ProjectionMember { name: "Age", type_name: "i64" },
        ]
    }

    fn from_cells(cells: &mut Cells<'_>, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        Ok(NameAge {
            name: decode(cells.next_cell("Name", "NameAge")?, ctx)?,
            age: decode(cells.next_cell("Age", "NameAge")?, ctx)?,
        })
    }
}

fn rs(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
    ResultSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

#[test]
fn test_single_column() {
    let result = rs(&["n"], vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
    let out: Vec<i64> = single_column(result, DecodeContext::detached())
        .unwrap()
        .collect_all()
        .unwrap();
    assert_eq!(out, vec![1, 2]);
}

#[test]
fn test_single_column_rejects_two_columns() {
    let result = rs(&["a", "b"], vec![vec![Value::Integer(1), Value::Integer(2)]]);
    let err = single_column::<i64>(result, DecodeContext::detached()).unwrap_err();
    assert!(matches!(err, CyflowError::ColumnCountMismatch { expected: 1, actual: 2, .. }));
}

#[test]
fn test_empty_result_is_empty_sequence() {
    let out = single_column::<i64>(rs(&["a", "b"], vec![]), DecodeContext::detached()).unwrap();
    assert_eq!(out.count(), 0);
    let out = projection::<NameAge>(rs(&[], vec![]), DecodeContext::detached(), ProjectionMatching::Positional)
        .unwrap();
    assert_eq!(out.count(), 0);
}

#[test]
fn test_projection_is_positional() {
    let result = rs(&["Name", "Age"], vec![vec![Value::from("Alice"), Value::Integer(30)]]);
    let out: Vec<NameAge> = projection(result, DecodeContext::detached(), ProjectionMatching::Positional)
        .unwrap()
        .collect_all()
        .unwrap();
    assert_eq!(out, vec![NameAge { name: "Alice".into(), age: 30 }]);
}

#[test]
fn test_reordered_columns_misalign_positionally() {
    // Name receives the Age cell; the Integer is not a String.
    let result = rs(&["Age", "Name"], vec![vec![Value::Integer(30), Value::from("Alice")]]);
    let mut out = projection::<NameAge>(result, DecodeContext::detached(), ProjectionMatching::Positional).unwrap();
    let err = out.next().unwrap().unwrap_err();
    assert!(matches!(err.root(), CyflowError::TypeMismatch { .. }));
}

#[test]
fn test_reordered_columns_rejected_by_name() {
    let result = rs(&["Age", "Name"], vec![vec![Value::Integer(30), Value::from("Alice")]]);
    let mut out = projection::<NameAge>(result, DecodeContext::detached(), ProjectionMatching::ByName).unwrap();
    match out.next().unwrap().unwrap_err() {
        CyflowError::ColumnNameMismatch { position, expected, actual } => {
            assert_eq!(position, 0);
            assert_eq!(expected, "Name");
            assert_eq!(actual, "Age");
        }
        other => panic!("expected ColumnNameMismatch, got {other}"),
    }
}

#[test]
fn test_projection_column_count_mismatch() {
    let result = rs(&["Name"], vec![vec![Value::from("Alice")]]);
    let err = projection::<NameAge>(result, DecodeContext::detached(), ProjectionMatching::Positional).unwrap_err();
    assert!(matches!(err, CyflowError::ColumnCountMismatch { expected: 2, actual: 1, .. }));
}

#[test]
fn test_null_cell_defaults_member() {
    let result = rs(&["Name", "Age"], vec![vec![Value::from("Alice"), Value::Null]]);
    let out: Vec<NameAge> = projection(result, DecodeContext::detached(), ProjectionMatching::Positional)
        .unwrap()
        .collect_all()
        .unwrap();
    assert_eq!(out[0].age, 0);
}

#[test]
fn test_results_are_single_pass() {
    let result = rs(&["n"], vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
    let mut out = single_column::<i64>(result, DecodeContext::detached()).unwrap();
    assert_eq!(out.remaining(), 2);
    assert_eq!(out.next().unwrap().unwrap(), 1);
    assert_eq!(out.remaining(), 1);
    assert_eq!(out.next().unwrap().unwrap(), 2);
    assert!(out.next().is_none());
}

#[test]
fn test_cells_hand_out_values_in_column_order() {
    let columns = vec!["Name".to_string(), "Age".to_string()];
    let mut cells = Cells::new(&columns, vec![Value::from("Alice"), Value::Integer(30)], ProjectionMatching::ByName);
    assert_eq!(cells.next_cell("Name", "NameAge").unwrap(), Value::from("Alice"));
    assert_eq!(cells.next_cell("Age", "NameAge").unwrap(), Value::Integer(30));
    assert!(matches!(
        cells.next_cell("Extra", "NameAge").unwrap_err(),
        CyflowError::MissingField { .. }
    ));
}
