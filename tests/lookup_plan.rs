//! Plan shape selection over the lookup planner public API.
//!
//! One tag (c1, c2, c3) with an index over (c1, c2); the four canonical
//! hint/yield combinations must select the four plan shapes.

use canopy::lookup::{
    ColumnHint, Expr, IndexQueryContext, IndexSpec, LookupPlanner, LookupRequest,
    MemoryIndexManager, MemorySchemaManager, NodeId, Plan, RelOp, ScanType, Value,
};
use canopy::types::{ColumnDef, IndexItem, PropType, Schema, SchemaId};

const SPACE: i32 = 1;
const TAG: i32 = 7;
const INDEX: i32 = 70;

fn managers() -> (MemorySchemaManager, MemoryIndexManager) {
    let schemas = MemorySchemaManager::new();
    schemas.add_space(SPACE, 8, false);
    schemas.add_tag(
        SPACE,
        TAG,
        "person",
        vec![Schema {
            columns: vec![
                ColumnDef::new("c1", PropType::Int),
                ColumnDef::new("c2", PropType::Int),
                ColumnDef::new("c3", PropType::Int),
            ],
        }],
    );

    let indexes = MemoryIndexManager::new();
    indexes.add_tag_index(
        SPACE,
        IndexItem {
            index_id: INDEX,
            index_name: "i_c1_c2".into(),
            schema_id: SchemaId::Tag(TAG),
            schema_name: "person".into(),
            fields: vec![
                ColumnDef::new("c1", PropType::Int),
                ColumnDef::new("c2", PropType::Int),
            ],
        },
    );
    (schemas, indexes)
}

fn exact_hints() -> Vec<ColumnHint> {
    ["c1", "c2"]
        .iter()
        .map(|col| ColumnHint {
            column: (*col).to_string(),
            scan_type: ScanType::Prefix,
            begin: Some(Value::Int(1)),
            end: None,
        })
        .collect()
}

fn lookup(filter: Option<Expr>, yields: &[&str]) -> LookupRequest {
    LookupRequest {
        space_id: SPACE,
        indices: IndexSpec {
            is_edge: false,
            tag_or_edge_id: TAG,
            contexts: vec![IndexQueryContext {
                index_id: INDEX,
                column_hints: exact_hints(),
                filter,
            }],
        },
        return_columns: yields.iter().map(|c| (*c).to_string()).collect(),
    }
}

fn shape(plan: &Plan) -> Vec<&'static str> {
    let root = plan.root().expect("plan has a root");
    assert_eq!(plan.node(root).kind(), "Aggregate");
    let dedup = plan.dependencies(root);
    assert_eq!(dedup.len(), 1);
    assert_eq!(plan.node(dedup[0]).kind(), "DeDup");
    let outputs = plan.dependencies(dedup[0]);
    assert_eq!(outputs.len(), 1);

    let mut kinds = Vec::new();
    let mut node: NodeId = outputs[0];
    loop {
        kinds.push(plan.node(node).kind());
        match plan.dependencies(node).as_slice() {
            [] => break,
            [next] => node = *next,
            more => panic!("unexpected fan-out {more:?}"),
        }
    }
    kinds.reverse();
    kinds
}

#[test]
fn indexed_hints_and_indexed_yield_scan_only() {
    let (schemas, indexes) = managers();
    let planner = LookupPlanner::new(&schemas, &indexes);
    let plan = planner.plan(&lookup(None, &["c1", "c2"])).unwrap();
    assert_eq!(shape(&plan), vec!["IndexScan", "Output"]);
}

#[test]
fn unindexed_yield_adds_a_vertex_fetch() {
    let (schemas, indexes) = managers();
    let planner = LookupPlanner::new(&schemas, &indexes);
    let plan = planner.plan(&lookup(None, &["c3"])).unwrap();
    assert_eq!(shape(&plan), vec!["IndexScan", "VertexFetch", "Output"]);
}

#[test]
fn residual_filter_over_index_columns_adds_a_filter() {
    let (schemas, indexes) = managers();
    let planner = LookupPlanner::new(&schemas, &indexes);
    let filter = Expr::and(vec![
        Expr::rel(RelOp::Gt, Expr::tag_prop("c1"), Expr::int(1)),
        Expr::rel(RelOp::Gt, Expr::tag_prop("c2"), Expr::int(1)),
    ]);
    let plan = planner.plan(&lookup(Some(filter), &["c1", "c2"])).unwrap();
    assert_eq!(shape(&plan), vec!["IndexScan", "Filter", "Output"]);
}

#[test]
fn foreign_filter_column_adds_fetch_and_filter() {
    let (schemas, indexes) = managers();
    let planner = LookupPlanner::new(&schemas, &indexes);
    let filter = Expr::and(vec![
        Expr::rel(RelOp::Eq, Expr::tag_prop("c1"), Expr::int(1)),
        Expr::rel(RelOp::Eq, Expr::tag_prop("c2"), Expr::int(1)),
        Expr::rel(RelOp::Gt, Expr::tag_prop("c3"), Expr::int(1)),
    ]);
    let plan = planner.plan(&lookup(Some(filter), &["c3"])).unwrap();
    assert_eq!(
        shape(&plan),
        vec!["IndexScan", "VertexFetch", "Filter", "Output"]
    );
}
