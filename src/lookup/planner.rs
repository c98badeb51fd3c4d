//! Request validation and plan assembly.

use std::sync::Arc;

use tracing::debug;

use crate::lookup::error::LookupError;
use crate::lookup::expr::{is_key_column, is_outside_index, ExprContext};
use crate::lookup::managers::{IndexManager, SchemaManager};
use crate::lookup::plan::{NodeId, OutputSource, Plan, PlanNode};
use crate::lookup::{IndexQueryContext, LookupRequest};
use crate::types::{IndexItem, Schema};

/// Facts about the lookup target collected during validation.
pub struct PlanContext {
    /// Fixed vertex-id width of the space.
    pub vid_len: i32,
    /// Whether vertex ids are integers.
    pub is_int_vid: bool,
    /// Whether the lookup targets edges.
    pub is_edge: bool,
    /// Name of the tag or edge.
    pub schema_name: String,
    /// Every schema version, oldest first; never empty.
    pub schemas: Vec<Arc<Schema>>,
    /// Positions of key-kind return columns, the dedup set.
    pub dedup_col_positions: Vec<usize>,
}

impl PlanContext {
    fn latest_schema(&self) -> Arc<Schema> {
        self.schemas
            .last()
            .cloned()
            .expect("validated context holds at least one schema version")
    }
}

/// Compiler from lookup requests to dataflow plans.
pub struct LookupPlanner<'a> {
    schemas: &'a dyn SchemaManager,
    indexes: &'a dyn IndexManager,
}

impl<'a> LookupPlanner<'a> {
    /// A planner over the serving layer's managers.
    pub fn new(schemas: &'a dyn SchemaManager, indexes: &'a dyn IndexManager) -> Self {
        Self { schemas, indexes }
    }

    /// Validate the request and assemble its plan.
    pub fn plan(&self, req: &LookupRequest) -> Result<Plan, LookupError> {
        let ctx = self.request_check(req)?;
        self.build_plan(req, &ctx)
    }

    /// Resolve the lookup target and capture its schemas.
    pub fn request_check(&self, req: &LookupRequest) -> Result<PlanContext, LookupError> {
        let (vid_len, is_int_vid) = self.schemas.space_vid_len(req.space_id)?;
        let is_edge = req.indices.is_edge;
        let target = req.indices.tag_or_edge_id;

        let (schema_name, schemas) = if is_edge {
            let name = self
                .schemas
                .edge_name(req.space_id, target)
                .ok_or(LookupError::EdgeNotFound)?;
            let schemas = self
                .schemas
                .all_ver_edge_schemas(req.space_id, target)
                .ok_or(LookupError::EdgeNotFound)?;
            (name, schemas)
        } else {
            let name = self
                .schemas
                .tag_name(req.space_id, target)
                .ok_or(LookupError::TagNotFound)?;
            let schemas = self
                .schemas
                .all_ver_tag_schemas(req.space_id, target)
                .ok_or(LookupError::TagNotFound)?;
            (name, schemas)
        };
        if schemas.is_empty() {
            return Err(if is_edge {
                LookupError::EdgeNotFound
            } else {
                LookupError::TagNotFound
            });
        }

        if req.indices.contexts.is_empty() || req.return_columns.is_empty() {
            return Err(LookupError::InvalidOperation);
        }

        let dedup_col_positions = req
            .return_columns
            .iter()
            .enumerate()
            .filter(|(_, col)| is_key_column(col))
            .map(|(pos, _)| pos)
            .collect();

        Ok(PlanContext {
            vid_len,
            is_int_vid,
            is_edge,
            schema_name,
            schemas,
            dedup_col_positions,
        })
    }

    /// Wire one scan chain per context into the dedup/aggregate tail.
    fn build_plan(&self, req: &LookupRequest, ctx: &PlanContext) -> Result<Plan, LookupError> {
        let mut plan = Plan::new();
        let dedup = plan.add_node(PlanNode::DeDup {
            columns: ctx.dedup_col_positions.clone(),
        });
        let aggregate = plan.add_node(PlanNode::Aggregate);

        for query in &req.indices.contexts {
            let index = if ctx.is_edge {
                self.indexes.edge_index(req.space_id, query.index_id)
            } else {
                self.indexes.tag_index(req.space_id, query.index_id)
            }
            .ok_or(LookupError::IndexNotFound)?;

            let has_nullable_col = index.fields.iter().any(|f| f.nullable);

            // A return column that neither key material nor the index
            // fields can answer forces a data fetch.
            let mut need_data = req.return_columns.iter().any(|col| {
                !is_key_column(col) && !index.fields.iter().any(|f| f.name == *col)
            });
            let mut need_filter = query.filter.is_some();
            if let Some(filter) = &query.filter {
                if is_outside_index(filter, &index) {
                    need_data = true;
                    need_filter = true;
                }
            }
            debug!(
                index = query.index_id,
                need_data, need_filter, has_nullable_col, "classified index context"
            );

            let output = match (need_data, need_filter) {
                (false, false) => {
                    self.build_plan_basic(&mut plan, query, has_nullable_col, &index)
                }
                (true, false) => self.build_plan_with_data(&mut plan, query, ctx)?,
                (false, true) => {
                    self.build_plan_with_filter(&mut plan, query, ctx, has_nullable_col, &index)
                }
                (true, true) => self.build_plan_with_data_and_filter(&mut plan, query, ctx)?,
            };
            plan.add_dependency(dedup, output);
        }

        plan.add_dependency(aggregate, dedup);
        plan.set_root(aggregate);
        if plan.dependencies(dedup).is_empty() {
            return Err(LookupError::InvalidPlan);
        }
        Ok(plan)
    }

    fn add_scan(&self, plan: &mut Plan, query: &IndexQueryContext) -> NodeId {
        plan.add_node(PlanNode::IndexScan {
            index_id: query.index_id,
            column_hints: query.column_hints.clone(),
        })
    }

    /// Scan feeding the output directly; index columns answer everything.
    fn build_plan_basic(
        &self,
        plan: &mut Plan,
        query: &IndexQueryContext,
        has_nullable_col: bool,
        index: &IndexItem,
    ) -> NodeId {
        let scan = self.add_scan(plan, query);
        let output = plan.add_node(PlanNode::Output {
            source: OutputSource::IndexRow {
                has_nullable_col,
                fields: index.fields.clone(),
            },
        });
        plan.add_dependency(output, scan);
        output
    }

    /// Scan plus a row fetch; no residual filter.
    fn build_plan_with_data(
        &self,
        plan: &mut Plan,
        query: &IndexQueryContext,
        ctx: &PlanContext,
    ) -> Result<NodeId, LookupError> {
        let scan = self.add_scan(plan, query);
        let fetch = plan.add_node(self.fetch_node(ctx)?);
        plan.add_dependency(fetch, scan);
        let output = plan.add_node(PlanNode::Output {
            source: OutputSource::DataRow,
        });
        plan.add_dependency(output, fetch);
        Ok(output)
    }

    /// Scan plus a filter evaluated over index columns alone.
    fn build_plan_with_filter(
        &self,
        plan: &mut Plan,
        query: &IndexQueryContext,
        ctx: &PlanContext,
        has_nullable_col: bool,
        index: &IndexItem,
    ) -> NodeId {
        let scan = self.add_scan(plan, query);
        let filter = plan.add_node(PlanNode::Filter {
            filter: query.filter.clone().expect("classified as filtering"),
            context: ExprContext::FieldOnly {
                vid_len: ctx.vid_len,
                is_int_vid: ctx.is_int_vid,
                has_nullable_col,
                fields: index.fields.clone(),
            },
        });
        plan.add_dependency(filter, scan);
        let output = plan.add_node(PlanNode::Output {
            source: OutputSource::FilterRow,
        });
        plan.add_dependency(output, filter);
        output
    }

    /// Scan, row fetch, then a schema-aware filter.
    fn build_plan_with_data_and_filter(
        &self,
        plan: &mut Plan,
        query: &IndexQueryContext,
        ctx: &PlanContext,
    ) -> Result<NodeId, LookupError> {
        if ctx.schemas.is_empty() {
            return Err(LookupError::SchemaNotFound);
        }
        let scan = self.add_scan(plan, query);
        let fetch = plan.add_node(self.fetch_node(ctx)?);
        plan.add_dependency(fetch, scan);
        let filter = plan.add_node(PlanNode::Filter {
            filter: query.filter.clone().expect("classified as filtering"),
            context: ExprContext::SchemaAware {
                vid_len: ctx.vid_len,
                is_int_vid: ctx.is_int_vid,
                schema_name: ctx.schema_name.clone(),
                schema: ctx.latest_schema(),
                is_edge: ctx.is_edge,
            },
        });
        plan.add_dependency(filter, fetch);
        let output = plan.add_node(PlanNode::Output {
            source: OutputSource::FilterRow,
        });
        plan.add_dependency(output, filter);
        Ok(output)
    }

    fn fetch_node(&self, ctx: &PlanContext) -> Result<PlanNode, LookupError> {
        if ctx.schemas.is_empty() {
            return Err(LookupError::SchemaNotFound);
        }
        Ok(if ctx.is_edge {
            PlanNode::EdgeFetch {
                edge_name: ctx.schema_name.clone(),
                schemas: ctx.schemas.clone(),
            }
        } else {
            PlanNode::VertexFetch {
                tag_name: ctx.schema_name.clone(),
                schemas: ctx.schemas.clone(),
            }
        })
    }
}
