//! Deterministic text assembly for the final statement and semantic views.

use std::collections::BTreeMap;

use super::expr::SelectExpression;
use super::resolve::ResolvedExpressions;
use crate::features::JoinModelSpec;

/// Identity of a compile, written as a comment header on the final statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHeader<'a> {
    pub pipeline_name: &'a str,
    pub pipeline_version: &'a str,
    pub compiled_at: &'a str,
    pub feature_keys: &'a [String],
}

pub fn render_join_clause(join: &JoinModelSpec) -> String {
    format!(
        "{} JOIN {} {} ON {}",
        join.join_type.as_sql(),
        join.model_name,
        join.alias,
        join.on
    )
}

/// `SELECT` over one relation with optional joins.
pub fn render_select_statement(
    select_expressions: &[String],
    from_model: &str,
    from_alias: &str,
    join_clauses: &[String],
) -> String {
    let select_lines: Vec<String> = select_expressions
        .iter()
        .map(|expr| format!("  {expr}"))
        .collect();
    let mut sql = format!(
        "SELECT\n{}\nFROM {from_model} {from_alias}",
        select_lines.join(",\n")
    );
    for join in join_clauses {
        sql.push('\n');
        sql.push_str(join);
    }
    sql
}

fn indent(sql: &str) -> String {
    sql.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn layer_select(relation: &str, exprs: &[SelectExpression]) -> String {
    let lines: Vec<String> = std::iter::once(format!("  {relation}.*"))
        .chain(exprs.iter().map(|expr| format!("  {}", expr.render())))
        .collect();
    format!("SELECT\n{}\nFROM {relation}", lines.join(",\n"))
}

/// Wrap `base_sql` in `WITH base AS (...)`, adding one layer per derived group.
///
/// A single derived group yields `SELECT base.*, ... FROM base`; deeper
/// groups go through `derived_1`, `derived_2`, ... CTEs.
pub fn render_with_layers(base_sql: &str, derived_layers: &[Vec<SelectExpression>]) -> String {
    let Some((last, inner)) = derived_layers.split_last() else {
        return base_sql.to_string();
    };

    let mut ctes = vec![format!("base AS (\n{}\n)", indent(base_sql))];
    let mut relation = "base".to_string();
    for (index, layer) in inner.iter().enumerate() {
        let name = format!("derived_{}", index + 1);
        ctes.push(format!(
            "{name} AS (\n{}\n)",
            indent(&layer_select(&relation, layer))
        ));
        relation = name;
    }

    format!("WITH {}\n{}", ctes.join(",\n"), layer_select(&relation, last))
}

/// The enriched statement: spine columns and base expressions over the spine,
/// joined feature models, then derived layers.
pub fn render_final_sql(
    spine_model: &str,
    spine_alias: &str,
    spine_columns: &[String],
    resolved: &ResolvedExpressions,
    joins: &[&JoinModelSpec],
) -> String {
    let selects: Vec<String> = spine_columns
        .iter()
        .map(|column| format!("{spine_alias}.{column} AS {column}"))
        .chain(resolved.base.iter().map(SelectExpression::render))
        .collect();
    let join_clauses: Vec<String> = joins.iter().map(|join| render_join_clause(join)).collect();
    let base_sql = render_select_statement(&selects, spine_model, spine_alias, &join_clauses);
    render_with_layers(&base_sql, &resolved.derived_layers)
}

pub fn prepend_header(header: &StatementHeader<'_>, sql: &str) -> String {
    format!(
        "-- pipeline_name: {}\n-- pipeline_version: {}\n-- compiled_at: {}\n-- features: {}\n{sql}",
        header.pipeline_name,
        header.pipeline_version,
        header.compiled_at,
        header.feature_keys.join(", ")
    )
}

/// Semantic view re-exposing physical columns under canonical names.
pub fn render_semantic_sql(table: &str, columns: &BTreeMap<String, String>) -> String {
    let select_lines: Vec<String> = columns
        .iter()
        .map(|(canonical, physical)| format!("  {physical} AS {canonical}"))
        .collect();
    format!("SELECT\n{}\nFROM {table}", select_lines.join(",\n"))
}
