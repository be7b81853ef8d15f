//! Final alias resolution: prefixing, collision policy, reference rewriting
//! and the base/derived split.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::expr::{expression_references, rewrite_identifiers, SelectExpression};
use crate::error::{Error, Result};
use crate::schema::{CollisionPolicy, NamingConfig, PrefixScheme};

/// Expressions with final aliases, grouped by SQL layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedExpressions {
    /// Emitted in the SELECT over the spine and joined models.
    pub base: Vec<SelectExpression>,
    /// Each layer references only aliases from the layers before it.
    pub derived_layers: Vec<Vec<SelectExpression>>,
}

impl ResolvedExpressions {
    pub fn derived(&self) -> impl Iterator<Item = &SelectExpression> {
        self.derived_layers.iter().flatten()
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.base
            .iter()
            .chain(self.derived())
            .map(|expr| expr.alias.as_str())
            .collect()
    }
}

/// Prefix for a feature's columns under the configured scheme.
///
/// Dots are replaced with `_` so the prefixed alias stays an identifier.
pub fn feature_prefix(feature_key: &str, naming: &NamingConfig) -> String {
    let prefix = match naming.prefixing.scheme {
        PrefixScheme::Feature => feature_key,
        PrefixScheme::Namespace => feature_key
            .split_once('.')
            .map_or(feature_key, |(namespace, _)| namespace),
    };
    prefix.replace('.', "_")
}

fn prefixed_alias(expr: &SelectExpression, naming: &NamingConfig) -> String {
    format!(
        "{}{}{}",
        feature_prefix(&expr.source_feature, naming),
        naming.prefixing.separator,
        expr.alias
    )
}

/// Final aliases repeated among themselves or shadowing a spine column.
fn find_collisions(aliases: &[String], spine_columns: &[String]) -> BTreeSet<String> {
    let mut seen: BTreeSet<&str> = spine_columns.iter().map(String::as_str).collect();
    let mut collisions = BTreeSet::new();
    for alias in aliases {
        if !seen.insert(alias.as_str()) {
            collisions.insert(alias.clone());
        }
    }
    collisions
}

/// Choose the final alias of every expression, honoring the collision policy.
pub fn resolve_aliases(
    expressions: &[SelectExpression],
    naming: &NamingConfig,
    spine_columns: &[String],
) -> Result<Vec<String>> {
    let mut aliases: Vec<String> = expressions
        .iter()
        .map(|expr| {
            if naming.prefixing.enabled {
                prefixed_alias(expr, naming)
            } else {
                expr.alias.clone()
            }
        })
        .collect();

    let collisions = find_collisions(&aliases, spine_columns);
    if collisions.is_empty() {
        return Ok(aliases);
    }
    if naming.collision_policy == CollisionPolicy::Fail {
        return Err(Error::validation(format!(
            "Column name collisions: {collisions:?}"
        )));
    }

    for (alias, expr) in aliases.iter_mut().zip(expressions) {
        if collisions.contains(alias.as_str()) {
            *alias = prefixed_alias(expr, naming);
        }
    }

    let remaining = find_collisions(&aliases, spine_columns);
    if !remaining.is_empty() {
        return Err(Error::validation(format!(
            "Column name collisions after auto-prefix: {remaining:?}"
        )));
    }
    Ok(aliases)
}

/// Rewrite references to other expressions' original aliases in one pass.
///
/// A reference whose original alias now names more than one column is an
/// error.
pub fn apply_reference_renames(
    expressions: &[SelectExpression],
    aliases: &[String],
) -> Result<Vec<SelectExpression>> {
    let mut finals_by_original: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (expr, alias) in expressions.iter().zip(aliases) {
        finals_by_original
            .entry(expr.alias.as_str())
            .or_default()
            .insert(alias.as_str());
    }

    expressions
        .iter()
        .zip(aliases)
        .map(|(expr, alias)| {
            let candidates = finals_by_original
                .keys()
                .copied()
                .filter(|original| *original != expr.alias);
            let mut renames = BTreeMap::new();
            for referenced in expression_references(&expr.expression, candidates)? {
                let finals = &finals_by_original[referenced.as_str()];
                if finals.len() > 1 {
                    return Err(Error::validation(format!(
                        "Feature '{}' references ambiguous column '{referenced}': {finals:?}",
                        expr.source_feature
                    )));
                }
                let Some(&target) = finals.first() else {
                    continue;
                };
                if target != referenced {
                    debug!(
                        feature = %expr.source_feature,
                        from = %referenced,
                        to = %target,
                        "rewrote column reference"
                    );
                    renames.insert(referenced, target.to_string());
                }
            }
            if alias != &expr.alias {
                debug!(feature = %expr.source_feature, from = %expr.alias, to = %alias, "renamed output column");
            }
            Ok(SelectExpression {
                expression: rewrite_identifiers(&expr.expression, &renames)?,
                alias: alias.clone(),
                source_feature: expr.source_feature.clone(),
            })
        })
        .collect()
}

/// Group expressions by how many computed columns deep they reference.
///
/// Expressions that reference no other final alias form the base layer.
/// Edges run from a referenced alias to the expression that uses it, and
/// each expression sits one layer below its deepest reference.
///
/// # Errors
///
/// `Error::Compile` if the references form a cycle. Feature builds only
/// accept references to earlier outputs, so this indicates an internal bug.
pub fn split_derived_expressions(expressions: Vec<SelectExpression>) -> Result<ResolvedExpressions> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..expressions.len()).map(|i| graph.add_node(i)).collect();
    let by_alias: BTreeMap<&str, NodeIndex> = expressions
        .iter()
        .zip(&nodes)
        .map(|(expr, node)| (expr.alias.as_str(), *node))
        .collect();

    for (expr, &node) in expressions.iter().zip(&nodes) {
        let candidates = by_alias
            .keys()
            .copied()
            .filter(|alias| *alias != expr.alias);
        for referenced in expression_references(&expr.expression, candidates)? {
            if let Some(&source) = by_alias.get(referenced.as_str()) {
                graph.add_edge(source, node, ());
            }
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        let alias = graph
            .node_weight(cycle.node_id())
            .map_or("?", |&index| expressions[index].alias.as_str());
        Error::Compile(format!(
            "Cyclic references between computed columns at '{alias}'"
        ))
    })?;

    let mut depth = vec![0usize; expressions.len()];
    for node in order {
        let level = graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|source| depth[graph[source]] + 1)
            .max()
            .unwrap_or(0);
        depth[graph[node]] = level;
    }

    let mut resolved = ResolvedExpressions::default();
    for (expr, level) in expressions.into_iter().zip(depth) {
        if level == 0 {
            resolved.base.push(expr);
            continue;
        }
        if resolved.derived_layers.len() < level {
            resolved.derived_layers.resize_with(level, Vec::new);
        }
        resolved.derived_layers[level - 1].push(expr);
    }
    Ok(resolved)
}

/// Resolve final aliases, rewrite references and split into layers.
pub fn resolve_select_expressions(
    expressions: &[SelectExpression],
    naming: &NamingConfig,
    spine_columns: &[String],
) -> Result<ResolvedExpressions> {
    let aliases = resolve_aliases(expressions, naming, spine_columns)?;
    let renamed = apply_reference_renames(expressions, &aliases)?;
    split_derived_expressions(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PrefixingConfig;

    fn expr(expression: &str, alias: &str, feature: &str) -> SelectExpression {
        SelectExpression {
            expression: expression.into(),
            alias: alias.into(),
            source_feature: feature.into(),
        }
    }

    fn naming(enabled: bool, scheme: PrefixScheme, policy: CollisionPolicy) -> NamingConfig {
        NamingConfig {
            prefixing: PrefixingConfig {
                enabled,
                scheme,
                ..PrefixingConfig::default()
            },
            collision_policy: policy,
        }
    }

    fn spine(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_feature_prefix_schemes() {
        let ns = naming(true, PrefixScheme::Namespace, CollisionPolicy::Fail);
        let full = naming(true, PrefixScheme::Feature, CollisionPolicy::Fail);
        assert_eq!(feature_prefix("geisinger.forward_65_flag", &ns), "geisinger");
        assert_eq!(feature_prefix("age", &ns), "age");
        assert_eq!(
            feature_prefix("geisinger.forward_65_flag", &full),
            "geisinger_forward_65_flag"
        );
    }

    #[test]
    fn test_prefixing_rewrites_derived_references() {
        let naming = naming(true, PrefixScheme::Namespace, CollisionPolicy::Fail);
        let resolved = resolve_select_expressions(
            &[expr("1", "a", "feat.a"), expr("a + 1", "b", "other.b")],
            &naming,
            &spine(&["id"]),
        )
        .unwrap();
        assert_eq!(resolved.base, vec![expr("1", "feat__a", "feat.a")]);
        assert_eq!(
            resolved.derived_layers,
            vec![vec![expr("feat__a + 1", "other__b", "other.b")]]
        );
    }

    #[test]
    fn test_collision_with_spine_column_fails() {
        let naming = naming(false, PrefixScheme::Feature, CollisionPolicy::Fail);
        let err = resolve_aliases(&[expr("1", "person_id", "f")], &naming, &spine(&["person_id"]))
            .unwrap_err();
        assert!(err.to_string().contains("Column name collisions"));
    }

    #[test]
    fn test_auto_prefix_resolves_spine_collision() {
        let naming = naming(false, PrefixScheme::Namespace, CollisionPolicy::AutoPrefix);
        let aliases =
            resolve_aliases(&[expr("1", "person_id", "f.x")], &naming, &spine(&["person_id"]))
                .unwrap();
        assert_eq!(aliases, vec!["f__person_id"]);
    }

    #[test]
    fn test_auto_prefix_uses_feature_key() {
        let naming = naming(false, PrefixScheme::Feature, CollisionPolicy::AutoPrefix);
        let aliases = resolve_aliases(
            &[expr("1", "dup", "test.dup_a"), expr("2", "dup", "test.dup_b")],
            &naming,
            &[],
        )
        .unwrap();
        assert_eq!(aliases, vec!["test_dup_a__dup", "test_dup_b__dup"]);
    }

    #[test]
    fn test_auto_prefix_leftover_collision_fails() {
        let naming = naming(false, PrefixScheme::Namespace, CollisionPolicy::AutoPrefix);
        let err = resolve_aliases(
            &[expr("1", "dup", "test.dup_a"), expr("2", "dup", "test.dup_b")],
            &naming,
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("after auto-prefix"));
    }

    #[test]
    fn test_ambiguous_reference_is_rejected() {
        let naming = naming(false, PrefixScheme::Feature, CollisionPolicy::AutoPrefix);
        let err = resolve_select_expressions(
            &[
                expr("1", "dup", "a"),
                expr("2", "dup", "b"),
                expr("dup + 1", "x", "c"),
            ],
            &naming,
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("ambiguous column 'dup'"));
    }

    #[test]
    fn test_split_on_references() {
        let resolved = split_derived_expressions(vec![
            expr("1", "a", "f"),
            expr("a + 1", "b", "f"),
            expr("2", "c", "g"),
        ])
        .unwrap();
        assert_eq!(resolved.aliases(), vec!["a", "c", "b"]);
        assert_eq!(resolved.derived_layers.len(), 1);
    }

    #[test]
    fn test_chained_derivations_get_their_own_layers() {
        let resolved = split_derived_expressions(vec![
            expr("1", "a", "f"),
            expr("a + 1", "b", "g"),
            expr("b * 2", "c", "h"),
            expr("a - 1", "d", "i"),
        ])
        .unwrap();
        let layers: Vec<Vec<&str>> = resolved
            .derived_layers
            .iter()
            .map(|layer| layer.iter().map(|e| e.alias.as_str()).collect())
            .collect();
        assert_eq!(layers, vec![vec!["b", "d"], vec!["c"]]);
    }

    #[test]
    fn test_cycles_are_internal_errors() {
        let err = split_derived_expressions(vec![expr("b", "a", "f"), expr("a", "b", "g")])
            .unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
    }
}
