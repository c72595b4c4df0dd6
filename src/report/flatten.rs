use super::tree::ReportTree;
use crate::error::Result;
use crate::types::MetricsRow;
use std::path::Path;

/// Flattens a report tree into one row per node, pre-order, children in input order.
/// Uses an explicit stack so arbitrarily deep trees never touch the call stack.
pub fn flatten(tree: &ReportTree) -> Vec<MetricsRow> {
    let mut rows = Vec::with_capacity(tree.len());
    if tree.is_empty() {
        return rows;
    }

    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let qual_or_name = match node.qualname.as_deref() {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => node.name.clone(),
        };
        rows.push(MetricsRow {
            name: node.name.clone(),
            nodetype: node.nodetype.clone(),
            path: node.path.clone(),
            qualname: node.qualname.clone(),
            qual_or_name,
            lineno: node.lineno,
            end_lineno: node.end_lineno,
            docstring: node.docstring.clone(),
            metrics: node.metrics.clone().unwrap_or_default(),
            has_metrics: node.metrics.is_some(),
            is_directory: node.nodetype == "directory",
            is_file: node.nodetype == "file",
        });
        stack.extend(tree.children(id).iter().rev());
    }
    rows
}

/// Loads a scanner report and flattens it in one step.
pub fn load_rows(path: &Path) -> Result<Vec<MetricsRow>> {
    let tree = ReportTree::load(path)?;
    Ok(flatten(&tree))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(depth: usize) -> String {
        let mut json = String::from(r#"{"name": "leaf", "nodetype": "function", "metrics": {"lines": 1}}"#);
        for i in 0..depth {
            json = format!(r#"{{"name": "d{i}", "nodetype": "directory", "children": [{json}]}}"#);
        }
        json
    }

    #[test]
    fn test_rows_follow_preorder() {
        let tree = ReportTree::from_json(
            r#"{"name": "root", "nodetype": "directory", "children": [
                {"name": "a", "nodetype": "directory", "children": [
                    {"name": "a1", "nodetype": "file", "metrics": {"lines": 1}},
                    {"name": "a2", "nodetype": "file", "metrics": {"lines": 2}}
                ]},
                {"name": "b", "nodetype": "file", "metrics": {"lines": 3}}
            ]}"#,
        )
        .unwrap();
        let rows = flatten(&tree);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "a1", "a2", "b"]);
        assert_eq!(rows.len(), tree.len(), "one row per node");
    }

    #[test]
    fn test_structural_rows_are_tagged_not_dropped() {
        let rows = flatten(&ReportTree::from_json(&nested(3)).unwrap());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.iter().filter(|r| r.has_metrics).count(), 1);
        assert!(rows[0].is_directory && !rows[0].has_metrics);
        assert!(!rows[3].is_directory && !rows[3].is_file);
    }

    #[test]
    fn test_qual_or_name_falls_back_to_name() {
        let tree = ReportTree::from_json(
            r#"{"name": "m.py", "nodetype": "file", "qualname": "", "children": [
                {"name": "f", "nodetype": "function", "qualname": "m.f"}
            ]}"#,
        )
        .unwrap();
        let rows = flatten(&tree);
        assert_eq!(rows[0].qual_or_name, "m.py");
        assert_eq!(rows[1].qual_or_name, "m.f");
    }

    #[test]
    fn test_deep_tree_flattens_without_recursion() {
        let rows = flatten(&ReportTree::from_json(&nested(500)).unwrap());
        assert_eq!(rows.len(), 501);
        assert_eq!(rows.last().unwrap().name, "leaf");
    }
}
