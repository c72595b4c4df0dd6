use crate::error::{Result, TrendError};
use crate::types::Metrics;
use serde::Deserialize;
use std::path::Path;

/// Node shape as the scanner writes it. Required fields are checked after
/// parsing so the error can say which node is broken.
#[derive(Debug, Deserialize)]
struct RawNode {
    name: Option<String>,
    nodetype: Option<String>,
    path: Option<String>,
    qualname: Option<String>,
    lineno: Option<u64>,
    end_lineno: Option<u64>,
    docstring: Option<String>,
    metrics: Option<serde_json::Value>,
    #[serde(default)]
    children: Option<Vec<RawNode>>,
}

/// One report node stored in the arena, without its children.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub nodetype: String,
    pub path: Option<String>,
    pub qualname: Option<String>,
    pub lineno: Option<u64>,
    pub end_lineno: Option<u64>,
    pub docstring: Option<String>,
    /// `None` for structural nodes (absent, null or empty `metrics`).
    pub metrics: Option<Metrics>,
}

/// Arena form of a report: nodes in pre-order plus parent → children index lists.
/// Node `0` is the root.
#[derive(Debug, Clone, Default)]
pub struct ReportTree {
    nodes: Vec<TreeNode>,
    children: Vec<Vec<usize>>,
}

impl ReportTree {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TrendError::io(path, e))?;
        Self::from_json(&text)
            .map_err(|e| match e {
                TrendError::MalformedReport(msg) => {
                    TrendError::MalformedReport(format!("{}: {msg}", path.display()))
                }
                other => other,
            })
    }

    /// Parses without a nesting limit; the stack grows on the heap for deep reports.
    pub fn from_json(text: &str) -> Result<Self> {
        let invalid = |e: serde_json::Error| TrendError::MalformedReport(format!("invalid report JSON: {e}"));
        let mut de = serde_json::Deserializer::from_str(text);
        de.disable_recursion_limit();
        let root = RawNode::deserialize(serde_stacker::Deserializer::new(&mut de)).map_err(invalid)?;
        de.end().map_err(invalid)?;
        Self::from_raw(root)
    }

    fn from_raw(root: RawNode) -> Result<Self> {
        let mut tree = ReportTree::default();
        // (node, parent id, locator): children are pushed in reverse so
        // they pop in input order and ids come out in pre-order.
        let mut stack: Vec<(RawNode, Option<usize>, String)> = vec![(root, None, "root".to_string())];

        while let Some((mut raw, parent, locator)) = stack.pop() {
            let kids = raw.children.take().unwrap_or_default();
            let id = tree.nodes.len();
            tree.nodes.push(into_tree_node(raw, &locator)?);
            tree.children.push(Vec::new());
            if let Some(p) = parent {
                tree.children[p].push(id);
            }
            for (i, kid) in kids.into_iter().enumerate().rev() {
                stack.push((kid, Some(id), format!("{locator}/children[{i}]")));
            }
        }

        Ok(tree)
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: usize) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn children(&self, id: usize) -> &[usize] {
        &self.children[id]
    }
}

fn into_tree_node(raw: RawNode, locator: &str) -> Result<TreeNode> {
    let name = raw
        .name
        .ok_or_else(|| TrendError::MalformedReport(format!("node {locator} has no 'name'")))?;
    let nodetype = raw.nodetype.ok_or_else(|| {
        TrendError::MalformedReport(format!("node {locator} ('{name}') has no 'nodetype'"))
    })?;
    let metrics = parse_metrics(raw.metrics, locator)?;

    Ok(TreeNode {
        name,
        nodetype,
        path: raw.path,
        qualname: raw.qualname,
        lineno: raw.lineno,
        end_lineno: raw.end_lineno,
        docstring: raw.docstring,
        metrics,
    })
}

/// An empty metrics object marks a structural node, same as a missing one.
fn parse_metrics(value: Option<serde_json::Value>, locator: &str) -> Result<Option<Metrics>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(v @ serde_json::Value::Object(_)) => serde_json::from_value::<Metrics>(v)
            .map(Some)
            .map_err(|e| TrendError::MalformedReport(format!("node {locator} has bad metrics: {e}"))),
        Some(other) => Err(TrendError::MalformedReport(format!(
            "node {locator} has non-object metrics: {other}"
        ))),
    }
}
