use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Node as served by the web UI's tree endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawNode {
    title: String,
    #[serde(default)]
    children: Option<Vec<RawNode>>,
    #[serde(default)]
    dataset: Option<String>,
}

/// Either a nested group or the dataset IDs of a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetNode {
    Group(DatasetTree),
    Datasets(Vec<String>),
}

/// The spacecraft/sensor tree, keyed by title; leaves are dataset IDs.
///
/// Serializes as plain nested JSON objects, so a tree saved with
/// `serde_json::to_string` can be reloaded with [`DatasetTree::from_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetTree {
    nodes: BTreeMap<String, DatasetNode>,
}

impl DatasetTree {
    pub(crate) fn from_raw(raw: Vec<RawNode>) -> Result<Self> {
        let img = Regex::new(r"<img[^>]*>")?;
        build(raw, Some(&img))
    }

    /// Load a tree previously written as JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Walk a path of titles.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&DatasetNode> {
        let (first, rest) = path.split_first()?;
        let node = self.nodes.get(first.as_ref())?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            DatasetNode::Group(tree) => tree.get(rest),
            DatasetNode::Datasets(_) => None,
        }
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DatasetNode)> {
        self.nodes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every dataset ID in the tree, depth first.
    pub fn dataset_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        for node in self.nodes.values() {
            match node {
                DatasetNode::Group(tree) => tree.collect_ids(out),
                DatasetNode::Datasets(ids) => out.extend(ids.iter().map(String::as_str)),
            }
        }
    }
}

// Only root titles carry the download icon markup.
fn build(raw: Vec<RawNode>, strip_markup: Option<&Regex>) -> Result<DatasetTree> {
    let mut nodes = BTreeMap::new();

    for node in raw {
        let title = match strip_markup {
            Some(re) => re.replace_all(&node.title, "").trim_end().to_string(),
            None => node.title,
        };

        let children = node.children.unwrap_or_default();
        let value = if !children.is_empty() {
            DatasetNode::Group(build(children, None)?)
        } else {
            let dataset = node.dataset.ok_or_else(|| {
                Error::Decoding(format!("dataset tree leaf {title:?} has no dataset"))
            })?;
            DatasetNode::Datasets(dataset.split(',').map(str::to_string).collect())
        };

        nodes.insert(title, value);
    }

    Ok(DatasetTree { nodes })
}
