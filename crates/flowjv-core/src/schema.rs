//! Schema model.
//!
//! Two representations, same split as program documents vs compiled
//! programs:
//!
//! - [`SchemaDoc`]: the authored, serde-friendly document. This is the
//!   interchange format and round-trips through JSON without loss.
//! - [`Schema`]: the loaded form. Nodes live in a flat arena addressed by
//!   [`NodeId`]; children are referenced by index and every node records its
//!   parent. Validation expressions are compiled during load, so unknown
//!   operators and dangling `$data` references are rejected up front.
//!
//! Schema nodes carry no array indices. Concrete paths only exist once a
//! node is correlated with a live data tree ([`Schema::walk`],
//! [`Schema::instances`]).

use crate::error::SchemaError;
use crate::logic::{self, Expr, Operators};
use crate::path::{Path, Segment};
use crate::tree::get_at;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Authored schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub kind: DocKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ValidationDoc>,
    #[serde(default, skip_serializing_if = "ErrMsgs::is_empty")]
    pub err_msgs: ErrMsgs,
    /// Presentation hints, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<Value>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocKind {
    Object {
        #[serde(default)]
        properties: Vec<SchemaDoc>,
    },
    Array {
        #[serde(rename = "itemSchema")]
        item_schema: Box<SchemaDoc>,
    },
    String,
    Number,
    Boolean,
    Enum {
        #[serde(default)]
        items: Vec<EnumItem>,
    },
}

impl DocKind {
    fn name(&self) -> &'static str {
        match self {
            DocKind::Object { .. } => "object",
            DocKind::Array { .. } => "array",
            DocKind::String => "string",
            DocKind::Number => "number",
            DocKind::Boolean => "boolean",
            DocKind::Enum { .. } => "enum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem {
    pub value: Value,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDoc {
    pub logic: Value,
    pub err: String,
}

/// Per-node message overrides, keyed by failure kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrMsgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_mismatch: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub not_in_enum: Option<String>,
    /// Kinds this engine does not act on, kept for round-tripping.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ErrMsgs {
    pub fn is_empty(&self) -> bool {
        self.required.is_none() && self.type_mismatch.is_none() && self.not_in_enum.is_none() && self.other.is_empty()
    }
}

const ROOT_PATTERN: &str = "(root)";

fn child_pattern(parent: &str, segment: &str) -> String {
    if parent == ROOT_PATTERN {
        segment.to_string()
    } else {
        format!("{parent}.{segment}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object { properties: Vec<NodeId> },
    Array { item: NodeId },
    String,
    Number,
    Boolean,
    Enum { items: Vec<EnumItem> },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Object { .. } => "object",
            NodeKind::Array { .. } => "array",
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Enum { .. } => "enum",
        }
    }

    /// Whether `value` has the JSON shape this kind stores.
    /// Enum values may be any scalar; membership is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            NodeKind::Object { .. } => value.is_object(),
            NodeKind::Array { .. } => value.is_array(),
            NodeKind::String => value.is_string(),
            NodeKind::Number => value.is_number(),
            NodeKind::Boolean => value.is_boolean(),
            NodeKind::Enum { .. } => !value.is_object() && !value.is_array(),
        }
    }
}

/// A compiled validation.
#[derive(Debug, Clone)]
pub struct Rule {
    pub logic: Value,
    pub expr: Expr,
    pub message: String,
    /// `$data` targets referenced by `expr`.
    pub refs: Vec<Path>,
}

#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub key: Option<String>,
    pub kind: NodeKind,
    pub label: Option<String>,
    pub is_required: bool,
    pub rules: Vec<Rule>,
    pub err_msgs: ErrMsgs,
    pub ui: Option<Value>,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Vec<SchemaNode>,
}

impl Schema {
    /// Parse and load a JSON schema document.
    pub fn from_json(value: &Value, operators: &Operators) -> Result<Self, SchemaError> {
        let doc: SchemaDoc =
            serde_json::from_value(value.clone()).map_err(|err| SchemaError::Parse(err.to_string()))?;
        Self::load(&doc, operators)
    }

    /// Build the arena and compile every validation.
    pub fn load(doc: &SchemaDoc, operators: &Operators) -> Result<Self, SchemaError> {
        if !matches!(doc.kind, DocKind::Object { .. }) {
            return Err(SchemaError::RootNotObject(doc.kind.name().to_string()));
        }
        let mut schema = Schema { nodes: Vec::new() };
        let root = schema.insert(doc, None, ROOT_PATTERN)?;
        // `$data` paths are read against the finished tree, so rules compile
        // only once every node exists.
        schema.compile_rules(doc, root, operators)?;
        schema.check_references()?;
        Ok(schema)
    }

    fn insert(&mut self, doc: &SchemaDoc, parent: Option<NodeId>, at: &str) -> Result<NodeId, SchemaError> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SchemaNode {
            key: doc.key.clone(),
            kind: NodeKind::Boolean,
            label: doc.label.clone(),
            is_required: doc.is_required,
            rules: Vec::new(),
            err_msgs: doc.err_msgs.clone(),
            ui: doc.ui.clone(),
            parent,
        });

        let kind = match &doc.kind {
            DocKind::Object { properties } => {
                let mut seen = HashSet::new();
                let mut children = Vec::with_capacity(properties.len());
                for child in properties {
                    let Some(key) = child.key.as_deref() else {
                        return Err(SchemaError::MissingKey { at: at.to_string() });
                    };
                    if !seen.insert(key.to_string()) {
                        return Err(SchemaError::DuplicateKey {
                            at: at.to_string(),
                            key: key.to_string(),
                        });
                    }
                    children.push(self.insert(child, Some(id), &child_pattern(at, key))?);
                }
                NodeKind::Object { properties: children }
            }
            DocKind::Array { item_schema } => NodeKind::Array {
                item: self.insert(item_schema, Some(id), &child_pattern(at, "[]"))?,
            },
            DocKind::String => NodeKind::String,
            DocKind::Number => NodeKind::Number,
            DocKind::Boolean => NodeKind::Boolean,
            DocKind::Enum { items } => NodeKind::Enum { items: items.clone() },
        };

        self.nodes[id.0].kind = kind;
        Ok(id)
    }

    /// Compile the validations of `doc` into the node `id` it was inserted
    /// as, then recurse in step with the arena.
    fn compile_rules(&mut self, doc: &SchemaDoc, id: NodeId, operators: &Operators) -> Result<(), SchemaError> {
        let rules = {
            // unresolvable targets keep their plain reading and are reported
            // by `check_references`
            let data_path = |raw: &str| self.parse_path(raw).or_else(|_| raw.parse::<Path>());
            let mut rules = Vec::with_capacity(doc.validations.len());
            for (index, validation) in doc.validations.iter().enumerate() {
                let expr = logic::compile_with(&validation.logic, operators, &data_path).map_err(|source| {
                    SchemaError::Logic {
                        at: self.pattern(id),
                        index,
                        source,
                    }
                })?;
                let mut refs = Vec::new();
                expr.data_refs(&mut refs);
                rules.push(Rule {
                    logic: validation.logic.clone(),
                    expr,
                    message: validation.err.clone(),
                    refs,
                });
            }
            rules
        };
        self.nodes[id.0].rules = rules;

        match (&doc.kind, self.nodes[id.0].kind.clone()) {
            (DocKind::Object { properties }, NodeKind::Object { properties: children }) => {
                for (child_doc, child) in properties.iter().zip(children) {
                    self.compile_rules(child_doc, child, operators)?;
                }
            }
            (DocKind::Array { item_schema }, NodeKind::Array { item }) => {
                self.compile_rules(item_schema, item, operators)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn check_references(&self) -> Result<(), SchemaError> {
        for (idx, node) in self.nodes.iter().enumerate() {
            for (index, rule) in node.rules.iter().enumerate() {
                for target in &rule.refs {
                    if self.resolve(target).is_err() {
                        return Err(SchemaError::UnresolvedReference {
                            at: self.pattern(NodeId(idx)),
                            index,
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SchemaNode)> {
        self.nodes.iter().enumerate().map(|(idx, node)| (NodeId(idx), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn rule_count(&self) -> usize {
        self.nodes.iter().map(|n| n.rules.len()).sum()
    }

    /// Chain of nodes from the root down to `id`, inclusive.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Dotted location of a node with `[]` standing for any array index.
    pub fn pattern(&self, id: NodeId) -> String {
        let parts: Vec<String> = self
            .lineage(id)
            .into_iter()
            .skip(1)
            .map(|n| {
                let node = &self.nodes[n.0];
                match node.parent.map(|p| &self.nodes[p.0].kind) {
                    Some(NodeKind::Array { .. }) => "[]".to_string(),
                    _ => node.key.clone().unwrap_or_default(),
                }
            })
            .collect();
        if parts.is_empty() {
            ROOT_PATTERN.to_string()
        } else {
            parts.join(".")
        }
    }

    /// Map a concrete path to the schema node describing it.
    pub fn resolve(&self, path: &Path) -> Result<NodeId, String> {
        let mut current = self.root();
        let mut walked = Path::root();
        for segment in path {
            current = self.step(current, segment, &walked)?;
            walked.push(segment.clone());
        }
        Ok(current)
    }

    /// Read dotted text as a path through this schema.
    ///
    /// Unlike [`Path::parse_dotted`], a part is an index only where the
    /// schema has an array, so object keys made of digits (`"2024"`) stay
    /// keys.
    pub fn parse_path(&self, dotted: &str) -> Result<Path, String> {
        let mut current = self.root();
        let mut walked = Path::root();
        if dotted.is_empty() {
            return Ok(walked);
        }
        for part in dotted.split('.') {
            if part.is_empty() {
                return Err(format!("path '{dotted}' contains an empty segment"));
            }
            let segment = match &self.nodes[current.0].kind {
                NodeKind::Array { .. } => part
                    .parse::<usize>()
                    .map(Segment::Index)
                    .map_err(|_| format!("'{walked}' is an array, '{part}' is not an index"))?,
                _ => Segment::Key(part.to_string()),
            };
            current = self.step(current, &segment, &walked)?;
            walked.push(segment);
        }
        Ok(walked)
    }

    fn step(&self, current: NodeId, segment: &Segment, walked: &Path) -> Result<NodeId, String> {
        let node = &self.nodes[current.0];
        Ok(match (&node.kind, segment) {
            (NodeKind::Object { properties }, Segment::Key(key)) => properties
                .iter()
                .copied()
                .find(|child| self.nodes[child.0].key.as_deref() == Some(key.as_str()))
                .ok_or_else(|| format!("'{walked}' has no property '{key}'"))?,
            (NodeKind::Array { item }, Segment::Index(_)) => *item,
            (NodeKind::Object { .. }, Segment::Index(idx)) => {
                return Err(format!("'{walked}' is an object, cannot index it with {idx}"));
            }
            (NodeKind::Array { .. }, Segment::Key(key)) => {
                return Err(format!("'{walked}' is an array, cannot address key '{key}'"));
            }
            (kind, _) => {
                return Err(format!("'{walked}' is a {} and has no children", kind.name()));
            }
        })
    }

    /// Depth-first, parent-before-children traversal of every node instance
    /// present in `data`.
    ///
    /// Object properties are visited in declaration order even when the
    /// object itself is absent, so missing required fields are reported.
    /// Array items are visited once per allocated index in ascending order;
    /// holes are visited with an absent value, absent arrays yield no items.
    pub fn walk<F>(&self, data: &Value, mut visitor: F)
    where
        F: FnMut(NodeId, &Path, Option<&Value>),
    {
        let mut path = Path::root();
        let value = (!data.is_null()).then_some(data);
        self.walk_node(self.root(), &mut path, value, &mut visitor);
    }

    /// Traverse the subtree rooted at `path`, which must resolve to `id`.
    pub fn walk_from<F>(&self, id: NodeId, path: &Path, data: &Value, mut visitor: F)
    where
        F: FnMut(NodeId, &Path, Option<&Value>),
    {
        let mut path = path.clone();
        let value = get_at(data, &path);
        self.walk_node(id, &mut path, value, &mut visitor);
    }

    fn walk_node<F>(&self, id: NodeId, path: &mut Path, value: Option<&Value>, visitor: &mut F)
    where
        F: FnMut(NodeId, &Path, Option<&Value>),
    {
        visitor(id, path, value);
        match &self.nodes[id.0].kind {
            NodeKind::Object { properties } => {
                let obj = value.and_then(Value::as_object);
                for child in properties {
                    let Some(key) = self.nodes[child.0].key.as_deref() else {
                        continue;
                    };
                    let child_value = obj.and_then(|o| o.get(key)).filter(|v| !v.is_null());
                    path.push(key);
                    self.walk_node(*child, path, child_value, visitor);
                    path.pop();
                }
            }
            NodeKind::Array { item } => {
                if let Some(items) = value.and_then(Value::as_array) {
                    for (idx, element) in items.iter().enumerate() {
                        path.push(idx);
                        self.walk_node(*item, path, (!element.is_null()).then_some(element), visitor);
                        path.pop();
                    }
                }
            }
            _ => {}
        }
    }

    /// Concrete paths currently occupied by `id` in `data`.
    ///
    /// Nodes outside any array have exactly one instance. Nodes below arrays
    /// have one per allocated element of every enclosing array.
    pub fn instances(&self, id: NodeId, data: &Value) -> Vec<Path> {
        let lineage = self.lineage(id);
        let mut paths = vec![Path::root()];
        for pair in lineage.windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            paths = match &self.nodes[parent.0].kind {
                NodeKind::Array { .. } => paths
                    .into_iter()
                    .flat_map(|p| {
                        let len = get_at(data, &p).and_then(Value::as_array).map_or(0, Vec::len);
                        (0..len).map(move |idx| p.child(idx))
                    })
                    .collect(),
                _ => {
                    let key = self.nodes[child.0].key.clone().unwrap_or_default();
                    paths.into_iter().map(|p| p.child(key.as_str())).collect()
                }
            };
        }
        paths
    }

    /// Rebuild the authored document.
    pub fn to_doc(&self) -> SchemaDoc {
        self.doc_for(self.root())
    }

    fn doc_for(&self, id: NodeId) -> SchemaDoc {
        let node = &self.nodes[id.0];
        let kind = match &node.kind {
            NodeKind::Object { properties } => DocKind::Object {
                properties: properties.iter().map(|c| self.doc_for(*c)).collect(),
            },
            NodeKind::Array { item } => DocKind::Array {
                item_schema: Box::new(self.doc_for(*item)),
            },
            NodeKind::String => DocKind::String,
            NodeKind::Number => DocKind::Number,
            NodeKind::Boolean => DocKind::Boolean,
            NodeKind::Enum { items } => DocKind::Enum { items: items.clone() },
        };
        SchemaDoc {
            key: node.key.clone(),
            kind,
            label: node.label.clone(),
            is_required: node.is_required,
            validations: node
                .rules
                .iter()
                .map(|r| ValidationDoc {
                    logic: r.logic.clone(),
                    err: r.message.clone(),
                })
                .collect(),
            err_msgs: node.err_msgs.clone(),
            ui: node.ui.clone(),
        }
    }
}
