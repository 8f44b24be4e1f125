//! Live form state: data tree, touched flags and per-path error lists.
//!
//! Every mutation revalidates synchronously before returning and reports a
//! [`Changes`] record describing exactly which observable state moved. The
//! store itself never notifies anyone; [`crate::Form`] feeds `Changes` to the
//! subscription router once the mutation has settled.
//!
//! Revalidation after `set(w, v)` covers:
//!
//! 1. every node instance in the subtree at `w`, widened to the shallowest
//!    prefix of `w` the write creates or resizes (array padding adds holes
//!    beside `w`); stale entries in that subtree are dropped first;
//! 2. every ancestor of that subtree;
//! 3. every instance of every node whose `$data` targets overlap `w`.
//!
//! Rule order per instance: required, value type, enum membership, then the
//! declared validations in order. An absent required value reports only the
//! required message.

use crate::config::FormConfig;
use crate::deps::DependencyIndex;
use crate::error::FlowError;
use crate::logic::{self, EvalContext};
use crate::path::{Path, Segment};
use crate::schema::{NodeId, NodeKind, Schema};
use crate::tree::{first_blocking_prefix, get_at, get_at_segments, set_at};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Observable state touched by one mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    /// Written path and its value before the write, recorded only when the
    /// value actually changed. A write that creates or pads containers is
    /// recorded at the outermost container it changed.
    pub writes: Vec<(Path, Option<Value>)>,
    /// Paths whose error list changed.
    pub errors: BTreeSet<Path>,
    /// Paths whose touched flag flipped.
    pub touched: BTreeSet<Path>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.errors.is_empty() && self.touched.is_empty()
    }

    /// Whether the state observable at `path` or below it changed.
    ///
    /// Writes below `path` always count. A write above `path` counts only if
    /// the value at `path` itself differs from before.
    pub fn affects(&self, path: &Path, store: &Store) -> bool {
        if self.errors.iter().chain(&self.touched).any(|c| path.is_prefix_of(c)) {
            return true;
        }
        self.writes.iter().any(|(written, before)| {
            if path.is_prefix_of(written) {
                return true;
            }
            match path.strip_prefix(written) {
                Some(rest) => {
                    let old = before.as_ref().and_then(|v| get_at_segments(v, rest));
                    old != store.get(path)
                }
                None => false,
            }
        })
    }
}

const NO_ERRORS: &[String] = &[];

#[derive(Debug, Clone)]
pub struct Store {
    schema: Schema,
    deps: DependencyIndex,
    config: FormConfig,
    data: Value,
    touched: BTreeSet<Path>,
    errors: BTreeMap<Path, Vec<String>>,
}

impl Store {
    pub fn new(schema: Schema, initial: Option<Value>, config: FormConfig) -> Self {
        let deps = DependencyIndex::build(&schema);
        let mut store = Self {
            schema,
            deps,
            data: normalize_root(initial.unwrap_or(Value::Null)),
            touched: BTreeSet::new(),
            errors: BTreeMap::new(),
            config,
        };
        if store.config.validate_on_load {
            store.errors = store.validate_all();
        }
        store
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Value at `path`, or `None` when absent.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        get_at(&self.data, path)
    }

    pub fn errors(&self, path: &Path) -> &[String] {
        self.errors.get(path).map_or(NO_ERRORS, Vec::as_slice)
    }

    /// Every path with at least one failure, in path order.
    pub fn error_entries(&self) -> impl Iterator<Item = (&Path, &[String])> {
        self.errors.iter().map(|(path, msgs)| (path, msgs.as_slice()))
    }

    pub fn is_touched(&self, path: &Path) -> bool {
        self.touched.contains(path)
    }

    pub fn touched_paths(&self) -> impl Iterator<Item = &Path> {
        self.touched.iter()
    }

    /// Write `value` at `path` and revalidate everything that depends on it.
    ///
    /// Fails with [`FlowError::PathShapeMismatch`] if `path` does not fit the
    /// schema or would have to descend through an existing scalar; the tree
    /// is left untouched in that case.
    pub fn set(&mut self, path: &Path, value: Value) -> Result<Changes, FlowError> {
        let node = self.schema.resolve(path).map_err(|reason| FlowError::shape(path, reason))?;
        if let Some((blocked, wanted)) = first_blocking_prefix(&self.data, path) {
            return Err(FlowError::shape(
                path,
                format!("'{blocked}' holds a non-container value where {wanted} is expected"),
            ));
        }

        // Creating containers or padding arrays on the way down adds
        // instances outside the written subtree, so the write is recorded
        // and revalidated from the shallowest prefix it changes.
        let depth = growth_depth(&self.data, path);
        let scope = Path::new(path.segments()[..depth].to_vec());
        // one lineage entry per segment, so the scope's node sits at `depth`
        let scope_node = self.schema.lineage(node)[depth];

        let before = self.get(&scope).cloned();
        if path.is_empty() {
            self.data = normalize_root(value);
        } else {
            set_at(&mut self.data, path, value);
        }

        let mut changes = Changes::default();
        if before.as_ref() != self.get(&scope) {
            changes.writes.push((scope.clone(), before));
        }

        let mut targets: BTreeMap<Path, NodeId> = BTreeMap::new();
        self.schema.walk_from(scope_node, &scope, &self.data, |id, p, _| {
            targets.insert(p.clone(), id);
        });
        for ancestor in scope.ancestors() {
            if let Ok(id) = self.schema.resolve(&ancestor) {
                targets.insert(ancestor, id);
            }
        }
        for id in self.deps.dependents_of(path) {
            for instance in self.schema.instances(id, &self.data) {
                targets.insert(instance, id);
            }
        }

        // Entries under the scope may belong to elements that no longer
        // exist; rebuild them from scratch.
        let stale: Vec<Path> = self
            .errors
            .range(scope.clone()..)
            .take_while(|(p, _)| scope.is_prefix_of(p))
            .map(|(p, _)| p.clone())
            .collect();
        let mut previous: BTreeMap<Path, Vec<String>> = BTreeMap::new();
        for p in stale {
            if let Some(msgs) = self.errors.remove(&p) {
                previous.insert(p, msgs);
            }
        }

        let revalidated = targets.len();
        for (p, id) in targets {
            let old = previous.remove(&p).or_else(|| self.errors.remove(&p)).unwrap_or_default();
            let fresh = self.check(id, &p);
            if old != fresh {
                changes.errors.insert(p.clone());
            }
            if !fresh.is_empty() {
                self.errors.insert(p, fresh);
            }
        }
        // whatever is left belonged to instances that disappeared
        changes.errors.extend(previous.into_keys());

        debug!(
            path = %path,
            revalidated,
            errors_changed = changes.errors.len(),
            "set"
        );
        Ok(changes)
    }

    /// Flip the touched flag. Does not revalidate.
    pub fn mark_touched(&mut self, path: &Path, touched: bool) -> Result<Changes, FlowError> {
        self.schema.resolve(path).map_err(|reason| FlowError::shape(path, reason))?;
        let flipped = if touched {
            self.touched.insert(path.clone())
        } else {
            self.touched.remove(path)
        };
        let mut changes = Changes::default();
        if flipped {
            changes.touched.insert(path.clone());
        }
        Ok(changes)
    }

    /// Mark every node instance currently in the tree as touched, the way a
    /// submit action reveals all errors at once.
    pub fn touch_all(&mut self) -> Changes {
        let mut paths = Vec::new();
        self.schema.walk(&self.data, |_, p, _| paths.push(p.clone()));
        let mut changes = Changes::default();
        for p in paths {
            if self.touched.insert(p.clone()) {
                changes.touched.insert(p);
            }
        }
        changes
    }

    /// Replace the whole tree, clear touched flags and errors, then run one
    /// full validation pass.
    pub fn reset(&mut self, initial: Value) -> Changes {
        let before = std::mem::replace(&mut self.data, normalize_root(initial));
        let old_touched = std::mem::take(&mut self.touched);
        let old_errors = std::mem::take(&mut self.errors);
        self.errors = self.validate_all();

        let mut changes = Changes {
            touched: old_touched,
            ..Changes::default()
        };
        if before != self.data {
            changes.writes.push((Path::root(), Some(before)));
        }
        for (p, msgs) in &old_errors {
            if self.errors.get(p) != Some(msgs) {
                changes.errors.insert(p.clone());
            }
        }
        for (p, msgs) in &self.errors {
            if old_errors.get(p) != Some(msgs) {
                changes.errors.insert(p.clone());
            }
        }
        debug!(errors = self.errors.len(), "reset");
        changes
    }

    fn validate_all(&self) -> BTreeMap<Path, Vec<String>> {
        let mut targets = Vec::new();
        self.schema.walk(&self.data, |id, p, _| targets.push((p.clone(), id)));
        targets
            .into_iter()
            .filter_map(|(p, id)| {
                let msgs = self.check(id, &p);
                (!msgs.is_empty()).then_some((p, msgs))
            })
            .collect()
    }

    /// Failure messages for one node instance, in rule order.
    fn check(&self, id: NodeId, path: &Path) -> Vec<String> {
        let node = self.schema.node(id);
        let value = self.get(path);
        let mut failures = Vec::new();

        match value {
            None if node.is_required => {
                let msg = node.err_msgs.required.as_ref().unwrap_or(&self.config.required_message);
                failures.push(msg.clone());
                return failures;
            }
            Some(v) if !node.kind.accepts(v) => {
                let msg = node.err_msgs.type_mismatch.as_ref().unwrap_or(&self.config.type_message);
                failures.push(msg.clone());
                return failures;
            }
            Some(v) => {
                if let NodeKind::Enum { items } = &node.kind
                    && !items.iter().any(|item| logic::strict_eq(&item.value, v))
                {
                    let msg = node.err_msgs.not_in_enum.as_ref().unwrap_or(&self.config.enum_message);
                    failures.push(msg.clone());
                }
            }
            None => {}
        }

        let ctx = EvalContext::new(value, &self.data);
        for (index, rule) in node.rules.iter().enumerate() {
            match logic::passes(&rule.expr, &ctx) {
                Ok(true) => {}
                Ok(false) => {
                    trace!(path = %path, index, "validation failed");
                    failures.push(rule.message.clone());
                }
                Err(err) => {
                    trace!(path = %path, index, code = err.code(), error = %err, "validation errored");
                    failures.push(rule.message.clone());
                }
            }
        }
        failures
    }
}

/// Number of leading segments of `path` that already exist in `data` and
/// that writing at `path` leaves in place.
///
/// The prefix at the returned depth is the outermost one the write creates
/// or, for an array indexed past its end, elongates.
fn growth_depth(data: &Value, path: &Path) -> usize {
    let segments = path.segments();
    for depth in 0..segments.len() {
        match get_at_segments(data, &segments[..depth]) {
            None => return depth,
            Some(Value::Array(items)) => {
                if let Segment::Index(idx) = &segments[depth]
                    && *idx >= items.len()
                {
                    return depth;
                }
            }
            Some(_) => {}
        }
    }
    segments.len()
}

fn normalize_root(value: Value) -> Value {
    if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Operators;
    use crate::path;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_json(
            &json!({
                "type": "object",
                "properties": [
                    {
                        "key": "name",
                        "type": "string",
                        "validations": [{"logic": [">=", ["str:len", ["$ref"]], 3], "err": "Too short"}]
                    },
                    {"key": "age", "type": "number", "isRequired": true},
                    {
                        "key": "gender",
                        "type": "enum",
                        "items": [{"value": "male", "label": "Male"}, {"value": "female", "label": "Female"}],
                        "errMsgs": {"enum": "Pick one"}
                    },
                    {
                        "key": "arr",
                        "type": "array",
                        "itemSchema": {
                            "type": "object",
                            "properties": [{"key": "field", "type": "string", "isRequired": true}]
                        }
                    }
                ]
            }),
            &Operators::new(),
        )
        .expect("schema")
    }

    fn store(initial: Value) -> Store {
        Store::new(schema(), Some(initial), FormConfig::default())
    }

    #[test]
    fn initial_validation_runs_on_load() {
        let s = store(json!({"name": "Jo"}));
        assert_eq!(s.errors(&path!["name"]), &["Too short".to_string()]);
        assert_eq!(s.errors(&path!["age"]), &["This field is required.".to_string()]);
        assert!(s.errors(&path!["gender"]).is_empty());
    }

    #[test]
    fn validate_on_load_can_be_disabled() {
        let config = FormConfig {
            validate_on_load: false,
            ..FormConfig::default()
        };
        let s = Store::new(schema(), None, config);
        assert_eq!(s.error_entries().count(), 0);
        assert_eq!(s.data(), &json!({}));
    }

    #[test]
    fn type_and_enum_checks() {
        let mut s = store(json!({}));
        s.set(&path!["age"], json!("ten")).expect("set");
        assert_eq!(s.errors(&path!["age"]), &["Value has the wrong type.".to_string()]);
        s.set(&path!["gender"], json!("other")).expect("set");
        assert_eq!(s.errors(&path!["gender"]), &["Pick one".to_string()]);
        s.set(&path!["gender"], json!("female")).expect("set");
        assert!(s.errors(&path!["gender"]).is_empty());
    }

    #[test]
    fn set_reports_changes() {
        let mut s = store(json!({"age": 3}));
        let changes = s.set(&path!["name"], json!("Kishore")).expect("set");
        assert_eq!(changes.writes, vec![(path!["name"], None)]);
        assert_eq!(changes.errors, BTreeSet::from([path!["name"]]));

        // same value again: nothing observable moves
        let again = s.set(&path!["name"], json!("Kishore")).expect("set");
        assert!(again.is_empty());
    }

    #[test]
    fn shape_mismatch_leaves_tree_untouched() {
        let mut s = store(json!({"name": "Kishore", "age": 3}));
        let before = s.data().clone();

        let err = s.set(&path!["name", "first"], json!("x")).unwrap_err();
        assert_eq!(err.code(), "FLOWJV_E_PATH_SHAPE");
        assert!(s.set(&path!["arr", "x"], json!(1)).is_err());
        assert!(s.set(&path!["missing"], json!(1)).is_err());
        assert!(s.mark_touched(&path!["missing"], true).is_err());
        assert_eq!(s.data(), &before);
    }

    #[test]
    fn writes_through_scalars_in_the_live_tree_are_rejected() {
        let mut s = store(json!({"arr": "not-an-array"}));
        let err = s.set(&path!["arr", 0, "field"], json!("v")).unwrap_err();
        assert!(matches!(err, FlowError::PathShapeMismatch { .. }));
        assert_eq!(s.get(&path!["arr"]), Some(&json!("not-an-array")));
    }

    #[test]
    fn shrinking_an_array_drops_stale_errors() {
        let mut s = store(json!({"arr": [{}, {}, {}]}));
        assert_eq!(s.errors(&path!["arr", 2, "field"]).len(), 1);

        let changes = s.set(&path!["arr"], json!([{"field": "a"}])).expect("set");
        assert!(s.errors(&path!["arr", 2, "field"]).is_empty());
        assert!(s.errors(&path!["arr", 0, "field"]).is_empty());
        assert!(changes.errors.contains(&path!["arr", 2, "field"]));
        assert!(changes.errors.contains(&path!["arr", 0, "field"]));
    }

    #[test]
    fn elongation_validates_the_padding_holes() {
        let mut s = store(json!({"arr": []}));
        let changes = s.set(&path!["arr", 2, "field"], json!("v")).expect("set");

        assert_eq!(s.get(&path!["arr"]), Some(&json!([null, null, {"field": "v"}])));
        assert_eq!(s.errors(&path!["arr", 0, "field"]), &["This field is required.".to_string()]);
        assert_eq!(s.errors(&path!["arr", 1, "field"]).len(), 1);
        assert!(s.errors(&path!["arr", 2, "field"]).is_empty());
        assert!(changes.errors.contains(&path!["arr", 0, "field"]));
        assert_eq!(changes.writes, vec![(path!["arr"], Some(json!([])))]);
    }

    #[test]
    fn padding_only_writes_are_recorded_at_the_array() {
        let mut s = store(json!({"arr": []}));
        let changes = s.set(&path!["arr", 2], Value::Null).expect("set");

        assert_eq!(s.get(&path!["arr"]), Some(&json!([null, null, null])));
        assert_eq!(changes.writes, vec![(path!["arr"], Some(json!([])))]);
        assert!(changes.affects(&path!["arr"], &s));
        assert!(!changes.affects(&path!["name"], &s));

        // a missing container is created and recorded where it starts
        let mut fresh = store(json!({}));
        let changes = fresh.set(&path!["arr", 0, "field"], json!("v")).expect("set");
        assert_eq!(changes.writes, vec![(path!["arr"], None)]);
    }

    #[test]
    fn touched_flags_and_touch_all() {
        let mut s = store(json!({"arr": [{}]}));
        assert!(s.mark_touched(&path!["name"], true).expect("touch").touched.contains(&path!["name"]));
        assert!(s.mark_touched(&path!["name"], true).expect("touch").is_empty());
        assert!(s.is_touched(&path!["name"]));

        let changes = s.touch_all();
        assert!(!changes.touched.contains(&path!["name"]));
        assert!(changes.touched.contains(&path!["arr", 0, "field"]));
        assert!(s.is_touched(&path!["age"]));

        s.mark_touched(&path!["name"], false).expect("untouch");
        assert!(!s.is_touched(&path!["name"]));
    }

    #[test]
    fn reset_replaces_everything() {
        let mut s = store(json!({"name": "Jo"}));
        s.mark_touched(&path!["name"], true).expect("touch");
        let changes = s.reset(json!({"name": "Kishore", "age": 30}));

        assert!(!s.is_touched(&path!["name"]));
        assert!(changes.touched.contains(&path!["name"]));
        assert!(changes.errors.contains(&path!["name"]));
        assert!(changes.errors.contains(&path!["age"]));
        assert_eq!(s.error_entries().count(), 0);
        assert_eq!(changes.writes.len(), 1);
    }

    #[test]
    fn affects_matches_descendants_and_changed_ancestor_writes() {
        let mut s = store(json!({"arr": [{"field": "a"}, {"field": "b"}]}));
        let changes = s.set(&path!["arr"], json!([{"field": "a"}, {"field": "c"}])).expect("set");

        assert!(changes.affects(&Path::root(), &s));
        assert!(changes.affects(&path!["arr"], &s));
        assert!(changes.affects(&path!["arr", 1, "field"], &s));
        assert!(!changes.affects(&path!["arr", 0, "field"], &s));
        assert!(!changes.affects(&path!["name"], &s));
    }
}
