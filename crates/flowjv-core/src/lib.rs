//! flowjv core crate.
//!
//! A schema-driven form engine: a declarative schema describes a nested data
//! tree, its validations are JSON logic expressions, and a live store keeps
//! the data, per-path errors and touched flags consistent after every write.
//!
//! Layers, bottom up:
//!
//! - `path` + `tree`: addressing and mutating a `serde_json::Value` tree.
//! - `logic`: expression compiler and evaluator with a custom-operator hook.
//! - `schema`: authored document and the loaded node arena.
//! - `deps`: static `$data` dependency index built at load.
//! - `store`: data, errors and touched state with synchronous revalidation.
//! - `subscribe` + `form`: path subscriptions dispatched after each mutation
//!   has settled.
//!
//! ```
//! use flowjv_core::{Form, FormConfig, path};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": [
//!         {"key": "password", "type": "string"},
//!         {
//!             "key": "confirm",
//!             "type": "string",
//!             "validations": [{"logic": ["===", ["$ref"], ["$data", "password"]], "err": "mismatch"}]
//!         }
//!     ]
//! });
//! let mut form = Form::new(&schema, None, FormConfig::default()).unwrap();
//! form.set(&path!["confirm"], json!("a")).unwrap();
//! assert_eq!(form.errors(&path!["confirm"]), ["mismatch"]);
//! form.set(&path!["password"], json!("a")).unwrap();
//! assert!(form.errors(&path!["confirm"]).is_empty());
//! ```

pub mod config;
pub mod deps;
pub mod error;
pub mod form;
pub mod logic;
pub mod path;
pub mod schema;
pub mod store;
pub mod subscribe;
pub mod tree;

pub use config::FormConfig;
pub use deps::DependencyIndex;
pub use error::{FlowError, LogicError, SchemaError};
pub use form::Form;
pub use logic::{CustomOperator, EvalContext, Expr, Operators, compile, compile_with, evaluate};
pub use path::{Path, Segment};
pub use schema::{NodeId, NodeKind, Schema, SchemaDoc, SchemaNode};
pub use store::{Changes, Store};
pub use subscribe::{Router, SubscriptionId};
