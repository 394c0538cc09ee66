//! treeschema
//!
//! Validation of hierarchical scientific-data containers (trees of
//! groups, datasets and attributes with typed payloads and shapes)
//! against declarative JSON-compatible schemas.
//!
//! ## Features
//!
//! - **Structural checks**: node kinds, member presence, dtype
//!   descriptors (simple and compound record layouts), shapes with
//!   wildcard dimensions
//! - **Pattern members**: regex-keyed group children, literal-wins
//!   resolution
//! - **Combinators**: `allOf` / `anyOf` / `oneOf` / `not`,
//!   `if`/`then`/`else` conditionals, `dependentRequired` and
//!   `dependentSchemas`
//! - **References**: `$ref` into a `$defs` registry, cycle-safe
//!   evaluation and cycle diagnostics
//! - **Value constraints**: `enum`, `const`, string lengths, `pattern`,
//!   named `format` validators
//! - **Errors as values**: a complete, path-annotated error list per
//!   validation run
//!
//! ## Example
//!
//! ```no_run
//! use treeschema::{validate, MemoryTree, SchemaDoc};
//!
//! let schema = SchemaDoc::from_path("schema.json")?;
//! let tree = MemoryTree::from_path("tree.json")?;
//! for error in validate(tree.root(), &schema) {
//!     eprintln!("{}", error);
//! }
//! # Ok::<(), treeschema::SchemaError>(())
//! ```

pub mod dtype;
pub mod error;
pub mod format;
pub mod generate;
pub mod report;
pub mod schema;
pub mod tree;
pub mod validator;
pub mod value;

pub use dtype::Dtype;
pub use error::{Result, SchemaError};
pub use report::{ErrorKind, ErrorRecord};
pub use schema::SchemaDoc;
pub use tree::{MemoryNode, MemoryTree, NodeKind, TreeNode};
pub use validator::{is_valid, validate, Validator};
pub use value::{AttrData, AttrValue, ScalarValue};
