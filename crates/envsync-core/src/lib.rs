//! Structural core for envsync
//!
//! Provides the primitives the sync pipeline is built from: glob matching of
//! file paths, a path-expression language for reading and rewriting parsed
//! documents, rule application (fixed values, skip paths, exclusions) and
//! detection of array changes between two versions of a document.

pub mod config;
pub mod diff;
pub mod error;
pub mod glob;
pub mod logging;
pub mod path;
pub mod rules;

pub use config::{ArraySortRule, FixedValueRule, OutputFormat, SortOrder, SyncConfig};
pub use diff::{ArrayChange, ChangeInfo, detect_array_changes};
pub use error::{Error, Result};
pub use glob::{CompiledPattern, GlobCache};
pub use path::{
    FilterOperator, FilterSpec, PathCache, PathExpression, PathSegment, get_value_at_path,
    parse_path, remove_value_at_path, set_value_at_path,
};
pub use rules::RuleContext;
