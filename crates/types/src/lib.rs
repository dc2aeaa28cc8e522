//! # Formflow Types
//!
//! Shared type definitions for the formflow engine: the declarative schema
//! model ([`FormItem`]), the flat value object ([`ValueMap`]), option trees
//! resolved from dictionaries, and the events the engine emits back to its
//! host. These types are pure data plus a handful of callback seams; all
//! evaluation logic lives in `formflow-engine`.

pub mod event;
pub mod handle;
pub mod options;
pub mod schema;
pub mod value;

pub use event::{FormEvent, ListEvent};
pub use handle::{HandleMap, WidgetHandle};
pub use options::{OptionEntry, deep_find, find_tree_path, flatten_tree};
pub use schema::{
    ChangeContext, ChangeHook, DEFAULT_COLUMN_SPAN, DEFAULT_SORT_ORDER, DictionaryRef, FieldValidator, Flag, FormItem, LabelAlign, Rule,
    TimeFormat, ValidatorContext, ValueTransform, WidgetKind,
};
pub use value::{FieldValue, ValueMap};
