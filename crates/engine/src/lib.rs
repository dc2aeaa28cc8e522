//! # Formflow Engine
//!
//! The Formflow Engine drives schema-declared forms: it computes the
//! effective field schema, owns the live value object for the duration of a
//! mount, runs validation, and tells the host exactly what to render. The
//! host owns the widgets; the engine owns the semantics.
//!
//! ## Key Features
//!
//! - **Schema Resolution**: Override merge, stable sort-order, dictionary
//!   option resolution with an injected cache
//! - **Value Model**: Committed vs. shadow value objects, so visibility
//!   predicates never react to an in-flight keystroke
//! - **Validation**: Widget-handle checks, rule lists with a built-in
//!   required message, async custom validators
//! - **Time Boundaries**: Date and range fields cross the engine boundary
//!   in wire form and live in widget form inside it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use formflow_engine::{DictionaryCache, Form};
//! use formflow_types::{FormItem, ValueMap, WidgetKind};
//!
//! # async fn demo(dictionaries: Arc<DictionaryCache>) -> anyhow::Result<()> {
//! let items = vec![
//!     FormItem::field("name", "Name", WidgetKind::Input),
//!     FormItem::field("level", "Level", WidgetKind::Select),
//! ];
//! let (mut form, _events) = Form::mount(items, None, ValueMap::new(), dictionaries).await?;
//! form.input("name", "oat".into()).await;
//! let value = form.validate().await?;
//! println!("submitting {value:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`form`**: The base engine and the render contract ([`RenderedField`])
//! - **`wrapper`**: [`Form`], the base engine plus boundary time transforms
//! - **`list`**: [`FormList`], ordered rows of independent forms
//! - **`filter`**: [`FilterBar`], the search bar shell
//! - **`dict`**: Dictionary source trait and memoizing cache
//! - **`schema`**: Override merge and dictionary resolution passes

pub mod dict;
pub mod error;
pub mod filter;
pub mod form;
pub mod list;
pub mod schema;
pub mod timefmt;
pub mod wrapper;

pub use dict::{DictionaryCache, DictionarySource};
pub use error::{FieldError, FormError, ValidationFailure};
pub use filter::{FilterBar, QueryFn, SearchItem};
pub use form::{BaseForm, RenderedField};
pub use list::{FormList, ListSchema, RowId, RowSchemaFn};
pub use schema::merge_overrides;
pub use wrapper::Form;
