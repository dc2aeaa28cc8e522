//! Widget capability handles.
//!
//! Rendered widgets register a capability object with the engine as they
//! mount and remove it as they unmount. The engine only ever talks to this
//! trait, never to host-framework internals.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::value::FieldValue;

/// Capability a mounted widget exposes back to the engine.
#[async_trait]
pub trait WidgetHandle: Send + Sync + Debug {
    /// Widget-internal validation, e.g. an upload widget confirming every
    /// file finished transferring. `false` short-circuits whole-form
    /// validation.
    async fn validate(&self) -> bool {
        true
    }

    /// Widget-internal reset. A returned value is written back into the
    /// value object for fields without a schema `default_value`.
    fn reset(&self) -> Option<FieldValue> {
        None
    }
}

/// Registry of currently mounted widget handles, keyed by field name.
pub type HandleMap = IndexMap<String, Arc<dyn WidgetHandle>>;
