//! Events the engine reports back to its host.
//!
//! Mutating operations return an event batch rather than invoking callbacks;
//! the host drains the batch, feeds `Updated` payloads back into its own
//! state, and reacts to `Changed` notifications. Per commit the order is
//! always update first, change second.

use crate::value::ValueMap;

/// Events emitted by a single form instance.
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    /// Two-way binding update carrying the full value object.
    Updated(ValueMap),
    /// Change notification: the value object plus the names that changed.
    /// An empty name list marks a whole-form transition (reset, clear).
    Changed(ValueMap, Vec<String>),
}

/// Events emitted by the repeating form list.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    /// Row array replacement; `None` when the list became empty.
    Updated(Option<Vec<ValueMap>>),
    /// Change notification mirroring [`ListEvent::Updated`].
    Changed(Option<Vec<ValueMap>>),
    /// The removed row, emitted between update and change on removal.
    Deleted(ValueMap),
}
