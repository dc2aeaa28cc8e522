//! The repeating form list.
//!
//! An ordered collection of independent value objects, each rendered
//! through its own [`Form`] instance sharing one schema. The schema may be
//! a static list or a per-row function of `(all_rows, row_index)`, so one
//! row's fields can depend on another row's values.
//!
//! Rows are spliced positionally, but each row carries a synthetic stable
//! [`RowId`] assigned at creation; drag tracking resolves through ids so a
//! reorder that lands mid-gesture cannot mis-target.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::debug;

use formflow_types::{FieldValue, FormEvent, FormItem, ListEvent, ValueMap};

use crate::dict::DictionaryCache;
use crate::error::{FormError, ValidationFailure};
use crate::wrapper::Form;

/// Per-row schema function: `(all_rows, row_index) -> items`.
pub type RowSchemaFn = Arc<dyn Fn(&[ValueMap], usize) -> Vec<FormItem> + Send + Sync>;

/// Static schema shared by every row, or a per-row schema function.
#[derive(Clone)]
pub enum ListSchema {
    Static(Vec<FormItem>),
    PerRow(RowSchemaFn),
}

impl ListSchema {
    fn items_for(&self, rows: &[ValueMap], index: usize) -> Vec<FormItem> {
        match self {
            ListSchema::Static(items) => items.clone(),
            ListSchema::PerRow(schema) => schema(rows, index),
        }
    }
}

/// Synthetic stable row identity, assigned at row creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId(u64);

struct FormRow {
    id: RowId,
    form: Form,
}

#[derive(Default)]
struct DragState {
    dragging: Option<RowId>,
    target: Option<RowId>,
}

/// Manager for an ordered sequence of form instances.
pub struct FormList {
    schema: ListSchema,
    rows: Vec<FormRow>,
    values: Vec<ValueMap>,
    dictionaries: Arc<DictionaryCache>,
    next_row_id: u64,
    drag: DragState,
}

impl FormList {
    pub async fn mount(schema: ListSchema, values: Vec<ValueMap>, dictionaries: Arc<DictionaryCache>) -> Result<Self, FormError> {
        let mut list = Self {
            schema,
            rows: Vec::new(),
            values,
            dictionaries,
            next_row_id: 0,
            drag: DragState::default(),
        };
        list.rebuild().await?;
        Ok(list)
    }

    /// Current row values, in order.
    pub fn rows(&self) -> &[ValueMap] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stable id of the row at `index`.
    pub fn row_id(&self, index: usize) -> Option<RowId> {
        self.rows.get(index).map(|row| row.id)
    }

    /// The row's form, for direct imperative access.
    pub fn form(&mut self, index: usize) -> Option<&mut Form> {
        self.rows.get_mut(index).map(|row| &mut row.form)
    }

    /// Appends an empty row. Emits nothing: the host sees the new row on
    /// its next read, matching add-then-edit flows.
    pub async fn add(&mut self) -> Result<(), FormError> {
        self.values.push(ValueMap::new());
        self.rebuild().await
    }

    /// Removes the row at `index`, emitting the removed row between the
    /// update and change notifications. The payload turns `None` when the
    /// list becomes empty.
    pub async fn remove(&mut self, index: usize) -> Result<Vec<ListEvent>, FormError> {
        if index >= self.values.len() {
            return Ok(Vec::new());
        }
        let removed = self.values.remove(index);
        self.rows.remove(index);
        self.rebuild().await?;
        let payload = if self.values.is_empty() { None } else { Some(self.values.clone()) };
        Ok(vec![
            ListEvent::Updated(payload.clone()),
            ListEvent::Deleted(removed),
            ListEvent::Changed(payload),
        ])
    }

    /// Commits a widget edit inside one row and propagates the new row
    /// array to the host.
    pub async fn input(&mut self, index: usize, name: &str, value: FieldValue) -> Result<Vec<ListEvent>, FormError> {
        let Some(row) = self.rows.get_mut(index) else {
            return Ok(Vec::new());
        };
        let events = row.form.input(name, value).await;
        if let Some(FormEvent::Updated(updated)) = events.iter().find(|event| matches!(event, FormEvent::Updated(_))) {
            self.values[index] = updated.clone();
        }
        self.refresh_row_schemas().await?;
        Ok(vec![
            ListEvent::Updated(Some(self.values.clone())),
            ListEvent::Changed(Some(self.values.clone())),
        ])
    }

    /// Begins a drag gesture on the row at `index`.
    pub fn drag_start(&mut self, index: usize) {
        self.drag.dragging = self.row_id(index);
    }

    /// Tracks the row currently under the pointer.
    pub fn drag_over(&mut self, index: usize) {
        self.drag.target = self.row_id(index);
    }

    /// Releases the gesture. When both endpoints are known and differ, the
    /// dragged row is splice-moved to the target position and exactly one
    /// update+change pair fires.
    pub async fn drag_end(&mut self) -> Result<Vec<ListEvent>, FormError> {
        let dragging = self.drag.dragging.take();
        let target = self.drag.target.take();
        let (Some(dragging), Some(target)) = (dragging, target) else {
            return Ok(Vec::new());
        };
        let from = self.rows.iter().position(|row| row.id == dragging);
        let to = self.rows.iter().position(|row| row.id == target);
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(Vec::new());
        };
        if from == to {
            return Ok(Vec::new());
        }
        debug!(from, to, "reordering rows");
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
        let value = self.values.remove(from);
        self.values.insert(to, value);
        self.refresh_row_schemas().await?;
        Ok(vec![
            ListEvent::Updated(Some(self.values.clone())),
            ListEvent::Changed(Some(self.values.clone())),
        ])
    }

    /// Wholesale row replacement.
    pub async fn set_rows(&mut self, values: Vec<ValueMap>) -> Result<(), FormError> {
        self.values = values;
        self.rows.clear();
        self.rebuild().await
    }

    /// Validates every row in parallel. Succeeds only when every row
    /// succeeds, returning each row's wire-form snapshot; otherwise the
    /// first failure is returned and no partial result is surfaced.
    pub async fn validate(&mut self) -> Result<Vec<ValueMap>, ValidationFailure> {
        let values = self.values.clone();
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.form.set_row_context(values.clone(), index);
        }
        let results = join_all(self.rows.iter_mut().map(|row| row.form.validate())).await;
        let mut snapshots = Vec::with_capacity(results.len());
        for result in results {
            snapshots.push(result?);
        }
        Ok(snapshots)
    }

    /// Rebuilds every row's form. Surviving rows keep their id by
    /// position; new positions get fresh ids.
    async fn rebuild(&mut self) -> Result<(), FormError> {
        let values = self.values.clone();
        let mut rows = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let id = match self.rows.get(index) {
                Some(existing) => existing.id,
                None => {
                    self.next_row_id += 1;
                    RowId(self.next_row_id)
                }
            };
            let items = self.schema.items_for(&values, index);
            let (mut form, _) = Form::mount(items, None, value.clone(), Arc::clone(&self.dictionaries)).await?;
            form.set_row_context(values.clone(), index);
            rows.push(FormRow { id, form });
        }
        self.rows = rows;
        // Default materialization may have filled values in; sync back.
        for index in 0..self.rows.len() {
            self.values[index] = self.rows[index].form.value();
        }
        let values = self.values.clone();
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.form.set_row_context(values.clone(), index);
        }
        Ok(())
    }

    /// Re-applies committed values, per-row schemas, and row contexts after
    /// values shift. The list is each row's host: an acknowledged edit
    /// becomes the row's committed state here, so row predicates see it on
    /// the next render.
    async fn refresh_row_schemas(&mut self) -> Result<(), FormError> {
        let values = self.values.clone();
        let per_row = matches!(self.schema, ListSchema::PerRow(_));
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.form.set_value(values[index].clone());
            if per_row {
                let items = self.schema.items_for(&values, index);
                row.form.set_items(items).await?;
            }
            row.form.set_row_context(values.clone(), index);
        }
        if per_row {
            for index in 0..self.rows.len() {
                self.values[index] = self.rows[index].form.value();
            }
        }
        Ok(())
    }
}
