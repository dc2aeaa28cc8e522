//! The form wrapper: wire-format boundary around the base engine.
//!
//! Callers hand the form wire-format values (flat strings, split range
//! keys); the base engine and its widgets work on widget-form values (rich
//! dates, combined range pairs). This wrapper owns that translation in both
//! directions and otherwise exposes the base engine's imperative contract
//! unchanged.

use std::sync::Arc;

use indexmap::IndexMap;

use formflow_types::{FieldValue, FormEvent, FormItem, ValueMap, WidgetHandle};

use crate::dict::DictionaryCache;
use crate::error::{FormError, ValidationFailure};
use crate::form::{BaseForm, RenderedField};
use crate::timefmt::{time_items, to_widget_form, to_wire_form};

/// A base form with wire-format translation at the boundary.
pub struct Form {
    base: BaseForm,
    time_items: Vec<FormItem>,
}

impl Form {
    /// Mounts the wrapped engine. When the inbound transform synthesizes a
    /// date default, an extra update+change pair propagates it upstream.
    pub async fn mount(
        items: Vec<FormItem>,
        overrides: Option<Vec<FormItem>>,
        value: ValueMap,
        dictionaries: Arc<DictionaryCache>,
    ) -> Result<(Self, Vec<FormEvent>), FormError> {
        let temporal = time_items(&items);
        let (widget_value, synthesized) = to_widget_form(&temporal, value);
        let (base, events) = BaseForm::mount(items, overrides, widget_value, dictionaries).await?;
        let form = Self {
            base,
            time_items: temporal,
        };
        let mut events = form.wire_events(events);
        if synthesized {
            let snapshot = form.value();
            events.push(FormEvent::Updated(snapshot.clone()));
            events.push(FormEvent::Changed(snapshot, Vec::new()));
        }
        Ok((form, events))
    }

    fn wire(&self, value: ValueMap) -> ValueMap {
        to_wire_form(&self.time_items, value)
    }

    fn wire_events(&self, events: Vec<FormEvent>) -> Vec<FormEvent> {
        events
            .into_iter()
            .map(|event| match event {
                FormEvent::Updated(value) => FormEvent::Updated(self.wire(value)),
                FormEvent::Changed(value, names) => FormEvent::Changed(self.wire(value), names),
            })
            .collect()
    }

    /// Wire-form snapshot of the live value object.
    pub fn value(&self) -> ValueMap {
        self.wire(self.base.value().clone())
    }

    /// External value replacement in wire form. A synthesized date default
    /// produces an update+change pair the caller must apply.
    pub fn set_value(&mut self, value: ValueMap) -> Vec<FormEvent> {
        let (widget_value, synthesized) = to_widget_form(&self.time_items, value);
        self.base.set_value(widget_value);
        if synthesized {
            let snapshot = self.value();
            vec![FormEvent::Updated(snapshot.clone()), FormEvent::Changed(snapshot, Vec::new())]
        } else {
            Vec::new()
        }
    }

    /// Replaces the schema and recomputes the temporal item list.
    pub async fn set_items(&mut self, items: Vec<FormItem>) -> Result<Vec<FormEvent>, FormError> {
        self.time_items = time_items(&items);
        let events = self.base.set_items(items).await?;
        Ok(self.wire_events(events))
    }

    /// Commits a widget edit (widget-form value), re-emitting in wire form.
    pub async fn input(&mut self, name: &str, value: FieldValue) -> Vec<FormEvent> {
        let events = self.base.input(name, value).await;
        self.wire_events(events)
    }

    /// Partial patch in wire form; translated before delegation.
    pub async fn set_fields(&mut self, patch: ValueMap) -> Vec<FormEvent> {
        let (patch, _) = to_widget_form(&self.time_items, patch);
        let events = self.base.set_fields(patch).await;
        self.wire_events(events)
    }

    pub fn reset_fields(&mut self) -> Vec<FormEvent> {
        let events = self.base.reset_fields();
        self.wire_events(events)
    }

    /// Empties the form outright.
    pub fn clear_fields(&mut self) -> Vec<FormEvent> {
        self.base.set_value(ValueMap::new());
        vec![FormEvent::Updated(ValueMap::new()), FormEvent::Changed(ValueMap::new(), Vec::new())]
    }

    /// Validates and resolves with the wire-transformed snapshot.
    pub async fn validate(&mut self) -> Result<ValueMap, ValidationFailure> {
        let snapshot = self.base.validate().await?;
        Ok(to_wire_form(&self.time_items, snapshot))
    }

    pub async fn validate_fields(&mut self, names: &[String]) -> Result<(), ValidationFailure> {
        self.base.validate_fields(names).await
    }

    pub fn clear_validate(&mut self, names: Option<&[String]>) {
        self.base.clear_validate(names);
    }

    pub fn fields(&self) -> Vec<RenderedField> {
        self.base.fields()
    }

    pub fn errors(&self) -> &IndexMap<String, String> {
        self.base.errors()
    }

    pub fn set_row_context(&mut self, rows: Vec<ValueMap>, index: usize) {
        self.base.set_row_context(rows, index);
    }

    pub fn register_handle(&mut self, name: impl Into<String>, handle: Arc<dyn WidgetHandle>) {
        self.base.register_handle(name, handle);
    }

    pub fn unregister_handle(&mut self, name: &str) {
        self.base.unregister_handle(name);
    }

    pub fn handle(&self, name: &str) -> Option<Arc<dyn WidgetHandle>> {
        self.base.handle(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::DictionarySource;
    use async_trait::async_trait;
    use formflow_types::WidgetKind;
    use std::collections::HashMap;

    #[derive(Debug)]
    struct EmptySource;

    #[async_trait]
    impl DictionarySource for EmptySource {
        async fn fetch(&self, _codes: &[String]) -> anyhow::Result<HashMap<String, Vec<serde_json::Value>>> {
            Ok(HashMap::new())
        }
    }

    fn cache() -> Arc<DictionaryCache> {
        Arc::new(DictionaryCache::new(Arc::new(EmptySource)))
    }

    #[tokio::test]
    async fn validate_resolves_with_wire_snapshot() {
        let items = vec![
            FormItem::field("period,period_end", "Period", WidgetKind::RangePicker),
            FormItem::field("note", "Note", WidgetKind::Input),
        ];
        let mut value = ValueMap::new();
        value.insert("period".into(), "2024-03-01".into());
        value.insert("period_end".into(), "2024-03-02".into());
        let (mut form, _) = Form::mount(items, None, value, cache()).await.unwrap();

        // Widget side sees the combined date pair.
        assert!(matches!(form.fields()[0].value, FieldValue::List(_)));
        let snapshot = form.validate().await.unwrap();
        assert_eq!(snapshot.get("period"), Some(&FieldValue::Text("2024-03-01 00:00:00".into())));
        assert_eq!(snapshot.get("period_end"), Some(&FieldValue::Text("2024-03-02 23:59:59".into())));
        assert!(snapshot.get("period,period_end").is_none());
    }

    #[tokio::test]
    async fn synthesized_date_default_propagates_upstream() {
        let mut day = FormItem::field("day", "Day", WidgetKind::DatePicker);
        day.default_value = Some("2024-01-15".into());
        let (_, events) = Form::mount(vec![day], None, ValueMap::new(), cache()).await.unwrap();

        // Materialization pair plus the synthesized-default pair.
        assert!(
            events
                .iter()
                .any(|event| matches!(event, FormEvent::Updated(value) if value.get("day").is_some()))
        );
    }

    #[tokio::test]
    async fn clear_fields_empties_the_value() {
        let items = vec![FormItem::field("name", "Name", WidgetKind::Input)];
        let mut value = ValueMap::new();
        value.insert("name".into(), "jo".into());
        let (mut form, _) = Form::mount(items, None, value, cache()).await.unwrap();

        let events = form.clear_fields();
        assert_eq!(events[0], FormEvent::Updated(ValueMap::new()));
        assert!(form.value().is_empty());
    }
}
