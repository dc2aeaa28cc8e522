//! The base form engine.
//!
//! Owns the live value object for the duration of a mount, computes the
//! effective per-field schema, evaluates show/required/disabled predicates,
//! runs validation, and exposes the imperative contract (reset, set-fields,
//! validate, clear-validate, widget handles).
//!
//! Two value objects are tracked. `committed` is the last value the host
//! acknowledged (the external, parent-supplied state); every predicate is
//! evaluated against it, so visibility never reacts to an uncommitted
//! keystroke. `shadow` is the working copy edits land in; it is what
//! `validate()` snapshots. The host closes the loop by feeding each
//! [`FormEvent::Updated`] payload back through [`BaseForm::set_value`].

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use formflow_types::{
    ChangeContext, DEFAULT_COLUMN_SPAN, FieldValue, FormEvent, FormItem, HandleMap, LabelAlign, OptionEntry, Rule, ValidatorContext,
    ValueMap, WidgetHandle, WidgetKind,
};

use crate::dict::DictionaryCache;
use crate::error::{FieldError, FormError, ValidationFailure};
use crate::schema::{merge_overrides, resolve_dictionaries};

/// Effective, render-ready description of one visible field. The host maps
/// these onto its concrete widget toolkit.
#[derive(Debug, Clone)]
pub struct RenderedField {
    /// Binding key; `None` marks a custom layout slot.
    pub name: Option<String>,
    pub title: Option<String>,
    pub widget: WidgetKind,
    /// Bound value: `format_in` applied to the committed value.
    pub value: FieldValue,
    /// Built rule list: default required-message rule first, user rules
    /// after. The async field validator stays engine-side.
    pub rules: Vec<Rule>,
    pub required: bool,
    pub disabled: bool,
    pub placeholder: String,
    pub options: Vec<OptionEntry>,
    pub column_span: u8,
    pub label_align: LabelAlign,
}

/// Builds the rule list for one field: the default required-message rule is
/// always first ("please select" for selection-style widgets, "please
/// enter" otherwise, plus the lowercased title), user rules follow.
pub(crate) fn build_rules(item: &FormItem, committed: &ValueMap) -> Vec<Rule> {
    let prefix = if item.widget_kind().is_selection() {
        "please select"
    } else {
        "please enter"
    };
    let message = match &item.title {
        Some(title) => format!("{prefix} {}", title.to_lowercase()),
        None => prefix.to_string(),
    };
    let mut rules = vec![Rule {
        required: item.is_required(committed),
        message: Some(message),
        ..Rule::default()
    }];
    rules.extend(item.rules.iter().cloned());
    rules
}

/// The central form engine. See the module docs for the value model.
pub struct BaseForm {
    items: Vec<FormItem>,
    overrides: Option<Vec<FormItem>>,
    resolved: Vec<FormItem>,
    committed: ValueMap,
    shadow: ValueMap,
    index: usize,
    rows: Option<Vec<ValueMap>>,
    handles: HandleMap,
    errors: IndexMap<String, String>,
    dictionaries: Arc<DictionaryCache>,
}

impl BaseForm {
    /// Mounts a form: resolves the schema (dictionaries included) and runs
    /// default-field materialization. Events produced by materialization
    /// are returned alongside the engine.
    pub async fn mount(
        items: Vec<FormItem>,
        overrides: Option<Vec<FormItem>>,
        value: ValueMap,
        dictionaries: Arc<DictionaryCache>,
    ) -> Result<(Self, Vec<FormEvent>), FormError> {
        let mut form = Self {
            items,
            overrides,
            resolved: Vec::new(),
            committed: value.clone(),
            shadow: value,
            index: 0,
            rows: None,
            handles: HandleMap::new(),
            errors: IndexMap::new(),
            dictionaries,
        };
        let events = form.refresh_schema().await?;
        Ok((form, events))
    }

    /// Recomputes the effective schema: override merge, then dictionary
    /// resolution in schema order, then default materialization. The
    /// exclusive borrow serializes passes, so a superseded pass can never
    /// land after a newer one.
    pub async fn refresh_schema(&mut self) -> Result<Vec<FormEvent>, FormError> {
        let merged = match &self.overrides {
            Some(overrides) => merge_overrides(&self.items, overrides),
            None => self.items.clone(),
        };
        self.resolved = resolve_dictionaries(merged, &self.dictionaries).await?;
        Ok(self.set_default_fields().await)
    }

    /// Replaces the raw schema and recomputes.
    pub async fn set_items(&mut self, items: Vec<FormItem>) -> Result<Vec<FormEvent>, FormError> {
        self.items = items;
        self.refresh_schema().await
    }

    /// Replaces the override list and recomputes.
    pub async fn set_overrides(&mut self, overrides: Option<Vec<FormItem>>) -> Result<Vec<FormEvent>, FormError> {
        self.overrides = overrides;
        self.refresh_schema().await
    }

    /// Wholesale external value replacement (the v-model write-back path).
    pub fn set_value(&mut self, value: ValueMap) {
        self.committed = value.clone();
        self.shadow = value;
    }

    /// The live (shadow) value object.
    pub fn value(&self) -> &ValueMap {
        &self.shadow
    }

    /// The last committed (externally acknowledged) value object.
    pub fn committed(&self) -> &ValueMap {
        &self.committed
    }

    /// The resolved effective schema.
    pub fn schema(&self) -> &[FormItem] {
        &self.resolved
    }

    /// Currently displayed validation errors, keyed by field name.
    pub fn errors(&self) -> &IndexMap<String, String> {
        &self.errors
    }

    /// Sibling-row context for repeating-list validators.
    pub fn set_row_context(&mut self, rows: Vec<ValueMap>, index: usize) {
        self.rows = Some(rows);
        self.index = index;
    }

    /// Registers a widget capability as the widget mounts.
    pub fn register_handle(&mut self, name: impl Into<String>, handle: Arc<dyn WidgetHandle>) {
        self.handles.insert(name.into(), handle);
    }

    /// Removes a widget capability as the widget unmounts.
    pub fn unregister_handle(&mut self, name: &str) {
        self.handles.shift_remove(name);
    }

    /// Escape hatch: the live widget capability for advanced external
    /// control.
    pub fn handle(&self, name: &str) -> Option<Arc<dyn WidgetHandle>> {
        self.handles.get(name).cloned()
    }

    /// Computes the render-ready field list for the current committed
    /// value. Hidden fields are omitted.
    pub fn fields(&self) -> Vec<RenderedField> {
        let mut fields = Vec::new();
        for item in &self.resolved {
            if !item.is_shown(&self.committed) {
                continue;
            }
            let widget = item.widget_kind();
            let disabled = item.is_disabled(&self.committed);
            let Some(name) = item.name.clone() else {
                // Pure custom layout slot: no binding, no rules.
                fields.push(RenderedField {
                    name: None,
                    title: item.title.clone(),
                    widget,
                    value: FieldValue::Null,
                    rules: Vec::new(),
                    required: false,
                    disabled,
                    placeholder: String::new(),
                    options: Vec::new(),
                    column_span: item.column_span.unwrap_or(DEFAULT_COLUMN_SPAN),
                    label_align: item.label_align.unwrap_or_default(),
                });
                continue;
            };
            let mut value = self.committed.get(&name).cloned().unwrap_or(FieldValue::Null);
            if let Some(format_in) = &item.format_in {
                value = format_in(value);
            }
            let placeholder = item.placeholder.clone().unwrap_or_else(|| match &item.title {
                Some(title) => format!("{} {}", widget.placeholder_prefix(), title.to_lowercase()),
                None => widget.placeholder_prefix().to_string(),
            });
            fields.push(RenderedField {
                required: item.is_required(&self.committed),
                rules: build_rules(item, &self.committed),
                options: item.options.clone().unwrap_or_default(),
                column_span: item.column_span.unwrap_or(DEFAULT_COLUMN_SPAN),
                label_align: item.label_align.unwrap_or_default(),
                title: item.title.clone(),
                name: Some(name),
                widget,
                value,
                disabled,
                placeholder,
            });
        }
        fields
    }

    /// Commits a widget edit: applies `format_out`, writes the shadow copy,
    /// emits update then change, validates exactly that field, then fires
    /// the dependency hook. A patch returned by the hook is pushed through
    /// [`BaseForm::set_fields`] and its events appended to the batch.
    pub async fn input(&mut self, name: &str, value: FieldValue) -> Vec<FormEvent> {
        let Some(item) = self
            .resolved
            .iter()
            .find(|item| item.name.as_deref() == Some(name))
            .cloned()
        else {
            debug!(field = name, "input for unknown field ignored");
            return Vec::new();
        };
        let stored = match &item.format_out {
            Some(format_out) => format_out(value.clone()),
            None => value.clone(),
        };
        self.shadow.insert(name.to_string(), stored);
        let mut events = vec![
            FormEvent::Updated(self.shadow.clone()),
            FormEvent::Changed(self.shadow.clone(), vec![name.to_string()]),
        ];
        let names = [name.to_string()];
        let _ = self.validate_fields(&names).await;
        if let Some(hook) = item.on_value_change.clone() {
            let patch = hook(ChangeContext {
                value: &value,
                index: self.index,
                form: &self.shadow,
                handles: &self.handles,
            });
            if let Some(patch) = patch {
                events.extend(self.set_fields(patch).await);
            }
        }
        events
    }

    /// Applies a partial patch. Keys outside the schema's field name set
    /// are silently ignored; unchanged values produce no events. Changed
    /// names are re-validated as one scoped pass.
    pub async fn set_fields(&mut self, patch: ValueMap) -> Vec<FormEvent> {
        let mut changed = Vec::new();
        for (key, value) in patch {
            let known = self.resolved.iter().any(|item| item.name.as_deref() == Some(key.as_str()));
            if !known {
                debug!(field = %key, "set_fields ignoring unknown key");
                continue;
            }
            if self.shadow.get(&key) != Some(&value) {
                self.shadow.insert(key.clone(), value);
                changed.push(key);
            }
        }
        if changed.is_empty() {
            return Vec::new();
        }
        let events = vec![
            FormEvent::Updated(self.shadow.clone()),
            FormEvent::Changed(self.shadow.clone(), changed.clone()),
        ];
        let _ = self.validate_fields(&changed).await;
        events
    }

    /// Restores every named field to its `default_value`, delegating to the
    /// widget's own reset capability when no default exists.
    pub fn reset_fields(&mut self) -> Vec<FormEvent> {
        let mut value = ValueMap::new();
        for item in &self.resolved {
            let Some(name) = &item.name else { continue };
            if let Some(default) = &item.default_value {
                value.insert(name.clone(), default.clone());
            } else if let Some(handle) = self.handles.get(name) {
                if let Some(reset) = handle.reset() {
                    value.insert(name.clone(), reset);
                }
            }
        }
        self.shadow = value.clone();
        vec![FormEvent::Updated(value.clone()), FormEvent::Changed(value, Vec::new())]
    }

    /// Whole-form validation.
    ///
    /// Phase one walks the schema in order: for each *visible* named field,
    /// the registered widget capability is awaited, and `false`
    /// short-circuits the call; each *hidden* field flagged
    /// `destroy_on_hide` has its key deleted from the live value object.
    /// Phase two runs rule validation over all visible named fields and
    /// resolves with a snapshot of the live value object when clean.
    pub async fn validate(&mut self) -> Result<ValueMap, ValidationFailure> {
        let items = self.resolved.clone();
        for item in &items {
            let Some(name) = item.name.as_deref() else { continue };
            if item.is_shown(&self.committed) {
                if let Some(handle) = self.handles.get(name).cloned() {
                    if !handle.validate().await {
                        warn!(field = name, "widget validation failed");
                        return Err(ValidationFailure::Widget { field: name.to_string() });
                    }
                }
            } else if item.destroy_on_hide.unwrap_or(false) && self.shadow.shift_remove(name).is_some() {
                debug!(field = name, "removed hidden field value on validate");
            }
        }

        let mut failures = Vec::new();
        for item in &items {
            let Some(name) = item.name.as_deref() else { continue };
            if !item.is_shown(&self.committed) {
                continue;
            }
            match self.check_field(item).await {
                Some(error) => {
                    self.errors.insert(name.to_string(), error.message.clone());
                    failures.push(error);
                }
                None => {
                    self.errors.shift_remove(name);
                }
            }
        }
        if failures.is_empty() {
            Ok(self.shadow.clone())
        } else {
            Err(ValidationFailure::Rules(failures))
        }
    }

    /// Rule validation scoped to the named fields only; widget capabilities
    /// are not involved.
    pub async fn validate_fields(&mut self, names: &[String]) -> Result<(), ValidationFailure> {
        let items = self.resolved.clone();
        let mut failures = Vec::new();
        for name in names {
            let Some(item) = items.iter().find(|item| item.name.as_ref() == Some(name)) else {
                continue;
            };
            if !item.is_shown(&self.committed) {
                continue;
            }
            match self.check_field(item).await {
                Some(error) => {
                    self.errors.insert(name.clone(), error.message.clone());
                    failures.push(error);
                }
                None => {
                    self.errors.shift_remove(name.as_str());
                }
            }
        }
        if failures.is_empty() { Ok(()) } else { Err(ValidationFailure::Rules(failures)) }
    }

    /// Clears displayed validation state, optionally scoped to `names`.
    pub fn clear_validate(&mut self, names: Option<&[String]>) {
        match names {
            Some(names) => {
                for name in names {
                    self.errors.shift_remove(name.as_str());
                }
            }
            None => self.errors.clear(),
        }
    }

    /// Default-field materialization, run on mount and after every schema
    /// recomputation. Precedence per field: an external value is kept
    /// unless a differing `fixed_value` forces it; otherwise
    /// `fixed_value ?? default_value`; otherwise a bare `fixed_value`.
    /// Changed names are batched into one update+change emission followed
    /// by validation of just those names.
    async fn set_default_fields(&mut self) -> Vec<FormEvent> {
        let mut value = ValueMap::new();
        let mut changed_names = Vec::new();
        for item in &self.resolved {
            let Some(name) = &item.name else { continue };
            match self.committed.get(name) {
                Some(current) => {
                    if let Some(fixed) = &item.fixed_value {
                        if current != fixed {
                            value.insert(name.clone(), fixed.clone());
                            changed_names.push(name.clone());
                            continue;
                        }
                    }
                    value.insert(name.clone(), current.clone());
                }
                None => {
                    if let Some(default) = &item.default_value {
                        value.insert(name.clone(), item.fixed_value.clone().unwrap_or_else(|| default.clone()));
                        changed_names.push(name.clone());
                    } else if let Some(fixed) = &item.fixed_value {
                        value.insert(name.clone(), fixed.clone());
                        changed_names.push(name.clone());
                    }
                }
            }
        }
        if changed_names.is_empty() {
            return Vec::new();
        }
        self.shadow = value.clone();
        let events = vec![
            FormEvent::Updated(value.clone()),
            FormEvent::Changed(value, changed_names.clone()),
        ];
        let _ = self.validate_fields(&changed_names).await;
        events
    }

    /// First failing rule for one field, default rule first; the async
    /// custom validator runs last.
    async fn check_field(&self, item: &FormItem) -> Option<FieldError> {
        let name = item.name.as_deref()?;
        let null = FieldValue::Null;
        let value = self.shadow.get(name).unwrap_or(&null);
        for rule in build_rules(item, &self.committed) {
            let message = rule.message.clone().unwrap_or_default();
            if rule.required && value.is_empty() {
                return Some(FieldError {
                    field: name.to_string(),
                    message,
                });
            }
            if let Some(pattern) = &rule.pattern {
                if !value.is_empty() && !pattern.is_match(&value.to_text()) {
                    return Some(FieldError {
                        field: name.to_string(),
                        message,
                    });
                }
            }
            if let Some(check) = &rule.validator {
                if let Some(message) = check(value, &self.shadow) {
                    return Some(FieldError {
                        field: name.to_string(),
                        message,
                    });
                }
            }
        }
        if let Some(validator) = &item.validator {
            let context = match &self.rows {
                Some(rows) => ValidatorContext::Rows(rows),
                None => ValidatorContext::Form(&self.shadow),
            };
            if let Some(message) = validator(value, context, self.index).await {
                return Some(FieldError {
                    field: name.to_string(),
                    message,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::DictionarySource;
    use async_trait::async_trait;
    use formflow_types::Flag;
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
    async fn default_rule_message_uses_widget_family() {
        let item = FormItem::field("age", "Age", WidgetKind::Number);
        let rules = build_rules(&item, &ValueMap::new());
        assert_eq!(rules[0].message.as_deref(), Some("please enter age"));

        let item = FormItem::field("city", "City", WidgetKind::Select);
        let rules = build_rules(&item, &ValueMap::new());
        assert_eq!(rules[0].message.as_deref(), Some("please select city"));
    }

    #[tokio::test]
    async fn user_rules_follow_the_default_rule() {
        let mut item = FormItem::field("code", "Code", WidgetKind::Input);
        item.rules = vec![Rule::required("custom message")];
        let rules = build_rules(&item, &ValueMap::new());
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].message.as_deref(), Some("please enter code"));
        assert_eq!(rules[1].message.as_deref(), Some("custom message"));
    }

    #[tokio::test]
    async fn input_emits_update_then_change() {
        let items = vec![FormItem::field("name", "Name", WidgetKind::Input)];
        let (mut form, _) = BaseForm::mount(items, None, ValueMap::new(), cache()).await.unwrap();

        let events = form.input("name", "jo".into()).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FormEvent::Updated(value) if value.get("name") == Some(&"jo".into())));
        assert!(matches!(&events[1], FormEvent::Changed(_, names) if names == &["name".to_string()]));
    }

    #[tokio::test]
    async fn format_out_applies_on_commit() {
        let mut item = FormItem::field("code", "Code", WidgetKind::Input);
        item.format_out = Some(Arc::new(|value| FieldValue::Text(value.to_text().to_uppercase())));
        let (mut form, _) = BaseForm::mount(vec![item], None, ValueMap::new(), cache()).await.unwrap();

        form.input("code", "abc".into()).await;
        assert_eq!(form.value().get("code"), Some(&FieldValue::Text("ABC".into())));
    }

    #[tokio::test]
    async fn set_fields_ignores_unknown_keys() {
        let items = vec![FormItem::field("known", "Known", WidgetKind::Input)];
        let (mut form, _) = BaseForm::mount(items, None, ValueMap::new(), cache()).await.unwrap();

        let mut patch = ValueMap::new();
        patch.insert("unknown".into(), "x".into());
        assert!(form.set_fields(patch).await.is_empty());
        assert!(form.value().get("unknown").is_none());
    }

    #[tokio::test]
    async fn set_fields_skips_unchanged_values() {
        let items = vec![FormItem::field("a", "A", WidgetKind::Input)];
        let mut value = ValueMap::new();
        value.insert("a".into(), "same".into());
        let (mut form, _) = BaseForm::mount(items, None, value, cache()).await.unwrap();

        let mut patch = ValueMap::new();
        patch.insert("a".into(), "same".into());
        assert!(form.set_fields(patch).await.is_empty());
    }

    #[tokio::test]
    async fn change_hook_patch_flows_through_set_fields() {
        let mut country = FormItem::field("country", "Country", WidgetKind::Select);
        country.on_value_change = Some(Arc::new(|context| {
            // Switching country clears the dependent city field.
            context.value.as_str()?;
            let mut patch = ValueMap::new();
            patch.insert("city".into(), FieldValue::Null);
            Some(patch)
        }));
        let city = FormItem::field("city", "City", WidgetKind::Select);
        let mut value = ValueMap::new();
        value.insert("city".into(), "paris".into());
        let (mut form, _) = BaseForm::mount(vec![country, city], None, value, cache()).await.unwrap();

        let events = form.input("country", "jp".into()).await;
        assert_eq!(form.value().get("city"), Some(&FieldValue::Null));
        // Commit pair plus the hook's set_fields pair.
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn hidden_fields_are_omitted_from_render() {
        let mut hidden = FormItem::field("secret", "Secret", WidgetKind::Input);
        hidden.show = Some(Flag::Literal(false));
        let shown = FormItem::field("name", "Name", WidgetKind::Input);
        let (form, _) = BaseForm::mount(vec![hidden, shown], None, ValueMap::new(), cache()).await.unwrap();

        let fields = form.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name.as_deref(), Some("name"));
    }

    #[tokio::test]
    async fn nameless_items_render_as_custom_slots() {
        let slot = FormItem {
            widget: Some(WidgetKind::Custom("banner".into())),
            ..FormItem::default()
        };
        let (form, _) = BaseForm::mount(vec![slot], None, ValueMap::new(), cache()).await.unwrap();
        let fields = form.fields();
        assert_eq!(fields.len(), 1);
        assert!(fields[0].name.is_none());
        assert!(fields[0].rules.is_empty());
    }

    #[tokio::test]
    async fn clear_validate_scopes_to_names() {
        let mut a = FormItem::field("a", "A", WidgetKind::Input);
        a.required = Some(Flag::Literal(true));
        let mut b = FormItem::field("b", "B", WidgetKind::Input);
        b.required = Some(Flag::Literal(true));
        let (mut form, _) = BaseForm::mount(vec![a, b], None, ValueMap::new(), cache()).await.unwrap();

        assert!(form.validate().await.is_err());
        assert_eq!(form.errors().len(), 2);
        form.clear_validate(Some(&["a".to_string()]));
        assert_eq!(form.errors().len(), 1);
        form.clear_validate(None);
        assert!(form.errors().is_empty());
    }
}
