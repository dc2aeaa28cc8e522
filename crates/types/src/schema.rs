//! The declarative schema model.
//!
//! A form is described by a list of [`FormItem`] descriptors. Every
//! behavioral field is optional: override lists are shallow-merged over the
//! base schema by matching `name`, and an absent field must be
//! distinguishable from an explicitly configured one.
//!
//! Descriptors carry data plus a handful of callback seams (predicates,
//! transforms, validators, the dependency hook). Predicates must be pure
//! functions of the current value object; the engine re-evaluates them on
//! every render pass.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use regex::Regex;

use crate::handle::HandleMap;
use crate::options::OptionEntry;
use crate::value::{FieldValue, ValueMap};

/// Sort position assigned to items that do not specify one.
pub const DEFAULT_SORT_ORDER: i32 = 99;

/// Grid units a field spans when unspecified (full row).
pub const DEFAULT_COLUMN_SPAN: u8 = 24;

/// The kind of input control a field renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetKind {
    Input,
    Number,
    Textarea,
    Select,
    SearchSelect,
    Cascader,
    Radio,
    Checkbox,
    DatePicker,
    RangePicker,
    TimePicker,
    Upload,
    /// Host-registered component tag. The engine falls through to a generic
    /// two-way-bound instantiation path for these.
    Custom(String),
}

impl WidgetKind {
    /// Widgets whose default required message reads "please select".
    /// Search-select deliberately stays on the "please enter" side.
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            WidgetKind::Cascader
                | WidgetKind::Select
                | WidgetKind::RangePicker
                | WidgetKind::Radio
                | WidgetKind::Checkbox
                | WidgetKind::DatePicker
                | WidgetKind::TimePicker
                | WidgetKind::Upload
        )
    }

    /// Widgets whose values pass through the time transform layer.
    pub fn is_temporal(&self) -> bool {
        matches!(self, WidgetKind::DatePicker | WidgetKind::RangePicker | WidgetKind::TimePicker)
    }

    /// Prefix for auto-generated placeholders.
    pub fn placeholder_prefix(&self) -> &'static str {
        match self {
            WidgetKind::Input | WidgetKind::Number | WidgetKind::Textarea => "please enter",
            _ => "please select",
        }
    }
}

impl Default for WidgetKind {
    fn default() -> Self {
        WidgetKind::Input
    }
}

/// Label alignment within a field row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelAlign {
    #[default]
    Left,
    Right,
    Top,
}

/// A static flag or a predicate over the whole value object.
///
/// Predicates are always evaluated against the last *committed* value
/// object, never against an uncommitted edit.
#[derive(Clone)]
pub enum Flag {
    Literal(bool),
    Predicate(Arc<dyn Fn(&ValueMap) -> bool + Send + Sync>),
}

impl Flag {
    pub fn eval(&self, value: &ValueMap) -> bool {
        match self {
            Flag::Literal(flag) => *flag,
            Flag::Predicate(predicate) => predicate(value),
        }
    }

    pub fn predicate(predicate: impl Fn(&ValueMap) -> bool + Send + Sync + 'static) -> Self {
        Flag::Predicate(Arc::new(predicate))
    }
}

impl From<bool> for Flag {
    fn from(flag: bool) -> Self {
        Flag::Literal(flag)
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Literal(flag) => write!(formatter, "Literal({flag})"),
            Flag::Predicate(_) => write!(formatter, "Predicate(..)"),
        }
    }
}

/// Per-field wire format for temporal fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFormat {
    /// One format string applied to the field (or to both range ends).
    Single(String),
    /// Distinct start / end formats for range fields.
    Pair(String, String),
}

/// Reference to a named, server-resolved dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryRef {
    pub name: String,
    /// Row property used as the option value. Defaults to `"id"`.
    pub row_key: Option<String>,
}

impl DictionaryRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            row_key: None,
        }
    }

    pub fn with_row_key(mut self, row_key: impl Into<String>) -> Self {
        self.row_key = Some(row_key.into());
        self
    }
}

/// Synchronous per-rule validator.
pub type RuleValidator = Arc<dyn Fn(&FieldValue, &ValueMap) -> Option<String> + Send + Sync>;

/// One validation rule. Rules are checked in order; the first failure wins.
#[derive(Clone, Default)]
pub struct Rule {
    pub required: bool,
    pub message: Option<String>,
    pub pattern: Option<Regex>,
    pub validator: Option<RuleValidator>,
}

impl Rule {
    pub fn required(message: impl Into<String>) -> Self {
        Self {
            required: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn pattern(pattern: Regex, message: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn validator(message: impl Into<String>, validator: impl Fn(&FieldValue, &ValueMap) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            message: Some(message.into()),
            validator: Some(Arc::new(validator)),
            ..Self::default()
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Rule")
            .field("required", &self.required)
            .field("message", &self.message)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("validator", &self.validator.as_ref().map(|_| ".."))
            .finish()
    }
}

/// The surrounding data a field validator may inspect: the whole form, or
/// the sibling row list in repeating-list context.
#[derive(Debug, Clone, Copy)]
pub enum ValidatorContext<'a> {
    Form(&'a ValueMap),
    Rows(&'a [ValueMap]),
}

/// Async custom validator: a returned string is a failing message, `None`
/// passes.
pub type FieldValidator =
    Arc<dyn for<'a> Fn(&'a FieldValue, ValidatorContext<'a>, usize) -> BoxFuture<'a, Option<String>> + Send + Sync>;

/// Pure value transform applied at the widget boundary.
pub type ValueTransform = Arc<dyn Fn(FieldValue) -> FieldValue + Send + Sync>;

/// Everything the dependency hook gets to see when a field value commits.
pub struct ChangeContext<'a> {
    /// The value as the widget reported it, before `format_out`.
    pub value: &'a FieldValue,
    /// Row index in repeating-list context, 0 otherwise.
    pub index: usize,
    /// The live (shadow) value object after the commit.
    pub form: &'a ValueMap,
    /// Currently mounted widget handles, for advanced control.
    pub handles: &'a HandleMap,
}

/// Dependency hook fired after a commit and its field-scoped validation
/// settle. A returned patch is pushed back through `set_fields`.
pub type ChangeHook = Arc<dyn for<'a> Fn(ChangeContext<'a>) -> Option<ValueMap> + Send + Sync>;

/// Declarative descriptor for one logical field (or one custom-rendered
/// slot, when `name` is absent).
#[derive(Clone, Default)]
pub struct FormItem {
    /// Binding key into the value object. Absent means pure custom layout:
    /// no value binding, no validation wiring, no change notification.
    pub name: Option<String>,
    pub title: Option<String>,
    /// Widget kind; [`WidgetKind::Input`] when unspecified.
    pub widget: Option<WidgetKind>,
    pub label_align: Option<LabelAlign>,
    /// Grid units, 1 to 24. Full row when unspecified.
    pub column_span: Option<u8>,
    /// Merge ordering; [`DEFAULT_SORT_ORDER`] when unspecified.
    pub sort_order: Option<i32>,
    pub placeholder: Option<String>,
    pub required: Option<Flag>,
    pub disabled: Option<Flag>,
    /// `false` omits the field from rendering. Defaults to visible.
    pub show: Option<Flag>,
    /// When hidden during validation, delete the field's value from the
    /// live value object.
    pub destroy_on_hide: Option<bool>,
    pub default_value: Option<FieldValue>,
    /// Overrides the incoming value unconditionally.
    pub fixed_value: Option<FieldValue>,
    /// Wire value -> widget value.
    pub format_in: Option<ValueTransform>,
    /// Widget value -> wire value.
    pub format_out: Option<ValueTransform>,
    pub rules: Vec<Rule>,
    pub validator: Option<FieldValidator>,
    /// Named dictionary resolved lazily into `options`.
    pub dictionary: Option<DictionaryRef>,
    /// Literal option list; wins over `dictionary` when both are present.
    pub options: Option<Vec<OptionEntry>>,
    /// Wire format for temporal fields; see the time transform layer for
    /// the defaults.
    pub time_format: Option<TimeFormat>,
    pub on_value_change: Option<ChangeHook>,
}

impl FormItem {
    /// A named field with a title and widget kind.
    pub fn field(name: impl Into<String>, title: impl Into<String>, widget: WidgetKind) -> Self {
        Self {
            name: Some(name.into()),
            title: Some(title.into()),
            widget: Some(widget),
            ..Self::default()
        }
    }

    pub fn widget_kind(&self) -> WidgetKind {
        self.widget.clone().unwrap_or_default()
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order.unwrap_or(DEFAULT_SORT_ORDER)
    }

    pub fn is_shown(&self, value: &ValueMap) -> bool {
        self.show.as_ref().map(|flag| flag.eval(value)).unwrap_or(true)
    }

    pub fn is_disabled(&self, value: &ValueMap) -> bool {
        self.disabled.as_ref().map(|flag| flag.eval(value)).unwrap_or(false)
    }

    pub fn is_required(&self, value: &ValueMap) -> bool {
        self.required.as_ref().map(|flag| flag.eval(value)).unwrap_or(false)
    }

    /// Shallow merge: every field the override specifies wins, everything
    /// else is retained from `self`.
    pub fn merged_with(&self, overriding: &FormItem) -> FormItem {
        FormItem {
            name: overriding.name.clone().or_else(|| self.name.clone()),
            title: overriding.title.clone().or_else(|| self.title.clone()),
            widget: overriding.widget.clone().or_else(|| self.widget.clone()),
            label_align: overriding.label_align.or(self.label_align),
            column_span: overriding.column_span.or(self.column_span),
            sort_order: overriding.sort_order.or(self.sort_order),
            placeholder: overriding.placeholder.clone().or_else(|| self.placeholder.clone()),
            required: overriding.required.clone().or_else(|| self.required.clone()),
            disabled: overriding.disabled.clone().or_else(|| self.disabled.clone()),
            show: overriding.show.clone().or_else(|| self.show.clone()),
            destroy_on_hide: overriding.destroy_on_hide.or(self.destroy_on_hide),
            default_value: overriding.default_value.clone().or_else(|| self.default_value.clone()),
            fixed_value: overriding.fixed_value.clone().or_else(|| self.fixed_value.clone()),
            format_in: overriding.format_in.clone().or_else(|| self.format_in.clone()),
            format_out: overriding.format_out.clone().or_else(|| self.format_out.clone()),
            rules: if overriding.rules.is_empty() {
                self.rules.clone()
            } else {
                overriding.rules.clone()
            },
            validator: overriding.validator.clone().or_else(|| self.validator.clone()),
            dictionary: overriding.dictionary.clone().or_else(|| self.dictionary.clone()),
            options: overriding.options.clone().or_else(|| self.options.clone()),
            time_format: overriding.time_format.clone().or_else(|| self.time_format.clone()),
            on_value_change: overriding.on_value_change.clone().or_else(|| self.on_value_change.clone()),
        }
    }
}

impl fmt::Debug for FormItem {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FormItem")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("widget", &self.widget)
            .field("sort_order", &self.sort_order)
            .field("required", &self.required)
            .field("show", &self.show)
            .field("default_value", &self.default_value)
            .field("fixed_value", &self.fixed_value)
            .field("dictionary", &self.dictionary)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_defaults() {
        let item = FormItem::field("a", "A", WidgetKind::Input);
        let value = ValueMap::new();
        assert!(item.is_shown(&value));
        assert!(!item.is_disabled(&value));
        assert!(!item.is_required(&value));
    }

    #[test]
    fn predicate_flags_read_the_value_object() {
        let mut item = FormItem::field("city", "City", WidgetKind::Select);
        item.show = Some(Flag::predicate(|value| {
            value.get("country").map(|country| !country.is_empty()).unwrap_or(false)
        }));
        let mut value = ValueMap::new();
        assert!(!item.is_shown(&value));
        value.insert("country".into(), "cn".into());
        assert!(item.is_shown(&value));
    }

    #[test]
    fn merge_prefers_override_per_key() {
        let mut base = FormItem::field("b", "B", WidgetKind::Select);
        base.sort_order = Some(2);
        base.column_span = Some(12);
        let mut overriding = FormItem {
            name: Some("b".into()),
            title: Some("B2".into()),
            ..FormItem::default()
        };
        overriding.required = Some(Flag::Literal(true));

        let merged = base.merged_with(&overriding);
        assert_eq!(merged.title.as_deref(), Some("B2"));
        assert_eq!(merged.sort_order, Some(2));
        assert_eq!(merged.column_span, Some(12));
        assert_eq!(merged.widget, Some(WidgetKind::Select));
        assert!(merged.is_required(&ValueMap::new()));
    }

    #[test]
    fn selection_kinds_use_select_message() {
        assert!(WidgetKind::Cascader.is_selection());
        assert!(WidgetKind::Upload.is_selection());
        assert!(!WidgetKind::Input.is_selection());
        // Search-select keys by typed text, so it stays on "please enter".
        assert!(!WidgetKind::SearchSelect.is_selection());
    }
}
