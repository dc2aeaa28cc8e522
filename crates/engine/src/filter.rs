//! Top filter bar for search/list screens.
//!
//! A thin shell over [`Form`]: items gain two filter-specific flags.
//! `auto_query` fires the query as soon as that field alone changes, so
//! pickers and selects search without an explicit confirm; `auto_hide`
//! tucks the field behind a disclosure toggle until expanded.

use std::sync::Arc;

use tracing::debug;

use formflow_types::{FieldValue, FormEvent, FormItem, ValueMap, WidgetHandle};

use crate::dict::DictionaryCache;
use crate::error::FormError;
use crate::wrapper::Form;

/// One filter field plus its bar-level behavior flags.
#[derive(Debug, Clone)]
pub struct SearchItem {
    pub item: FormItem,
    /// Fire the query when this field alone changes.
    pub auto_query: bool,
    /// Hidden until the bar is expanded.
    pub auto_hide: bool,
}

impl SearchItem {
    pub fn new(item: FormItem) -> Self {
        Self {
            item,
            auto_query: false,
            auto_hide: false,
        }
    }

    pub fn auto_query(mut self) -> Self {
        self.auto_query = true;
        self
    }

    pub fn auto_hide(mut self) -> Self {
        self.auto_hide = true;
        self
    }
}

/// Invoked with the wire-form value whenever a query fires.
pub type QueryFn = Arc<dyn Fn(ValueMap) + Send + Sync>;

pub struct FilterBar {
    items: Vec<SearchItem>,
    form: Form,
    collapsed: bool,
    query: QueryFn,
}

impl FilterBar {
    /// Mounts the bar collapsed: `auto_hide` items stay out of the schema
    /// until [`FilterBar::toggle_collapsed`] expands it.
    pub async fn mount(
        items: Vec<SearchItem>,
        value: ValueMap,
        dictionaries: Arc<DictionaryCache>,
        query: QueryFn,
    ) -> Result<Self, FormError> {
        let collapsed = true;
        let visible = visible_items(&items, collapsed);
        let (form, _) = Form::mount(visible, None, value, dictionaries).await?;
        Ok(Self {
            items,
            form,
            collapsed,
            query,
        })
    }

    /// True when at least one item is hidden behind the disclosure toggle.
    pub fn has_collapsible(&self) -> bool {
        self.items.iter().any(|entry| entry.auto_hide)
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Flips the disclosure state and re-applies the visible schema.
    pub async fn toggle_collapsed(&mut self) -> Result<Vec<FormEvent>, FormError> {
        self.collapsed = !self.collapsed;
        let visible = visible_items(&self.items, self.collapsed);
        self.form.set_items(visible).await
    }

    /// Render-ready fields for the current disclosure state.
    pub fn fields(&self) -> Vec<crate::form::RenderedField> {
        self.form.fields()
    }

    /// Current wire-form value.
    pub fn value(&self) -> ValueMap {
        self.form.value()
    }

    pub fn set_value(&mut self, value: ValueMap) -> Vec<FormEvent> {
        self.form.set_value(value)
    }

    pub fn handle(&self, name: &str) -> Option<Arc<dyn WidgetHandle>> {
        self.form.handle(name)
    }

    pub fn register_handle(&mut self, name: impl Into<String>, handle: Arc<dyn WidgetHandle>) {
        self.form.register_handle(name, handle);
    }

    /// Commits a widget edit. When exactly one field changed and that
    /// field is flagged `auto_query`, the query fires before returning.
    pub async fn input(&mut self, name: &str, value: FieldValue) -> Vec<FormEvent> {
        let events = self.form.input(name, value).await;
        let changed: Option<&str> = events.iter().find_map(|event| match event {
            FormEvent::Changed(_, names) if names.len() == 1 => Some(names[0].as_str()),
            _ => None,
        });
        if let Some(changed) = changed {
            let fires = self
                .items
                .iter()
                .any(|entry| entry.auto_query && entry.item.name.as_deref() == Some(changed));
            if fires {
                self.query().await;
            }
        }
        events
    }

    /// Validates the whole bar and, on success, invokes the query callback
    /// with the wire-form value. A failed validation skips the query.
    pub async fn query(&mut self) {
        match self.form.validate().await {
            Ok(value) => (self.query)(value),
            Err(failure) => debug!(%failure, "query skipped"),
        }
    }

    /// Resets every field to its default, then re-queries.
    pub async fn reset(&mut self) -> Vec<FormEvent> {
        let events = self.form.reset_fields();
        self.query().await;
        events
    }
}

fn visible_items(items: &[SearchItem], collapsed: bool) -> Vec<FormItem> {
    items
        .iter()
        .filter(|entry| !(collapsed && entry.auto_hide))
        .map(|entry| entry.item.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::DictionarySource;
    use async_trait::async_trait;
    use formflow_types::WidgetKind;
    use std::collections::HashMap;
    use std::sync::Mutex;

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

    fn recorder() -> (QueryFn, Arc<Mutex<Vec<ValueMap>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let query: QueryFn = Arc::new(move |value| sink.lock().unwrap().push(value));
        (query, log)
    }

    fn items() -> Vec<SearchItem> {
        vec![
            SearchItem::new(FormItem::field("keyword", "Keyword", WidgetKind::Input)),
            SearchItem::new(FormItem::field("status", "Status", WidgetKind::Select)).auto_query(),
            SearchItem::new(FormItem::field("owner", "Owner", WidgetKind::Input)).auto_hide(),
        ]
    }

    #[tokio::test]
    async fn collapsed_bar_hides_auto_hide_fields() {
        let (query, _) = recorder();
        let mut bar = FilterBar::mount(items(), ValueMap::new(), cache(), query).await.unwrap();
        assert!(bar.has_collapsible());
        assert_eq!(bar.fields().len(), 2);

        bar.toggle_collapsed().await.unwrap();
        assert_eq!(bar.fields().len(), 3);
    }

    #[tokio::test]
    async fn auto_query_field_fires_the_query_on_change() {
        let (query, log) = recorder();
        let mut bar = FilterBar::mount(items(), ValueMap::new(), cache(), query).await.unwrap();

        bar.input("keyword", "rust".into()).await;
        assert!(log.lock().unwrap().is_empty());

        bar.input("status", "open".into()).await;
        let queries = log.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].get("status"), Some(&"open".into()));
    }

    #[tokio::test]
    async fn reset_clears_and_requeries() {
        let (query, log) = recorder();
        let mut defaulted = FormItem::field("keyword", "Keyword", WidgetKind::Input);
        defaulted.default_value = Some("all".into());
        let mut bar = FilterBar::mount(
            vec![SearchItem::new(defaulted)],
            ValueMap::new(),
            cache(),
            query,
        )
        .await
        .unwrap();

        bar.input("keyword", "narrow".into()).await;
        bar.reset().await;
        let queries = log.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].get("keyword"), Some(&"all".into()));
    }
}
