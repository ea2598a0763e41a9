//! Plugin extension points.
//!
//! A plugin can expose one resolution-time method to behavior scripts, ship
//! templates, veto or observe collection mutations, and contribute code to
//! every page's client bundle.

use std::sync::Arc;

use tessera_collection::{CollectionHooks, CollectionItem, FileRecord, SetDecision};
use tessera_compiler::{ClientModule, Module, Page, PluginMethod, TemplateKeys};

/// A build plugin.
///
/// Every hook has a default that keeps the mutation and does nothing else.
pub trait Plugin: Send + Sync {
    /// Unique plugin name. The method is exported under this name from
    /// `tessera/plugins`.
    fn name(&self) -> &str;

    /// Function callable from behavior scripts.
    fn method(&self) -> Option<PluginMethod> {
        None
    }

    /// Templates bundled with the plugin, loaded before the site's own.
    fn templates(&self) -> Vec<FileRecord> {
        Vec::new()
    }

    /// Code added to every page bundle.
    fn client_script(&self) -> Option<ClientModule> {
        None
    }

    /// Called before a page is stored. Return `false` to skip it.
    fn on_page_set(&self, _page: &CollectionItem<Page>) -> bool {
        true
    }

    /// Called before a stored page is replaced. Return `false` to keep the current one.
    fn on_page_update(&self, _current: &CollectionItem<Page>, next: &CollectionItem<Page>) -> bool {
        self.on_page_set(next)
    }

    fn on_page_delete(&self, _page: &CollectionItem<Page>) {}

    /// Called before a template is stored. Return `false` to skip it.
    fn on_template_set(&self, _template: &CollectionItem<Module>) -> bool {
        true
    }

    /// Called before a stored template is replaced. Return `false` to keep the current one.
    fn on_template_update(
        &self,
        _current: &CollectionItem<Module>,
        next: &CollectionItem<Module>,
    ) -> bool {
        self.on_template_set(next)
    }

    fn on_template_delete(&self, _template: &CollectionItem<Module>) {}
}

/// Registered plugins, shared with the collection hooks.
pub type Plugins = Arc<[Arc<dyn Plugin>]>;

/// Page collection hooks that consult every plugin.
pub(crate) struct PageHooks(pub Plugins);

impl CollectionHooks<Page> for PageHooks {
    fn before_set(&self, item: &CollectionItem<Page>) -> SetDecision {
        if self.0.iter().all(|p| p.on_page_set(item)) {
            SetDecision::Store { key: None }
        } else {
            SetDecision::Skip
        }
    }

    fn before_update(&self, current: &CollectionItem<Page>, next: &CollectionItem<Page>) -> SetDecision {
        if self.0.iter().all(|p| p.on_page_update(current, next)) {
            SetDecision::Store { key: None }
        } else {
            SetDecision::Skip
        }
    }
}

/// Template collection hooks: plugin vetoes, then keying by template id.
pub(crate) struct TemplateHooks(pub Plugins);

impl CollectionHooks<Module> for TemplateHooks {
    fn before_set(&self, item: &CollectionItem<Module>) -> SetDecision {
        if self.0.iter().all(|p| p.on_template_set(item)) {
            TemplateKeys.before_set(item)
        } else {
            SetDecision::Skip
        }
    }

    fn before_update(
        &self,
        current: &CollectionItem<Module>,
        next: &CollectionItem<Module>,
    ) -> SetDecision {
        if self.0.iter().all(|p| p.on_template_update(current, next)) {
            TemplateKeys.before_set(next)
        } else {
            SetDecision::Skip
        }
    }
}
