//! Compiled template modules and parsed pages.
//!
//! Both are [`Document`] payloads stored in a [`Collection`]. A [`Module`] is
//! never mutated after parsing; every expansion works on a copy produced by
//! [`Module::instantiate`].

use std::path::{Path, PathBuf};

use tessera_collection::{
    Collection, CollectionHooks, CollectionItem, Document, FileRecord, ItemKind, SetDecision,
};
use tessera_markup::{
    parse_page, parse_template, Arena, Frontmatter, IgnoreRule, MarkupError, NodeId, PageFormat,
    ParseOptions, ParsedDocument, Sites,
};

use crate::traits::ModuleSource;
use crate::value::{document_value, Values};

/// Parse settings for template modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleOptions {
    /// Absolute template directory, used to resolve relative script imports
    pub root: PathBuf,

    pub ignore: Vec<IgnoreRule>,
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Module {
    /// Declared template id
    pub id: String,

    /// Path relative to the template directory
    pub path: String,

    /// Absolute directory holding the template file
    pub dir: PathBuf,

    /// Template content below the arena root
    pub template: Arena,

    /// Sites within `template`
    pub sites: Sites,

    /// Behavior script source
    pub script: Option<String>,
}

impl Module {
    /// Copy the template content into `into` as a detached fragment and
    /// relink the sites to the copy.
    pub fn instantiate(&self, into: &mut Arena) -> (NodeId, Sites) {
        let (root, map) = self.template.copy_into(self.template.root(), into);
        (root, self.sites.relink(&map))
    }

    /// Absolute path the behavior script is linked as.
    pub fn script_path(&self) -> PathBuf {
        let filename = Path::new(&self.path)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| self.id.clone().into());
        self.dir.join(filename)
    }
}

impl Document for Module {
    type Options = ModuleOptions;
    type Error = MarkupError;

    fn parse(record: &FileRecord, options: &ModuleOptions) -> Result<Self, MarkupError> {
        let source = parse_template(&record.content, &ParseOptions::template(&options.ignore))?;

        let dir = match record.path.dirname.as_str() {
            "." => options.root.clone(),
            dirname => options.root.join(dirname),
        };

        Ok(Module {
            id: source.id,
            path: record.path.pathname.clone(),
            dir,
            template: source.arena,
            sites: source.sites,
            script: source.script,
        })
    }

    fn uses(&self) -> Vec<String> {
        self.sites.custom_element_names(&self.template)
    }
}

/// Keys templates by their declared id, keeping the path as an alias.
pub struct TemplateKeys;

impl CollectionHooks<Module> for TemplateKeys {
    fn before_set(&self, item: &CollectionItem<Module>) -> SetDecision {
        SetDecision::Store {
            key: Some(item.result.id.clone()),
        }
    }
}

/// Create the template collection.
pub fn template_collection(options: ModuleOptions) -> Collection<Module> {
    Collection::with_hooks(ItemKind::Template, options, Box::new(TemplateKeys))
}

/// Parse settings for pages.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub ignore: Vec<IgnoreRule>,
}

/// A parsed page.
#[derive(Debug, Clone)]
pub struct Page {
    pub frontmatter: Frontmatter,
    pub document: ParsedDocument,
}

impl Page {
    /// Document values from the frontmatter.
    pub fn values(&self) -> Values {
        let mut values = Values::new();
        for (key, yaml) in &self.frontmatter.values {
            let Ok(json) = serde_json::to_value(yaml) else {
                continue;
            };
            if let Some(value) = document_value(&json) {
                values.insert(key.clone(), value);
            }
        }
        values
    }
}

impl Document for Page {
    type Options = PageOptions;
    type Error = MarkupError;

    fn parse(record: &FileRecord, options: &PageOptions) -> Result<Self, MarkupError> {
        let format = record
            .path
            .extension()
            .and_then(PageFormat::from_extension)
            .unwrap_or(PageFormat::Html);
        let source = parse_page(&record.content, format, &ParseOptions::page(&options.ignore))?;

        Ok(Page {
            frontmatter: source.frontmatter,
            document: source.document,
        })
    }

    fn uses(&self) -> Vec<String> {
        self.document
            .sites
            .custom_element_names(&self.document.arena)
    }
}

/// Create the page collection.
pub fn page_collection(options: PageOptions) -> Collection<Page> {
    Collection::new(ItemKind::Page, options)
}

/// Templates and pages of one site.
#[derive(Clone, Copy)]
pub struct Library<'a> {
    pub templates: &'a Collection<Module>,
    pub pages: &'a Collection<Page>,
}

impl ModuleSource for Library<'_> {
    fn module(&self, id: &str) -> Option<&Module> {
        self.templates.get(id).map(|item| &item.result)
    }

    fn template_ids(&self) -> Vec<String> {
        self.templates.ids()
    }

    fn page_paths(&self) -> Vec<String> {
        self.pages.ids()
    }
}
