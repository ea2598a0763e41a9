//! Site build driver.
//!
//! A [`Site`] owns the template and page collections, compiles pages in
//! parallel and writes the results. The watcher feeds single file changes back
//! in through [`Site::apply_change`] and [`Site::remove`], which report the
//! pages that need recompiling.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tessera_collection::{Collection, FileRecord, ItemKind, Outcome};
use tessera_compiler::{
    compile_page, CompileOptions, Library, Module, ModuleOptions, Page, PageOptions,
};

use crate::config::{SiteConfig, PAGE_EXTENSIONS, TEMPLATE_EXTENSIONS};
use crate::enumerate::{enumerate, has_extension, is_excluded};
use crate::error::SiteError;
use crate::plugin::{PageHooks, Plugin, Plugins, TemplateHooks};

/// Extensions of script files templates can import.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "json"];

/// One compiled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPage {
    /// Page path relative to the page directory
    pub path: String,

    pub html: String,

    /// Compile time in milliseconds
    pub duration_ms: u64,
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages written
    pub pages: usize,

    /// Number of templates loaded
    pub templates: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Pages affected by a single file change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Change {
    /// Pages to compile again
    pub recompile: Vec<String>,

    /// Pages whose output is gone
    pub removed: Vec<String>,
}

/// Which collection a changed file belongs to.
enum Source {
    Page(String),
    Template(String),
    TemplateScript,
}

/// A site: its configuration, plugins, templates and pages.
pub struct Site {
    config: SiteConfig,
    pages_root: PathBuf,
    templates_root: PathBuf,
    registered: Vec<Arc<dyn Plugin>>,
    plugins: Plugins,
    templates: Collection<Module>,
    pages: Collection<Page>,
    options: CompileOptions,
}

impl Site {
    /// Create an empty site. Nothing is read until [`Site::initialise`].
    pub fn new(config: SiteConfig) -> Self {
        let pages_root = absolute(&config.pages_dir);
        let templates_root = absolute(&config.templates_dir);
        let plugins: Plugins = Arc::from(Vec::new());
        let (templates, pages) = collections(&templates_root, &config, &plugins);

        Self {
            options: compile_options(&config, &plugins),
            config,
            pages_root,
            templates_root,
            registered: Vec::new(),
            plugins,
            templates,
            pages,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn templates(&self) -> &Collection<Module> {
        &self.templates
    }

    pub fn pages(&self) -> &Collection<Page> {
        &self.pages
    }

    /// Register a plugin. Takes effect at the next [`Site::initialise`].
    pub fn register_plugin(&mut self, plugin: impl Plugin + 'static) -> Result<(), SiteError> {
        if self.registered.iter().any(|p| p.name() == plugin.name()) {
            return Err(SiteError::DuplicatePlugin(plugin.name().to_string()));
        }
        tracing::debug!("registered plugin {}", plugin.name());
        self.registered.push(Arc::new(plugin));
        Ok(())
    }

    /// Load plugin templates, then the template directory, then the page
    /// directory. Any invalid document aborts the load.
    pub fn initialise(&mut self) -> Result<(), SiteError> {
        self.plugins = Arc::from(self.registered.clone());
        self.options = compile_options(&self.config, &self.plugins);
        (self.templates, self.pages) =
            collections(&self.templates_root, &self.config, &self.plugins);

        for plugin in self.plugins.iter() {
            for record in plugin.templates() {
                let pathname = format!("@{}/{}", plugin.name(), record.path.pathname);
                self.templates.set(FileRecord::new(pathname, record.content))?;
            }
        }

        if self.templates_root.is_dir() {
            for record in enumerate(&self.templates_root, TEMPLATE_EXTENSIONS, &self.config.exclude)? {
                self.templates.set(record)?;
            }
        } else {
            tracing::debug!(
                "Template directory {} not found, no site templates loaded",
                self.templates_root.display()
            );
        }

        for record in enumerate(&self.pages_root, PAGE_EXTENSIONS, &self.config.exclude)? {
            self.pages.set(record)?;
        }

        tracing::info!(
            "Loaded {} templates and {} pages",
            self.templates.len(),
            self.pages.len()
        );
        Ok(())
    }

    /// Compile pages.
    ///
    /// `None` compiles every page. Otherwise each entry is a page path, or a
    /// template path or id selecting every page that uses the template
    /// directly or through other templates. The first failure aborts the pass.
    pub fn compile(&self, selection: Option<&[String]>) -> Result<Vec<CompiledPage>, SiteError> {
        let queue = match selection {
            None => self.pages.ids(),
            Some(selectors) => self.render_queue(selectors),
        };
        let library = Library {
            templates: &self.templates,
            pages: &self.pages,
        };

        queue
            .par_iter()
            .filter_map(|path| Some((path, self.pages.get(path)?)))
            .map(|(path, page)| compile_one(&library, path, &page.result, &self.options))
            .collect()
    }

    /// Write compiled pages below `out_dir`, returning the written files.
    pub async fn save(
        &self,
        results: &[CompiledPage],
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, SiteError> {
        let mut written = Vec::with_capacity(results.len());

        for page in results {
            let target = out_dir.join(output_path(&page.path));
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| SiteError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            tokio::fs::write(&target, &page.html)
                .await
                .map_err(|source| SiteError::Write {
                    path: target.clone(),
                    source,
                })?;
            written.push(target);
        }

        Ok(written)
    }

    /// Delete the output of removed pages. Missing files are ignored.
    pub async fn discard(&self, pages: &[String], out_dir: &Path) -> Result<(), SiteError> {
        for page in pages {
            let target = out_dir.join(output_path(page));
            match tokio::fs::remove_file(&target).await {
                Ok(()) => tracing::debug!("removed {}", target.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(SiteError::Write { path: target, source }),
            }
        }
        Ok(())
    }

    /// Initialise, compile every page and write the output directory.
    pub async fn build(&mut self) -> Result<BuildResult, SiteError> {
        let start = Instant::now();

        self.initialise()?;
        let results = self.compile(None)?;
        let output_dir = self.config.output_dir.clone();
        self.save(&results, &output_dir).await?;

        Ok(BuildResult {
            pages: results.len(),
            templates: self.templates.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir,
        })
    }

    /// Re-read a created or modified file.
    ///
    /// A file that no longer exists is treated as removed. Files outside the
    /// page and template directories are rejected.
    pub fn apply_change(&mut self, path: &Path) -> Result<Change, SiteError> {
        if !path.is_file() {
            return self.remove(path);
        }

        let Some(source) = self.locate(path)? else {
            return Ok(Change::default());
        };
        let read = || {
            fs::read_to_string(path).map_err(|source| SiteError::Read {
                path: path.to_path_buf(),
                source,
            })
        };

        match source {
            Source::Page(relative) => {
                let outcome = self.pages.set(FileRecord::new(&relative, read()?))?;
                let recompile = match outcome {
                    Outcome::Skipped => Vec::new(),
                    _ => vec![relative],
                };
                Ok(Change {
                    recompile,
                    removed: Vec::new(),
                })
            }
            Source::Template(relative) => {
                let previous = self.templates.get(&relative).map(|t| t.result.id.clone());
                let outcome = self.templates.set(FileRecord::new(&relative, read()?))?;
                if outcome == Outcome::Skipped {
                    return Ok(Change::default());
                }

                let current = self.templates.get(&relative).map(|t| t.result.id.clone());
                let mut recompile = Vec::new();
                for id in previous.iter().chain(current.iter()) {
                    for page in self.dependents(id) {
                        push_unique(&mut recompile, page);
                    }
                }
                Ok(Change {
                    recompile,
                    removed: Vec::new(),
                })
            }
            Source::TemplateScript => Ok(Change {
                recompile: self.pages.ids(),
                removed: Vec::new(),
            }),
        }
    }

    /// Forget a deleted file.
    pub fn remove(&mut self, path: &Path) -> Result<Change, SiteError> {
        let Some(source) = self.locate(path)? else {
            return Ok(Change::default());
        };

        match source {
            Source::Page(relative) => {
                let Some(page) = self.pages.delete(&relative) else {
                    return Ok(Change::default());
                };
                for plugin in self.plugins.iter() {
                    plugin.on_page_delete(&page);
                }
                Ok(Change {
                    recompile: Vec::new(),
                    removed: vec![relative],
                })
            }
            Source::Template(relative) => {
                let Some(id) = self.templates.get(&relative).map(|t| t.result.id.clone()) else {
                    return Ok(Change::default());
                };
                let recompile = self.dependents(&id);
                if let Some(template) = self.templates.delete(&relative) {
                    for plugin in self.plugins.iter() {
                        plugin.on_template_delete(&template);
                    }
                }
                Ok(Change {
                    recompile,
                    removed: Vec::new(),
                })
            }
            Source::TemplateScript => Ok(Change {
                recompile: self.pages.ids(),
                removed: Vec::new(),
            }),
        }
    }

    /// Pages that use the template `id`, directly or through other templates.
    pub fn dependents(&self, id: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
        let mut pending = vec![id.to_string()];
        let mut pages: Vec<String> = Vec::new();

        while let Some(name) = pending.pop() {
            for page in self.pages.usage().users_of(&name) {
                if !pages.iter().any(|p| p == page) {
                    pages.push(page.to_string());
                }
            }
            for user in self.templates.usage().users_of(&name) {
                let Some(template) = self.templates.get(user) else {
                    continue;
                };
                if seen.insert(template.result.id.clone()) {
                    pending.push(template.result.id.clone());
                }
            }
        }

        pages.sort();
        pages
    }

    fn render_queue(&self, selectors: &[String]) -> Vec<String> {
        let mut queue: Vec<String> = Vec::new();
        for selector in selectors {
            if let Some(page) = self.pages.get(selector) {
                push_unique(&mut queue, page.path.pathname.clone());
            } else if let Some(template) = self.templates.get(selector) {
                for page in self.dependents(&template.result.id) {
                    push_unique(&mut queue, page);
                }
            } else {
                tracing::warn!("Nothing to compile for {}", selector);
            }
        }
        queue
    }

    /// Classify a changed file. `None` for files no collection cares about.
    fn locate(&self, path: &Path) -> Result<Option<Source>, SiteError> {
        let path = absolute(path);
        let exclude = &self.config.exclude;

        if let Ok(relative) = path.strip_prefix(&self.templates_root) {
            if is_excluded(relative, exclude) {
                return Ok(None);
            }
            if has_extension(relative, TEMPLATE_EXTENSIONS) {
                return Ok(Some(Source::Template(pathname(relative))));
            }
            if has_extension(relative, SCRIPT_EXTENSIONS) {
                return Ok(Some(Source::TemplateScript));
            }
            return Ok(None);
        }

        if let Ok(relative) = path.strip_prefix(&self.pages_root) {
            if is_excluded(relative, exclude) || !has_extension(relative, PAGE_EXTENSIONS) {
                return Ok(None);
            }
            return Ok(Some(Source::Page(pathname(relative))));
        }

        Err(SiteError::Unwatched(path))
    }
}

fn compile_one(
    library: &Library<'_>,
    path: &str,
    page: &Page,
    options: &CompileOptions,
) -> Result<CompiledPage, SiteError> {
    let start = Instant::now();
    let html = compile_page(library, path, page, options).map_err(|source| SiteError::Compile {
        path: path.to_string(),
        source,
    })?;
    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::debug!("compiled {} in {}ms", path, duration_ms);

    Ok(CompiledPage {
        path: path.to_string(),
        html,
        duration_ms,
    })
}

fn push_unique(queue: &mut Vec<String>, page: String) {
    if !queue.contains(&page) {
        queue.push(page);
    }
}

/// Output file of a page, relative to the output directory.
pub fn output_path(page: &str) -> PathBuf {
    Path::new(page).with_extension("html")
}

fn pathname(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Empty template and page collections wired to the plugin hooks.
fn collections(
    templates_root: &Path,
    config: &SiteConfig,
    plugins: &Plugins,
) -> (Collection<Module>, Collection<Page>) {
    let templates = Collection::with_hooks(
        ItemKind::Template,
        ModuleOptions {
            root: templates_root.to_path_buf(),
            ignore: config.ignore.clone(),
        },
        Box::new(TemplateHooks(plugins.clone())),
    );
    let pages = Collection::with_hooks(
        ItemKind::Page,
        PageOptions {
            ignore: config.ignore.clone(),
        },
        Box::new(PageHooks(plugins.clone())),
    );
    (templates, pages)
}

fn compile_options(config: &SiteConfig, plugins: &Plugins) -> CompileOptions {
    CompileOptions {
        minify: config.minify,
        script_timeout: config.script_timeout,
        script_memory_limit: config.script_memory_limit,
        plugin_methods: plugins
            .iter()
            .filter_map(|p| Some((p.name().to_string(), p.method()?)))
            .collect(),
        client_modules: plugins.iter().filter_map(|p| p.client_script()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};
    use tessera_compiler::{ClientModule, PluginMethod};

    const GREETING: &str = r#"<template id="hello-greeting">Hello {{ name }}!</template>"#;

    const SHOUT: &str = r#"<template id="x-shout"><b><hello-greeting name="{{ name }}"></hello-greeting></b></template>"#;

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn fixture() -> (TempDir, SiteConfig) {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "templates/greeting.html", GREETING);
        write(root, "templates/shout.html", SHOUT);
        write(
            root,
            "pages/index.html",
            r#"<body><hello-greeting name="Ada"></hello-greeting></body>"#,
        );
        write(
            root,
            "pages/blog/loud.md",
            "---\ntitle: Loud\n---\n<x-shout name=\"Bo\"></x-shout>\n",
        );
        write(root, "pages/about.html", "<p>{{ title }}</p>");

        let config = SiteConfig {
            pages_dir: root.join("pages"),
            templates_dir: root.join("templates"),
            output_dir: root.join("dist"),
            minify: false,
            ..Default::default()
        };
        (temp, config)
    }

    fn paths(pages: &[CompiledPage]) -> Vec<&str> {
        let mut paths: Vec<&str> = pages.iter().map(|p| p.path.as_str()).collect();
        paths.sort();
        paths
    }

    #[tokio::test]
    async fn builds_simple_site() {
        let (temp, config) = fixture();
        let out = config.output_dir.clone();

        let mut site = Site::new(config);
        let result = site.build().await.unwrap();

        assert_eq!(result.pages, 3);
        assert_eq!(result.templates, 2);
        assert_eq!(
            fs::read_to_string(out.join("index.html")).unwrap(),
            "<body>Hello Ada!</body>"
        );
        let loud = fs::read_to_string(out.join("blog/loud.html")).unwrap();
        assert!(loud.contains("<b>Hello Bo!</b>"), "{loud}");
        assert!(out.join("about.html").exists());
        drop(temp);
    }

    #[test]
    fn template_selectors_pick_dependent_pages() {
        let (_temp, config) = fixture();
        let mut site = Site::new(config);
        site.initialise().unwrap();

        assert_eq!(site.dependents("hello-greeting"), vec!["blog/loud.md", "index.html"]);
        assert_eq!(site.dependents("x-shout"), vec!["blog/loud.md"]);

        let by_id = site.compile(Some(&["x-shout".to_string()])).unwrap();
        assert_eq!(paths(&by_id), vec!["blog/loud.md"]);

        let by_path = site
            .compile(Some(&["greeting.html".to_string(), "index.html".to_string()]))
            .unwrap();
        assert_eq!(paths(&by_path), vec!["blog/loud.md", "index.html"]);

        let unknown = site.compile(Some(&["nope.html".to_string()])).unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn invalid_template_ids_abort_initialisation() {
        let (temp, config) = fixture();
        write(temp.path(), "templates/bad.html", r#"<template id="bad"></template>"#);

        let mut site = Site::new(config);
        let err = site.initialise().unwrap_err();
        assert!(matches!(err, SiteError::Collection(_)), "{err}");
    }

    #[test]
    fn missing_page_directory_is_fatal() {
        let (temp, mut config) = fixture();
        config.pages_dir = temp.path().join("missing");

        let mut site = Site::new(config);
        assert!(matches!(
            site.initialise().unwrap_err(),
            SiteError::MissingDirectory(_)
        ));
    }

    #[test]
    fn template_changes_report_dependents() {
        let (temp, config) = fixture();
        let mut site = Site::new(config);
        site.initialise().unwrap();

        let path = write(
            temp.path(),
            "templates/greeting.html",
            r#"<template id="hello-greeting">Hi {{ name }}</template>"#,
        );
        let change = site.apply_change(&path).unwrap();
        assert_eq!(change.recompile, vec!["blog/loud.md", "index.html"]);

        let compiled = site.compile(Some(&change.recompile)).unwrap();
        let index = compiled.iter().find(|p| p.path == "index.html").unwrap();
        assert_eq!(index.html, "<body>Hi Ada</body>");

        fs::remove_file(&path).unwrap();
        let change = site.remove(&path).unwrap();
        assert_eq!(change.recompile, vec!["blog/loud.md", "index.html"]);
        assert!(site.templates().get("hello-greeting").is_none());
    }

    #[test]
    fn page_changes_and_removals() {
        let (temp, config) = fixture();
        let mut site = Site::new(config);
        site.initialise().unwrap();

        let path = write(temp.path(), "pages/new.html", "<hello-greeting name=\"Cy\"></hello-greeting>");
        let change = site.apply_change(&path).unwrap();
        assert_eq!(change.recompile, vec!["new.html"]);
        assert_eq!(site.dependents("hello-greeting").len(), 3);

        fs::remove_file(&path).unwrap();
        let change = site.apply_change(&path).unwrap();
        assert_eq!(
            change,
            Change {
                recompile: Vec::new(),
                removed: vec!["new.html".to_string()],
            }
        );

        let ignored = write(temp.path(), "pages/notes.txt", "x");
        assert_eq!(site.apply_change(&ignored).unwrap(), Change::default());

        let outside = write(temp.path(), "elsewhere/a.html", "x");
        assert!(matches!(
            site.apply_change(&outside).unwrap_err(),
            SiteError::Unwatched(_)
        ));
    }

    #[tokio::test]
    async fn discards_removed_output() {
        let (_temp, config) = fixture();
        let out = config.output_dir.clone();
        let mut site = Site::new(config);
        site.build().await.unwrap();

        site.discard(&["about.html".to_string(), "gone.html".to_string()], &out)
            .await
            .unwrap();
        assert!(!out.join("about.html").exists());
        assert!(out.join("index.html").exists());
    }

    struct Stamp;

    impl Plugin for Stamp {
        fn name(&self) -> &str {
            "stamp"
        }

        fn method(&self) -> Option<PluginMethod> {
            let method: PluginMethod =
                Arc::new(|args: &[serde_json::Value]| -> Result<serde_json::Value, String> {
                    let text = args.first().and_then(|v| v.as_str()).unwrap_or_default();
                    Ok(serde_json::Value::String(format!("[{text}]")))
                });
            Some(method)
        }

        fn templates(&self) -> Vec<FileRecord> {
            vec![FileRecord::new(
                "stamped.html",
                r#"<template id="x-stamped"><i>{{ label }}</i></template>
<script type="module">
import { stamp } from 'tessera/plugins';
export default { label: ({ text }) => stamp(text) };
</script>"#,
            )]
        }

        fn client_script(&self) -> Option<ClientModule> {
            Some(ClientModule {
                helpers: "const stamped = true;".into(),
                imports: Vec::new(),
            })
        }

        fn on_page_set(&self, page: &tessera_collection::CollectionItem<Page>) -> bool {
            page.path.pathname != "about.html"
        }
    }

    #[test]
    fn plugins_contribute_templates_methods_and_scripts() {
        let (temp, config) = fixture();
        write(temp.path(), "pages/stamp.html", r#"<body><x-stamped text="ok"></x-stamped></body>"#);

        let mut site = Site::new(config);
        site.register_plugin(Stamp).unwrap();
        assert!(matches!(
            site.register_plugin(Stamp).unwrap_err(),
            SiteError::DuplicatePlugin(_)
        ));
        site.initialise().unwrap();

        assert!(site.templates().get("@stamp/stamped.html").is_some());
        assert!(site.pages().get("about.html").is_none());

        let compiled = site.compile(Some(&["stamp.html".to_string()])).unwrap();
        assert_eq!(compiled.len(), 1);
        assert!(compiled[0].html.starts_with("<body><i>[ok]</i><script>"), "{}", compiled[0].html);
        assert!(compiled[0].html.contains("const stamped = true;"));
    }

    #[test]
    fn output_paths_use_html_extension() {
        assert_eq!(output_path("blog/post.md"), PathBuf::from("blog/post.html"));
        assert_eq!(output_path("index.html"), PathBuf::from("index.html"));
    }
}
