//! Scaffold a new site.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command in `root`.
pub async fn run(root: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing tessera site...");

    let config_path = root.join("tessera.toml");
    if config_path.exists() && !yes {
        tracing::warn!("tessera.toml already exists. Use --yes to overwrite.");
        return Ok(());
    }

    for dir in ["pages", "templates"] {
        fs::create_dir_all(root.join(dir))
            .with_context(|| format!("Failed to create {dir} directory"))?;
    }

    let files = [
        ("tessera.toml", DEFAULT_CONFIG),
        ("templates/site-greeting.html", DEFAULT_GREETING),
        ("templates/click-counter.html", DEFAULT_COUNTER),
        ("pages/index.html", DEFAULT_INDEX),
    ];
    for (relative, content) in files {
        let path = root.join(relative);
        if path.exists() && !yes {
            continue;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {relative}"))?;
        tracing::info!("Created {}", relative);
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'tessera build' to compile the site.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Tessera Configuration

[site]
# Page source directory
pages = "pages"

# Template source directory
templates = "templates"

# Output directory for the built site
output = "dist"

[build]
# Minify client scripts
minify = true

# Time budget of one behavior script, in milliseconds
script_timeout_ms = 5000

# Memory limit of one script sandbox, in megabytes
script_memory_mb = 32

# Elements the compiler leaves untouched
# [[ignore]]
# tag = "dev-only"

[exclude]
# Path segments skipped when reading pages and templates
patterns = ["_drafts"]
"#;

const DEFAULT_GREETING: &str = r#"<template id="site-greeting">
  <h1>{{ greeting }}</h1>
  <slot>Welcome to your new site.</slot>
</template>
<script type="module">
export default {
  greeting: ({ name }) => `Hello, ${name ?? 'world'}!`,
};
</script>
"#;

const DEFAULT_COUNTER: &str = r#"<template id="click-counter">
  <button ref="button">{{ label }}</button>
  <output ref="count">0</output>
</template>
<script type="module">
export default {
  script({ refs }) {
    let clicks = 0;
    refs.button.addEventListener('click', () => {
      clicks += 1;
      refs.count.textContent = String(clicks);
    });
  },
};
</script>
"#;

const DEFAULT_INDEX: &str = r#"---
title: Home
---
<!DOCTYPE html>
<html>
<head>
  <title>{{ title }}</title>
</head>
<body>
  <site-greeting name="tessera">
    <p>Edit pages/index.html to get started.</p>
  </site-greeting>
  <click-counter label="Click me"></click-counter>
</body>
</html>
"#;
