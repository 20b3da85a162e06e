//! Theme engine with Tera templates.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tera::Tera;
use tracing::debug;

/// Templates compiled into the binary, as (name, source).
const EMBEDDED: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("macros.html", include_str!("../templates/macros.html")),
    ("shell.html", include_str!("../templates/shell.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("success.html", include_str!("../templates/success.html")),
    ("unauthorized.html", include_str!("../templates/unauthorized.html")),
    ("not_found.html", include_str!("../templates/not_found.html")),
    ("main.html", include_str!("../templates/main.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("settings.html", include_str!("../templates/settings.html")),
    ("tray.html", include_str!("../templates/tray.html")),
    ("screen.html", include_str!("../templates/screen.html")),
    ("screens/frame.html", include_str!("../templates/screens/frame.html")),
    ("screens/screen.html", include_str!("../templates/screens/screen.html")),
    ("screens/tree.html", include_str!("../templates/screens/tree.html")),
];

/// Theme engine for rendering templates.
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Create a theme engine loading templates from the given directory.
    pub fn new(template_dir: &Path) -> Result<Self> {
        let pattern = template_dir.join("**/*.html");
        let pattern_str = pattern
            .to_str()
            .context("invalid template directory path")?;

        let mut tera = Tera::new(pattern_str).context("failed to initialize Tera templates")?;
        Self::register_filters(&mut tera);

        let template_names: Vec<_> = tera.get_template_names().collect();
        debug!(count = template_names.len(), "loaded templates");

        Ok(Self { tera })
    }

    /// Create a theme engine from the templates embedded in the binary.
    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(EMBEDDED.iter().copied())
            .context("failed to compile embedded templates")?;
        Self::register_filters(&mut tera);
        debug!(count = EMBEDDED.len(), "loaded embedded templates");
        Ok(Self { tera })
    }

    fn register_filters(tera: &mut Tera) {
        // Avatar fallback: first letter of up to two words.
        tera.register_filter(
            "initials",
            |value: &tera::Value, _args: &HashMap<String, tera::Value>| {
                let name = tera::try_get_value!("initials", "value", String, value);
                Ok(tera::Value::String(initials(&name)))
            },
        );
    }

    pub fn tera(&self) -> &Tera {
        &self.tera
    }

    /// Render a template by name.
    pub fn render(&self, template: &str, context: &tera::Context) -> Result<String, tera::Error> {
        self.tera.render(template, context)
    }
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}
