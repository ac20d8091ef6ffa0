use std::fmt;
use std::path::{Path, PathBuf};

use tera::{Context, Tera};
use thiserror::Error;

use crate::config::RenderConfig;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template directory not found: {}", .0.display())]
    MissingDir(PathBuf),
    #[error("template `{name}` not found in {}", dir.display())]
    MissingTemplate { name: &'static str, dir: PathBuf },
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),
}

/// Every page template the site knows about, keyed by logical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageTemplate {
    Home,
    BlogPost,
    BlogIndex,
    Contact,
    Tools,
    Data,
    Rss,
    Tokenizer,
    Dithering,
    Logo,
}

impl PageTemplate {
    pub const ALL: [PageTemplate; 10] = [
        PageTemplate::Home,
        PageTemplate::BlogPost,
        PageTemplate::BlogIndex,
        PageTemplate::Contact,
        PageTemplate::Tools,
        PageTemplate::Data,
        PageTemplate::Rss,
        PageTemplate::Tokenizer,
        PageTemplate::Dithering,
        PageTemplate::Logo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PageTemplate::Home => "home",
            PageTemplate::BlogPost => "blog-post",
            PageTemplate::BlogIndex => "blog-index",
            PageTemplate::Contact => "contact",
            PageTemplate::Tools => "tools",
            PageTemplate::Data => "data",
            PageTemplate::Rss => "rss",
            PageTemplate::Tokenizer => "tokenizer",
            PageTemplate::Dithering => "dithering",
            PageTemplate::Logo => "logo",
        }
    }

    /// File name inside the templates directory.
    pub fn file_name(self) -> &'static str {
        match self {
            PageTemplate::Home => "home.html",
            PageTemplate::BlogPost => "blog-post.html",
            PageTemplate::BlogIndex => "blog-index.html",
            PageTemplate::Contact => "contact.html",
            PageTemplate::Tools => "tools.html",
            PageTemplate::Data => "data.html",
            PageTemplate::Rss => "rss.xml",
            PageTemplate::Tokenizer => "tokenizer.html",
            PageTemplate::Dithering => "dithering.html",
            PageTemplate::Logo => "logo.html",
        }
    }
}

impl fmt::Display for PageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Loads the templates directory once and renders pages against a
/// [`RenderConfig`] plus a per-page context.
pub struct TemplateRenderer {
    tera: Tera,
    dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, TemplateError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(TemplateError::MissingDir(dir));
        }

        let glob = format!("{}/**/*", dir.display());
        let tera = Tera::new(&glob)?;

        Ok(Self { tera, dir })
    }

    /// Fail early if any page template is missing, before the output tree
    /// is touched.
    pub fn check(&self) -> Result<(), TemplateError> {
        let known: Vec<&str> = self.tera.get_template_names().collect();
        for template in PageTemplate::ALL {
            if !known.contains(&template.file_name()) {
                return Err(TemplateError::MissingTemplate {
                    name: template.name(),
                    dir: self.dir.clone(),
                });
            }
        }
        Ok(())
    }

    /// Path of the file a template was loaded from.
    pub fn template_path(&self, template: PageTemplate) -> PathBuf {
        self.dir.join(template.file_name())
    }

    /// Render `template` with the run's globals overlaid by `context`.
    pub fn render(
        &self,
        template: PageTemplate,
        config: &RenderConfig,
        context: &Context,
    ) -> Result<String, TemplateError> {
        let mut full = config.to_context();
        full.extend(context.clone());
        Ok(self.tera.render(template.file_name(), &full)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    fn renderer_with(files: &[(&str, &str)]) -> (TempDir, TemplateRenderer) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let renderer = TemplateRenderer::new(dir.path()).unwrap();
        (dir, renderer)
    }

    #[test]
    fn page_context_overrides_globals() {
        let (_dir, renderer) = renderer_with(&[(
            "home.html",
            "{{ site.name }} {{ year }} {{ cache_token }} {{ is_homepage }}",
        )]);
        let config = RenderConfig::new(SiteConfig::default()).with_cache_token("t0k");

        let mut context = Context::new();
        context.insert("is_homepage", &true);
        let html = renderer.render(PageTemplate::Home, &config, &context).unwrap();

        assert_eq!(html, format!("vtasca.dev {} t0k true", config.year));
    }

    #[test]
    fn check_reports_missing_template() {
        let (_dir, renderer) = renderer_with(&[("home.html", "hi")]);
        let err = renderer.check().unwrap_err();
        assert!(matches!(err, TemplateError::MissingTemplate { name: "blog-post", .. }));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = TemplateRenderer::new(dir.path().join("nope")).err().unwrap();
        assert!(matches!(err, TemplateError::MissingDir(_)));
    }

    #[test]
    fn html_templates_escape_variables() {
        let (_dir, renderer) = renderer_with(&[("contact.html", "{{ note }}|{{ note | safe }}")]);
        let mut context = Context::new();
        context.insert("note", "<b>");
        let config = RenderConfig::new(SiteConfig::default());

        let html = renderer.render(PageTemplate::Contact, &config, &context).unwrap();
        assert_eq!(html, "&lt;b&gt;|<b>");
    }
}
