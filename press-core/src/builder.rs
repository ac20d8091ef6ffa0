use std::fmt;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::assemble::{self, AssembleError};
use crate::config::{RenderConfig, SiteConfig};
use crate::metadata::{MetadataError, MetadataStore};
use crate::pages::{self, GeneratedPage};
use crate::post::convert_post;
use crate::site::{OutputTree, SourceLayout};
use crate::sitemap::Sitemap;
use crate::template::{TemplateError, TemplateRenderer};

/// Pipeline stages, in the only order they ever run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    CopyStatic,
    RenderPosts,
    RenderDerivedPages,
    RenderSitemap,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::CopyStatic => "copy static",
            Stage::RenderPosts => "render posts",
            Stage::RenderDerivedPages => "render derived pages",
            Stage::RenderSitemap => "render sitemap",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Source directory not specified")]
    MissingSourceDir,
    #[error("markdown source not found: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("{} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to scan output tree: {0}")]
    Scan(std::io::Error),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// The stage a pipeline failure happened in.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BuildError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub posts: usize,
    pub pages: usize,
    pub assets: usize,
    pub sitemap_urls: usize,
}

pub struct SiteBuilder {
    source_dir: Option<PathBuf>,
    output_dir: PathBuf,
    templates_dir: Option<PathBuf>,
    site: SiteConfig,
    cache_token: Option<String>,
    livereload: Option<String>,
    root_files: Vec<String>,
    sitemap_exclude: Vec<String>,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            source_dir: None,
            output_dir: PathBuf::from("./published"),
            templates_dir: None,
            site: SiteConfig::default(),
            cache_token: None,
            livereload: None,
            root_files: default_root_files(),
            sitemap_exclude: vec!["404.html".to_string()],
        }
    }

    // Required configuration
    pub fn source_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_dir = Some(path.as_ref().to_path_buf());
        self
    }

    // Optional paths
    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = path.as_ref().to_path_buf();
        self
    }

    /// Defaults to `<source>/templates`.
    pub fn templates_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.templates_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn site_config(mut self, config: SiteConfig) -> Self {
        self.site = config;
        self
    }

    /// Pin the cache-busting token instead of drawing a random one.
    pub fn cache_token<S: Into<String>>(mut self, token: S) -> Self {
        self.cache_token = Some(token.into());
        self
    }

    pub fn livereload<S: Into<String>>(mut self, url: S) -> Self {
        self.livereload = Some(url.into());
        self
    }

    pub fn root_files(mut self, files: Vec<String>) -> Self {
        self.root_files = files;
        self
    }

    pub fn sitemap_exclude(mut self, paths: Vec<String>) -> Self {
        self.sitemap_exclude = paths;
        self
    }

    pub fn build(self) -> Result<Site, BuildError> {
        let source_dir = self.source_dir.ok_or(BuildError::MissingSourceDir)?;

        let mut layout = SourceLayout::new(&source_dir);
        if let Some(templates) = self.templates_dir {
            layout = layout.with_templates(templates);
        }

        // One config per run, handed to every render call
        let mut render_config = RenderConfig::new(self.site);
        if let Some(token) = self.cache_token {
            render_config = render_config.with_cache_token(token);
        }
        if let Some(url) = self.livereload {
            render_config = render_config.with_livereload(url);
        }

        Ok(Site {
            layout,
            output_dir: self.output_dir,
            render_config,
            root_files: self.root_files,
            sitemap_exclude: self.sitemap_exclude,
        })
    }
}

pub fn default_root_files() -> Vec<String> {
    ["favicon.ico", "favicon.svg", "robots.txt", "CNAME"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A configured build, ready to run.
pub struct Site {
    layout: SourceLayout,
    output_dir: PathBuf,
    render_config: RenderConfig,
    root_files: Vec<String>,
    sitemap_exclude: Vec<String>,
}

/// Inputs loaded during setup and shared by the later stages.
struct Inputs {
    store: MetadataStore,
    renderer: TemplateRenderer,
}

impl Site {
    pub fn render_config(&self) -> &RenderConfig {
        &self.render_config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run every stage in order. Any failure stops the run; the output tree
    /// may then be incomplete until the next successful build replaces it.
    pub fn render_all(&self) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        let mut tree = OutputTree::new(&self.output_dir);

        let inputs = run_stage(Stage::Setup, || self.setup())?;
        report.assets = run_stage(Stage::CopyStatic, || self.copy_static())?;
        report.posts = run_stage(Stage::RenderPosts, || self.render_posts(&inputs, &mut tree))?;
        run_stage(Stage::RenderDerivedPages, || self.render_derived(&inputs, &mut tree))?;
        report.sitemap_urls = run_stage(Stage::RenderSitemap, || self.render_sitemap(&mut tree))?;
        report.pages = tree.pages_written();

        info!(
            "{}: {} posts, {} pages, {} assets, {} sitemap urls",
            Stage::Done,
            report.posts,
            report.pages,
            report.assets,
            report.sitemap_urls
        );
        Ok(report)
    }

    /// Load every input before the previous output is removed, so bad input
    /// never leaves the site half-deleted.
    fn setup(&self) -> Result<Inputs, BuildError> {
        let store = MetadataStore::load(&self.layout.blog_metadata(), &self.layout.data_metadata())?;
        let renderer = TemplateRenderer::new(&self.layout.templates)?;
        renderer.check()?;

        assemble::prepare_output(&self.output_dir)?;
        Ok(Inputs { store, renderer })
    }

    fn copy_static(&self) -> Result<usize, BuildError> {
        Ok(assemble::copy_static(&self.layout, &self.output_dir, &self.root_files)?)
    }

    fn render_posts(&self, inputs: &Inputs, tree: &mut OutputTree) -> Result<usize, BuildError> {
        let markdown_dir = self.layout.markdown_dir();

        for post in inputs.store.posts() {
            let source = markdown_dir.join(post.source_file_name());
            convert_post(
                &source,
                Some(post),
                Path::new("blog"),
                tree,
                &inputs.renderer,
                &self.render_config,
            )?;
        }

        Ok(inputs.store.posts().len())
    }

    fn render_derived(&self, inputs: &Inputs, tree: &mut OutputTree) -> Result<(), BuildError> {
        let Inputs { store, renderer } = inputs;
        let config = &self.render_config;

        let mut generated: Vec<GeneratedPage> = vec![
            pages::home(store, renderer, config)?,
            pages::blog_index(store, renderer, config)?,
            pages::rss_feed(store, renderer, config)?,
            pages::data(store, renderer, config)?,
        ];
        generated.extend(pages::simple_pages(renderer, config)?);

        for page in generated {
            let origin = renderer.template_path(page.template);
            write(tree, &page.output, &page.contents, &origin)?;
        }
        Ok(())
    }

    fn render_sitemap(&self, tree: &mut OutputTree) -> Result<usize, BuildError> {
        let sitemap = Sitemap::scan(tree, self.render_config.site.origin(), &self.sitemap_exclude)
            .map_err(BuildError::Scan)?;

        let path = self.output_dir.join("sitemap.xml");
        std::fs::write(&path, sitemap.to_xml()).map_err(|source| BuildError::Write { path, source })?;
        Ok(sitemap.len())
    }
}

fn write(tree: &mut OutputTree, relative: &Path, contents: &str, origin: &Path) -> Result<(), BuildError> {
    tree.write_page(relative, contents, origin)
        .map(|_| ())
        .map_err(|source| BuildError::Write {
            path: tree.root().join(relative),
            source,
        })
}

fn run_stage<T>(stage: Stage, f: impl FnOnce() -> Result<T, BuildError>) -> Result<T, BuildError> {
    info!("stage: {stage}");
    f().map_err(|source| BuildError::Stage {
        stage,
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_source_dir() {
        let err = SiteBuilder::new().build().err().unwrap();
        assert!(matches!(err, BuildError::MissingSourceDir));
    }

    #[test]
    fn builder_pins_cache_token() {
        let site = SiteBuilder::new()
            .source_dir("src")
            .cache_token("v1")
            .livereload("ws://127.0.0.1:8000/__livereload")
            .build()
            .unwrap();
        assert_eq!(site.render_config().cache_token, "v1");
        assert_eq!(
            site.render_config().livereload.as_deref(),
            Some("ws://127.0.0.1:8000/__livereload")
        );
    }

    #[test]
    fn stage_errors_name_the_stage() {
        let err = run_stage::<()>(Stage::RenderPosts, || {
            Err(BuildError::MissingSource(PathBuf::from("blog/md/x.md")))
        })
        .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::RenderPosts));
        assert_eq!(err.to_string(), "render posts failed: markdown source not found: blog/md/x.md");
    }
}
