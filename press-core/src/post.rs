//! One markdown file plus its metadata record in, one blog page out.

use std::path::{Path, PathBuf};

use tera::Context;

use crate::builder::BuildError;
use crate::config::RenderConfig;
use crate::markdown::{first_heading, render_markdown};
use crate::metadata::{PostMetadata, display_date};
use crate::site::OutputTree;
use crate::template::{PageTemplate, TemplateRenderer};

const DEFAULT_TITLE: &str = "Blog Post";

#[derive(Debug)]
pub struct RenderedPost {
    /// File name inside the blog output directory
    pub file_name: String,
    pub html: String,
}

/// `<url>.html` when the metadata carries a slug, otherwise the source file
/// name with its extension swapped.
pub fn output_file_name(source: &Path, metadata: Option<&PostMetadata>) -> String {
    match metadata {
        Some(meta) if !meta.url.is_empty() => meta.output_file_name(),
        _ => {
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{stem}.html")
        }
    }
}

/// Read a markdown file and render it through the `blog-post` template.
pub fn render_post(
    source: &Path,
    metadata: Option<&PostMetadata>,
    renderer: &TemplateRenderer,
    config: &RenderConfig,
) -> Result<RenderedPost, BuildError> {
    let markdown = read_source(source)?;
    let content = render_markdown(&markdown);

    let mut context = Context::new();
    context.insert("content", &content);

    match metadata {
        Some(meta) => {
            context.insert("title", &meta.name);
            context.insert("description", &meta.description);
            context.insert("id", &meta.id);
            context.insert("created_time", &meta.created_time);
            context.insert("last_edited_time", &meta.last_edited_time);
            context.insert("display_date", display_date(&meta.last_edited_time));
            context.insert("tags", &meta.tags);
            context.insert("post", meta);
        }
        None => {
            let title = first_heading(&markdown).unwrap_or_else(|| DEFAULT_TITLE.to_string());
            context.insert("title", &title);
            context.insert("description", "");
            context.insert("id", "");
            context.insert("created_time", "");
            context.insert("last_edited_time", "");
            context.insert("display_date", "");
            context.insert("tags", &Vec::<String>::new());
        }
    }

    let html = renderer.render(PageTemplate::BlogPost, config, &context)?;

    Ok(RenderedPost {
        file_name: output_file_name(source, metadata),
        html,
    })
}

/// Render a post and write it to `out_dir/<file name>` inside the output
/// tree. The markdown file is recorded as the page's origin, so it dates the
/// page in the sitemap.
pub fn convert_post(
    source: &Path,
    metadata: Option<&PostMetadata>,
    out_dir: &Path,
    tree: &mut OutputTree,
    renderer: &TemplateRenderer,
    config: &RenderConfig,
) -> Result<(PathBuf, String), BuildError> {
    let post = render_post(source, metadata, renderer, config)?;
    let relative = out_dir.join(&post.file_name);
    let path = tree
        .write_page(&relative, &post.html, source)
        .map_err(|e| BuildError::Write {
            path: tree.root().join(&relative),
            source: e,
        })?;
    Ok((path, post.html))
}

fn read_source(path: &Path) -> Result<String, BuildError> {
    let bytes = std::fs::read(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => BuildError::MissingSource(path.to_path_buf()),
        _ => BuildError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    String::from_utf8(bytes).map_err(|_| BuildError::Encoding(path.to_path_buf()))
}
