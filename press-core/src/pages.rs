//! Derived pages: everything that is not rendered 1:1 from a markdown file.
//!
//! Each generator is a pure function of the metadata store and the template
//! set; writing the result is left to the caller.

use std::path::PathBuf;

use serde::Serialize;
use tera::Context;

use crate::config::RenderConfig;
use crate::metadata::{MetadataStore, PostMetadata, display_date};
use crate::template::{PageTemplate, TemplateError, TemplateRenderer};

/// A rendered page and where it belongs in the output tree.
#[derive(Debug)]
pub struct GeneratedPage {
    pub template: PageTemplate,
    /// Path relative to the output root
    pub output: PathBuf,
    pub contents: String,
}

/// Pages whose only input is the template and the run's globals.
pub const SIMPLE_PAGES: [(PageTemplate, &str); 5] = [
    (PageTemplate::Contact, "contact.html"),
    (PageTemplate::Tools, "tools.html"),
    (PageTemplate::Tokenizer, "tools/tokenizer.html"),
    (PageTemplate::Dithering, "tools/dithering.html"),
    (PageTemplate::Logo, "tools/logo.html"),
];

/// A post as listed on the home page and the blog index.
#[derive(Debug, Serialize)]
pub struct IndexEntry<'a> {
    #[serde(flatten)]
    pub post: &'a PostMetadata,
    /// Site path of the post, extensionless like the feed and sitemap
    pub href: String,
    pub display_date: &'a str,
}

impl<'a> IndexEntry<'a> {
    fn new(post: &'a PostMetadata) -> Self {
        Self {
            href: format!("/blog/{}", post.url),
            display_date: display_date(&post.last_edited_time),
            post,
        }
    }
}

/// One `<item>` of the RSS feed.
#[derive(Debug, Serialize)]
pub struct FeedItem<'a> {
    pub title: &'a str,
    pub link: String,
    pub guid: String,
    pub description: &'a str,
    pub categories: &'a [String],
    /// RFC 2822, empty when the timestamp does not parse
    pub pub_date: String,
}

/// Posts ordered for the blog index: by `date`, newest first. Posts without
/// a date keep their file order after the dated ones.
pub fn index_order(posts: &[PostMetadata]) -> Vec<&PostMetadata> {
    let mut sorted: Vec<&PostMetadata> = posts.iter().collect();
    sorted.sort_by(|a, b| {
        let a = a.date.as_deref().unwrap_or_default();
        let b = b.date.as_deref().unwrap_or_default();
        b.cmp(a)
    });
    sorted
}

/// Posts ordered for the feed: by `last_edited_time`, newest first.
pub fn feed_order(posts: &[PostMetadata]) -> Vec<&PostMetadata> {
    let mut sorted: Vec<&PostMetadata> = posts.iter().collect();
    sorted.sort_by_key(|post| std::cmp::Reverse(post.last_edited()));
    sorted
}

pub fn home(
    store: &MetadataStore,
    renderer: &TemplateRenderer,
    config: &RenderConfig,
) -> Result<GeneratedPage, TemplateError> {
    let entries: Vec<IndexEntry> = index_order(store.posts()).into_iter().map(IndexEntry::new).collect();

    let mut context = Context::new();
    context.insert("is_homepage", &true);
    context.insert("posts", &entries);

    render(renderer, config, PageTemplate::Home, "index.html", &context)
}

pub fn blog_index(
    store: &MetadataStore,
    renderer: &TemplateRenderer,
    config: &RenderConfig,
) -> Result<GeneratedPage, TemplateError> {
    let entries: Vec<IndexEntry> = index_order(store.posts()).into_iter().map(IndexEntry::new).collect();

    let mut context = Context::new();
    context.insert("title", "Blog");
    context.insert("posts", &entries);

    render(renderer, config, PageTemplate::BlogIndex, "blog/index.html", &context)
}

/// The RSS feed. Every published post is included; there is no pagination.
pub fn rss_feed(
    store: &MetadataStore,
    renderer: &TemplateRenderer,
    config: &RenderConfig,
) -> Result<GeneratedPage, TemplateError> {
    let origin = config.site.origin();
    let items: Vec<FeedItem> = feed_order(store.posts())
        .into_iter()
        .map(|post| {
            let link = format!("{origin}/blog/{}", post.url);
            FeedItem {
                title: &post.name,
                guid: link.clone(),
                link,
                description: &post.description,
                categories: &post.tags,
                pub_date: post.last_edited().map(|d| d.to_rfc2822()).unwrap_or_default(),
            }
        })
        .collect();

    // Newest item doubles as the channel date so the feed only changes
    // when content does
    let build_date = items.first().map(|i| i.pub_date.clone()).unwrap_or_default();

    let mut context = Context::new();
    context.insert("items", &items);
    context.insert("build_date", &build_date);
    context.insert("feed_url", &format!("{origin}/rss.xml"));

    render(renderer, config, PageTemplate::Rss, "rss.xml", &context)
}

pub fn data(
    store: &MetadataStore,
    renderer: &TemplateRenderer,
    config: &RenderConfig,
) -> Result<GeneratedPage, TemplateError> {
    let mut context = Context::new();
    context.insert("title", "Data");
    context.insert("datasets", store.datasets());

    render(renderer, config, PageTemplate::Data, "data.html", &context)
}

/// Contact, tools and the individual tool pages.
pub fn simple_pages(
    renderer: &TemplateRenderer,
    config: &RenderConfig,
) -> Result<Vec<GeneratedPage>, TemplateError> {
    SIMPLE_PAGES
        .iter()
        .map(|(template, output)| render(renderer, config, *template, output, &Context::new()))
        .collect()
}

fn render(
    renderer: &TemplateRenderer,
    config: &RenderConfig,
    template: PageTemplate,
    output: &str,
    context: &Context,
) -> Result<GeneratedPage, TemplateError> {
    Ok(GeneratedPage {
        template,
        output: PathBuf::from(output),
        contents: renderer.render(template, config, context)?,
    })
}
