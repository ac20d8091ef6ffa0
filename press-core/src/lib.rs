pub mod assemble;
pub mod builder;
pub mod config;
pub mod markdown;
pub mod metadata;
pub mod pages;
pub mod post;
pub mod site;
pub mod sitemap;
pub mod slug;
pub mod svg;
pub mod template;

// Re-export main types
pub use builder::{BuildError, BuildReport, Site, SiteBuilder, Stage};
pub use config::{RenderConfig, SiteConfig};
pub use markdown::render_markdown;
pub use metadata::{DatasetMetadata, MetadataStore, PostMetadata};
pub use post::convert_post;
pub use slug::slugify;
pub use template::{PageTemplate, TemplateError, TemplateRenderer};
