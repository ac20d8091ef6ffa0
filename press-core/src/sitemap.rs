//! Sitemap generation.
//!
//! Built by walking the finished output tree, so it has to run after every
//! other page has been written.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://vtasca.dev/blog/hello-world</loc>
//!     <lastmod>2025-01-01</lastmod>
//!   </url>
//! </urlset>
//! ```

use std::path::{Component, Path};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::site::OutputTree;

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Single URL entry in the sitemap
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UrlEntry {
    pub loc: String,
    /// `YYYY-MM-DD`
    pub lastmod: Option<String>,
}

#[derive(Debug, Default)]
pub struct Sitemap {
    urls: Vec<UrlEntry>,
}

impl Sitemap {
    /// Collect every `*.html` file under the output root, minus `exclude`
    /// (paths relative to the root, `/`-separated).
    pub fn scan(tree: &OutputTree, origin: &str, exclude: &[String]) -> std::io::Result<Self> {
        let root = tree.root();
        let mut urls = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.path().extension().is_none_or(|e| e != "html") {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let key = url_path(relative);
            if exclude.iter().any(|e| e.trim_start_matches('/') == key) {
                continue;
            }

            // The originating template or source says when the content last
            // changed; fall back to the output file itself
            let lastmod = tree
                .origin_of(relative)
                .and_then(|origin| modified(origin))
                .or_else(|| modified(entry.path()));

            urls.push(UrlEntry {
                loc: canonical_url(origin, relative),
                lastmod,
            });
        }

        urls.sort();
        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[UrlEntry] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(4096);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
        xml.push('\n');

        for entry in &self.urls {
            xml.push_str("  <url>\n");
            xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
            if let Some(lastmod) = &entry.lastmod {
                xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
            }
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }
}

/// Relative path joined with `/` whatever the platform separator.
fn url_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `blog/index.html` → `{origin}/blog/`, `blog/post.html` → `{origin}/blog/post`.
pub fn canonical_url(origin: &str, relative: &Path) -> String {
    let path = url_path(relative);
    let path = if path == "index.html" {
        ""
    } else if let Some(dir) = path.strip_suffix("/index.html") {
        return format!("{}/{dir}/", origin.trim_end_matches('/'));
    } else {
        path.strip_suffix(".html").unwrap_or(&path)
    };
    format!("{}/{path}", origin.trim_end_matches('/'))
}

fn modified(path: &Path) -> Option<String> {
    let time: SystemTime = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(time).format("%Y-%m-%d").to_string())
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ORIGIN: &str = "https://vtasca.dev";

    #[test]
    fn canonical_urls() {
        assert_eq!(canonical_url(ORIGIN, Path::new("index.html")), "https://vtasca.dev/");
        assert_eq!(canonical_url(ORIGIN, Path::new("blog/index.html")), "https://vtasca.dev/blog/");
        assert_eq!(
            canonical_url(ORIGIN, Path::new("blog/hello-world.html")),
            "https://vtasca.dev/blog/hello-world"
        );
        assert_eq!(canonical_url("https://vtasca.dev/", Path::new("contact.html")), "https://vtasca.dev/contact");
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_xml("a&b<c>\"'"), "a&amp;b&lt;c&gt;&quot;&apos;");
    }

    #[test]
    fn scan_skips_non_html_and_exclusions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("blog")).unwrap();
        std::fs::create_dir_all(root.join("static")).unwrap();
        for file in ["index.html", "404.html", "blog/index.html", "blog/a.html", "static/x.css", "rss.xml"] {
            std::fs::write(root.join(file), "x").unwrap();
        }

        let tree = OutputTree::new(root);
        let sitemap = Sitemap::scan(&tree, ORIGIN, &["404.html".to_string()]).unwrap();
        let locs: Vec<&str> = sitemap.urls().iter().map(|u| u.loc.as_str()).collect();

        assert_eq!(
            locs,
            vec!["https://vtasca.dev/", "https://vtasca.dev/blog/", "https://vtasca.dev/blog/a"]
        );
        assert!(sitemap.urls().iter().all(|u| u.lastmod.as_deref().is_some_and(|d| d.len() == 10)));
    }

    #[test]
    fn lastmod_prefers_origin_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("out");
        std::fs::create_dir_all(&root).unwrap();
        let template = dir.path().join("contact.html");
        std::fs::write(&template, "tpl").unwrap();

        let old = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(86_400 * 365);
        std::fs::File::options()
            .write(true)
            .open(&template)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let mut tree = OutputTree::new(&root);
        tree.write_page(Path::new("contact.html"), "page", &template).unwrap();
        let sitemap = Sitemap::scan(&tree, ORIGIN, &[]).unwrap();

        assert_eq!(sitemap.urls()[0].lastmod.as_deref(), Some("1971-01-01"));
    }

    #[test]
    fn xml_shape() {
        let sitemap = Sitemap {
            urls: vec![UrlEntry {
                loc: "https://vtasca.dev/?a=1&b=2".into(),
                lastmod: Some("2025-01-01".into()),
            }],
        };
        let xml = sitemap.to_xml();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset"));
        assert!(xml.contains("<loc>https://vtasca.dev/?a=1&amp;b=2</loc>"));
        assert!(xml.contains("<lastmod>2025-01-01</lastmod>"));
        assert!(xml.ends_with("</urlset>\n"));
    }
}
