use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tera::Context;

/// Site-wide settings shared by every page.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// Short site name, used in page titles (`<title>Post | name</title>`)
    pub name: String,
    /// Canonical origin, no trailing slash
    pub url: String,
    pub description: String,
    pub author: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "vtasca.dev".to_string(),
            url: "https://vtasca.dev".to_string(),
            description: "Notes on data, tools and the occasional experiment".to_string(),
            author: "Vlad Tasca".to_string(),
        }
    }
}

impl SiteConfig {
    /// The origin without any trailing slash.
    pub fn origin(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Values injected into every template render of a single run.
///
/// Built once per build and handed to each render call, so two renders with
/// the same `RenderConfig` see exactly the same globals.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub site: SiteConfig,
    pub year: i32,
    /// Appended to asset URLs (`styles.css?v=...`) to defeat stale caches
    pub cache_token: String,
    /// Websocket URL of the dev server, only set while serving
    pub livereload: Option<String>,
}

impl RenderConfig {
    pub fn new(site: SiteConfig) -> Self {
        Self {
            site,
            year: Utc::now().year(),
            cache_token: random_token(),
            livereload: None,
        }
    }

    pub fn with_cache_token<S: Into<String>>(mut self, token: S) -> Self {
        self.cache_token = token.into();
        self
    }

    pub fn with_livereload<S: Into<String>>(mut self, url: S) -> Self {
        self.livereload = Some(url.into());
        self
    }

    /// Base context for one page. `is_homepage` defaults to false; the home
    /// generator overrides it.
    pub fn to_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site);
        context.insert("year", &self.year);
        context.insert("cache_token", &self.cache_token);
        context.insert("is_homepage", &false);
        context.insert("livereload", &self.livereload);
        context
    }
}

fn random_token() -> String {
    format!("{:08x}", rand::random::<u32>())
}
