//! The metadata store: post and dataset records written by the content fetch
//! step and read, never modified, by the build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slug::slugify;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed metadata in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("post `{id}` has url `{url}`, which is not a plain slug")]
    InvalidUrl { id: String, url: String },
    #[error("posts `{first}` and `{second}` both publish to `{url}`")]
    DuplicateUrl {
        url: String,
        first: String,
        second: String,
    },
}

/// One blog post as exported from the CMS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostMetadata {
    pub id: String,
    pub name: String,
    /// Slug, used as the output filename stem
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_edited_time: String,
    #[serde(default = "default_published")]
    pub published: bool,
    /// Optional display date; the blog index sorts on it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

fn default_published() -> bool {
    true
}

impl PostMetadata {
    pub fn created(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.created_time)
    }

    pub fn last_edited(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.last_edited_time)
    }

    /// Name of the markdown source this post is rendered from.
    pub fn source_file_name(&self) -> String {
        format!("{}.md", self.id)
    }

    /// Name of the generated page inside the blog directory.
    pub fn output_file_name(&self) -> String {
        format!("{}.html", self.url)
    }
}

/// One dataset listed on the data page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

/// `YYYY-MM-DD` prefix of an ISO-8601 timestamp, or the value itself when
/// shorter.
pub fn display_date(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

#[derive(Debug, Default, Clone)]
pub struct MetadataStore {
    posts: Vec<PostMetadata>,
    datasets: Vec<DatasetMetadata>,
}

impl MetadataStore {
    pub fn new(posts: Vec<PostMetadata>, datasets: Vec<DatasetMetadata>) -> Result<Self, MetadataError> {
        let posts = normalize_posts(posts)?;
        Ok(Self { posts, datasets })
    }

    /// Load both metadata files. The dataset file is optional; the blog file
    /// is not.
    pub fn load(blog_path: &Path, data_path: &Path) -> Result<Self, MetadataError> {
        let posts: Vec<PostMetadata> = read_json(blog_path)?;
        debug!("loaded {} post records from {}", posts.len(), blog_path.display());

        let datasets = if data_path.exists() {
            read_json(data_path)?
        } else {
            warn!("{} not found, data page will be empty", data_path.display());
            Vec::new()
        };

        Self::new(posts, datasets)
    }

    /// Published posts, in file order.
    pub fn posts(&self) -> &[PostMetadata] {
        &self.posts
    }

    pub fn datasets(&self) -> &[DatasetMetadata] {
        &self.datasets
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, MetadataError> {
    let data = std::fs::read_to_string(path).map_err(|source| MetadataError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| MetadataError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Drop unpublished records, fill in missing slugs and reject collisions.
fn normalize_posts(posts: Vec<PostMetadata>) -> Result<Vec<PostMetadata>, MetadataError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut out = Vec::with_capacity(posts.len());

    for mut post in posts {
        if !post.published {
            debug!("skipping unpublished post {}", post.id);
            continue;
        }

        if post.url.is_empty() {
            post.url = slugify(&post.name);
        }
        if post.url.is_empty() {
            post.url = post.id.clone();
        }
        if !is_plain_slug(&post.url) {
            return Err(MetadataError::InvalidUrl {
                id: post.id,
                url: post.url,
            });
        }

        if let Some(first) = seen.insert(post.url.clone(), post.id.clone()) {
            return Err(MetadataError::DuplicateUrl {
                url: post.url,
                first,
                second: post.id,
            });
        }

        out.push(post);
    }

    Ok(out)
}

/// The url becomes a file name in the blog directory, so it may not
/// name a path.
fn is_plain_slug(url: &str) -> bool {
    !url.contains(['/', '\\']) && !url.contains("..") && slugify(url) == url
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn post(id: &str, name: &str, url: &str) -> PostMetadata {
        PostMetadata {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            description: String::new(),
            tags: Vec::new(),
            created_time: String::new(),
            last_edited_time: String::new(),
            published: true,
            date: None,
        }
    }

    #[test]
    fn parses_exported_record() {
        let json = r#"[{
            "id": "1b2c",
            "name": "Hello World",
            "url": "hello-world",
            "description": "first post",
            "tags": ["rust", "notes"],
            "published": true,
            "created_time": "2024-03-01T10:00:00.000Z",
            "last_edited_time": "2024-03-02T12:30:00.000Z"
        }]"#;
        let posts: Vec<PostMetadata> = serde_json::from_str(json).unwrap();
        assert_eq!(posts[0].tags, vec!["rust", "notes"]);
        assert_eq!(posts[0].date, None);
        assert_eq!(
            posts[0].last_edited().unwrap().to_rfc3339(),
            "2024-03-02T12:30:00+00:00"
        );
    }

    #[test]
    fn unpublished_posts_are_dropped() {
        let mut hidden = post("2", "Draft", "draft");
        hidden.published = false;
        let store = MetadataStore::new(vec![post("1", "A", "a"), hidden], vec![]).unwrap();
        assert_eq!(store.posts().len(), 1);
        assert_eq!(store.posts()[0].id, "1");
    }

    #[test]
    fn missing_slug_is_derived_from_name() {
        let store = MetadataStore::new(vec![post("1", "Hello World", "")], vec![]).unwrap();
        assert_eq!(store.posts()[0].url, "hello-world");
    }

    #[test]
    fn duplicate_slugs_are_rejected() {
        let err = MetadataStore::new(vec![post("1", "A", "same"), post("2", "B", "same")], vec![])
            .unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateUrl { ref url, .. } if url == "same"));
    }

    #[test]
    fn path_like_urls_are_rejected() {
        for url in ["../../escaped", "blog/nested", "a\\b", "..", "Not A Slug"] {
            let err = MetadataStore::new(vec![post("1", "A", url)], vec![]).unwrap_err();
            assert!(
                matches!(err, MetadataError::InvalidUrl { url: ref u, .. } if u == url),
                "{url} was accepted"
            );
        }
        assert!(MetadataStore::new(vec![post("1", "A", "notes_2024-v2")], vec![]).is_ok());
    }

    #[test]
    fn missing_dataset_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let blog = dir.path().join("blog_metadata.json");
        std::fs::write(&blog, "[]").unwrap();

        let store = MetadataStore::load(&blog, &dir.path().join("data_metadata.json")).unwrap();
        assert!(store.is_empty());
        assert!(store.datasets().is_empty());
    }

    #[test]
    fn missing_blog_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = MetadataStore::load(
            &dir.path().join("blog_metadata.json"),
            &dir.path().join("data_metadata.json"),
        )
        .unwrap_err();
        assert!(matches!(err, MetadataError::Read { .. }));
    }

    #[test]
    fn display_date_truncates() {
        assert_eq!(display_date("2024-03-02T12:30:00.000Z"), "2024-03-02");
        assert_eq!(display_date("2024"), "2024");
    }
}
