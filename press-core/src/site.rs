use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use log::debug;

/// Where inputs live inside the source directory.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    pub root: PathBuf,
    pub templates: PathBuf,
}

impl SourceLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            templates: root.join("templates"),
            root,
        }
    }

    pub fn with_templates<P: AsRef<Path>>(mut self, templates: P) -> Self {
        self.templates = templates.as_ref().to_path_buf();
        self
    }

    pub fn blog_metadata(&self) -> PathBuf {
        self.root.join("blog_metadata.json")
    }

    pub fn data_metadata(&self) -> PathBuf {
        self.root.join("data_metadata.json")
    }

    pub fn markdown_dir(&self) -> PathBuf {
        self.root.join("blog").join("md")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("blog").join("img")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.join("static")
    }
}

/// The output directory of one run, plus a record of every page written to
/// it and the file each page was generated from.
#[derive(Debug)]
pub struct OutputTree {
    root: PathBuf,
    manifest: BTreeMap<PathBuf, PathBuf>,
}

impl OutputTree {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            manifest: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `contents` to `relative` and remember `origin` as its source.
    pub fn write_page(
        &mut self,
        relative: &Path,
        contents: &str,
        origin: &Path,
    ) -> std::io::Result<PathBuf> {
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} leaves the output directory", relative.display()),
            ));
        }

        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        debug!("wrote {}", relative.display());

        self.record(relative, origin);
        Ok(path)
    }

    fn record(&mut self, relative: &Path, origin: &Path) {
        self.manifest
            .insert(relative.to_path_buf(), origin.to_path_buf());
    }

    /// The file a page was generated from, if this run wrote it.
    pub fn origin_of(&self, relative: &Path) -> Option<&Path> {
        self.manifest.get(relative).map(PathBuf::as_path)
    }

    pub fn pages_written(&self) -> usize {
        self.manifest.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_paths() {
        let layout = SourceLayout::new("src");
        assert_eq!(layout.markdown_dir(), Path::new("src/blog/md"));
        assert_eq!(layout.templates, Path::new("src/templates"));

        let layout = layout.with_templates("theme");
        assert_eq!(layout.templates, Path::new("theme"));
    }

    #[test]
    fn write_page_records_origin() {
        let dir = TempDir::new().unwrap();
        let mut tree = OutputTree::new(dir.path());

        let written = tree
            .write_page(Path::new("tools/logo.html"), "<p>logo</p>", Path::new("t/logo.html"))
            .unwrap();

        assert_eq!(std::fs::read_to_string(written).unwrap(), "<p>logo</p>");
        assert_eq!(
            tree.origin_of(Path::new("tools/logo.html")),
            Some(Path::new("t/logo.html"))
        );
        assert_eq!(tree.pages_written(), 1);
    }

    #[test]
    fn write_page_stays_inside_the_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("published");
        let mut tree = OutputTree::new(&root);

        for relative in ["../escaped.html", "blog/../../escaped.html", "/abs.html"] {
            let err = tree
                .write_page(Path::new(relative), "x", Path::new("t.html"))
                .unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput, "{relative}");
        }

        assert!(!dir.path().join("escaped.html").exists());
        assert_eq!(tree.pages_written(), 0);
        // refused writes leave no manifest entry behind
        assert_eq!(tree.origin_of(Path::new("../escaped.html")), None);
    }
}
