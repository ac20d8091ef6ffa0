use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};

/// Lets at most one trigger through per window.
#[derive(Debug)]
pub struct Cooldown {
    window: Duration,
    last: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// True when `now` is outside the window opened by the last trigger;
    /// the window then restarts at `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Watches source paths and calls back with the changed files.
pub struct SourceWatcher {
    paths: Vec<PathBuf>,
    ignore: Vec<PathBuf>,
    debounce: Duration,
    cooldown: Duration,
}

impl SourceWatcher {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            ignore: Vec::new(),
            debounce: Duration::from_millis(500),
            cooldown: Duration::from_secs(2),
        }
    }

    /// Changes under `path` never trigger (typically the output directory).
    pub fn ignore<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ignore.push(absolute(path.as_ref()));
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Start watching. `on_change` runs on the watcher thread; the returned
    /// handle keeps the watch alive until it is stopped or dropped.
    pub fn start<F>(self, mut on_change: F) -> Result<WatchHandle>
    where
        F: FnMut(Vec<PathBuf>) + Send + 'static,
    {
        let ignore = self.ignore;
        let mut cooldown = Cooldown::new(self.cooldown);

        let mut debouncer = new_debouncer(self.debounce, move |res: DebounceEventResult| {
            let events = match res {
                Ok(events) => events,
                Err(e) => {
                    warn!("watch error: {e:?}");
                    return;
                }
            };

            let changed: Vec<PathBuf> = events
                .into_iter()
                .map(|event| event.path)
                .filter(|path| !is_ignored(path, &ignore))
                .collect();
            if changed.is_empty() {
                return;
            }

            if !cooldown.ready(Instant::now()) {
                debug!("skipping rebuild, last one was too recent");
                return;
            }
            on_change(changed);
        })?;

        for path in &self.paths {
            if !path.exists() {
                debug!("not watching missing path {}", path.display());
                continue;
            }
            debouncer
                .watcher()
                .watch(&absolute(path), RecursiveMode::Recursive)?;
            info!("Watching {}", path.display());
        }

        Ok(WatchHandle { debouncer })
    }
}

/// Running watcher. Dropping it stops the watch as well.
pub struct WatchHandle {
    debouncer: Debouncer<RecommendedWatcher>,
}

impl WatchHandle {
    pub fn stop(self) {
        drop(self.debouncer);
        debug!("watcher stopped");
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

pub fn is_ignored(path: &Path, ignore: &[PathBuf]) -> bool {
    let path = absolute(path);
    ignore.iter().any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_blocks_rapid_triggers() {
        let start = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_secs(2));

        assert!(cooldown.ready(start));
        assert!(!cooldown.ready(start + Duration::from_millis(500)));
        assert!(!cooldown.ready(start + Duration::from_millis(1999)));
        assert!(cooldown.ready(start + Duration::from_secs(2)));
        assert!(!cooldown.ready(start + Duration::from_millis(2500)));
    }

    #[test]
    fn ignores_paths_under_prefix() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("published");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("index.html"), "x").unwrap();
        let ignore = vec![absolute(&out)];

        assert!(is_ignored(&out.join("index.html"), &ignore));
        assert!(!is_ignored(&dir.path().join("src/blog_metadata.json"), &ignore));
    }

    #[test]
    fn start_and_stop() {
        let dir = tempfile::TempDir::new().unwrap();
        let handle = SourceWatcher::new(vec![dir.path().to_path_buf(), dir.path().join("missing")])
            .ignore(dir.path().join("published"))
            .start(|_| {})
            .unwrap();
        handle.stop();
    }
}
