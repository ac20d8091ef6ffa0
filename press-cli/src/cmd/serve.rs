use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{error, info};
use press_dev_server::{LiveServer, LiveServerConfig, SourceWatcher};

use super::build::{add_build_args, build_site};
use crate::config::PressConfig;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Build, serve the output and rebuild on source changes")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on [default: 8000]"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = PressConfig::load(args)?;
    let build = &config.build;

    let server_config = LiveServerConfig {
        host: build.host.clone(),
        port: build.port,
        root: build.output_dir(),
        open: build.open,
    };
    let livereload = server_config.livereload_url();

    build_site(&config, Some(&livereload))?;

    let server = LiveServer::new(server_config);
    let reloader = server.reloader();

    let args = args.clone();
    let watcher = SourceWatcher::new(watch_paths(&config))
        .ignore(build.output_dir())
        .start(move |changed| {
            for path in &changed {
                info!("Changed: {}", path.display());
            }
            // Reload the config too so edits to press.toml take effect
            let rebuilt = PressConfig::load(&args).and_then(|config| build_site(&config, Some(&livereload)));
            match rebuilt {
                Ok(report) => {
                    info!("Rebuilt {} pages", report.pages);
                    reloader.reload();
                }
                Err(e) => error!("Rebuild failed: {e:#}"),
            }
        })?;

    let result = server.run().await;
    watcher.stop();
    result
}

/// Source dir, templates when they live elsewhere, and the config file.
fn watch_paths(config: &PressConfig) -> Vec<PathBuf> {
    let build = &config.build;
    let source = build.source_dir();
    let templates = build.templates_dir();

    let mut paths = vec![source.clone()];
    if !templates.starts_with(&source) {
        paths.push(templates);
    }
    paths.push(PathBuf::from(&build.config));
    paths
}
