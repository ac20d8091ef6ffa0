use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use log::info;
use press_core::{BuildReport, SiteBuilder};

use crate::config::PressConfig;

/// Arguments shared by `build` and `serve`. No defaults here: unset
/// arguments fall through to env vars, the config file and then defaults.
pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Source directory with metadata, markdown, static files and templates [default: ./src]"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for the generated site [default: ./published]"),
        )
        .arg(
            Arg::new("templates")
                .short('t')
                .long("templates")
                .value_name("DIR")
                .help("Template directory [default: <source>/templates]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./press.toml]"),
        )
        .arg(
            Arg::new("cache_token")
                .long("cache-token")
                .value_name("TOKEN")
                .help("Fixed cache-busting token instead of a random one"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the site into the output directory")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = PressConfig::load(args)?;

    let report = build_site(&config, None)?;

    info!(
        "Site built in {} ({} posts, {} pages)",
        config.build.output,
        report.posts,
        report.pages
    );
    Ok(())
}

/// One full pipeline run with the given configuration. `livereload` is set
/// while serving so pages can connect back to the dev server.
pub fn build_site(config: &PressConfig, livereload: Option<&str>) -> Result<BuildReport> {
    let build = &config.build;

    let mut builder = SiteBuilder::new()
        .source_dir(build.source_dir())
        .output_dir(build.output_dir())
        .templates_dir(build.templates_dir())
        .site_config(config.site.clone())
        .root_files(build.root_files.clone())
        .sitemap_exclude(build.sitemap_exclude.clone());
    if let Some(token) = build.cache_token() {
        builder = builder.cache_token(token);
    }
    if let Some(url) = livereload {
        builder = builder.livereload(url);
    }

    let site = builder.build()?;
    Ok(site.render_all()?)
}
