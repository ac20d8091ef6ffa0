mod cmd;
mod config;

use anyhow::Result;
use clap::Command;

fn cli() -> Command {
    Command::new("press")
        .about("Build the vtasca.dev static site")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
        .subcommand(cmd::svg::make_subcommand())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        Some(("serve", args)) => cmd::serve::execute(args).await,
        Some(("svg", args)) => cmd::svg::execute(args),
        _ => unreachable!("subcommand_required is set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        cli().debug_assert();
    }

    #[test]
    fn serve_accepts_build_args() {
        let matches = cli()
            .try_get_matches_from(["press", "serve", "--source", "site", "--port", "9000", "--open"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "serve");
        assert_eq!(args.get_one::<String>("source").map(String::as_str), Some("site"));
        assert!(args.get_flag("open"));
    }

    #[test]
    fn svg_requires_a_colour() {
        assert!(cli().try_get_matches_from(["press", "svg", "logo.svg"]).is_err());
    }
}
