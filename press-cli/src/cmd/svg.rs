use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use log::info;
use press_core::svg::{analyze_svg_colors, normalize_hex_color, recolor_svg};

pub fn make_subcommand() -> Command {
    Command::new("svg")
        .about("Drop the near-black parts of an SVG and paint the rest in one colour")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("SVG file, rewritten in place")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("color")
                .value_name("HEX")
                .help("Fill colour, e.g. FF0000 or #f00")
                .required(true),
        )
        .arg(
            Arg::new("dry_run")
                .long("dry-run")
                .help("Only print the colour analysis")
                .action(ArgAction::SetTrue),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let file = args
        .get_one::<PathBuf>("file")
        .context("missing SVG file")?;
    let color = args.get_one::<String>("color").context("missing colour")?;
    let fill = normalize_hex_color(color)?;

    let svg = fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;

    let report = analyze_svg_colors(&svg)?;
    print_colors("Dark colors (will be removed)", &report.dark);
    print_colors(&format!("Other colors (will be changed to {fill})"), &report.other);

    if args.get_flag("dry_run") {
        return Ok(());
    }

    let recolored = recolor_svg(&svg, &fill)?;
    fs::write(file, recolored).with_context(|| format!("failed to write {}", file.display()))?;
    info!("Updated {} in place", file.display());

    Ok(())
}

fn print_colors(heading: &str, colors: &BTreeMap<String, usize>) {
    println!("\n{heading}:");
    println!("{}", "-".repeat(40));
    for (color, count) in colors {
        println!("{color} (used {count} times)");
    }
}
