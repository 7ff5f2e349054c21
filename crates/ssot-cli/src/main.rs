//! `ssot` command line
//!
//! Exit codes: `0` success, `1` invariant violations or gate failure,
//! `2` usage, configuration or I/O errors.

mod commands;
mod logging;

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

/// Exit code for usage, configuration and I/O failures
const EXIT_ERROR: i32 = 2;

fn baseline_arg() -> Arg {
    Arg::new("baseline")
        .long("baseline")
        .value_name("DIR")
        .value_parser(value_parser!(PathBuf))
        .help("Prior version of the tree to compare against")
}

fn date_arg() -> Arg {
    Arg::new("date")
        .long("date")
        .value_name("YYYY-MM-DD")
        .help("Date used for generated ids (defaults to today, UTC)")
}

fn cli() -> Command {
    Command::new("ssot")
        .version(ssot_core::VERSION)
        .about("Traceability validation and delta-driven task planning for a governed spec tree")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .long("root")
                .global(true)
                .value_name("DIR")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Repository root holding the spec tree"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (defaults to <root>/ssot.toml when present)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Log line format on stderr"),
        )
        .subcommand(
            Command::new("validate")
                .about("Run every check and print the report")
                .arg(baseline_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("impact")
                .about("Impact units for an applied delta")
                .arg(Arg::new("delta").long("delta").value_name("ID").required(true))
                .arg(baseline_arg()),
        )
        .subcommand(
            Command::new("taskgen")
                .about("Generate the ordered task plan for an applied delta")
                .arg(Arg::new("delta").long("delta").value_name("ID").required(true))
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .action(ArgAction::SetTrue)
                        .help("Print impact and ordering only; never writes"),
                )
                .arg(
                    Arg::new("drafts")
                        .long("drafts")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required_unless_present("plan")
                        .help("Recorded task drafts, one document or `attempts: [...]`"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .conflicts_with("plan")
                        .help("Plan file (defaults to <tasks>/<delta>.yaml)"),
                )
                .arg(baseline_arg())
                .arg(date_arg()),
        )
        .subcommand(
            Command::new("ingest")
                .about("Validate artifact drafts and write them with a proposed delta")
                .arg(
                    Arg::new("drafts")
                        .long("drafts")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .help("Recorded artifact drafts, one document or `attempts: [...]`"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Validate only; write nothing"),
                )
                .arg(date_arg()),
        )
        .subcommand(
            Command::new("delta")
                .about("Delta lifecycle")
                .subcommand_required(true)
                .subcommand(
                    Command::new("advance")
                        .about("Move a delta forward and rewrite its file")
                        .arg(Arg::new("id").value_name("ID").required(true))
                        .arg(
                            Arg::new("to")
                                .long("to")
                                .value_name("STATUS")
                                .required(true)
                                .value_parser(["draft", "proposed", "applied"]),
                        ),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    let verbose = matches.get_flag("verbose");
    let json_logs = matches.get_one::<String>("log-format").is_some_and(|f| f == "json");
    logging::init(verbose, json_logs);

    let code = match commands::run(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn taskgen_needs_drafts_unless_planning() {
        assert!(cli().try_get_matches_from(["ssot", "taskgen", "--delta", "D"]).is_err());
        assert!(cli()
            .try_get_matches_from(["ssot", "taskgen", "--delta", "D", "--plan"])
            .is_ok());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let matches = cli()
            .try_get_matches_from(["ssot", "validate", "--root", "/tmp/x", "--json"])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("root"),
            Some(&PathBuf::from("/tmp/x"))
        );
    }
}
