use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("chainseek")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("chainseek")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Enable debug logging")
                .required(false)
                .conflicts_with("quiet"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("search")
                .about(
                    "Walk the suggestion chain outward from a seed profile and record every \
                profile whose handle or name contains a keyword. Resumes saved progress.",
                )
                .arg(
                    arg!(-s --"seed" <HANDLE>)
                        .required(false)
                        .help("Handle to start from (prompted for when omitted)"),
                )
                .arg(
                    arg!(-k --"keywords" <LIST>)
                        .required(false)
                        .help("Comma-separated keywords, e.g. 'tech, john doe' (prompted for when omitted)"),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum expansion depth; the seed is depth 0")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("2"),
                )
                .arg(
                    arg!(--"mode" <MODE>)
                        .required(false)
                        .help("Scheduling mode")
                        .value_parser(["concurrent", "sequential"])
                        .default_value("concurrent"),
                )
                .arg(
                    arg!(-t --"workers" <COUNT>)
                        .required(false)
                        .help("Maximum number of requests in flight")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(--"min-delay-ms" <MS>)
                        .required(false)
                        .help("Lower bound of the random pause before each fetch")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("1000"),
                )
                .arg(
                    arg!(--"max-delay-ms" <MS>)
                        .required(false)
                        .help("Upper bound of the random pause before each fetch")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("2000"),
                )
                .arg(
                    arg!(--"dedup" <POLICY>)
                        .required(false)
                        .help("How duplicate matches are collapsed")
                        .value_parser(["full", "node-keyword"])
                        .default_value("full"),
                )
                .arg(
                    arg!(--"headers" <PATH>)
                        .required(false)
                        .help("JSON object of request headers (session cookie, user agent, app id)")
                        .default_value("headers.json"),
                )
                .arg(
                    arg!(--"base-url" <URL>)
                        .required(false)
                        .help("Override the API base URL"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"state-dir" <PATH>)
                        .required(false)
                        .help("Directory holding saved search progress")
                        .default_value("~/.config/chainseek/state"),
                )
                .arg(
                    arg!(--"results-dir" <PATH>)
                        .required(false)
                        .help("Directory receiving per-keyword match files")
                        .default_value("results"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the report to a file instead of stdout")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("status")
                .about("Show the saved progress and matches for a seed")
                .arg(
                    arg!(-s --"seed" <HANDLE>)
                        .required(false)
                        .help("Seed handle of the saved search"),
                )
                .arg(
                    arg!(-k --"keywords" <LIST>)
                        .required(false)
                        .help("Keywords to list first, even when they have no matches"),
                )
                .arg(
                    arg!(--"state-dir" <PATH>)
                        .required(false)
                        .help("Directory holding saved search progress")
                        .default_value("~/.config/chainseek/state"),
                )
                .arg(
                    arg!(--"results-dir" <PATH>)
                        .required(false)
                        .help("Directory receiving per-keyword match files")
                        .default_value("results"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the report to a file instead of stdout")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("reset")
                .about("Delete the saved progress for a seed so the next search starts fresh")
                .arg(
                    arg!(-s --"seed" <HANDLE>)
                        .required(false)
                        .help("Seed handle of the saved search"),
                )
                .arg(
                    arg!(--"state-dir" <PATH>)
                        .required(false)
                        .help("Directory holding saved search progress")
                        .default_value("~/.config/chainseek/state"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Skip the confirmation prompt")
                        .required(false),
                ),
        )
}
