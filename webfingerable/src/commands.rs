use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("webfingerable")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("webfingerable")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress the header and the progress spinner").required(false))
        .subcommand_required(true)
        .subcommand(
            command!("init")
                .about("Creates the webfingerable database on your filesystem")
                .arg(database_arg())
                .arg(
                    arg!(-f --"force")
                        .help("Deletes any existing database at the specified location first")
                        .required(false),
                ),
        )
        .subcommand(
            command!("run")
                .about(
                    "Probes the webfinger and host-meta endpoints of every domain with an \
                account due for a check",
                )
                .arg(database_arg())
                .arg(
                    arg!(-b --"blocklist" <PATH>)
                        .required(false)
                        .help("JSON array of domain suffixes that must never be probed"),
                )
                .arg(
                    arg!(-p --"page-size" <ROWS>)
                        .required(false)
                        .help("Number of domains read from the database per page")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    arg!(--"quota" <DOMAINS>)
                        .required(false)
                        .help("Stop after this many domains (default: all due domains)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-c --"concurrency" <PROBES>)
                        .required(false)
                        .help("Maximum number of probes in flight")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30"),
                )
                .arg(
                    arg!(--"recheck-hours" <HOURS>)
                        .required(false)
                        .help("Skip accounts checked within this many hours")
                        .value_parser(
                            clap::value_parser!(u64).range(0..=crate::handlers::MAX_RECHECK_HOURS),
                        )
                        .default_value("24"),
                ),
        )
        .subcommand(
            command!("probe")
                .about("Probes a single account right away and prints the result as JSON")
                .arg(arg!(<DOMAIN>).help("Domain to probe"))
                .arg(arg!(<USERNAME>).help("Account on that domain"))
                .arg(database_arg())
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30"),
                ),
        )
}

fn database_arg() -> clap::Arg {
    arg!(-d --"database" <PATH>)
        .required(false)
        .help("Location of the webfingerable database")
        .default_value(crate::handlers::DEFAULT_DATABASE)
}
