use std::{net::SocketAddr, time::Duration};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::filter::LevelFilter;

use crate::{form::FormLimits, render::Converter};

/// Everything that can be configured when starting the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The address on which the server listens.
    pub bind: SocketAddr,
    /// How the external converter is invoked.
    pub converter: Converter,
    /// Bounds for submitted forms.
    pub limits: FormLimits,
    /// The maximal level of log messages that are emitted.
    pub verbosity: LevelFilter,
}

/// The command line interface of the `dfa-tikz` binary.
pub fn cli() -> Command {
    Command::new("dfa-tikz")
        .about("Serves a web form that draws DFAs and converts them to TikZ")
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(0..=1)
                .require_equals(true)
                .value_parser(["info", "debug", "trace"])
                .default_missing_value("info"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .env("DFA_TIKZ_BIND")
                .value_parser(value_parser!(SocketAddr))
                .help("address the server listens on [default: 127.0.0.1:5000]"),
        )
        .arg(
            Arg::new("converter")
                .long("converter")
                .env("DFA_TIKZ_CONVERTER")
                .help("program that converts DOT read from stdin into TikZ [default: dot2tex]"),
        )
        .arg(
            Arg::new("converter-arg")
                .long("converter-arg")
                .action(ArgAction::Append)
                .allow_hyphen_values(true)
                .help("argument passed to the converter, may be repeated [default: --autosize]"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(u64))
                .help("seconds after which a running converter is killed, waits forever if absent"),
        )
        .arg(
            Arg::new("max-states")
                .long("max-states")
                .value_parser(value_parser!(usize))
                .help("largest number of states accepted from the form [default: 256]"),
        )
}

impl Config {
    /// Extracts the configuration from matches that were produced by [`cli`].
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let verbosity = match matches
            .try_get_one::<String>("verbosity")
            .ok()
            .flatten()
            .map(|m| m.as_str())
        {
            Some("trace") => LevelFilter::TRACE,
            Some("debug") => LevelFilter::DEBUG,
            _ => LevelFilter::INFO,
        };

        // arguments that were not given keep the values of `Config::default`
        let defaults = Self::default();
        let converter = Converter::new(
            matches
                .get_one::<String>("converter")
                .map_or(defaults.converter.program(), String::as_str),
        )
        .with_args(
            matches
                .get_many::<String>("converter-arg")
                .map_or_else(|| defaults.converter.args().to_vec(), |args| args.cloned().collect()),
        )
        .with_timeout(
            matches
                .get_one::<u64>("timeout")
                .map(|secs| Duration::from_secs(*secs)),
        );

        Self {
            bind: matches
                .get_one::<SocketAddr>("bind")
                .copied()
                .unwrap_or(defaults.bind),
            converter,
            limits: FormLimits {
                max_states: matches
                    .get_one::<usize>("max-states")
                    .copied()
                    .unwrap_or(defaults.limits.max_states),
            },
            verbosity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            converter: Converter::default(),
            limits: FormLimits::default(),
            verbosity: LevelFilter::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let matches = cli()
            .try_get_matches_from(std::iter::once("dfa-tikz").chain(args.iter().copied()))
            .unwrap();
        Config::from_matches(&matches)
    }

    #[test]
    fn defaults_match_dot2tex() {
        let config = parse(&[]);
        assert_eq!(config.converter, Converter::default());
        assert_eq!(config.limits, FormLimits::default());
        assert_eq!(config.verbosity, LevelFilter::INFO);
        assert_eq!(config.bind.port(), 5000);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn changing_the_program_keeps_default_arguments() {
        let config = parse(&["--converter", "/usr/local/bin/dot2tex"]);
        assert_eq!(config.converter.program(), "/usr/local/bin/dot2tex");
        assert_eq!(config.converter.args(), Converter::default().args());
        assert_eq!(
            Config {
                converter: Converter::default(),
                ..config
            },
            Config::default()
        );
    }

    #[test]
    fn everything_can_be_overridden() {
        let config = parse(&[
            "-v=trace",
            "--bind",
            "0.0.0.0:8080",
            "--converter",
            "/opt/bin/dot2tex",
            "--converter-arg",
            "--autosize",
            "--converter-arg",
            "--figonly",
            "--timeout",
            "30",
            "--max-states",
            "12",
        ]);
        assert_eq!(config.verbosity, LevelFilter::TRACE);
        assert_eq!(config.bind, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.converter.program(), "/opt/bin/dot2tex");
        assert_eq!(
            config.converter.args(),
            &["--autosize".to_string(), "--figonly".to_string()]
        );
        assert_eq!(config.converter.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.limits.max_states, 12);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(cli()
            .try_get_matches_from(["dfa-tikz", "--timeout", "soon"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["dfa-tikz", "-v=loud"])
            .is_err());
    }

    #[test]
    fn cli_is_consistent() {
        cli().debug_assert();
    }
}
