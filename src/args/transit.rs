use super::validators;
use clap::{App, Arg, ArgMatches, SubCommand};

pub const COMMAND_NAME: &str = "transit";

pub fn command() -> App<'static, 'static> {
    SubCommand::with_name(COMMAND_NAME)
        .about("Decode or extend a DOMAIN-X500-COMPRESS transited path")
        .arg(
            Arg::with_name("path")
                .takes_value(true)
                .help("Contents of the transited path")
                .default_value(""),
        )
        .arg(
            Arg::with_name("client-realm")
                .long("client-realm")
                .takes_value(true)
                .value_name("realm")
                .help("Realm of the client")
                .required(true)
                .validator(validators::is_realm),
        )
        .arg(
            Arg::with_name("server-realm")
                .long("server-realm")
                .takes_value(true)
                .value_name("realm")
                .help("Realm of the server")
                .required(true)
                .validator(validators::is_realm),
        )
        .arg(
            Arg::with_name("add")
                .long("add")
                .takes_value(true)
                .value_name("realm")
                .help("Realm to add to the path")
                .validator(validators::is_realm),
        )
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help("Increase message verbosity"),
        )
}

#[derive(Debug)]
pub struct Arguments {
    pub path: String,
    pub client_realm: String,
    pub server_realm: String,
    pub add: Option<String>,
    pub verbosity: usize,
}

pub struct ArgumentsParser<'a> {
    matches: &'a ArgMatches<'a>,
}

impl<'a> ArgumentsParser<'a> {
    pub fn parse(matches: &'a ArgMatches) -> Arguments {
        let parser = Self { matches: matches };
        return parser._parse();
    }

    fn _parse(&self) -> Arguments {
        return Arguments {
            path: self.matches.value_of("path").unwrap_or("").into(),
            client_realm: self.matches.value_of("client-realm").unwrap().into(),
            server_realm: self.matches.value_of("server-realm").unwrap().into(),
            add: self.matches.value_of("add").map(|s| s.into()),
            verbosity: self.matches.occurrences_of("verbosity") as usize,
        };
    }
}
