use super::validators;
use clap::{App, Arg, ArgMatches, SubCommand};

pub const COMMAND_NAME: &str = "handle";

pub fn command() -> App<'static, 'static> {
    SubCommand::with_name(COMMAND_NAME)
        .about("Process a DER encoded AS-REQ or TGS-REQ")
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .takes_value(true)
                .value_name("file")
                .help("YAML configuration of the realm")
                .required(true),
        )
        .arg(
            Arg::with_name("request")
                .long("request")
                .short("r")
                .takes_value(true)
                .value_name("file")
                .help("File with the DER encoded request")
                .required(true),
        )
        .arg(
            Arg::with_name("out-file")
                .long("out-file")
                .short("o")
                .takes_value(true)
                .value_name("file")
                .help("File to save the DER encoded reply"),
        )
        .arg(
            Arg::with_name("from")
                .long("from")
                .takes_value(true)
                .value_name("ip")
                .help("Address the request came from")
                .default_value("127.0.0.1")
                .validator(validators::is_ip),
        )
        .arg(
            Arg::with_name("audit")
                .long("audit")
                .takes_value(true)
                .value_name("file")
                .help("File to append the audit records as JSON lines"),
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
    pub config_file: String,
    pub request_file: String,
    pub out_file: Option<String>,
    pub from: String,
    pub audit_file: Option<String>,
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
            config_file: self.matches.value_of("config").unwrap().into(),
            request_file: self.matches.value_of("request").unwrap().into(),
            out_file: self.matches.value_of("out-file").map(|s| s.into()),
            from: self.matches.value_of("from").unwrap().into(),
            audit_file: self.matches.value_of("audit").map(|s| s.into()),
            verbosity: self.matches.occurrences_of("verbosity") as usize,
        };
    }
}
