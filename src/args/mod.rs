pub mod handle;
pub mod transit;
mod validators;

use clap::{App, AppSettings, ArgMatches};

pub fn args() -> App<'static, 'static> {
    App::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::SubcommandRequired)
        .subcommand(handle::command())
        .subcommand(transit::command())
}

pub enum Arguments {
    Handle(handle::Arguments),
    Transit(transit::Arguments),
}

impl Arguments {
    pub fn verbosity(&self) -> usize {
        match self {
            Arguments::Handle(args) => args.verbosity,
            Arguments::Transit(args) => args.verbosity,
        }
    }
}

pub struct ArgumentsParser {}

impl ArgumentsParser {
    pub fn parse<'a>(matches: &'a ArgMatches) -> Arguments {
        match matches.subcommand_name().unwrap() {
            name @ handle::COMMAND_NAME => {
                return Arguments::Handle(handle::ArgumentsParser::parse(
                    matches.subcommand_matches(name).unwrap(),
                ));
            }
            name @ transit::COMMAND_NAME => {
                return Arguments::Transit(transit::ArgumentsParser::parse(
                    matches.subcommand_matches(name).unwrap(),
                ));
            }
            _ => unreachable!("Unknown command"),
        }
    }
}
