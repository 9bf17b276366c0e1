mod args;
mod commands;

use args::{args, Arguments, ArgumentsParser};
use cerbero_kdc::Result;
use log::error;

fn init_log(verbosity: usize) {
    if let Err(err) = stderrlog::new()
        .module(module_path!())
        .verbosity(verbosity)
        .init()
    {
        eprintln!("Unable to initialize the log: {}", err);
    }
}

fn main() {
    let args = ArgumentsParser::parse(&args().get_matches());
    init_log(args.verbosity());

    if let Err(error) = run(args) {
        error!("{}", error);
        std::process::exit(1);
    }
}

fn run(args: Arguments) -> Result<()> {
    match args {
        Arguments::Handle(args) => {
            return commands::handle(
                &args.config_file,
                &args.request_file,
                args.out_file.as_deref(),
                &args.from,
                args.audit_file.as_deref(),
            )
        }
        Arguments::Transit(args) => {
            return commands::transit(
                &args.path,
                &args.client_realm,
                &args.server_realm,
                args.add.as_deref(),
            )
        }
    }
}
