mod cli;
mod metadata;

use cli::{cli, compile, CompileArgs};
use log::{error, LevelFilter};
use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env("LOG")
        .filter_level(LevelFilter::Info)
        .format_module_path(false)
        .format_target(false)
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        None => {
            let args = CompileArgs {
                vertex: matches.get_one::<PathBuf>("vertex"),
                fragment: matches.get_one::<PathBuf>("fragment"),
                output: matches.get_one::<PathBuf>("output"),
                reflection: matches.get_one::<PathBuf>("reflection"),
                emit_wgsl: matches.get_flag("wgsl"),
            };

            if let Err(err) = compile(&args) {
                let mut errors = Vec::new();

                for cause in err.chain() {
                    errors.push(format!("- {}", cause));
                }

                error!("failed to compile the program. error:\n{}", errors.join("\n"));
                std::process::exit(1);
            }
        }
        _ => unreachable!(),
    }
}
