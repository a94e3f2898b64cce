mod compile;

pub use compile::*;

use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub fn cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .arg(
            Arg::new("vertex")
                .help("legacy GLSL vertex shader")
                .value_parser(ValueParser::path_buf())
                .required(true),
        )
        .arg(
            Arg::new("fragment")
                .help("legacy GLSL fragment shader")
                .value_parser(ValueParser::path_buf())
                .required(true),
        )
        .arg(
            Arg::new("output")
                .help("program resource file to write")
                .value_parser(ValueParser::path_buf())
                .required(false),
        )
        .arg(
            Arg::new("reflection")
                .long("reflection")
                .help("also write the reflection as JSON to this path")
                .value_parser(ValueParser::path_buf())
                .required(false),
        )
        .arg(
            Arg::new("wgsl")
                .long("wgsl")
                .help("also write each linked stage as WGSL next to the output")
                .action(ArgAction::SetTrue),
        )
}
