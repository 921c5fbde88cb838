use clap::{crate_version, Arg, Command};

const OPTABLES: [&str; 23] = [
    "ZOP", "ZS1", "YOP", "ZS2", "Z9", "ZS3", "Z10", "ZS4", "Z11", "ZS5", "Z12", "ZS6",
    "Z13", "ZS7", "Z14", "ZS8", "Z15", "ZS9", "UNI", "DOS", "370", "XA", "ESA",
];

pub fn build_cli() -> Command {
    let long_help = "hlasmkit is always invoked with exactly one of several subcommands.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
Check a file:            `hlasmkit verify payroll.hlasm`
Check piped source:      `cat payroll.hlasm | hlasmkit verify`
Use workspace config:    `hlasmkit verify -w ./zos-src payroll.hlasm`
Dump the symbol table:   `hlasmkit symbols payroll.hlasm`
Time an analysis:        `hlasmkit bench payroll.hlasm --optable Z15`";

    let file_arg = Arg::new("file")
        .help("path to the HLASM source, stdin when omitted")
        .value_name("FILE")
        .required(false);
    let workspace_arg = Arg::new("workspace")
        .long("workspace")
        .short('w')
        .help("workspace folder with .hlasmplugin configuration")
        .value_name("DIR")
        .required(false);
    let optable_arg = Arg::new("optable")
        .long("optable")
        .help("instruction set architecture level")
        .value_name("LEVEL")
        .value_parser(OPTABLES)
        .required(false);
    let sysparm_arg = Arg::new("sysparm")
        .long("sysparm")
        .help("value of the SYSPARM system variable")
        .value_name("TEXT")
        .required(false);

    Command::new("hlasmkit")
        .about("IBM HLASM analysis engine and language services")
        .after_long_help(long_help)
        .version(crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("verify")
            .visible_alias("vfy")
            .about("analyze a source file and print diagnostics")
            .arg(file_arg.clone())
            .arg(workspace_arg.clone())
            .arg(optable_arg.clone())
            .arg(sysparm_arg.clone()))
        .subcommand(Command::new("symbols")
            .about("analyze a source file and dump the symbol table as JSON")
            .arg(file_arg.clone())
            .arg(workspace_arg.clone())
            .arg(optable_arg.clone())
            .arg(sysparm_arg.clone()))
        .subcommand(Command::new("bench")
            .about("time the analysis of a source file")
            .arg(file_arg)
            .arg(workspace_arg)
            .arg(optable_arg))
        .subcommand(Command::new("completions")
            .about("write shell completions to stdout")
            .arg(Arg::new("shell")
                .help("shell to generate completions for")
                .value_name("SHELL")
                .value_parser(["bash","elvish","fish","powershell","zsh"])
                .required(true)))
}
