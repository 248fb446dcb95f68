use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use diamond_core::{ContractArtifact, ContractArtifacts, UpgradeConfig};
use diamond_cut::RoutingTable;
use diamond_primitives::abi::SelectorFilter;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

fn cli() -> Command {
    Command::new("diamond-upgrade")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plan and encode diamond facet upgrades")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("plan")
                .about("Plan the cut batches for a routing table snapshot")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Upgrade config (.toml or .json)"),
                )
                .arg(
                    Arg::new("table")
                        .long("table")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Routing table snapshot: JSON list of {facetAddress, functionSelectors}"),
                )
                .arg(artifacts_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("selectors")
                .about("List the selectors a facet would route")
                .arg(artifact_arg())
                .arg(
                    Arg::new("include")
                        .long("include")
                        .value_delimiter(',')
                        .help("Only these functions (name or signature)"),
                )
                .arg(
                    Arg::new("exclude")
                        .long("exclude")
                        .value_delimiter(',')
                        .help("Every function except these"),
                ),
        )
        .subcommand(
            Command::new("encode-init")
                .about("Encode initializer call data")
                .arg(artifact_arg())
                .arg(
                    Arg::new("method")
                        .long("method")
                        .default_value("init")
                        .help("Initializer method"),
                )
                .arg(
                    Arg::new("args")
                        .long("args")
                        .default_value("null")
                        .help("Arguments as JSON (array, or object for a single struct input)"),
                ),
        )
}

fn artifacts_arg() -> Arg {
    Arg::new("artifacts")
        .long("artifacts")
        .default_value("artifacts")
        .value_parser(value_parser!(PathBuf))
        .help("Directory of compiled contract artifacts")
}

fn artifact_arg() -> Arg {
    Arg::new("artifact")
        .long("artifact")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Compiled contract artifact (.json)")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing --{name}"))
}

fn load_artifact(path: &Path) -> Result<ContractArtifact> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ContractArtifact::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn run(matches: &ArgMatches) -> Result<String> {
    match matches.subcommand() {
        Some(("plan", args)) => {
            let config_path = path_arg(args, "config")?;
            let config = UpgradeConfig::load(config_path)
                .with_context(|| format!("loading config {}", config_path.display()))?;

            let table_path = path_arg(args, "table")?;
            let snapshot = std::fs::read_to_string(table_path)
                .with_context(|| format!("reading {}", table_path.display()))?;
            let table: RoutingTable = serde_json::from_str(&snapshot)
                .with_context(|| format!("parsing routing table {}", table_path.display()))?;

            let artifacts_dir = path_arg(args, "artifacts")?;
            let mut artifacts = ContractArtifacts::new();
            let loaded = artifacts
                .load_dir(artifacts_dir)
                .with_context(|| format!("loading artifacts from {}", artifacts_dir.display()))?;
            tracing::info!("loaded {} artifact(s)", loaded);

            commands::plan(&config, &artifacts, &table, args.get_flag("json"))
        }
        Some(("selectors", args)) => {
            let artifact = load_artifact(path_arg(args, "artifact")?)?;
            let list = |name: &str| {
                args.get_many::<String>(name)
                    .map(|values| values.cloned().collect::<Vec<_>>())
            };
            let filter = SelectorFilter {
                include: list("include"),
                exclude: list("exclude"),
            };
            commands::selectors(&artifact, &filter)
        }
        Some(("encode-init", args)) => {
            let artifact = load_artifact(path_arg(args, "artifact")?)?;
            let method = args.get_one::<String>("method").map_or("init", String::as_str);
            let raw = args.get_one::<String>("args").map_or("null", String::as_str);
            let init_args: serde_json::Value = serde_json::from_str(raw).context("parsing --args")?;
            commands::encode_init(&artifact, method, &init_args)
        }
        _ => anyhow::bail!("no command given"),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let matches = cli().get_matches();
    let output = run(&matches)?;
    println!("{output}");
    Ok(())
}
