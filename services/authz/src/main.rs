//! `authz`: answer access decisions from a host configuration file.
use anyhow::{Context, Result};
use castellan_authz::host::{Host, HostConfig};
use castellan_authz::{AuthzPlugin, PolicyModule, observability};
use castellan_policy::RuleKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status for a denied `check`.
const DENIED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "authz", version)]
#[command(about = "Evaluate RBAC decisions against configured authz modules")]
struct Args {
    /// Host configuration file (YAML); required by `check` and `rules`
    #[arg(long, short, env = "AUTHZ_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide one request; exits 0 when allowed and 2 when denied
    Check {
        /// Module to ask
        #[arg(long, default_value = "authz")]
        module: String,
        subject: String,
        object: String,
        action: String,
    },
    /// Print the module's current rules in flat-file form
    Rules {
        #[arg(long, default_value = "authz")]
        module: String,
        /// Only print one kind of rule
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Print the plugin manifest as JSON
    Manifest,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Policy,
    Grouping,
}

impl From<KindArg> for RuleKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Policy => RuleKind::Policy,
            KindArg::Grouping => RuleKind::Grouping,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    observability::init_tracing_with_default("warn");
    let args = Args::parse();

    let plugin = AuthzPlugin::new();
    if let Command::Manifest = args.command {
        println!("{}", serde_json::to_string_pretty(&plugin.manifest())?);
        return Ok(ExitCode::SUCCESS);
    }

    let path = args
        .config
        .context("--config (or AUTHZ_CONFIG) is required for this command")?;
    let config = HostConfig::load(&path)
        .with_context(|| format!("load host config {}", path.display()))?;
    let host = Host::build(plugin, &config).context("build modules")?;
    host.start().await.context("initialize modules")?;
    let status = run(&host, args.command).await;
    host.shutdown().await;
    status
}

async fn run(host: &Host, command: Command) -> Result<ExitCode> {
    match command {
        Command::Check {
            module,
            subject,
            object,
            action,
        } => {
            let module = host.module(&module)?;
            let allowed = module.enforce(&subject, &object, &action).await?;
            println!("{}", if allowed { "allow" } else { "deny" });
            Ok(if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(DENIED)
            })
        }
        Command::Rules { module, kind } => {
            let module = host.module(&module)?;
            let kinds = match kind {
                Some(kind) => vec![kind.into()],
                None => vec![RuleKind::Policy, RuleKind::Grouping],
            };
            for kind in kinds {
                for rule in module.rules(kind).await? {
                    println!("{}, {}", kind.default_ptype(), rule.join(", "));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Manifest => Ok(ExitCode::SUCCESS),
    }
}
