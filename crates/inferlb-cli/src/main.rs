use clap::{Parser, Subcommand};

mod commands;
mod manifest;

#[derive(Parser)]
#[command(
    name = "inferlb",
    about = "inferlb — metrics-driven pod scheduling for LLM inference",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log output format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a pod for one request from scraped metrics.
    ///
    /// The pod manifest lists each backend with the file holding its
    /// Prometheus metrics text. Metrics paths are resolved relative to
    /// the manifest. Exits non-zero when the request is rejected.
    Schedule {
        /// Scheduler config (default: built-in defaults)
        #[arg(short, long)]
        config: Option<String>,
        /// Pod manifest (TOML)
        #[arg(short, long)]
        pods: String,
        /// Requested model or adapter
        #[arg(short, long)]
        model: String,
        /// Mark the request critical (never shed)
        #[arg(long)]
        critical: bool,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Print every filter the request passed through
        #[arg(long)]
        explain: bool,
    },
    /// Print the filter chain a config resolves to, as JSON
    Chain {
        #[arg(short, long)]
        config: Option<String>,
    },
    /// List the known scheduling policies
    Policies,
}

fn init_logging(format: &str) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inferlb=info".parse()?)
        )
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_format)?;

    match cli.command {
        Commands::Schedule {
            config,
            pods,
            model,
            critical,
            format,
            explain,
        } => {
            let request = commands::schedule::RequestArgs { model, critical };
            commands::schedule::schedule(config.as_deref(), &pods, request, &format, explain)
        }
        Commands::Chain { config } => commands::chain::chain(config.as_deref()),
        Commands::Policies => commands::policies::policies(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_text() {
        let cli = Cli::try_parse_from(["inferlb", "policies"]).unwrap();
        assert_eq!(cli.log_format, "text");
    }

    #[test]
    fn log_format_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["inferlb", "chain", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, "json");
        assert!(matches!(cli.command, Commands::Chain { config: None }));
    }
}
