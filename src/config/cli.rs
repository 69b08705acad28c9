use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "group-signup")]
#[command(about = "Student group registration service")]
pub struct CliConfig {
    /// Path to TOML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the listen address from the configuration
    #[arg(long)]
    pub bind: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}
