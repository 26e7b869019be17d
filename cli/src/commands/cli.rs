use std::path::PathBuf;

use acctswap_core::api::{Algorithm, Tool};
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "acctswap", version, about = "Switch between saved accounts of AI coding CLIs")]
pub struct Args {
    /// Config file (defaults to $ACCTSWAP_CONFIG or ~/.config/acctswap/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Save the tool's current auth files as a named profile.
    Backup(ProfileArgs),
    /// Switch the tool's live auth files to a saved profile.
    Activate(ProfileArgs),
    /// Show which saved profile is live for each tool.
    Status(ToolFilter),
    /// List saved profiles.
    Ls(LsArgs),
    /// Remove a saved profile.
    Delete(DeleteArgs),
    /// Pick the best other profile and activate it.
    Next(NextArgs),
    /// Inspect or edit rate-limit cooldowns.
    Cooldown {
        #[command(subcommand)]
        action: CooldownCommand,
    },
    /// Run the tool with automatic account handoff on rate limits.
    Run(RunArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ProfileArgs {
    pub tool: Tool,
    pub profile: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ToolFilter {
    pub tool: Option<Tool>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct LsArgs {
    pub tool: Option<Tool>,

    /// Print profiles with metadata as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DeleteArgs {
    pub tool: Tool,
    pub profile: String,

    /// Also delete system profiles (names starting with `_`).
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct NextArgs {
    pub tool: Tool,

    /// smart | round_robin | random (defaults to the configured algorithm).
    #[arg(long)]
    pub algorithm: Option<Algorithm>,

    /// Show the scores without switching.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CooldownCommand {
    /// Put a profile in cooldown.
    Set {
        tool: Tool,
        profile: String,
        #[arg(long, default_value_t = 60)]
        minutes: i64,
        #[arg(long, default_value = "set manually")]
        note: String,
    },
    /// Clear one profile's cooldown, or every cooldown of the tool.
    Clear { tool: Tool, profile: Option<String> },
    /// Show active cooldowns.
    List,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    pub tool: Tool,

    /// Executable to launch instead of the tool's default binary.
    #[arg(long)]
    pub bin: Option<String>,

    /// Arguments passed through to the tool.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
