use clap::Parser;

mod app;
mod commands;
mod error;

use commands::cli::{self, Commands};
use commands::Ctx;
use error::CliError;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    let code = match real_main(args).await {
        Ok(code) => code,
        Err(e) => {
            let mut msg = e.to_string();
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                msg.push_str(&format!(": {cause}"));
                source = cause.source();
            }
            eprintln!("acctswap: {msg}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn real_main(args: cli::Args) -> Result<i32, CliError> {
    let cfg = app::load_config(args.config.as_deref())?;
    // Dropped at the end of this function so buffered log lines are flushed
    // before `process::exit`.
    let _log_guard = app::init_logging(&cfg.logging);
    tracing::debug!(target: "acctswap.cli", vault = %cfg.vault_path().display(), "config loaded");

    let ctx = Ctx::new(cfg);
    dispatch(&ctx, args.command).await
}

async fn dispatch(ctx: &Ctx, cmd: Commands) -> Result<i32, CliError> {
    let mut out = std::io::stdout().lock();
    match cmd {
        Commands::Backup(a) => commands::vault::backup(ctx, &mut out, a.tool, &a.profile)?,
        Commands::Activate(a) => commands::vault::activate(ctx, &mut out, a.tool, &a.profile)?,
        Commands::Status(a) => commands::vault::status(ctx, &mut out, a.tool)?,
        Commands::Ls(a) => commands::vault::ls(ctx, &mut out, a.tool, a.json)?,
        Commands::Delete(a) => {
            commands::vault::delete(ctx, &mut out, a.tool, &a.profile, a.force)?
        }
        Commands::Next(a) => {
            commands::next::next(ctx, &mut out, a.tool, a.algorithm, a.dry_run)?
        }
        Commands::Cooldown { action } => commands::cooldown::handle(ctx, &mut out, action)?,
        Commands::Run(a) => {
            drop(out);
            return commands::run::run(ctx, a).await;
        }
    }
    Ok(0)
}
