//! Command dispatch: bridges CLI args -> fleet operations -> output formatting.

pub mod control;
pub mod devices;
pub mod watch;

use twinkly_config::Config;
use twinkly_core::{CoreError, Fleet};

use crate::cli::{Command, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Everything a handler needs.
pub struct Ctx<'a> {
    pub fleet: &'a Fleet,
    pub config: &'a Config,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Dispatch a fleet-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Ctx<'_>) -> Result<(), CliError> {
    match cmd {
        Command::List => devices::list(ctx),
        Command::Add { address } => devices::add(ctx, &address).await,
        Command::Remove { address } => devices::remove(ctx, &address).await,
        Command::Info { address } => devices::info(ctx, &address).await,
        Command::Call(args) => control::call(ctx, &args).await,
        Command::Mode { device, state } => control::mode(ctx, &device, state).await,
        Command::Brightness { device, percent } => {
            control::brightness(ctx, &device, percent).await
        }
        Command::Watch => watch::handle(ctx).await,
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}

/// Print the structured `{code, message}` failure body before the
/// error is reported on stderr.
pub(crate) fn report_failure<T>(ctx: &Ctx<'_>, result: Result<T, CoreError>) -> Result<T, CliError> {
    result.map_err(|err| {
        if let Ok(body) = output::render_json(&err.to_payload(), true) {
            output::print_output(&body, ctx.quiet);
        }
        CliError::from(err)
    })
}

/// Resolve a registry index or a registered address to an index.
pub(crate) fn resolve_index(fleet: &Fleet, device: &str) -> Result<usize, CliError> {
    if let Ok(index) = device.parse::<usize>() {
        return Ok(index);
    }
    fleet
        .registry()
        .index_of(device)
        .ok_or_else(|| CliError::NotFound {
            identifier: device.to_owned(),
        })
}
