//! Device control handlers: raw calls, mode, brightness.

use serde_json::Value;

use crate::cli::{CallArgs, PowerState};
use crate::error::CliError;
use crate::output;

use super::{Ctx, report_failure, resolve_index};

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

pub async fn call(ctx: &Ctx<'_>, args: &CallArgs) -> Result<(), CliError> {
    let payload = args
        .payload
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()?;

    let reply = report_failure(
        ctx,
        ctx.fleet.invoke_raw(&args.address, &args.method, payload).await,
    )?;
    let out = output::render_single(ctx.format, &reply, value_text, value_text)?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}

pub async fn mode(ctx: &Ctx<'_>, device: &str, state: PowerState) -> Result<(), CliError> {
    let index = resolve_index(ctx.fleet, device)?;
    ctx.fleet.set_mode(index, state == PowerState::On).await?;
    if !ctx.quiet {
        eprintln!("Device #{index} switched {}", if state == PowerState::On { "on" } else { "off" });
    }
    Ok(())
}

/// The exchange itself runs in the background; `run` waits for it
/// through `Fleet::shutdown` before exiting.
pub async fn brightness(ctx: &Ctx<'_>, device: &str, percent: i64) -> Result<(), CliError> {
    let index = resolve_index(ctx.fleet, device)?;
    ctx.fleet.set_brightness(index, percent).await?;
    Ok(())
}
