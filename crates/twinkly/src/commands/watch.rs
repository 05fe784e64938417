//! `twinkly watch`: attach the telemetry pump and stream fleet events
//! until Ctrl-C.

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use twinkly_core::{FleetEvent, TelemetryPump};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

use super::Ctx;

fn render(format: OutputFormat, event: &FleetEvent) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
        _ => Ok(event.to_string()),
    }
}

pub async fn handle(ctx: &Ctx<'_>) -> Result<(), CliError> {
    let settings =
        twinkly_config::mqtt_settings(ctx.config)?.ok_or_else(|| CliError::Validation {
            field: "telemetry.enabled".into(),
            reason: "watch needs telemetry enabled with a broker configured".into(),
        })?;

    // Subscribe before init so the Initialized event is not missed.
    let mut events = Box::pin(ctx.fleet.event_stream());

    let cancel = CancellationToken::new();
    let pump = TelemetryPump::new(ctx.fleet.clone(), settings);
    let pump_handle = tokio::spawn(pump.run(cancel.child_token()));

    ctx.fleet.init();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.next() => {
                let Some(event) = event else { break };
                output::print_output(&render(ctx.format, &event)?, ctx.quiet);
            }
        }
    }

    cancel.cancel();
    pump_handle.await??;
    Ok(())
}
