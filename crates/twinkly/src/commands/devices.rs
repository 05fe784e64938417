//! Registry command handlers: list, add, remove, info.

use serde::Serialize;
use serde::ser::SerializeMap;
use tabled::Tabled;

use twinkly_api::DeviceDescriptor;
use twinkly_core::DeviceRecord;

use crate::error::CliError;
use crate::output;

use super::{Ctx, report_failure};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Generation")]
    generation: String,
}

fn row(index: usize, entry: &ListEntry<'_>) -> DeviceRow {
    let d = &entry.0.descriptor;
    DeviceRow {
        index,
        address: entry.0.address.clone(),
        name: d.device_name().unwrap_or("-").to_owned(),
        mac: d.mac().unwrap_or("-").to_owned(),
        family: d.fw_family().unwrap_or("-").to_owned(),
        generation: d.generation().to_string(),
    }
}

/// Serializes as `{"<address>": <descriptor>}`.
struct ListEntry<'a>(&'a DeviceRecord);

impl Serialize for ListEntry<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.0.address, &self.0.descriptor)?;
        map.end()
    }
}

fn detail(address: &str, d: &DeviceDescriptor) -> String {
    [
        format!("Address:    {address}"),
        format!("Name:       {}", d.device_name().unwrap_or("-")),
        format!("MAC:        {}", d.mac().unwrap_or("-")),
        format!("Product:    {}", d.product_code().unwrap_or("-")),
        format!("Family:     {}", d.fw_family().unwrap_or("-")),
        format!("Generation: {}", d.generation()),
    ]
    .join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn list(ctx: &Ctx<'_>) -> Result<(), CliError> {
    let records = ctx.fleet.records();
    let entries: Vec<ListEntry<'_>> = records.iter().map(ListEntry).collect();
    let out = output::render_list(ctx.format, &entries, row, |e| e.0.address.clone())?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}

pub async fn add(ctx: &Ctx<'_>, address: &str) -> Result<(), CliError> {
    let index = report_failure(ctx, ctx.fleet.add(address).await)?;
    if !ctx.quiet {
        eprintln!("Added {address} as #{index}");
    }
    Ok(())
}

pub async fn remove(ctx: &Ctx<'_>, address: &str) -> Result<(), CliError> {
    let index = report_failure(ctx, ctx.fleet.remove(address).await)?;
    if !ctx.quiet {
        eprintln!("Removed {address} (was #{index})");
    }
    Ok(())
}

pub async fn info(ctx: &Ctx<'_>, address: &str) -> Result<(), CliError> {
    let descriptor = report_failure(ctx, ctx.fleet.info(address).await)?;
    let out = output::render_single(
        ctx.format,
        &descriptor,
        |d| detail(address, d),
        |d| d.mac().unwrap_or_default().to_owned(),
    )?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
