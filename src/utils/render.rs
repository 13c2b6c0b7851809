//! Tabular rendering of listings for the command line.

use crate::core::context::ProviderMetadata;
use crate::domain::blob::StorageMetadata;
use crate::domain::compute::{Hardware, Image, NodeMetadata};
use crate::domain::location::Location;
use crate::utils::error::{CloudError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Tsv,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Table => "table",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            other => Err(CloudError::InvalidConfigValueError {
                field: "format".to_string(),
                value: other.to_string(),
                reason: "Valid formats are: table, csv, tsv, json".to_string(),
            }),
        }
    }
}

/// A record that renders as one row.
pub trait Tabular {
    fn headers() -> &'static [&'static str];

    fn row(&self) -> Vec<String>;
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl Tabular for StorageMetadata {
    fn headers() -> &'static [&'static str] {
        &["type", "name", "size", "etag", "last_modified"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.kind.to_string(),
            self.name.clone(),
            opt(&self.size),
            opt(&self.etag),
            self.last_modified.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]
    }
}

impl Tabular for NodeMetadata {
    fn headers() -> &'static [&'static str] {
        &["id", "name", "group", "status", "location", "public_addresses", "private_addresses"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            opt(&self.group),
            self.status.to_string(),
            self.location.as_ref().map(|l| l.id.clone()).unwrap_or_default(),
            self.public_addresses.join(" "),
            self.private_addresses.join(" "),
        ]
    }
}

impl Tabular for Hardware {
    fn headers() -> &'static [&'static str] {
        &["id", "name", "cores", "ram_mb", "disk_gb"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.total_cores().to_string(),
            self.ram_mb.to_string(),
            self.total_disk_gb().to_string(),
        ]
    }
}

impl Tabular for Image {
    fn headers() -> &'static [&'static str] {
        &["id", "name", "os_family", "os_version", "64bit"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.os.family.to_string(),
            opt(&self.os.version),
            self.os.is_64bit.to_string(),
        ]
    }
}

impl Tabular for Location {
    fn headers() -> &'static [&'static str] {
        &["id", "scope", "description", "parent", "iso3166_codes"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.scope.to_string(),
            self.description.clone(),
            self.parent.as_ref().map(|p| p.id.clone()).unwrap_or_default(),
            self.iso3166_codes.join(" "),
        ]
    }
}

impl Tabular for ProviderMetadata {
    fn headers() -> &'static [&'static str] {
        &["id", "api", "kinds", "endpoint", "name"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.api.to_string(),
            self.kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            self.default_endpoint.unwrap_or_default().to_string(),
            self.name.to_string(),
        ]
    }
}

pub fn render<T: Tabular + Serialize>(items: &[T], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(items)),
        OutputFormat::Csv => render_delimited(items, b','),
        OutputFormat::Tsv => render_delimited(items, b'\t'),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(items)?),
    }
}

fn render_table<T: Tabular>(items: &[T]) -> String {
    let headers = T::headers();
    let rows: Vec<Vec<String>> = items.iter().map(Tabular::row).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.iter().map(|h| h.to_uppercase()).collect())];
    out.extend(rows.into_iter().map(line));
    out.join("\n")
}

fn render_delimited<T: Tabular>(items: &[T], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());
    writer.write_record(T::headers())?;
    for item in items {
        writer.write_record(item.row())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CloudError::illegal_state(format!("flushing output: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| CloudError::parse("rendered output", e.to_string()))
}
