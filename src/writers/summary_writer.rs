use crate::error::Result;
use crate::models::{StationReport, Summary};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// `{name=min/mean/max, ...}` on one line
    #[default]
    Text,
    /// JSON array of per-station objects
    Json,
}

pub struct SummaryWriter {
    format: OutputFormat,
}

impl SummaryWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Write the summary followed by a newline.
    pub fn write_summary<W: Write>(&self, summary: &Summary, out: &mut W) -> Result<()> {
        match self.format {
            OutputFormat::Text => self.write_text(summary, out)?,
            OutputFormat::Json => {
                let rows: Vec<StationReport> =
                    summary.stations().iter().map(|s| s.to_report()).collect();
                serde_json::to_writer(&mut *out, &rows).map_err(std::io::Error::from)?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Station names are written byte for byte, without UTF-8 re-encoding.
    fn write_text<W: Write>(&self, summary: &Summary, out: &mut W) -> Result<()> {
        out.write_all(b"{")?;
        for (index, station) in summary.stations().iter().enumerate() {
            if index > 0 {
                out.write_all(b", ")?;
            }
            out.write_all(&station.name)?;
            let mean = station.stats.mean().unwrap_or_default();
            write!(
                out,
                "={}/{}/{}",
                station.stats.min(),
                mean,
                station.stats.max()
            )?;
        }
        out.write_all(b"}\n")?;
        Ok(())
    }
}

impl Default for SummaryWriter {
    fn default() -> Self {
        Self::new(OutputFormat::Text)
    }
}
