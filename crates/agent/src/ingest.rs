//! Line-delimited JSON input loop
//!
//! Each input line is either a telemetry packet or a pump event, tagged by
//! `kind`. Telemetry produces one `AnalysisResult` JSON line on the output;
//! pump events only update the irrigation log. Malformed lines are logged
//! and skipped.

use agronomy_lib::engine::AgronomyEngine;
use agronomy_lib::models::InputRecord;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Counters for one input stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub packets: u64,
    pub pump_events: u64,
    pub malformed: u64,
}

/// Process lines until the reader is exhausted
pub async fn process_lines<R, W>(
    engine: &mut AgronomyEngine,
    reader: R,
    mut writer: W,
) -> Result<IngestSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = IngestSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input line")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match InputRecord::parse(line) {
            Ok(InputRecord::Telemetry(packet)) => {
                let result = engine.analyze(&packet);
                let mut out = serde_json::to_vec(&result).context("Failed to encode result")?;
                out.push(b'\n');
                writer
                    .write_all(&out)
                    .await
                    .context("Failed to write result")?;
                writer.flush().await.context("Failed to flush output")?;
                summary.packets += 1;
            }
            Ok(InputRecord::Pump(event)) => {
                engine.record_pump_event(event);
                summary.pump_events += 1;
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed input line");
                summary.malformed += 1;
            }
        }
    }

    debug!(
        packets = summary.packets,
        pump_events = summary.pump_events,
        malformed = summary.malformed,
        "Input stream exhausted"
    );
    Ok(summary)
}
