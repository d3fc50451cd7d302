use std::path::PathBuf;
use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::debug;

use super::{GeoSample, GeoSensor, SampleStream, SensorError, SensorOptions, SensorUnavailable};
use crate::position::{Coordinate, Timestamp};
use crate::state_machine::wrappers::input::system::SystemResource;

/// Replays a recorded trace, one `lat,lng[,heading]` line per sample.
///
/// Blank lines and lines starting with `#` are skipped. A line that does not parse fails the
/// watch. The trace ends the watch when exhausted.
#[derive(Debug, Clone)]
pub struct ReplaySensor {
    path: PathBuf,
    period: Duration,
}

impl ReplaySensor {
    pub fn new(path: impl Into<PathBuf>, period: Duration) -> Self {
        Self {
            path: path.into(),
            period,
        }
    }
}

impl GeoSensor for ReplaySensor {
    fn watch(&mut self, _options: &SensorOptions) -> Result<SampleStream, SensorUnavailable> {
        let file = std::fs::File::open(&self.path).map_err(|e| SensorUnavailable {
            reason: format!("cannot open {}: {e}", self.path.display()),
        })?;
        debug!(path = %self.path.display(), "Replaying position trace");

        let reader = BufReader::new(tokio::fs::File::from_std(file));
        Ok(replay_lines(reader, self.period))
    }
}

/// Emit one sample per trace line, paced by `period`.
pub fn replay_lines<R>(reader: R, period: Duration) -> SampleStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut lines = LinesStream::new(reader.lines());

    stream! {
        let mut ticker = tokio::time::interval(period);
        let mut number = 0;

        while let Some(line) = lines.next().await {
            number += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    yield Err(SensorError::Stream(e.to_string()));
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            ticker.tick().await;
            yield parse_sample_line(trimmed, number, Timestamp::generate());
        }
    }
    .boxed()
}

/// Parse `lat,lng[,heading]`. `number` is the 1-based line number for error reporting.
pub fn parse_sample_line(
    line: &str,
    number: usize,
    timestamp: Timestamp,
) -> Result<GeoSample, SensorError> {
    let malformed = |reason: String| SensorError::Malformed {
        line: number,
        reason,
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if !(2..=3).contains(&fields.len()) {
        return Err(malformed(format!(
            "expected lat,lng[,heading], got {} fields",
            fields.len()
        )));
    }

    let parse = |field: &str, name: &str| {
        field
            .parse::<f64>()
            .map_err(|e| malformed(format!("{name} {field:?}: {e}")))
    };

    let coordinate = Coordinate::new(parse(fields[0], "lat")?, parse(fields[1], "lng")?);
    coordinate
        .validate()
        .map_err(|e| malformed(e.to_string()))?;

    let heading = fields
        .get(2)
        .copied()
        .map(|field| parse(field, "heading"))
        .transpose()?;

    Ok(GeoSample {
        coordinate,
        heading,
        timestamp,
    })
}
