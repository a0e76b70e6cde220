use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::{AxonError, Result};
use crate::events::SpikeEvent;
use crate::monitors::VoltageSample;

pub const SCHEMA_VERSION: u32 = 1;

const SPIKE_HEADER: &str = "# axon_rs spikes schema";
const VOLTAGE_HEADER: &str = "# axon_rs voltages schema";

/// Writes one `compartment time` row per spike.
///
/// Lines starting with `#` are comments; the first one carries the schema version.
pub fn write_spikes<W: Write>(mut out: W, spikes: &[SpikeEvent]) -> Result<()> {
    writeln!(out, "{SPIKE_HEADER} {SCHEMA_VERSION}")?;
    writeln!(out, "# compartment time_ms")?;
    for spike in spikes {
        writeln!(out, "{} {}", spike.compartment, spike.time)?;
    }
    out.flush()?;
    Ok(())
}

/// Writes one `time compartment voltage` row per recorded value.
/// `recorded` names the compartment behind each column of the samples.
pub fn write_voltages<W: Write>(
    mut out: W,
    recorded: &[usize],
    samples: &[VoltageSample],
) -> Result<()> {
    writeln!(out, "{VOLTAGE_HEADER} {SCHEMA_VERSION}")?;
    writeln!(out, "# time_ms compartment voltage_mV")?;
    for sample in samples {
        for (compartment, v) in recorded.iter().zip(&sample.voltages) {
            writeln!(out, "{} {} {}", sample.time, compartment, v)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: usize, what: &str) -> Result<T> {
    let raw = field.ok_or_else(|| AxonError::Parse {
        line,
        detail: format!("missing {what}"),
    })?;
    raw.parse::<T>().map_err(|_| AxonError::Parse {
        line,
        detail: format!("bad {what}: {raw:?}"),
    })
}

fn check_schema(first: &str, header: &str) -> Result<()> {
    let version = first
        .strip_prefix(header)
        .map(str::trim)
        .ok_or_else(|| AxonError::Parse {
            line: 1,
            detail: format!("expected header {header:?}"),
        })?;
    if version != SCHEMA_VERSION.to_string() {
        return Err(AxonError::Parse {
            line: 1,
            detail: format!("unsupported schema version {version}"),
        });
    }
    Ok(())
}

/// Reads back a table produced by [`write_spikes`].
pub fn read_spikes<R: BufRead>(input: R) -> Result<Vec<SpikeEvent>> {
    let mut spikes = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let number = idx + 1;
        if number == 1 {
            check_schema(&line, SPIKE_HEADER)?;
            continue;
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let compartment = parse_field(fields.next(), number, "compartment")?;
        let time = parse_field(fields.next(), number, "time")?;
        spikes.push(SpikeEvent { compartment, time });
    }
    Ok(spikes)
}

pub fn save_spikes(path: impl AsRef<Path>, spikes: &[SpikeEvent]) -> Result<()> {
    let path = path.as_ref();
    write_spikes(BufWriter::new(File::create(path)?), spikes)?;
    info!("Wrote {} spikes to {}", spikes.len(), path.display());
    Ok(())
}

pub fn load_spikes(path: impl AsRef<Path>) -> Result<Vec<SpikeEvent>> {
    read_spikes(BufReader::new(File::open(path)?))
}

pub fn save_voltages(
    path: impl AsRef<Path>,
    recorded: &[usize],
    samples: &[VoltageSample],
) -> Result<()> {
    let path = path.as_ref();
    write_voltages(BufWriter::new(File::create(path)?), recorded, samples)?;
    info!("Wrote {} voltage samples to {}", samples.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_table_layout() {
        let spikes = vec![
            SpikeEvent { compartment: 0, time: 51.9 },
            SpikeEvent { compartment: 1, time: 51.91 },
        ];
        let mut buffer = Vec::new();
        write_spikes(&mut buffer, &spikes).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# axon_rs spikes schema 1");
        assert_eq!(lines[2], "0 51.9");
        assert_eq!(read_spikes(text.as_bytes()).unwrap(), spikes);
    }

    #[test]
    fn voltage_table_is_flat() {
        let samples = vec![
            VoltageSample { time: 0.0, voltages: vec![0.0, 1.5] },
            VoltageSample { time: 0.5, voltages: vec![2.0, -3.25] },
        ];
        let mut buffer = Vec::new();
        write_voltages(&mut buffer, &[4, 9], &samples).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows, vec!["0 4 0", "0 9 1.5", "0.5 4 2", "0.5 9 -3.25"]);
    }

    #[test]
    fn malformed_tables_rejected() {
        let wrong_version = "# axon_rs spikes schema 7\n0 1.0\n";
        assert!(matches!(
            read_spikes(wrong_version.as_bytes()),
            Err(AxonError::Parse { line: 1, .. })
        ));
        let no_header = "0 1.0\n";
        assert!(read_spikes(no_header.as_bytes()).is_err());
        let bad_row = "# axon_rs spikes schema 1\n# comment\n3 abc\n";
        assert!(matches!(
            read_spikes(bad_row.as_bytes()),
            Err(AxonError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn files_round_trip() {
        let path = std::env::temp_dir().join(format!("axon_rs_spikes_{}.txt", std::process::id()));
        let spikes = vec![SpikeEvent { compartment: 12, time: 0.125 }];
        save_spikes(&path, &spikes).unwrap();
        assert_eq!(load_spikes(&path).unwrap(), spikes);
        std::fs::remove_file(&path).unwrap();
    }
}
