// src/trajectory.rs
//
// Trajectory recording as JSON Lines: one `TrajectoryRecord` per step.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::state::ObservableState;

/// Single transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub step: u64,
    pub action: Action,
    /// Observation after the action was applied.
    pub observation: ObservableState,
    pub reward: f64,
}

pub struct TrajectoryWriter<W: Write> {
    writer: W,
    records: u64,
}

impl TrajectoryWriter<BufWriter<File>> {
    /// Create (or truncate) `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TrajectoryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    pub fn write(&mut self, record: &TrajectoryRecord) -> io::Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{line}")?;
        self.records += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Read every record of a JSON Lines trajectory file.
pub fn read_trajectory<P: AsRef<Path>>(path: P) -> io::Result<Vec<TrajectoryRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MarkovState, StateKey};

    #[test]
    fn writes_one_line_per_record() {
        let mut state = MarkovState::new(1, Vec::<String>::new());
        state[StateKey::SetPoint] = 50.0;
        let record = TrajectoryRecord {
            step: 3,
            action: Action::delta(1.0, 0.0, -1.0),
            observation: ObservableState::from_markov(&state),
            reward: -12.5,
        };

        let mut writer = TrajectoryWriter::new(Vec::new());
        writer.write(&record).unwrap();
        writer.write(&record).unwrap();
        assert_eq!(writer.records_written(), 2);

        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["step"], 3);
        assert_eq!(value["reward"], -12.5);
        assert_eq!(value["observation"]["set_point"], 50.0);
    }
}
