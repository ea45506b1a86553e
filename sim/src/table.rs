//! Localization table I/O: JSON files for detections, ground truth and
//! linked trajectories.

use linker_core::metrics::GroundTruth;
use linker_core::{Detection, FrameSequence, ParticleId, Trajectory};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A localization table as written by a fitter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizationTable {
    pub detections: Vec<Detection>,
}

impl LocalizationTable {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// Group into contiguous frames, filling frames with no detections.
    pub fn frames(&self) -> linker_core::Result<FrameSequence> {
        FrameSequence::from_detections(self.detections.iter().copied())
    }
}

/// One ground-truth row: the emitter behind particle `index` of `frame`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TruthEntry {
    pub frame: u32,
    pub index: u32,
    pub emitter: u64,
}

/// Flatten ground truth into rows sorted by particle.
pub fn truth_entries(truth: &GroundTruth) -> Vec<TruthEntry> {
    let mut rows: Vec<TruthEntry> = truth
        .iter()
        .map(|(id, &emitter)| TruthEntry {
            frame: id.frame,
            index: id.index,
            emitter,
        })
        .collect();
    rows.sort_unstable();
    rows
}

pub fn truth_from_entries(rows: &[TruthEntry]) -> GroundTruth {
    rows.iter()
        .map(|r| {
            (
                ParticleId {
                    frame: r.frame,
                    index: r.index,
                },
                r.emitter,
            )
        })
        .collect()
}

fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Save a localization table to a JSON file.
pub fn save_table(table: &LocalizationTable, path: &Path) -> anyhow::Result<()> {
    save_json(table, path)
}

/// Load a localization table from a JSON file.
pub fn load_table(path: &Path) -> anyhow::Result<LocalizationTable> {
    load_json(path)
}

pub fn save_truth(truth: &GroundTruth, path: &Path) -> anyhow::Result<()> {
    save_json(&truth_entries(truth), path)
}

pub fn load_truth(path: &Path) -> anyhow::Result<GroundTruth> {
    let rows: Vec<TruthEntry> = load_json(path)?;
    Ok(truth_from_entries(&rows))
}

/// Save linked trajectories (rejected sentinel included) to a JSON file.
pub fn save_trajectories(trajectories: &[Trajectory], path: &Path) -> anyhow::Result<()> {
    save_json(trajectories, path)
}

pub fn load_trajectories(path: &Path) -> anyhow::Result<Vec<Trajectory>> {
    load_json(path)
}
