// ============================================================
// Layer 6 — Metrics
// ============================================================
// Two pieces:
//
//   StepLog       : what a training module records per step
//                   ("train_loss", "val_loss"). The fit loop
//                   drains it and averages per metric.
//
//   MetricsLogger : appends one CSV row per epoch so learning
//                   curves can be plotted after the run.
//
// Output file: {output_dir}/metrics.csv
//
//   epoch,lr,train_loss,val_loss
//   1,0.000020,3.124500,3.089200
//   2,0.000010,2.890100,2.854300

use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const TRAIN_LOSS: &str = "train_loss";
pub const VAL_LOSS: &str = "val_loss";

/// Named scalar values recorded during steps
#[derive(Debug, Default, Clone)]
pub struct StepLog {
    entries: Vec<(&'static str, f64)>,
}

impl StepLog {
    pub fn record(&mut self, name: &'static str, value: f64) {
        tracing::trace!("{} = {:.6}", name, value);
        self.entries.push((name, value));
    }

    /// Most recent value logged under `name`
    pub fn last(&self, name: &str) -> Option<f64> {
        self.entries.iter().rev().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mean per metric name, leaving the log empty
    pub fn drain_means(&mut self) -> BTreeMap<&'static str, f64> {
        let mut sums: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
        for (name, value) in self.entries.drain(..) {
            let slot = sums.entry(name).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
        sums.into_iter().map(|(k, (sum, n))| (k, sum / n as f64)).collect()
    }
}

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub lr:         f64,
    /// NaN when the epoch had no training batches
    pub train_loss: f64,
    /// NaN when there is no validation data
    pub val_loss:   f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, lr: f64, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, lr, train_loss, val_loss }
    }

    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss.is_finite() && self.val_loss < best_val_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,lr,train_loss,val_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{},{:.8},{:.6},{:.6}", m.epoch, m.lr, m.train_loss, m.val_loss)?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
