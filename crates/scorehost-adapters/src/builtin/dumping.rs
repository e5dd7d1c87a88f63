//! Stateful adapter that writes every scored instance to a dump file
//!
//! The dump file is opened in append mode at construction, so every
//! instance of a pooled or per-call adapter adds to the same file. Each
//! instance flushes after every call and once more when it is dropped.

use super::{numeric_features, param, seeded_weights};
use crate::contract::{AdapterParams, ClassifierAdapter};
use crate::normalize::normalize;
use anyhow::Context;
use scorehost_core::{AdapterDescriptor, Batch, Capabilities, Distribution, Instance, Label};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::warn;

pub const NAME: &str = "dumping";

const NUM_CLASSES: usize = 2;
const DEFAULT_THRESHOLD: f64 = 0.5;

pub struct DumpingAdapter {
    threshold: f64,
    dump: Option<BufWriter<File>>,
    classified: u64,
    scored: u64,
}

impl DumpingAdapter {
    /// Create an adapter; `dump_path` enables dumping
    pub fn new(threshold: f64, dump_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let dump = match dump_path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("failed to open dump file {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                writeln!(writer, "OPEN threshold={}", threshold)?;
                Some(writer)
            }
            None => None,
        };

        Ok(Self {
            threshold,
            dump,
            classified: 0,
            scored: 0,
        })
    }

    /// Build from `threshold`, `dump_instances` and `dump_path`
    pub fn from_params(params: &AdapterParams) -> anyhow::Result<Self> {
        let threshold = param(params, "threshold")?.unwrap_or(DEFAULT_THRESHOLD);
        let dump_instances = param(params, "dump_instances")?.unwrap_or(false);

        let dump_path = if dump_instances {
            Some(
                param::<PathBuf>(params, "dump_path")?
                    .context("'dump_instances' is set but 'dump_path' is missing")?,
            )
        } else {
            None
        };

        Self::new(threshold, dump_path)
    }

    /// Number of instances classified by this instance so far
    pub fn classified(&self) -> u64 {
        self.classified
    }

    /// Number of instances scored by this instance so far
    pub fn scored(&self) -> u64 {
        self.scored
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if let Some(dump) = self.dump.as_mut() {
            dump.flush().context("failed to flush dump file")?;
        }
        Ok(())
    }

    fn score(&mut self, index: usize, instance: &Instance) -> anyhow::Result<Distribution> {
        let values = numeric_features(index, instance)?;
        self.scored += 1;
        let rendered = values
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join("|");
        write_line(
            &mut self.dump,
            format_args!("SCORE #{} len={}: {}", self.scored, values.len(), rendered),
        )?;

        let weights = seeded_weights(&values, NUM_CLASSES);
        Ok(normalize(&weights))
    }
}

fn write_line(
    dump: &mut Option<BufWriter<File>>,
    text: std::fmt::Arguments<'_>,
) -> anyhow::Result<()> {
    if let Some(dump) = dump.as_mut() {
        dump.write_fmt(text)?;
        dump.write_all(b"\n")?;
    }
    Ok(())
}

impl ClassifierAdapter for DumpingAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::permissive(NUM_CLASSES)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn classify(&mut self, batch: &Batch) -> anyhow::Result<Vec<Label>> {
        write_line(&mut self.dump, format_args!("CLASSIFY batch of {}", batch.len()))?;

        let mut labels = Vec::with_capacity(batch.len());
        for (index, instance) in batch.iter().enumerate() {
            let score = self.score(index, instance)?[0];
            let class = if score > self.threshold { 1.0 } else { 0.0 };
            self.classified += 1;
            write_line(
                &mut self.dump,
                format_args!("CLASSIFY #{} score={:.4} class={}", self.classified, score, class),
            )?;
            labels.push(Label::Score(class));
        }

        self.flush()?;
        Ok(labels)
    }

    fn class_distribution(&mut self, batch: &Batch) -> anyhow::Result<Vec<Distribution>> {
        write_line(&mut self.dump, format_args!("DISTRIBUTION batch of {}", batch.len()))?;

        let out = batch
            .iter()
            .enumerate()
            .map(|(index, instance)| self.score(index, instance))
            .collect::<anyhow::Result<Vec<_>>>()?;

        self.flush()?;
        Ok(out)
    }
}

impl Drop for DumpingAdapter {
    fn drop(&mut self) {
        let closing = write_line(
            &mut self.dump,
            format_args!("CLOSE classified={} scored={}", self.classified, self.scored),
        );
        if let Err(e) = closing.and_then(|()| self.flush()) {
            warn!("Failed to finalize dump file: {:#}", e);
        }
    }
}

impl std::fmt::Debug for DumpingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpingAdapter")
            .field("threshold", &self.threshold)
            .field("dumping", &self.dump.is_some())
            .field("classified", &self.classified)
            .field("scored", &self.scored)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counters_and_float_labels() {
        let mut adapter = DumpingAdapter::new(0.5, None).unwrap();
        let batch = Batch::from_rows([vec![1.0, 2.0], vec![3.0]]);

        let labels = adapter.classify(&batch).unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels
            .iter()
            .all(|l| matches!(l, Label::Score(s) if *s == 0.0 || *s == 1.0)));

        adapter.class_distribution(&batch).unwrap();
        assert_eq!(adapter.classified(), 2);
        assert_eq!(adapter.scored(), 4);
    }

    #[test]
    fn test_dump_written_and_flushed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");

        let mut params = AdapterParams::new();
        params.insert("dump_instances".into(), json!(true));
        params.insert("dump_path".into(), json!(path.to_str().unwrap()));

        {
            let mut adapter = DumpingAdapter::from_params(&params).unwrap();
            adapter.classify(&Batch::from_rows([vec![0.25, 4.0]])).unwrap();
        }

        let dump = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.first(), Some(&"OPEN threshold=0.5"));
        assert!(lines.contains(&"SCORE #1 len=2: 0.25|4"));
        assert_eq!(lines.last(), Some(&"CLOSE classified=1 scored=1"));
    }

    #[test]
    fn test_instances_append_to_shared_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        let batch = Batch::from_rows([vec![1.5]]);

        let mut first = DumpingAdapter::new(0.5, Some(path.clone())).unwrap();
        let mut second = DumpingAdapter::new(0.5, Some(path.clone())).unwrap();
        first.classify(&batch).unwrap();
        second.classify(&batch).unwrap();
        drop(first);
        drop(second);

        let dump = std::fs::read_to_string(&path).unwrap();
        assert_eq!(dump.lines().filter(|l| l.starts_with("OPEN")).count(), 2);
        assert_eq!(dump.matches("CLOSE classified=1 scored=1").count(), 2);
    }

    #[test]
    fn test_dump_path_required_when_dumping() {
        let mut params = AdapterParams::new();
        params.insert("dump_instances".into(), json!(true));
        let err = DumpingAdapter::from_params(&params).unwrap_err();
        assert!(err.to_string().contains("dump_path"));
    }
}
