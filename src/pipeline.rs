//! Sequential execution of named pipeline stages.

use crate::errinput;
use crate::error::Result;
use crate::metrics;
use crate::transform::{run_stage, Stage};

/// An ordered sequence of stages, executed one after another. Stage i's
/// writes are fully persisted before stage i+1 begins, so later stages
/// read everything earlier stages produced; there is no cross-stage
/// parallelism.
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Keeps only the named stages, in the order the names are given.
    /// Unknown names are an input error.
    pub fn select_only(self, names: &[&str]) -> Result<Self> {
        let mut remaining: Vec<Option<Stage>> = self.stages.into_iter().map(Some).collect();
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let found = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|s| s.name() == *name));
            match found {
                Some(slot) => selected.push(slot.take().expect("slot was just matched")),
                None => return Err(errinput!("unknown pipeline stage {name}")),
            }
        }
        Ok(Self { stages: selected })
    }

    /// Keeps the named stage and every stage after it. An unknown name
    /// is an input error.
    pub fn select_from(mut self, name: &str) -> Result<Self> {
        match self.stages.iter().position(|s| s.name() == name) {
            Some(index) => {
                self.stages.drain(..index);
                Ok(self)
            }
            None => Err(errinput!("unknown pipeline stage {name}")),
        }
    }

    /// Runs every stage in order. A stage failure is fatal: later
    /// stages do not run and the error propagates to the caller.
    pub fn run(self, workers: usize) -> Result<()> {
        let total = self.stages.len();
        for (index, stage) in self.stages.into_iter().enumerate() {
            metrics::CURRENT_STAGE.set(stage.name());
            tracing::info!(
                stage = stage.name(),
                index = index + 1,
                total,
                "running pipeline stage"
            );
            run_stage(stage, workers)?;
            metrics::STAGES_COMPLETE.add(1);
        }
        tracing::info!("all stages complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{read_all, write_all, MemStore, Record};
    use crate::transform;

    fn tagging_stage(name: &str, source: MemStore, sink: MemStore) -> Stage {
        let suffix = name.as_bytes().to_vec();
        Stage::new(name)
            .reader(source)
            .transform(transform::map(move |mut record: Record| {
                record.value.extend_from_slice(&suffix);
                Some(record)
            }))
            .writer(sink)
    }

    #[test]
    fn stages_run_in_order_and_see_prior_output() {
        let first = MemStore::new();
        let middle = MemStore::new();
        let last = MemStore::new();
        write_all(&mut first.clone(), vec![Record::new("k", "v-", 0)]).unwrap();

        let done_before = metrics::STAGES_COMPLETE.get();
        Pipeline::new(vec![
            tagging_stage("one", first, middle.clone()),
            tagging_stage("two", middle, last.clone()),
        ])
        .run(1)
        .unwrap();

        let records = read_all(&mut last.clone()).unwrap();
        assert_eq!(records[0].value, b"v-onetwo");
        assert!(metrics::STAGES_COMPLETE.get() >= done_before + 2);
    }

    #[test]
    fn select_only_keeps_the_named_stages_in_order() {
        let pipeline = Pipeline::new(vec![
            Stage::new("a"),
            Stage::new("b"),
            Stage::new("c"),
        ]);
        let selected = pipeline.select_only(&["c", "a"]).unwrap();
        assert_eq!(selected.stage_names(), vec!["c", "a"]);
    }

    #[test]
    fn select_only_rejects_unknown_names() {
        let pipeline = Pipeline::new(vec![Stage::new("a")]);
        assert!(matches!(
            pipeline.select_only(&["nope"]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn select_from_keeps_the_tail() {
        let pipeline = Pipeline::new(vec![
            Stage::new("a"),
            Stage::new("b"),
            Stage::new("c"),
        ]);
        let selected = pipeline.select_from("b").unwrap();
        assert_eq!(selected.stage_names(), vec!["b", "c"]);
    }

    #[test]
    fn select_from_rejects_unknown_names() {
        let pipeline = Pipeline::new(vec![Stage::new("a")]);
        assert!(matches!(
            pipeline.select_from("nope"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn stage_failure_stops_the_pipeline() {
        struct FailingReader;
        impl crate::store::Reader for FailingReader {
            fn begin_reading(&mut self) -> Result<()> {
                Err(Error::IO("cannot open".to_string()))
            }
            fn read_record(&mut self) -> Result<Option<Record>> {
                Ok(None)
            }
            fn end_reading(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let untouched = MemStore::new();
        let result = Pipeline::new(vec![
            Stage::new("boom").reader(FailingReader).writer(MemStore::new()),
            tagging_stage("later", MemStore::new(), untouched.clone()),
        ])
        .run(1);

        assert_eq!(result, Err(Error::IO("cannot open".to_string())));
        assert!(read_all(&mut untouched.clone()).unwrap().is_empty());
    }
}
