//! The transformer execution model.
//!
//! A [`Transform`] consumes a stage's input channel and emits records
//! on its output channel. The adapters in this module wrap plain
//! closures and fan the work out over a pool of worker threads that all
//! draw from the same channel, so record-level transforms do not
//! preserve input order across distinct keys. Group adapters coalesce
//! consecutive records sharing a key on a single thread and hand each
//! completed group to a worker as an atomic batch.

pub mod join;
pub mod stage;

pub use join::join;
pub use stage::{run_stage, Stage};

use std::thread;

use flume::{Receiver, Sender};

use crate::store::merge::MAX_SOURCES;
use crate::store::Record;

/// A record transformer: the middle worker of a stage, between the
/// reader pump and the writer drain. Implementations must drain `input`
/// and drop every clone of `output` before returning; the stage
/// completes when the output channel closes.
pub trait Transform: Send + Sync {
    fn run(&self, input: Receiver<Record>, output: Sender<Record>, workers: usize);
}

/// Emits records to a stage's output stream.
pub struct Emit {
    tx: Sender<Record>,
}

impl Emit {
    pub fn emit(&self, record: Record) {
        if self.tx.send(record).is_err() {
            panic!("output stream closed before the transform finished");
        }
    }
}

/// Emits records to one of a fixed number of output streams. Emitting
/// on stream i stamps the record's source tag with i, which a
/// downstream [`crate::store::MuxWriter`] uses to route it.
pub struct FanEmit {
    tx: Sender<Record>,
    outputs: usize,
}

impl FanEmit {
    pub fn emit(&self, output: usize, mut record: Record) {
        assert!(
            output < self.outputs,
            "fan-out stream {output} out of range (transform has {} outputs)",
            self.outputs
        );
        record.source_tag = output as u8;
        if self.tx.send(record).is_err() {
            panic!("output stream closed before the transform finished");
        }
    }

    /// The number of output streams.
    pub fn outputs(&self) -> usize {
        self.outputs
    }
}

/// Maps each record to zero or one output records. The simplest and
/// cheapest transform; `None` emits nothing.
pub fn map<F>(f: F) -> MapTransform<F>
where
    F: Fn(Record) -> Option<Record> + Send + Sync,
{
    MapTransform { f }
}

/// Maps each record to any number of output records on one stream.
pub fn flat_map<F>(f: F) -> FlatMapTransform<F>
where
    F: Fn(Record, &Emit) + Send + Sync,
{
    FlatMapTransform { f }
}

/// Maps each record to any number of output records across `outputs`
/// streams. Panics if outputs exceeds the 255-stream routing space.
pub fn fan_out<F>(outputs: usize, f: F) -> FanOutTransform<F>
where
    F: Fn(Record, &FanEmit) + Send + Sync,
{
    assert!(
        outputs <= MAX_SOURCES,
        "cannot fan out to more than {MAX_SOURCES} streams"
    );
    FanOutTransform { f, outputs }
}

/// Maps each batch of consecutive records sharing a key to any number
/// of output records on one stream. Batches never interleave: every
/// record for one key reaches exactly one invocation, in input order.
pub fn group_map<F>(f: F) -> GroupMapTransform<F>
where
    F: Fn(Vec<Record>, &Emit) + Send + Sync,
{
    GroupMapTransform { f }
}

/// Maps each batch of consecutive records sharing a key to any number
/// of output records across `outputs` streams.
pub fn group_fan_out<F>(outputs: usize, f: F) -> GroupFanOutTransform<F>
where
    F: Fn(Vec<Record>, &FanEmit) + Send + Sync,
{
    assert!(
        outputs <= MAX_SOURCES,
        "cannot fan out to more than {MAX_SOURCES} streams"
    );
    GroupFanOutTransform { f, outputs }
}

pub struct MapTransform<F> {
    f: F,
}

impl<F> Transform for MapTransform<F>
where
    F: Fn(Record) -> Option<Record> + Send + Sync,
{
    fn run(&self, input: Receiver<Record>, output: Sender<Record>, workers: usize) {
        let f = &self.f;
        thread::scope(|s| {
            for _ in 0..workers.max(1) {
                let input = input.clone();
                let output = output.clone();
                s.spawn(move || {
                    for record in input.iter() {
                        if let Some(mapped) = f(record) {
                            if output.send(mapped).is_err() {
                                break;
                            }
                        }
                    }
                });
            }
        });
    }
}

pub struct FlatMapTransform<F> {
    f: F,
}

impl<F> Transform for FlatMapTransform<F>
where
    F: Fn(Record, &Emit) + Send + Sync,
{
    fn run(&self, input: Receiver<Record>, output: Sender<Record>, workers: usize) {
        let f = &self.f;
        thread::scope(|s| {
            for _ in 0..workers.max(1) {
                let input = input.clone();
                let emit = Emit {
                    tx: output.clone(),
                };
                s.spawn(move || {
                    for record in input.iter() {
                        f(record, &emit);
                    }
                });
            }
        });
    }
}

pub struct FanOutTransform<F> {
    f: F,
    outputs: usize,
}

impl<F> Transform for FanOutTransform<F>
where
    F: Fn(Record, &FanEmit) + Send + Sync,
{
    fn run(&self, input: Receiver<Record>, output: Sender<Record>, workers: usize) {
        let f = &self.f;
        thread::scope(|s| {
            for _ in 0..workers.max(1) {
                let input = input.clone();
                let emit = FanEmit {
                    tx: output.clone(),
                    outputs: self.outputs,
                };
                s.spawn(move || {
                    for record in input.iter() {
                        f(record, &emit);
                    }
                });
            }
        });
    }
}

pub struct GroupMapTransform<F> {
    f: F,
}

impl<F> Transform for GroupMapTransform<F>
where
    F: Fn(Vec<Record>, &Emit) + Send + Sync,
{
    fn run(&self, input: Receiver<Record>, output: Sender<Record>, workers: usize) {
        let f = &self.f;
        run_grouped_with(input, workers, move || {
            let emit = Emit {
                tx: output.clone(),
            };
            move |group: Vec<Record>| f(group, &emit)
        });
    }
}

pub struct GroupFanOutTransform<F> {
    f: F,
    outputs: usize,
}

impl<F> Transform for GroupFanOutTransform<F>
where
    F: Fn(Vec<Record>, &FanEmit) + Send + Sync,
{
    fn run(&self, input: Receiver<Record>, output: Sender<Record>, workers: usize) {
        let f = &self.f;
        let outputs = self.outputs;
        run_grouped_with(input, workers, move || {
            let emit = FanEmit {
                tx: output.clone(),
                outputs,
            };
            move |group: Vec<Record>| f(group, &emit)
        });
    }
}

/// Coalesces consecutive records sharing a key into batches on the
/// calling thread and hands each batch to one of `workers` worker
/// threads. `make_worker` builds one consumer closure per worker.
fn run_grouped_with<F, W>(input: Receiver<Record>, workers: usize, make_worker: F)
where
    F: Fn() -> W,
    W: FnMut(Vec<Record>) + Send,
{
    let (group_tx, group_rx) = flume::bounded::<Vec<Record>>(0);
    thread::scope(|s| {
        for _ in 0..workers.max(1) {
            let group_rx = group_rx.clone();
            let mut work = make_worker();
            s.spawn(move || {
                for group in group_rx.iter() {
                    work(group);
                }
            });
        }
        drop(group_rx);

        let mut current: Vec<Record> = Vec::new();
        for record in input.iter() {
            if let Some(first) = current.first() {
                if first.key != record.key {
                    let batch = std::mem::take(&mut current);
                    if group_tx.send(batch).is_err() {
                        return;
                    }
                }
            }
            current.push(record);
        }
        if !current.is_empty() {
            let _ = group_tx.send(current);
        }
        drop(group_tx);
    });
}
