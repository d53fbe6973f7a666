//! The single-stage driver: a reader pump, a transform, and a writer
//! drain connected by rendezvous channels.

use std::thread;

use flume::Receiver;

use super::Transform;
use crate::error::Result;
use crate::store::{Reader, Record, Writer};

/// One step of a pipeline: a named transform with its input reader and
/// output writer. Any of the three parts may be absent: a stage without
/// a transform copies records straight through, and reader-less or
/// writer-less stages are useful for sources and sinks.
pub struct Stage {
    name: String,
    transform: Option<Box<dyn Transform>>,
    reader: Option<Box<dyn Reader + Send>>,
    writer: Option<Box<dyn Writer + Send>>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: None,
            reader: None,
            writer: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn reader(mut self, reader: impl Reader + Send + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    pub fn writer(mut self, writer: impl Writer + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }
}

/// Runs one stage to completion: the reader pumps records into the
/// input channel until end of stream, the transform's workers process
/// them, and the writer drains the output channel. All channels are
/// rendezvous channels, so every part blocks when its downstream is
/// slow. A store error from the reader or writer aborts the stage and
/// is returned; the caller treats it as fatal.
pub fn run_stage(stage: Stage, workers: usize) -> Result<()> {
    let Stage {
        transform,
        reader,
        writer,
        ..
    } = stage;

    let (input_tx, input_rx) = flume::bounded::<Record>(0);
    let (output_tx, output_rx) = match &transform {
        Some(_) => {
            let (tx, rx) = flume::bounded::<Record>(0);
            (Some(tx), rx)
        }
        // No transform: the writer drains the input channel directly.
        None => (None, input_rx.clone()),
    };

    thread::scope(|s| {
        let reader_handle = match reader {
            Some(mut r) => Some(s.spawn(move || -> Result<()> {
                r.begin_reading()?;
                while let Some(record) = r.read_record()? {
                    // A closed channel means downstream finished or
                    // failed early; stop reading either way.
                    if input_tx.send(record).is_err() {
                        break;
                    }
                }
                r.end_reading()
            })),
            None => {
                drop(input_tx);
                None
            }
        };

        let transform_handle = match (&transform, output_tx) {
            (Some(t), Some(tx)) => {
                let rx = input_rx;
                Some(s.spawn(move || t.run(rx, tx, workers)))
            }
            _ => None,
        };

        let writer_result = match writer {
            Some(w) => drive_writer(w, &output_rx),
            None => {
                for _ in output_rx.iter() {}
                Ok(())
            }
        };

        let reader_result = match reader_handle {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            None => Ok(()),
        };
        if let Some(handle) = transform_handle {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }

        reader_result.and(writer_result)
    })
}

fn drive_writer(mut writer: Box<dyn Writer + Send>, output: &Receiver<Record>) -> Result<()> {
    let mut result = writer.begin_writing();
    if result.is_ok() {
        for record in output.iter() {
            result = writer.write_record(record);
            if result.is_err() {
                break;
            }
        }
    }
    // Drain whatever is still in flight so the reader and transform
    // workers can finish instead of blocking on a dead channel.
    for _ in output.iter() {}
    match result {
        Ok(()) => writer.end_writing(),
        Err(e) => Err(e),
    }
}
