use std::io::{self, Read};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::blob;
use crate::block;
use crate::element::Element;
use crate::error::{DecodeError, Error};
use crate::osm_pbf;
use crate::reader::BlobReader;

/// A typical PrimitiveBlock holds about 8k entities; the consumer queue
/// buffers one block's worth so per-block latency does not gate
/// steady-state throughput.
const SERIALIZER_DEPTH: usize = 8000;

/// One blob on its way to a worker, or the reader's terminal error.
enum Job {
    Decode(osm_pbf::Blob, u64),
    Fail(Error, u64),
}

/// One worker's result for a single blob.
enum Batch {
    Entities(Vec<Element>, u64),
    Fail(Error, u64),
}

type Delivery = Result<(Element, u64), DecodeError>;

/// Streaming decoder for OpenStreetMap PBF data.
///
/// [`start`] validates the file header and spawns a pipeline of reader,
/// `n` block-decoding workers and a serializer; [`decode`] then yields
/// entities one at a time, in the order their blocks appear in the file.
/// Order is preserved structurally: blobs are dispatched to workers in a
/// fixed round-robin over depth-1 channels and drained in the same
/// round-robin, so no reordering buffer is needed.
///
/// Dropping the decoder tears the pipeline down: every task exits once
/// its channel closes.
///
/// [`start`]: Decoder::start
/// [`decode`]: Decoder::decode
pub struct Decoder<R> {
    reader: Option<BlobReader<R>>,
    sender: Option<Sender<Delivery>>,
    serializer: Receiver<Delivery>,
}

impl<R: Read + Send + 'static> Decoder<R> {
    /// Wraps a byte stream positioned at the start of a PBF file.
    pub fn new(stream: R) -> Self {
        let (sender, serializer) = bounded(SERIALIZER_DEPTH);
        Self {
            reader: Some(BlobReader::new(stream)),
            sender: Some(sender),
            serializer,
        }
    }

    /// Reads and validates the leading `OSMHeader` block, then spawns the
    /// decode pipeline with `workers` parallel block decoders (clamped to
    /// at least one).
    pub fn start(&mut self, workers: usize) -> Result<(), Error> {
        let (Some(mut reader), Some(sender)) = (self.reader.take(), self.sender.take()) else {
            return Err(Error::Io(io::Error::other("decoder already started")));
        };

        let (header, header_blob, position) = reader.read_file_block()?;
        if header.r#type != "OSMHeader" {
            return Err(Error::UnexpectedBlockType(header.r#type));
        }
        blob::check_osm_header(&header_blob)?;

        let workers = workers.max(1);
        debug!(position, workers, "header accepted, starting pipeline");

        let mut inputs = Vec::with_capacity(workers);
        let mut outputs = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (job_tx, job_rx) = bounded::<Job>(1);
            let (batch_tx, batch_rx) = bounded::<Batch>(1);
            thread::spawn(move || run_worker(worker, job_rx, batch_tx));
            inputs.push(job_tx);
            outputs.push(batch_rx);
        }
        thread::spawn(move || run_dispatcher(reader, inputs));
        thread::spawn(move || run_serializer(outputs, sender));
        Ok(())
    }

    /// Blocks until the next entity is available and returns it together
    /// with the offset of the file block it was decoded from. The end of
    /// the stream, and every call after an error has been delivered,
    /// reports [`Error::Eof`].
    ///
    /// Safe to call from several threads at once; every call yields a
    /// distinct entity.
    pub fn decode(&self) -> Result<(Element, u64), DecodeError> {
        if self.sender.is_some() {
            // start() has not run; nothing will ever arrive.
            return Err(DecodeError {
                position: 0,
                kind: Error::Eof,
            });
        }
        match self.serializer.recv() {
            Ok(delivery) => delivery,
            Err(_) => Err(DecodeError {
                position: 0,
                kind: Error::Eof,
            }),
        }
    }
}

impl<R: Read + Send + 'static> Iterator for Decoder<R> {
    type Item = Result<(Element, u64), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.decode() {
            Err(err) if err.is_eof() => None,
            other => Some(other),
        }
    }
}

/// Hands each `OSMData` blob to the next worker in a fixed round-robin.
/// The depth-1 input channels provide backpressure: a stuck worker stalls
/// the reader instead of piling blocks up in memory.
///
/// On any reader error, end of stream included, the error is forwarded to
/// the current worker and all inputs are closed.
fn run_dispatcher<R: Read>(mut reader: BlobReader<R>, inputs: Vec<Sender<Job>>) {
    let mut index = 0;
    loop {
        let input = &inputs[index];
        index = (index + 1) % inputs.len();

        let position = reader.position();
        let job = match reader.read_file_block() {
            Ok((header, blob, position)) => {
                if header.r#type == "OSMData" {
                    Job::Decode(blob, position)
                } else {
                    Job::Fail(Error::UnexpectedBlockType(header.r#type), position)
                }
            }
            Err(err) => Job::Fail(err, position),
        };
        let terminal = matches!(job, Job::Fail(..));
        if input.send(job).is_err() {
            // The consumer went away and the worker exited.
            return;
        }
        if terminal {
            trace!("dispatcher finished");
            return; // dropping `inputs` closes every worker input
        }
    }
}

/// Decodes blobs as they arrive and forwards each result, preserving
/// arrival order through the depth-1 output channel.
fn run_worker(worker: usize, jobs: Receiver<Job>, batches: Sender<Batch>) {
    for job in jobs {
        let batch = match job {
            Job::Decode(blob, position) => match block::decode_block(&blob) {
                Ok(entities) => {
                    trace!(worker, position, entities = entities.len(), "block decoded");
                    Batch::Entities(entities, position)
                }
                Err(err) => Batch::Fail(err, position),
            },
            Job::Fail(err, position) => Batch::Fail(err, position),
        };
        if batches.send(batch).is_err() {
            return;
        }
    }
}

/// Drains workers in dispatch order and flattens their batches into the
/// consumer queue. The first error terminates the stream: end of stream
/// closes it silently, anything else is delivered first. A worker output
/// that closes early also counts as termination rather than something to
/// keep polling.
fn run_serializer(outputs: Vec<Receiver<Batch>>, deliveries: Sender<Delivery>) {
    let mut index = 0;
    loop {
        let output = &outputs[index];
        index = (index + 1) % outputs.len();

        match output.recv() {
            Ok(Batch::Entities(entities, position)) => {
                for element in entities {
                    if deliveries.send(Ok((element, position))).is_err() {
                        return;
                    }
                }
            }
            Ok(Batch::Fail(err, position)) => {
                debug!(position, %err, "pipeline finished");
                if !err.is_eof() {
                    let _ = deliveries.send(Err(DecodeError {
                        position,
                        kind: err,
                    }));
                }
                return; // dropping `deliveries` ends the public stream
            }
            Err(_) => return,
        }
    }
}
