//! Single-flight encode dispatch
//!
//! At most one native encode call per session is outstanding at a time.
//! A request that arrives while one is outstanding is dropped, never
//! queued: under encoder backpressure the render loop keeps its latency
//! and memory bounded and loses frames instead.
//!
//! State flow:
//!
//! ```text
//! Idle -> Submitting -> InFlight -> Completing -> Idle
//!            |             |
//!            +-> Idle      +-> Idle (native failure)
//!                          |
//!                          +-> Abandoned (timeout) -> Idle (late completion)
//! ```
//!
//! In synchronous mode the native call runs on the caller and a success
//! parks the dispatcher in `Completing` until the next harvest. In
//! multithreaded mode a per-session worker runs the call and reports back
//! over a completion channel that [`Dispatcher::poll`] drains.
//!
//! A timed-out call is abandoned, not cancelled: the dispatcher keeps
//! refusing submissions until the worker hands the call back, then drops
//! whatever it produced.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use surface::SurfaceRef;
use tracing::{debug, trace, warn};

use crate::stats::StatsRecorder;
use crate::{
    DispatchConfig, EncoderError, EncoderResult, EncoderStats, NativeEncoder, PacketBuffer,
    SessionHandle,
};

type SharedNative = Arc<Mutex<Box<dyn NativeEncoder>>>;

/// Observable dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// No encode outstanding
    Idle,
    /// A request has claimed the dispatcher and is being handed off
    Submitting,
    /// The native call has been issued and has not reported back, or
    /// timed out and is still running
    InFlight,
    /// The native call succeeded; packets are waiting to be harvested
    Completing,
}

#[derive(Debug, Clone, Copy)]
struct Flight {
    job: u64,
    started: Instant,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Submitting,
    InFlight(Flight),
    Completing,
    Abandoned(u64),
}

struct Job {
    id: u64,
    surface: SurfaceRef,
    force_key_frame: bool,
}

struct Completion {
    job: u64,
    result: EncoderResult<()>,
    elapsed: Duration,
}

/// Per-session encode worker
struct Worker {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(handle: SessionHandle, native: SharedNative) -> EncoderResult<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<Completion>();

        let thread = std::thread::Builder::new()
            .name(format!("encode-{}", handle.raw()))
            .spawn(move || Self::run(handle, native, job_rx, done_tx))
            .map_err(|e| {
                EncoderError::ResourceExhausted(format!("failed to spawn encode worker: {e}"))
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            thread: Some(thread),
        })
    }

    fn run(
        handle: SessionHandle,
        native: SharedNative,
        jobs: Receiver<Job>,
        done: Sender<Completion>,
    ) {
        debug!("Encode worker for session {} started", handle);

        for job in jobs.iter() {
            let start = Instant::now();
            let result = native.lock().encode(job.surface, job.force_key_frame);

            let completion = Completion {
                job: job.id,
                result,
                elapsed: start.elapsed(),
            };
            if done.send(completion).is_err() {
                break;
            }
        }

        debug!("Encode worker for session {} stopped", handle);
    }

    fn send(&self, job: Job) -> EncoderResult<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| EncoderError::Internal("encode worker already stopped".to_string()))?;

        jobs.send(job)
            .map_err(|_| EncoderError::Internal("encode worker is not running".to_string()))
    }

    /// Close the job queue and wait for the outstanding call, if any
    fn stop(&mut self) {
        self.jobs.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Encode worker panicked");
            }
        }
    }
}

/// Gates submission of frames to one native encoder
pub(crate) struct Dispatcher {
    handle: SessionHandle,
    native: SharedNative,
    phase: Mutex<Phase>,
    next_job: AtomicU64,
    worker: Option<Worker>,
    timeout: Option<Duration>,
    stats: Mutex<StatsRecorder>,
}

impl Dispatcher {
    pub fn new(
        handle: SessionHandle,
        native: Box<dyn NativeEncoder>,
        config: &DispatchConfig,
    ) -> EncoderResult<Self> {
        let native: SharedNative = Arc::new(Mutex::new(native));

        let worker = if config.multithreaded {
            Some(Worker::spawn(handle, native.clone())?)
        } else {
            None
        };

        Ok(Self {
            handle,
            native,
            phase: Mutex::new(Phase::Idle),
            next_job: AtomicU64::new(0),
            worker,
            timeout: config.submit_timeout(),
            stats: Mutex::new(StatsRecorder::default()),
        })
    }

    pub fn state(&self) -> DispatchState {
        match *self.phase.lock() {
            Phase::Idle => DispatchState::Idle,
            Phase::Submitting => DispatchState::Submitting,
            Phase::InFlight(_) | Phase::Abandoned(_) => DispatchState::InFlight,
            Phase::Completing => DispatchState::Completing,
        }
    }

    pub fn is_multithreaded(&self) -> bool {
        self.worker.is_some()
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats.lock().snapshot()
    }

    /// Hand one frame to the native encoder.
    ///
    /// Fails with [`EncoderError::EncodeInProgress`] unless the dispatcher is
    /// idle. In synchronous mode the native result is returned directly; in
    /// multithreaded mode `Ok` means the worker accepted the job.
    pub fn submit(&self, surface: SurfaceRef, force_key_frame: bool) -> EncoderResult<()> {
        let flight = {
            let mut phase = self.phase.lock();
            if !matches!(*phase, Phase::Idle) {
                drop(phase);
                self.stats.lock().dropped();
                return Err(EncoderError::EncodeInProgress);
            }
            *phase = Phase::Submitting;

            Flight {
                job: self.next_job.fetch_add(1, Ordering::Relaxed),
                started: Instant::now(),
            }
        };

        self.stats.lock().submitted(force_key_frame);
        *self.phase.lock() = Phase::InFlight(flight);

        match &self.worker {
            Some(worker) => {
                let job = Job {
                    id: flight.job,
                    surface,
                    force_key_frame,
                };

                if let Err(e) = worker.send(job) {
                    *self.phase.lock() = Phase::Idle;
                    self.stats.lock().failed();
                    return Err(e);
                }

                trace!(session = %self.handle, job = flight.job, "Encode job queued");
                Ok(())
            }
            None => {
                let result = self.native.lock().encode(surface, force_key_frame);
                self.finish_flight(flight.job, result, flight.started.elapsed())
            }
        }
    }

    /// Drain worker completions and expire a stalled flight.
    ///
    /// Returns the errors to surface to the caller, oldest first.
    pub fn poll(&self) -> Vec<EncoderError> {
        let mut errors = Vec::new();

        if let Some(worker) = &self.worker {
            loop {
                match worker.completions.try_recv() {
                    Ok(completion) => {
                        if self.settle_abandoned(completion.job) {
                            continue;
                        }
                        if !self.is_current(completion.job) {
                            debug!(
                                session = %self.handle,
                                job = completion.job,
                                "Discarding late encode completion"
                            );
                            continue;
                        }

                        if let Err(e) =
                            self.finish_flight(completion.job, completion.result, completion.elapsed)
                        {
                            errors.push(e);
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        let mut phase = self.phase.lock();
                        if matches!(*phase, Phase::InFlight(_) | Phase::Abandoned(_)) {
                            *phase = Phase::Idle;
                            errors.push(EncoderError::Internal(
                                "encode worker stopped unexpectedly".to_string(),
                            ));
                        }
                        break;
                    }
                }
            }
        }

        if let Some(limit) = self.timeout {
            let mut phase = self.phase.lock();
            if let Phase::InFlight(flight) = *phase {
                if flight.started.elapsed() >= limit {
                    *phase = Phase::Abandoned(flight.job);
                    self.stats.lock().failed();
                    warn!(
                        session = %self.handle,
                        job = flight.job,
                        "Encode timed out after {} ms",
                        limit.as_millis()
                    );
                    errors.push(EncoderError::Timeout(limit));
                }
            }
        }

        errors
    }

    /// Copy the native output queue into `buffer`, starting a new cycle.
    ///
    /// Never harvests while a call is outstanding: the cycle comes back
    /// empty instead. A successful harvest returns the dispatcher to idle.
    pub fn harvest(&self, buffer: &mut PacketBuffer) -> usize {
        let mut phase = self.phase.lock();
        if matches!(
            *phase,
            Phase::Submitting | Phase::InFlight(_) | Phase::Abandoned(_)
        ) {
            buffer.clear();
            return 0;
        }

        // A timed-out call can still be holding the encoder
        let Some(mut native) = self.native.try_lock() else {
            debug!(session = %self.handle, "Native encoder busy, skipping harvest");
            buffer.clear();
            return 0;
        };
        let chunks = native.copy_encoded_data();
        drop(native);

        let count = buffer.replace(chunks);
        *phase = Phase::Idle;
        drop(phase);

        self.stats.lock().harvested(count, buffer.total_bytes());
        count
    }

    /// Take back a timed-out call, dropping its output. `false` if `job`
    /// is not the abandoned one.
    fn settle_abandoned(&self, job: u64) -> bool {
        let mut phase = self.phase.lock();
        if !matches!(*phase, Phase::Abandoned(abandoned) if abandoned == job) {
            return false;
        }

        let discarded = self.native.lock().copy_encoded_data();
        *phase = Phase::Idle;
        debug!(
            session = %self.handle,
            job,
            packets = discarded.len(),
            "Timed-out encode returned, discarding its output"
        );
        true
    }

    fn is_current(&self, job: u64) -> bool {
        matches!(*self.phase.lock(), Phase::InFlight(flight) if flight.job == job)
    }

    fn finish_flight(
        &self,
        job: u64,
        result: EncoderResult<()>,
        elapsed: Duration,
    ) -> EncoderResult<()> {
        let mut phase = self.phase.lock();
        let current = matches!(*phase, Phase::InFlight(flight) if flight.job == job);

        match result {
            Ok(()) => {
                self.stats.lock().encoded(elapsed);
                if current {
                    *phase = Phase::Completing;
                }
                Ok(())
            }
            Err(e) => {
                self.stats.lock().failed();
                if current {
                    *phase = Phase::Idle;
                }
                Err(e)
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Blocks until an outstanding native call returns
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }

        let mut native = self.native.lock();
        if let Err(e) = native.finish() {
            warn!("Failed to end stream for session {}: {}", self.handle, e);
        }

        let trailing = native.copy_encoded_data();
        if !trailing.is_empty() {
            debug!(
                session = %self.handle,
                packets = trailing.len(),
                "Discarding packets produced at end of stream"
            );
        }
    }
}
