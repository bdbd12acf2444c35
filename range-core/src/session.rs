//! Background detection sessions.
//!
//! The worker thread owns the [`VocalRangeEstimator`] and the spectrum
//! analyzer. Audio frames and session commands both arrive over channels and
//! are handled one at a time, so a `stop` can never interleave with a frame
//! that is halfway through `accept`.

use crate::config::EstimatorConfig;
use crate::error::Result;
use crate::fft::SpectrumAnalyzer;
use crate::range::{RangeResult, VocalRangeEstimator};
use crossbeam_channel::{Receiver, Sender, select};
use std::thread::{self, JoinHandle};

/// Messages from the session owner to the worker.
#[derive(Debug)]
pub enum SessionCommand {
    /// Start a session and acknowledge once the worker is sampling.
    Start(Sender<()>),
    /// Stop the session and send the result back on the enclosed channel.
    Stop(Sender<RangeResult>),
    Shutdown,
}

/// Caller side of a running worker. Dropping it shuts the worker down.
#[derive(Debug)]
pub struct SessionHandle {
    commands: Sender<SessionCommand>,
    thread: Option<JoinHandle<()>>,
}

/// Spawns the analysis thread.
///
/// # Arguments
/// * `config` - Estimator parameters
/// * `frame_size` - Length of each time-domain frame on `frames`
/// * `sample_rate` - Sample rate of the frames in Hz
/// * `frames` - Incoming audio frames (from capture or a synthetic source)
pub fn spawn_session_worker(
    config: EstimatorConfig,
    frame_size: usize,
    sample_rate: u32,
    frames: Receiver<Vec<f32>>,
) -> Result<SessionHandle> {
    let analyzer = SpectrumAnalyzer::new(frame_size)?;
    let (commands, command_rx) = crossbeam_channel::unbounded();
    let estimator = VocalRangeEstimator::new(config);

    let thread = thread::Builder::new()
        .name("range-session".into())
        .spawn(move || run_worker(estimator, analyzer, sample_rate, frames, command_rx))?;

    Ok(SessionHandle {
        commands,
        thread: Some(thread),
    })
}

fn run_worker(
    mut estimator: VocalRangeEstimator,
    analyzer: SpectrumAnalyzer,
    sample_rate: u32,
    frames: Receiver<Vec<f32>>,
    commands: Receiver<SessionCommand>,
) {
    let config = estimator.config();
    log::debug!(
        "Session worker started ({} samples per frame, voice band {}-{} Hz, tolerance {} Hz)",
        analyzer.frame_size(),
        config.min_voice_hz,
        config.max_voice_hz,
        config.tolerance_hz
    );
    let closed = crossbeam_channel::never();
    let mut source_open = true;
    loop {
        let source = if source_open { &frames } else { &closed };
        select! {
            recv(commands) -> command => match command {
                Ok(SessionCommand::Start(ack)) => {
                    drain_queued(&mut estimator, &analyzer, sample_rate, &frames);
                    estimator.start();
                    let _ = ack.send(());
                }
                Ok(SessionCommand::Stop(reply)) => {
                    drain_queued(&mut estimator, &analyzer, sample_rate, &frames);
                    let _ = reply.send(estimator.stop());
                }
                Ok(SessionCommand::Shutdown) | Err(_) => break,
            },
            recv(source) -> frame => match frame {
                Ok(frame) => process_frame(&mut estimator, &analyzer, sample_rate, &frame),
                Err(_) => {
                    log::debug!("Audio source closed");
                    source_open = false;
                }
            },
        }
    }
    log::debug!("Session worker finished");
}

/// Frames queued before a command belong to the session that was running
/// when they were captured.
fn drain_queued(
    estimator: &mut VocalRangeEstimator,
    analyzer: &SpectrumAnalyzer,
    sample_rate: u32,
    frames: &Receiver<Vec<f32>>,
) {
    let pending = frames.len();
    for frame in frames.try_iter().take(pending) {
        process_frame(estimator, analyzer, sample_rate, &frame);
    }
}

fn process_frame(
    estimator: &mut VocalRangeEstimator,
    analyzer: &SpectrumAnalyzer,
    sample_rate: u32,
    frame: &[f32],
) {
    match analyzer.magnitudes(frame) {
        Ok(magnitudes) => {
            if let Some(sample) = estimator.observe(&magnitudes, sample_rate) {
                log::trace!("Accepted {} ({:.1} Hz)", sample.note, sample.frequency_hz);
            }
        }
        Err(e) => log::warn!("Skipping frame: {}", e),
    }
}

impl SessionHandle {
    /// Starts (or restarts) a session and waits until the worker is
    /// sampling. Returns `false` if the worker is gone.
    pub fn start(&self) -> bool {
        let (ack, started) = crossbeam_channel::bounded(1);
        self.commands.send(SessionCommand::Start(ack)).is_ok() && started.recv().is_ok()
    }

    /// Stops the session and waits for the result. If the worker is gone the
    /// fallback result is returned.
    pub fn stop(&self) -> RangeResult {
        let (reply, result) = crossbeam_channel::bounded(1);
        if self.commands.send(SessionCommand::Stop(reply)).is_err() {
            log::warn!("Session worker is not running");
            return RangeResult::fallback();
        }
        result.recv().unwrap_or_else(|_| RangeResult::fallback())
    }

    /// Stops the worker thread and waits for it to exit.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Session worker panicked");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.join();
    }
}
