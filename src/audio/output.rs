//! Audio output using cpal
//!
//! Device-backed [`RenderHost`]. The cpal stream is owned by a dedicated
//! thread (cpal streams are not `Send`), which builds the device stream,
//! reports readiness back to `start()`, and keeps the stream alive until
//! stopped or until the device reports an error.

use crate::audio::host::{RenderFn, RenderHost, RenderHostFactory};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Render host backed by a system output device.
///
/// The device is acquired lazily in [`RenderHost::start`], so constructing
/// the host never fails and acquisition errors surface where playback
/// actually begins. A stream error flagged by the device marks the host
/// stopped; the next start acquires the device again.
pub struct CpalHost {
    requested_device: Option<String>,
    working_sample_rate: u32,
    running: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    error_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalHost {
    /// Create a host for the named device (None = system default) that
    /// renders at `working_sample_rate`.
    pub fn new(requested_device: Option<String>, working_sample_rate: u32) -> Self {
        Self {
            requested_device,
            working_sample_rate,
            running: Arc::new(AtomicBool::new(false)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            error_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Whether the device has flagged a stream error since the last start.
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl RenderHost for CpalHost {
    fn start(&mut self, render: RenderFn) -> Result<()> {
        if self.is_running() {
            return Err(Error::InvalidState(
                "audio stream already running".to_string(),
            ));
        }
        info!("Starting audio stream");

        // Clear leftover state from a previous run
        if let Some(handle) = self.thread.take() {
            self.stop_flag.store(true, Ordering::SeqCst);
            let _ = handle.join();
        }
        self.stop_flag.store(false, Ordering::SeqCst);
        self.error_flag.store(false, Ordering::SeqCst);

        let requested = self.requested_device.clone();
        let rate = self.working_sample_rate;
        let running = Arc::clone(&self.running);
        let stop_flag = Arc::clone(&self.stop_flag);
        let error_flag = Arc::clone(&self.error_flag);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            stream_thread(requested, rate, render, running, stop_flag, error_flag, ready_tx);
        });
        self.thread = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Audio stream started successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                if let Some(handle) = self.thread.take() {
                    let _ = handle.join();
                }
                Err(e)
            }
            Err(_) => Err(Error::EngineStart(
                "audio output thread exited before reporting readiness".to_string(),
            )),
        }
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn sample_rate(&self) -> u32 {
        self.working_sample_rate
    }
}

impl Drop for CpalHost {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens a [`CpalHost`] per graph, all targeting the same device and rate.
pub struct CpalHostFactory {
    device_name: Option<String>,
    working_sample_rate: u32,
}

impl CpalHostFactory {
    pub fn new(working_sample_rate: u32) -> Self {
        Self {
            device_name: None,
            working_sample_rate,
        }
    }

    /// Target a specific output device by name instead of the default.
    pub fn with_device(device_name: String, working_sample_rate: u32) -> Self {
        Self {
            device_name: Some(device_name),
            working_sample_rate,
        }
    }
}

impl RenderHostFactory for CpalHostFactory {
    fn open(&self) -> Box<dyn RenderHost> {
        Box::new(CpalHost::new(
            self.device_name.clone(),
            self.working_sample_rate,
        ))
    }
}

/// Body of the stream-owning thread: acquire the device, run the stream,
/// hold it alive until stopped or errored.
fn stream_thread(
    requested: Option<String>,
    rate: u32,
    render: RenderFn,
    running: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    error_flag: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<Result<()>>,
) {
    let stream = match open_stream(requested, rate, render, Arc::clone(&error_flag)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::EngineStart(format!(
            "Failed to start stream: {}",
            e
        ))));
        return;
    }

    running.store(true, Ordering::SeqCst);
    let _ = ready_tx.send(Ok(()));

    // The stream runs on its own; this thread just keeps it alive.
    while !stop_flag.load(Ordering::SeqCst) && !error_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    if error_flag.load(Ordering::SeqCst) {
        warn!("Audio stream errored, releasing device");
    }

    drop(stream);
    running.store(false, Ordering::SeqCst);
    info!("Audio stream stopped");
}

/// Acquire the output device and build a stream for it.
///
/// Falls back to the default device when the requested one is missing.
fn open_stream(
    requested: Option<String>,
    rate: u32,
    render: RenderFn,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream> {
    let host = cpal::default_host();

    let device = if let Some(name) = requested.as_ref() {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::EngineStart(format!("Failed to enumerate devices: {}", e)))?;

        match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
            Some(dev) => {
                info!("Found requested audio device: {}", name);
                dev
            }
            None => {
                warn!(
                    "Requested device '{}' not found, falling back to default device",
                    name
                );
                host.default_output_device().ok_or_else(|| {
                    Error::EngineStart(format!(
                        "Device '{}' not found and no default device available",
                        name
                    ))
                })?
            }
        }
    } else {
        host.default_output_device()
            .ok_or_else(|| Error::EngineStart("No default output device found".to_string()))?
    };

    debug!(
        "Using audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let (config, sample_format) = pick_config(&device, rate)?;
    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, render, error_flag),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, render, error_flag),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, render, error_flag),
        other => Err(Error::EngineStart(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }
}

/// Pick a supported configuration at the working sample rate.
///
/// Prefers stereo f32. The working rate is not negotiable: every loaded
/// item was resampled to it, so a device that cannot render at that rate
/// is an error rather than a silent pitch shift.
fn pick_config(device: &Device, rate: u32) -> Result<(StreamConfig, SampleFormat)> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::EngineStart(format!("Failed to get device configs: {}", e)))?
        .filter(|c| c.min_sample_rate().0 <= rate && c.max_sample_rate().0 >= rate)
        .collect();

    let preferred = configs
        .iter()
        .find(|c| c.channels() == 2 && c.sample_format() == SampleFormat::F32)
        .or_else(|| configs.iter().find(|c| c.channels() == 2))
        .or_else(|| configs.first());

    match preferred {
        Some(supported) => {
            let sample_format = supported.sample_format();
            let config = supported.with_sample_rate(cpal::SampleRate(rate)).config();
            Ok((config, sample_format))
        }
        None => Err(Error::EngineStart(format!(
            "Audio device does not support {} Hz output",
            rate
        ))),
    }
}

/// Build the output stream for one sample format.
///
/// The render callback produces interleaved stereo f32; each device frame
/// is then written in the device's own channel layout and sample type.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut render: RenderFn,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                if scratch.len() < frames * 2 {
                    scratch.resize(frames * 2, 0.0);
                }
                let buf = &mut scratch[..frames * 2];
                buf.fill(0.0);
                render(buf);

                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    write_frame(frame, buf[i * 2], buf[i * 2 + 1]);
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::EngineStart(format!("Failed to build stream: {}", e)))?;

    Ok(stream)
}

/// Write one stereo sample pair into a device frame of any channel count.
///
/// Mono devices get a downmix; extra channels beyond stereo stay silent.
fn write_frame<T>(frame: &mut [T], left: f32, right: f32)
where
    T: SizedSample + FromSample<f32>,
{
    let left = left.clamp(-1.0, 1.0);
    let right = right.clamp(-1.0, 1.0);

    if frame.len() == 1 {
        frame[0] = T::from_sample((left + right) * 0.5);
        return;
    }

    frame[0] = T::from_sample(left);
    frame[1] = T::from_sample(right);
    for sample in frame.iter_mut().skip(2) {
        *sample = T::EQUILIBRIUM;
    }
}
