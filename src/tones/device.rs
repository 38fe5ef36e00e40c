//! Tone playback on the default output device (requires alsa-lib-devel on Linux)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tinyaudio::prelude::*;

use super::{ToneKind, TonePlayer, ToneSynth};

const SAMPLE_RATE: usize = 44100;

#[derive(Default)]
pub struct DeviceTonePlayer {
    /// Stop flag of the tone currently playing
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl TonePlayer for DeviceTonePlayer {
    fn start(&self, kind: ToneKind) {
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(stop.clone());

        // The device lives on its own thread so the caller never blocks on audio
        std::thread::spawn(move || {
            let mut synth = ToneSynth::new(kind, SAMPLE_RATE as u32);
            let params = OutputDeviceParameters {
                channels_count: 1,
                sample_rate: SAMPLE_RATE,
                channel_sample_count: 1024,
            };

            match run_output_device(params, move |data| synth.fill(data)) {
                Ok(device) => {
                    while !stop.load(Ordering::Relaxed) {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    drop(device);
                }
                Err(e) => tracing::warn!("Failed to open audio output for {:?} tone: {}", kind, e),
            }
        });
    }

    fn stop(&self) {
        if let Some(stop) = self.current.lock().unwrap_or_else(|e| e.into_inner()).take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}
