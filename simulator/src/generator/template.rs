use std::f32::consts::PI;

/// Generates a simple sine waveform.
pub fn sine_wave(length: usize, frequency: f32) -> Vec<f32> {
    (0..length)
        .map(|i| ((i as f32 * frequency) / length as f32 * 2.0 * PI).sin())
        .collect()
}

/// Stand-in for a microphone: a tone whose loudness swells and fades so
/// the wind it drives sweeps back and forth.
#[derive(Debug, Clone)]
pub struct SyntheticMic {
    buffer_len: usize,
    peak: f32,
    swell_frames: u32,
    frame: u32,
}

impl SyntheticMic {
    pub fn new(buffer_len: usize, peak: f32, swell_frames: u32) -> Self {
        Self {
            buffer_len: buffer_len.max(1),
            peak,
            swell_frames: swell_frames.max(1),
            frame: 0,
        }
    }

    /// Samples for the next frame.
    pub fn next_buffer(&mut self) -> Vec<f32> {
        let phase = self.frame as f32 / self.swell_frames as f32 * 2.0 * PI;
        let envelope = 0.5 * (1.0 - phase.cos());
        self.frame = (self.frame + 1) % self.swell_frames;
        sine_wave(self.buffer_len, 8.0)
            .into_iter()
            .map(|sample| sample * self.peak * envelope)
            .collect()
    }
}

impl Default for SyntheticMic {
    fn default() -> Self {
        // Peak amplitude 0.14 puts the RMS at ~0.1, the top of the wind range.
        Self::new(256, 0.14, 600)
    }
}
