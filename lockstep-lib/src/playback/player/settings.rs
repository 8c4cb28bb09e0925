use crate::playback::settings::PipelineSettings;

use super::Player;

impl Player {
    /// Replace every pipeline setting at once.
    pub fn set_pipeline_settings(&self, settings: PipelineSettings) {
        let settings = settings.sanitized();
        self.apply_queue_limits(&settings);
        *self.shared.settings.lock().unwrap() = settings;
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        self.shared.settings.lock().unwrap().clone()
    }

    /// Configure the combined queue size (bytes) that triggers backpressure.
    pub fn set_max_queue_bytes(&self, bytes: usize) {
        let mut settings = self.shared.settings.lock().unwrap();
        settings.max_queue_bytes = bytes;
    }

    /// Configure the packet count a queue must exceed to count as buffered.
    pub fn set_min_queued_packets(&self, packets: usize) {
        let mut settings = self.shared.settings.lock().unwrap();
        settings.min_queued_packets = packets;
        self.apply_queue_limits(&settings);
    }

    /// Configure the duration (seconds) a queue must exceed to count as
    /// buffered.
    pub fn set_min_queued_seconds(&self, seconds: f64) {
        let mut settings = self.shared.settings.lock().unwrap();
        settings.min_queued_seconds = seconds.max(0.0);
        self.apply_queue_limits(&settings);
    }

    /// Configure the demux retry interval (ms). Clamped to at least 1 ms.
    pub fn set_poll_interval_ms(&self, ms: u64) {
        let mut settings = self.shared.settings.lock().unwrap();
        settings.poll_interval_ms = ms.max(1);
    }

    /// Configure the frame spacing (seconds) assumed for streams that do not
    /// report one. Applies to the next source.
    pub fn set_default_frame_interval(&self, seconds: f64) {
        if !seconds.is_finite() || seconds <= 0.0 {
            return;
        }
        let mut settings = self.shared.settings.lock().unwrap();
        settings.default_frame_interval = seconds;
    }

    fn apply_queue_limits(&self, settings: &PipelineSettings) {
        for queue in [&self.shared.video, &self.shared.audio] {
            queue.set_limits(settings.min_queued_packets, settings.min_queued_seconds);
        }
    }
}
