use crate::PerceptionError;

/// Streaming speech recognition.
///
/// Each call to [`start`](SpeechTranscriber::start) opens an independent
/// recognition session.
pub trait SpeechTranscriber: Send + Sync {
    fn readiness(&self) -> Result<(), PerceptionError> {
        Ok(())
    }

    /// Opens a recognition session for PCM16 mono audio at `sample_rate`.
    fn start(&self, sample_rate: u32) -> Result<Box<dyn TranscriptStream>, PerceptionError>;
}

/// One recognition session.
pub trait TranscriptStream: Send {
    /// Feeds PCM16 little-endian samples.
    fn accept_audio_chunk(&mut self, pcm: &[u8]) -> Result<(), PerceptionError>;

    /// Best hypothesis so far. Empty when nothing has been recognized.
    fn partial_text(&self) -> String;

    /// Flushes the decoder and returns the final transcript.
    fn final_text(&mut self) -> Result<String, PerceptionError>;
}
