pub mod calibrator;
pub mod capture;
pub mod chunker;
pub mod encoder;
pub mod frame_reader;
pub mod recorder;
pub mod ring_buffer;

pub use calibrator::{CalibrationConfig, NoiseCalibration, NoiseCalibrator};
pub use capture::{CaptureThread, DeviceConfig};
pub use chunker::{AudioFrame, ChunkerConfig, FrameChunker};
pub use encoder::{EncoderConfig, FrameEncoder};
pub use frame_reader::FrameReader;
pub use recorder::{Recorder, RecorderState};
pub use ring_buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
