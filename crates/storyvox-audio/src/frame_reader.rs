use super::ring_buffer::AudioConsumer;

/// A variable-sized chunk of raw capture samples with a reconstructed
/// monotonic timestamp.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub samples: Vec<i16>,
    pub timestamp_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Drains the capture ring buffer and reconstructs per-chunk timestamps
/// from the running sample count.
pub struct FrameReader {
    consumer: AudioConsumer,
    sample_rate: u32,
    channels: u16,
    samples_read: u64,
}

impl FrameReader {
    pub fn new(consumer: AudioConsumer, sample_rate: u32, channels: u16) -> Self {
        Self {
            consumer,
            sample_rate,
            channels,
            samples_read: 0,
        }
    }

    /// Read whatever is available, up to `max_samples`. Returns `None` when
    /// the ring buffer is empty.
    pub fn read_chunk(&mut self, max_samples: usize) -> Option<RawChunk> {
        let mut buffer = vec![0i16; max_samples];
        let n = self.consumer.read(&mut buffer);
        if n == 0 {
            return None;
        }
        buffer.truncate(n);

        // Timestamp of the first sample in this chunk, in stream time
        let frames_read = self.samples_read / u64::from(self.channels.max(1));
        let timestamp_ms = frames_read * 1000 / u64::from(self.sample_rate);
        self.samples_read += n as u64;

        Some(RawChunk {
            samples: buffer,
            timestamp_ms,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }

    pub fn available_samples(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::AudioRingBuffer;

    #[test]
    fn timestamps_advance_with_samples() {
        let rb = AudioRingBuffer::new(4096);
        let (mut producer, consumer) = rb.split();
        let mut reader = FrameReader::new(consumer, 16_000, 1);

        // 16 samples at 16kHz = 1ms
        producer.write(&vec![0i16; 16]).unwrap();
        let first = reader.read_chunk(1024).unwrap();
        assert_eq!(first.timestamp_ms, 0);
        assert_eq!(first.samples.len(), 16);

        producer.write(&vec![0i16; 16]).unwrap();
        let second = reader.read_chunk(1024).unwrap();
        assert_eq!(second.timestamp_ms, 1);
    }

    #[test]
    fn empty_buffer_yields_none() {
        let rb = AudioRingBuffer::new(64);
        let (_producer, consumer) = rb.split();
        let mut reader = FrameReader::new(consumer, 16_000, 1);
        assert!(reader.read_chunk(64).is_none());
    }
}
