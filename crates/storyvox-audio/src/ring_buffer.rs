use rtrb::{Consumer, Producer, RingBuffer};
use tracing::warn;

use storyvox_foundation::AudioError;

/// Lock-free SPSC ring buffer between the cpal callback thread and the
/// chunker task. rtrb is real-time safe: the producer side never allocates
/// or blocks inside the audio callback.
pub struct AudioRingBuffer {
    producer: Producer<i16>,
    consumer: Consumer<i16>,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Split into halves for the capture thread and the processing task.
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the audio callback thread.
pub struct AudioProducer {
    producer: Producer<i16>,
}

impl AudioProducer {
    /// Write samples from the audio callback (non-blocking). A full buffer
    /// drops the whole chunk and reports how much was lost.
    pub fn write(&mut self, samples: &[i16]) -> Result<usize, AudioError> {
        let mut chunk = match self.producer.write_chunk(samples.len()) {
            Ok(chunk) => chunk,
            Err(_) => {
                warn!(
                    samples = samples.len(),
                    "Ring buffer overflow, dropping capture chunk"
                );
                return Err(AudioError::BufferOverflow {
                    count: samples.len(),
                });
            }
        };

        // The write may wrap around the end of the buffer
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&samples[..split]);
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..]);
        }
        chunk.commit_all();
        Ok(samples.len())
    }

    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half, owned by the chunker.
pub struct AudioConsumer {
    consumer: Consumer<i16>,
}

impl AudioConsumer {
    /// Read up to `buffer.len()` samples (non-blocking). Returns the number
    /// of samples actually read.
    pub fn read(&mut self, buffer: &mut [i16]) -> usize {
        let chunk = match self.consumer.read_chunk(buffer.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                self.consumer
                    .read_chunk(available)
                    .expect("available slots reported by rtrb")
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        buffer[..split].copy_from_slice(first);
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trip() {
        let rb = AudioRingBuffer::new(1024);
        let (mut producer, mut consumer) = rb.split();

        let samples = vec![1, 2, 3, 4, 5];
        assert_eq!(producer.write(&samples).unwrap(), 5);

        let mut buffer = vec![0i16; 10];
        let read = consumer.read(&mut buffer);

        assert_eq!(read, 5);
        assert_eq!(&buffer[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn overflow_drops_chunk_and_reports_count() {
        let rb = AudioRingBuffer::new(16);
        let (mut producer, mut _consumer) = rb.split();

        let too_big = vec![1i16; 20];
        assert!(matches!(
            producer.write(&too_big),
            Err(AudioError::BufferOverflow { count: 20 })
        ));

        let exact = vec![1i16; 16];
        assert!(producer.write(&exact).is_ok());

        let one_more = vec![2i16; 1];
        assert!(producer.write(&one_more).is_err());
    }

    #[test]
    fn partial_read_when_fewer_samples_available() {
        let rb = AudioRingBuffer::new(64);
        let (mut producer, mut consumer) = rb.split();

        producer.write(&[7i16; 3]).unwrap();
        let mut buffer = vec![0i16; 32];
        assert_eq!(consumer.read(&mut buffer), 3);
        assert_eq!(consumer.read(&mut buffer), 0);
    }
}
