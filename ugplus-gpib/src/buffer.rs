//! Buffered byte stream over a chunked USB IN endpoint.

use std::{collections::VecDeque, time::Duration};

use crate::{BulkPort, error::Error};

/// Accumulates the chunks delivered by a USB IN endpoint into a byte queue
/// and serves exact-length reads from it.
///
/// A single bulk transfer may deliver more bytes than the current frame
/// needs; the excess stays queued for the next call. The buffer never issues
/// more chunk reads than required to satisfy the outstanding request.
pub(crate) struct TransportBuffer {
    queue: VecDeque<u8>,
}

impl TransportBuffer {
    pub(crate) fn new() -> TransportBuffer {
        TransportBuffer {
            queue: VecDeque::new(),
        }
    }

    /// Number of received bytes not yet handed out.
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Discards everything queued. Used to resynchronize after a device-error
    /// reply.
    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }

    /// Removes and returns the first `count` bytes in arrival order, pulling
    /// chunks from `port` until enough are queued.
    ///
    /// A timeout with nothing queued is reported as [`Error::Timeout`] (the
    /// adapter never started answering); a timeout with a partial frame
    /// queued is reported as [`Error::TruncatedReply`], and the partial bytes
    /// stay queued.
    pub(crate) fn read_exact<P: BulkPort>(
        &mut self,
        port: &mut P,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, Error> {
        while self.queue.len() < count {
            let mut chunk = vec![0u8; port.max_chunk_size()];
            log::debug!(
                "Reading up to {} bytes from the adapter ({} of {} buffered)",
                chunk.len(),
                self.queue.len(),
                count
            );
            let received = match port.read_chunk(&mut chunk, timeout) {
                Ok(received) => received,
                Err(rusb::Error::Timeout) => {
                    return Err(if self.queue.is_empty() {
                        Error::Timeout
                    } else {
                        Error::TruncatedReply {
                            received: self.queue.len(),
                            expected: count,
                        }
                    });
                }
                Err(other) => return Err(Error::Usb(other)),
            };
            self.queue.extend(&chunk[..received]);
        }
        log::trace!("Transport buffer: {:02x?}", self.queue);
        Ok(self.queue.drain(..count).collect())
    }
}

#[cfg(test)]
mod test {
    use std::{collections::VecDeque, time::Duration};

    use super::TransportBuffer;
    use crate::{BulkPort, error::Error};

    const TIMEOUT: Duration = Duration::from_millis(10);

    /// Endpoint double that hands out pre-arranged chunks and counts reads.
    struct ChunkPort {
        chunks: VecDeque<Vec<u8>>,
        reads: usize,
    }

    impl ChunkPort {
        fn new(chunks: &[&[u8]]) -> ChunkPort {
            ChunkPort {
                chunks: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
                reads: 0,
            }
        }
    }

    impl BulkPort for ChunkPort {
        fn max_chunk_size(&self) -> usize {
            64
        }

        fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> rusb::Result<usize> {
            self.reads += 1;
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(rusb::Error::Timeout),
            }
        }

        fn write_all(&mut self, _bytes: &[u8], _timeout: Duration) -> rusb::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn chunk_accounting_for_long_frame() {
        // A 130-byte frame arrives in full 64-byte chunks. Serving it must
        // take exactly 3 chunk reads, with the 62 surplus bytes queued.
        let pattern: Vec<u8> = (0..=255u8).collect();
        let mut port = ChunkPort::new(&[
            &pattern[0..64],
            &pattern[64..128],
            &pattern[128..192],
            &pattern[192..256],
        ]);
        let mut buffer = TransportBuffer::new();

        let data = buffer.read_exact(&mut port, 130, TIMEOUT).unwrap();
        assert_eq!(data, &pattern[..130]);
        assert_eq!(port.reads, 3);
        assert_eq!(buffer.len(), 62);

        // The surplus is served without touching the endpoint again.
        let rest = buffer.read_exact(&mut port, 62, TIMEOUT).unwrap();
        assert_eq!(rest, &pattern[130..192]);
        assert_eq!(port.reads, 3);
    }

    #[test]
    fn timeout_with_nothing_received() {
        let mut port = ChunkPort::new(&[]);
        let mut buffer = TransportBuffer::new();
        match buffer.read_exact(&mut port, 1, TIMEOUT) {
            Err(Error::Timeout) => {}
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn timeout_mid_frame_keeps_partial_bytes() {
        let mut port = ChunkPort::new(&[&[1, 2, 3]]);
        let mut buffer = TransportBuffer::new();
        match buffer.read_exact(&mut port, 8, TIMEOUT) {
            Err(Error::TruncatedReply { received, expected }) => {
                assert_eq!(received, 3);
                assert_eq!(expected, 8);
            }
            other => panic!("expected TruncatedReply, got {other:?}"),
        }
        // The partial bytes are not consumed by the failed call.
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.read_exact(&mut port, 3, TIMEOUT).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn clear_discards_surplus() {
        let mut port = ChunkPort::new(&[&[1, 2, 3, 4]]);
        let mut buffer = TransportBuffer::new();
        buffer.read_exact(&mut port, 1, TIMEOUT).unwrap();
        assert_eq!(buffer.len(), 3);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
