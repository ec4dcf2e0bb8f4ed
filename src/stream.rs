//! Executable reference of the chunked streaming convention.
//!
//! Generated bindings implement the same arithmetic in their own language.
//! This module is what the tests check the convention against: chunk
//! offsets, padding of the last chunk, short writes and out-of-sync detection.

use std::fmt;

/// Framing error of a chunked transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A stream with a chunk capacity of zero can never make progress
    CapacityZero,
    /// More items than the length element can describe
    TooLong { length: usize, max: usize },
    /// A chunk arrived with an offset other than the running length
    OutOfSync { expected: usize, actual: usize },
    /// The total length changed while a stream was being reassembled
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::CapacityZero => write!(f, "Chunk capacity must be greater than zero"),
            StreamError::TooLong { length, max } => {
                write!(f, "Stream length {} exceeds maximum of {}", length, max)
            }
            StreamError::OutOfSync { expected, actual } => write!(
                f,
                "Stream is out-of-sync: expected chunk offset {}, got {}",
                expected, actual
            ),
            StreamError::LengthMismatch { expected, actual } => write!(
                f,
                "Stream length changed from {} to {} during transfer",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for StreamError {}

/// One chunk of a planned transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Offset of the first item, `index * capacity`
    pub offset: usize,
    /// Items taken from the stream
    pub length: usize,
    /// Zero items appended to fill the chunk to capacity
    pub padding: usize,
}

impl Chunk {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Split of a stream of `total` items into chunks of `capacity` items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    capacity: usize,
}

impl ChunkPlan {
    pub fn new(total: usize, capacity: usize, max_length: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::CapacityZero);
        }
        if total > max_length {
            return Err(StreamError::TooLong {
                length: total,
                max: max_length,
            });
        }
        Ok(Self { total, capacity })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of chunks sent; an empty stream still sends one chunk
    pub fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.capacity).max(1)
    }

    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.chunk_count()).map(move |index| {
            let offset = index * self.capacity;
            let length = self.total.saturating_sub(offset).min(self.capacity);
            Chunk {
                index,
                offset,
                length,
                padding: self.capacity - length,
            }
        })
    }
}

/// Send `data` chunk by chunk
///
/// `send` receives each chunk padded to capacity and returns the number of
/// items the device accepted. With `short_write` the transfer stops at the
/// first chunk that was not fully accepted and the total accepted count is
/// returned; otherwise the whole stream is sent and its length returned.
pub fn write_stream<T, F>(
    data: &[T],
    capacity: usize,
    max_length: usize,
    short_write: bool,
    mut send: F,
) -> Result<usize, StreamError>
where
    T: Clone + Default,
    F: FnMut(&Chunk, Vec<T>) -> usize,
{
    let plan = ChunkPlan::new(data.len(), capacity, max_length)?;
    let mut written = 0;

    for chunk in plan.chunks() {
        let mut items = data[chunk.offset..chunk.end()].to_vec();
        items.resize(capacity, T::default());

        let accepted = send(&chunk, items);

        if short_write {
            written += accepted.min(chunk.length);
            if accepted < capacity {
                break;
            }
        }
    }

    Ok(if short_write { written } else { data.len() })
}

/// Outcome of feeding one chunk into a [`StreamReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadProgress<T> {
    /// More chunks are needed
    Incomplete,
    /// The stream is complete
    Complete(Vec<T>),
    /// The device reported that there is no data
    NoData,
}

/// Reassembles a device-to-host stream from its chunks
#[derive(Debug, Clone)]
pub struct StreamReader<T> {
    capacity: usize,
    /// Chunk offset value meaning "no data", the maximum of the offset type
    no_data_offset: Option<usize>,
    total: Option<usize>,
    data: Vec<T>,
}

impl<T: Clone> StreamReader<T> {
    pub fn new(capacity: usize, no_data_offset: Option<usize>) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::CapacityZero);
        }
        Ok(Self {
            capacity,
            no_data_offset,
            total: None,
            data: Vec::new(),
        })
    }

    pub fn is_idle(&self) -> bool {
        self.total.is_none()
    }

    /// Drop a partially reassembled stream
    pub fn reset(&mut self) {
        self.total = None;
        self.data.clear();
    }

    /// Feed a chunk carrying `total`, `offset` and up to `capacity` items
    ///
    /// An out-of-sync chunk resets the reader and returns an error; the next
    /// chunk with offset 0 starts a new stream.
    pub fn push(&mut self, total: usize, offset: usize, chunk: &[T]) -> Result<ReadProgress<T>, StreamError> {
        if self.is_idle() && Some(offset) == self.no_data_offset {
            return Ok(ReadProgress::NoData);
        }

        let expected = self.data.len();
        if offset != expected {
            self.reset();
            return Err(StreamError::OutOfSync {
                expected,
                actual: offset,
            });
        }

        match self.total {
            None => self.total = Some(total),
            Some(known) if known != total => {
                self.reset();
                return Err(StreamError::LengthMismatch {
                    expected: known,
                    actual: total,
                });
            }
            Some(_) => {}
        }

        let take = total.saturating_sub(offset).min(self.capacity).min(chunk.len());
        self.data.extend_from_slice(&chunk[..take]);

        if self.data.len() >= total {
            self.total = None;
            Ok(ReadProgress::Complete(std::mem::take(&mut self.data)))
        } else {
            Ok(ReadProgress::Incomplete)
        }
    }
}

/// Chunks that still follow the one at `offset`, to be drained after an
/// out-of-sync error so the next read starts on a fresh stream
pub fn remaining_chunks(total: usize, offset: usize, capacity: usize) -> usize {
    if capacity == 0 {
        return 0;
    }
    total.saturating_sub(offset + capacity).div_ceil(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_full_chunks() {
        let plan = ChunkPlan::new(118, 59, 118).unwrap();
        let chunks: Vec<Chunk> = plan.chunks().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].offset, chunks[0].length), (0, 59));
        assert_eq!((chunks[1].offset, chunks[1].length), (59, 59));
        assert!(chunks.iter().all(|c| c.padding == 0));
    }

    #[test]
    fn test_last_chunk_padded() {
        let plan = ChunkPlan::new(100, 59, 118).unwrap();
        let last = plan.chunks().last().unwrap();
        assert_eq!(last.offset, 59);
        assert_eq!(last.length, 41);
        assert_eq!(last.padding, 18);
    }

    #[test]
    fn test_empty_stream_sends_one_chunk() {
        let plan = ChunkPlan::new(0, 59, 118).unwrap();
        let chunks: Vec<Chunk> = plan.chunks().collect();
        assert_eq!(chunks, vec![Chunk { index: 0, offset: 0, length: 0, padding: 59 }]);
    }

    #[test]
    fn test_chunks_never_exceed_total() {
        for total in 0..=300 {
            let plan = ChunkPlan::new(total, 59, 300).unwrap();
            for chunk in plan.chunks() {
                assert_eq!(chunk.offset, chunk.index * 59);
                assert!(chunk.end() <= total);
            }
        }
    }

    #[test]
    fn test_too_long_rejected() {
        assert_eq!(
            ChunkPlan::new(119, 59, 118),
            Err(StreamError::TooLong { length: 119, max: 118 })
        );
        assert_eq!(ChunkPlan::new(1, 0, 118), Err(StreamError::CapacityZero));
    }

    #[test]
    fn test_write_stream_pads_chunks() {
        let data: Vec<u8> = (1..=70).collect();
        let mut sent = Vec::new();
        let written = write_stream(&data, 60, 65535, false, |chunk, items| {
            sent.push((chunk.offset, items));
            60
        })
        .unwrap();
        assert_eq!(written, 70);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].0, 60);
        assert_eq!(sent[1].1.len(), 60);
        assert_eq!(sent[1].1[9], 70);
        assert!(sent[1].1[10..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_short_write_stops_early() {
        let data = vec![b'x'; 150];
        let mut calls = 0;
        let written = write_stream(&data, 60, 65535, true, |_, _| {
            calls += 1;
            if calls == 2 { 25 } else { 60 }
        })
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(written, 85);
    }

    #[test]
    fn test_reader_reassembles() {
        let mut reader = StreamReader::new(59, Some(65535)).unwrap();
        let first: Vec<u8> = (0..59).collect();
        let second: Vec<u8> = (59..118).collect();
        assert_eq!(reader.push(118, 0, &first).unwrap(), ReadProgress::Incomplete);
        match reader.push(118, 59, &second).unwrap() {
            ReadProgress::Complete(data) => assert_eq!(data, (0..118).collect::<Vec<u8>>()),
            other => panic!("unexpected {:?}", other),
        }
        assert!(reader.is_idle());
    }

    #[test]
    fn test_reader_detects_out_of_sync() {
        let mut reader = StreamReader::new(59, None).unwrap();
        let chunk = vec![0u8; 59];
        assert_eq!(
            reader.push(118, 59, &chunk),
            Err(StreamError::OutOfSync { expected: 0, actual: 59 })
        );
        reader.push(177, 0, &chunk).unwrap();
        assert_eq!(
            reader.push(177, 118, &chunk),
            Err(StreamError::OutOfSync { expected: 59, actual: 118 })
        );
        assert!(reader.is_idle());
    }

    #[test]
    fn test_reader_no_data_sentinel() {
        let mut reader: StreamReader<u8> = StreamReader::new(59, Some(65535)).unwrap();
        assert_eq!(reader.push(0, 65535, &[]).unwrap(), ReadProgress::NoData);
    }

    #[test]
    fn test_reader_length_change() {
        let mut reader = StreamReader::new(4, None).unwrap();
        reader.push(8, 0, &[1u8, 2, 3, 4]).unwrap();
        assert_eq!(
            reader.push(9, 4, &[5, 6, 7, 8]),
            Err(StreamError::LengthMismatch { expected: 8, actual: 9 })
        );
    }

    #[test]
    fn test_remaining_chunks() {
        assert_eq!(remaining_chunks(118, 0, 59), 1);
        assert_eq!(remaining_chunks(118, 59, 59), 0);
        assert_eq!(remaining_chunks(200, 0, 59), 3);
    }
}
