//! Sample segment façade: chunked storage plus envelope pyramid behind one lock.

use std::mem;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::envelope::{
    DEFAULT_LEVEL_COUNT, DEFAULT_SCALE_POWER, EnvelopePyramid, EnvelopeSection, LevelInfo,
};
use crate::error::{Error, Result};
use crate::logic::{self, SchmittTrigger};
use crate::storage::{ChunkedBuffer, MAX_CHUNK_SIZE};
use crate::util::{deinterleave, time_stride};

mod events;
mod iter;

pub use events::{ListenerId, SegmentEvent};
pub use iter::SampleIterator;

use events::Listeners;

/// Options controlling [`Segment`] construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentOptions {
    /// Samples per second.
    pub samplerate: f64,
    /// Acquisition time of the first sample, in seconds.
    pub start_time: f64,
    /// Upper bound for a single storage chunk in bytes.
    pub max_chunk_bytes: usize,
    /// Base-2 logarithm of the envelope scale factor.
    pub scale_power: u32,
    /// Number of envelope levels.
    pub level_count: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            samplerate: 1.0,
            start_time: 0.0,
            max_chunk_bytes: MAX_CHUNK_SIZE,
            scale_power: DEFAULT_SCALE_POWER,
            level_count: DEFAULT_LEVEL_COUNT,
        }
    }
}

/// Builder for [`Segment`].
pub struct SegmentBuilder {
    id: u32,
    options: SegmentOptions,
}

impl SegmentBuilder {
    /// Creates a builder for the segment with the given identifier.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            options: SegmentOptions::default(),
        }
    }

    /// Overrides segment options wholesale.
    pub fn options(mut self, options: SegmentOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the samplerate in samples per second.
    pub fn samplerate(mut self, samplerate: f64) -> Self {
        self.options.samplerate = samplerate;
        self
    }

    /// Sets the acquisition time of the first sample.
    pub fn start_time(mut self, start_time: f64) -> Self {
        self.options.start_time = start_time;
        self
    }

    /// Caps the size of a single storage chunk.
    pub fn max_chunk_bytes(mut self, bytes: usize) -> Self {
        self.options.max_chunk_bytes = bytes;
        self
    }

    /// Sets the envelope scale factor to `2^power`.
    pub fn scale_power(mut self, power: u32) -> Self {
        self.options.scale_power = power;
        self
    }

    /// Sets the number of envelope levels.
    pub fn level_count(mut self, count: usize) -> Self {
        self.options.level_count = count;
        self
    }

    /// Builds the segment, validating options before returning the instance.
    pub fn build(self) -> Result<Segment> {
        Segment::with_options(self.id, self.options)
    }
}

/// Result of a [`Segment::free_unused_memory`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Storage was compacted right away.
    Compacted {
        /// Bytes handed back to the allocator.
        released_bytes: usize,
    },
    /// Iterators are outstanding; the last one to end performs the compaction.
    Deferred,
    /// The segment is still accepting samples, nothing was done.
    Skipped,
}

/// Point-in-time resource usage of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentStats {
    /// Committed samples.
    pub sample_count: u64,
    /// Allocated storage chunks.
    pub chunk_count: usize,
    /// Capacity of a full chunk in bytes.
    pub chunk_size: usize,
    /// Bytes held by sample chunks.
    pub sample_bytes: usize,
    /// Bytes held by envelope levels.
    pub envelope_bytes: usize,
    /// Iterators currently alive.
    pub outstanding_iterators: usize,
    /// Compactions performed so far.
    pub compactions: u64,
}

#[derive(Debug)]
struct SegmentState {
    samples: ChunkedBuffer<f32>,
    envelope: EnvelopePyramid,
    samplerate: f64,
    time_stride: f64,
    iterators: usize,
    compaction_pending: bool,
    compactions: u64,
}

impl SegmentState {
    fn compact(&mut self) -> usize {
        let released = self.samples.compact();
        self.compactions += 1;
        released
    }
}

/// One continuous run of analog samples for a single channel.
///
/// A single producer appends while any number of readers query samples and envelopes through a
/// shared reference, typically an `Arc<Segment>`.
#[derive(Debug)]
pub struct Segment {
    id: u32,
    start_time: f64,
    state: Mutex<SegmentState>,
    sample_count: AtomicU64,
    complete: AtomicBool,
    listeners: Listeners,
    #[cfg(feature = "async")]
    progress: tokio::sync::watch::Sender<crate::async_support::SegmentProgress>,
}

impl Segment {
    fn with_options(id: u32, options: SegmentOptions) -> Result<Self> {
        let stride = time_stride(options.samplerate)?;
        if !options.start_time.is_finite() {
            return Err(Error::config(format!(
                "start time must be finite, got {}",
                options.start_time
            )));
        }
        let envelope = EnvelopePyramid::new(options.level_count, options.scale_power)?;
        let samples = ChunkedBuffer::new(options.max_chunk_bytes, envelope.scale_factor())?;
        debug!(
            id,
            samplerate = options.samplerate,
            chunk_size = samples.chunk_size(),
            scale_factor = envelope.scale_factor(),
            levels = envelope.level_count(),
            "created segment"
        );
        Ok(Self {
            id,
            start_time: options.start_time,
            state: Mutex::new(SegmentState {
                samples,
                envelope,
                samplerate: options.samplerate,
                time_stride: stride,
                iterators: 0,
                compaction_pending: false,
                compactions: 0,
            }),
            sample_count: AtomicU64::new(0),
            complete: AtomicBool::new(false),
            listeners: Listeners::default(),
            #[cfg(feature = "async")]
            progress: tokio::sync::watch::Sender::new(Default::default()),
        })
    }

    /// Creates a segment with default options and the given samplerate.
    pub fn new(id: u32, samplerate: f64) -> Result<Self> {
        Self::builder(id).samplerate(samplerate).build()
    }

    /// Starts building a segment with the given identifier.
    pub fn builder(id: u32) -> SegmentBuilder {
        SegmentBuilder::new(id)
    }

    /// Segment identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Acquisition time of the first sample, in seconds.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Bytes per stored sample.
    pub fn unit_size(&self) -> usize {
        mem::size_of::<f32>()
    }

    /// Samples per second.
    pub fn samplerate(&self) -> f64 {
        self.state.lock().samplerate
    }

    /// Seconds between consecutive samples.
    pub fn time_stride(&self) -> f64 {
        self.state.lock().time_stride
    }

    /// Changes the samplerate, recomputing the time stride.
    pub fn set_samplerate(&self, samplerate: f64) -> Result<()> {
        let stride = time_stride(samplerate)?;
        let mut state = self.state.lock();
        state.samplerate = samplerate;
        state.time_stride = stride;
        Ok(())
    }

    /// Envelope scale factor.
    pub fn scale_factor(&self) -> usize {
        self.state.lock().envelope.scale_factor()
    }

    /// Number of samples readable right now.
    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::Acquire)
    }

    /// Returns `true` if no samples have been committed.
    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    /// Returns `true` once [`Segment::mark_complete`] has been called.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Appends samples and brings the envelope up to date.
    ///
    /// The new sample count becomes visible only after storage and envelope are consistent with
    /// it. On failure nothing observable changes.
    pub fn append(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let (start, end, bounds) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.samples.is_closed() {
                warn!(id = self.id, "append rejected on completed segment");
                return Err(Error::Completed);
            }
            let start = state.samples.len();
            let end = start + samples.len() as u64;

            state.envelope.reserve(end)?;
            state.samples.append(samples)?;
            let widened = state.envelope.extend(&state.samples, end)?;
            self.sample_count.store(end, Ordering::Release);

            (start, end, widened.then(|| state.envelope.bounds()))
        };

        self.emit(SegmentEvent::SamplesAdded { start, end });
        if let Some(pair) = bounds {
            self.emit(SegmentEvent::MinMaxChanged {
                min: pair.min,
                max: pair.max,
            });
        }
        Ok(())
    }

    /// Appends `count` samples taken from `data` every `stride` values.
    pub fn append_interleaved(&self, data: &[f32], count: usize, stride: usize) -> Result<()> {
        let mut samples = Vec::new();
        deinterleave(data, count, stride, &mut samples)?;
        self.append(&samples)
    }

    /// Marks the segment complete. Returns `false` if it already was.
    ///
    /// Completion closes the storage for writing but leaves its memory alone; call
    /// [`Segment::free_unused_memory`] to release the unused tail of the last chunk.
    pub fn mark_complete(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.samples.is_closed() {
                return false;
            }
            state.samples.close();
            self.complete.store(true, Ordering::Release);
        }
        debug!(id = self.id, samples = self.sample_count(), "segment complete");
        self.emit(SegmentEvent::Completed);
        true
    }

    /// Returns the sample at `index`.
    pub fn sample(&self, index: u64) -> Result<f32> {
        let count = self.sample_count();
        if index >= count {
            return Err(Error::out_of_range(index, count));
        }
        self.state.lock().samples.sample_at(index)
    }

    /// Copies the samples in `range`.
    pub fn samples(&self, range: Range<u64>) -> Result<Vec<f32>> {
        let len = self.checked_len(&range)?;
        let mut out = Vec::new();
        out.try_reserve_exact(len)
            .map_err(|err| Error::alloc(len * mem::size_of::<f32>(), err))?;
        out.resize(len, 0.0);
        self.state.lock().samples.read_range(range.start, &mut out)?;
        Ok(out)
    }

    /// Fills `dest` with the samples starting at `start`.
    pub fn samples_into(&self, start: u64, dest: &mut [f32]) -> Result<()> {
        self.checked_len(&(start..start.saturating_add(dest.len() as u64)))?;
        self.state.lock().samples.read_range(start, dest)
    }

    /// Copies the samples in `range` as little-endian IEEE-754 bytes.
    pub fn raw_bytes(&self, range: Range<u64>) -> Result<Bytes> {
        let len = self.checked_len(&range)?;
        let mut out = BytesMut::with_capacity(len * self.unit_size());
        let state = self.state.lock();
        for piece in state.samples.slices(range) {
            for &value in piece {
                out.put_f32_le(value);
            }
        }
        Ok(out.freeze())
    }

    fn checked_len(&self, range: &Range<u64>) -> Result<usize> {
        let count = self.sample_count();
        if range.start > range.end || range.end > count {
            return Err(Error::range(format!(
                "samples {}..{} outside 0..{count}",
                range.start, range.end
            )));
        }
        usize::try_from(range.end - range.start)
            .map_err(|_| Error::range("sample range exceeds addressable memory"))
    }

    /// Smallest and largest sample appended so far, or `None` before the first sample.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let bounds = self.state.lock().envelope.bounds();
        (!bounds.is_empty()).then_some((bounds.min, bounds.max))
    }

    /// Smallest sample appended so far.
    pub fn min_value(&self) -> Option<f32> {
        self.min_max().map(|(min, _)| min)
    }

    /// Largest sample appended so far.
    pub fn max_value(&self) -> Option<f32> {
        self.min_max().map(|(_, max)| max)
    }

    /// Returns the envelope covering `range` from the coarsest level whose pairs summarise no
    /// more than `min_resolution` samples, scaled to the level above the raw data.
    pub fn envelope_section(
        &self,
        range: Range<u64>,
        min_resolution: f32,
    ) -> Result<EnvelopeSection> {
        let count = self.sample_count();
        let state = self.state.lock();
        state
            .envelope
            .query(range, min_resolution, count, state.time_stride)
    }

    /// Describes every envelope level.
    pub fn envelope_levels(&self) -> SmallVec<[LevelInfo; DEFAULT_LEVEL_COUNT]> {
        let state = self.state.lock();
        state.envelope.levels(state.time_stride)
    }

    /// Starts a sequential traversal at `start`.
    pub fn iter(&self, start: u64) -> Result<SampleIterator<'_>> {
        SampleIterator::begin(self, start)
    }

    /// Releases the unused tail of the last chunk of a completed segment.
    ///
    /// With iterators outstanding the request is recorded and performed by the last iterator to
    /// end.
    pub fn free_unused_memory(&self) -> CompactionOutcome {
        let mut state = self.state.lock();
        if !state.samples.is_closed() {
            return CompactionOutcome::Skipped;
        }
        if state.iterators > 0 {
            state.compaction_pending = true;
            debug!(
                id = self.id,
                iterators = state.iterators,
                "compaction deferred until iterators end"
            );
            return CompactionOutcome::Deferred;
        }
        let released_bytes = state.compact();
        CompactionOutcome::Compacted { released_bytes }
    }

    /// Converts `range` to logic levels: `1` where a sample is at or above `threshold`.
    pub fn logic_via_threshold(&self, range: Range<u64>, threshold: f32) -> Result<Vec<u8>> {
        let len = self.checked_len(&range)?;
        let mut out = Vec::with_capacity(len);
        let state = self.state.lock();
        for piece in state.samples.slices(range) {
            logic::threshold(piece, threshold, &mut out);
        }
        Ok(out)
    }

    /// Converts `range` to logic levels through `trigger`, which carries its state across calls.
    pub fn logic_via_schmitt_trigger(
        &self,
        range: Range<u64>,
        trigger: &mut SchmittTrigger,
    ) -> Result<Vec<u8>> {
        let len = self.checked_len(&range)?;
        let mut out = Vec::with_capacity(len);
        let state = self.state.lock();
        for piece in state.samples.slices(range) {
            trigger.feed(piece, &mut out);
        }
        Ok(out)
    }

    /// Bytes held by sample chunks and envelope levels.
    pub fn memory_usage(&self) -> usize {
        let state = self.state.lock();
        state.samples.memory_usage() + state.envelope.memory_usage()
    }

    /// Current resource usage.
    pub fn stats(&self) -> SegmentStats {
        let state = self.state.lock();
        SegmentStats {
            sample_count: self.sample_count(),
            chunk_count: state.samples.chunk_count(),
            chunk_size: state.samples.chunk_size(),
            sample_bytes: state.samples.memory_usage(),
            envelope_bytes: state.envelope.memory_usage(),
            outstanding_iterators: state.iterators,
            compactions: state.compactions,
        }
    }

    /// Registers a listener invoked synchronously, on the calling thread, for every event.
    ///
    /// Listeners run without the segment lock or the listener registry held, so they may read
    /// from the segment and subscribe or unsubscribe listeners, themselves included.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SegmentEvent) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn emit(&self, event: SegmentEvent) {
        self.listeners.emit(&event);
        #[cfg(feature = "async")]
        self.publish_progress();
    }

    #[cfg(feature = "async")]
    pub(crate) fn progress_sender(
        &self,
    ) -> &tokio::sync::watch::Sender<crate::async_support::SegmentProgress> {
        &self.progress
    }

    #[cfg(feature = "async")]
    fn publish_progress(&self) {
        let progress = crate::async_support::SegmentProgress {
            sample_count: self.sample_count(),
            complete: self.is_complete(),
            bounds: self.min_max(),
        };
        self.progress.send_replace(progress);
    }

    fn release_iterator(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.iterators > 0);
        state.iterators = state.iterators.saturating_sub(1);
        if state.iterators == 0 && state.compaction_pending {
            state.compaction_pending = false;
            let released = state.compact();
            debug!(id = self.id, released, "ran deferred compaction");
        }
    }
}
