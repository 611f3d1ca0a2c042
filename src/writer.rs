//! Buffered map stack to time-series writer
//!
//! Maps are read one timestep at a time, their missing cells are replaced by
//! the container's fill value and they are collected in a [`BufferWindow`].
//! The window is written to the container in one bulk operation whenever it
//! fills up, and once more at the end for any remaining timesteps, so memory
//! stays bounded by `capacity x rows x cols` cells however long the stack is.
//!
//! Windows are aligned on the container's time axis: slot `s` lives at buffer
//! position `s % capacity`, and a window is written when slot
//! `k * capacity - 1` has been stored.

use crate::container::{NetcdfStore, SeriesStore, VariableSpec};
use crate::errors::{Result, RuNeStackError};
use crate::geometry::GridGeometry;
use crate::raster::{mapstack_file_name, truncate_prefix, RasterSource};
use chrono::NaiveDateTime;
use ndarray::{s, Array2, Array3};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Number of timesteps buffered before a write
pub const DEFAULT_BUFFER_CAPACITY: usize = 600;

/// Fixed-capacity block of consecutive timesteps awaiting a write
#[derive(Debug)]
pub struct BufferWindow {
    data: Array3<f32>,
    /// Slots stored since the last flush, always inside one aligned window
    pending: Option<RangeInclusive<usize>>,
}

impl BufferWindow {
    /// Allocate a window of `capacity` grids shaped like `geometry`.
    pub fn new(capacity: usize, geometry: &GridGeometry) -> Result<Self> {
        if capacity == 0 {
            return Err(RuNeStackError::InvalidBufferCapacity { capacity });
        }
        Ok(Self {
            data: Array3::zeros((capacity, geometry.rows, geometry.cols)),
            pending: None,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.dim().0
    }

    /// Slots waiting to be written
    pub fn pending(&self) -> Option<RangeInclusive<usize>> {
        self.pending.clone()
    }

    /// Whether `slot` can join the pending run without a flush first: it
    /// must directly follow the last pending slot inside the same window.
    pub fn accepts(&self, slot: usize) -> bool {
        match &self.pending {
            None => true,
            Some(run) => slot == run.end() + 1 && slot / self.capacity() == run.start() / self.capacity(),
        }
    }

    /// Store `grid` for `slot`. Returns `true` when the slot closes its
    /// window and the buffer should be flushed.
    ///
    /// Callers must flush first when [`BufferWindow::accepts`] is false.
    pub fn store(&mut self, slot: usize, grid: &Array2<f32>) -> bool {
        let capacity = self.capacity();
        debug_assert!(self.accepts(slot));

        self.data.slice_mut(s![slot % capacity, .., ..]).assign(grid);
        self.pending = Some(match self.pending.take() {
            Some(run) => *run.start()..=slot,
            None => slot..=slot,
        });
        (slot + 1) % capacity == 0
    }

    /// Write the pending slots to `store` in one block and empty the window.
    pub fn flush<S: SeriesStore>(&mut self, store: &mut S, variable: &str) -> Result<()> {
        let Some(run) = self.pending.take() else {
            return Ok(());
        };
        let capacity = self.capacity();
        let first = *run.start();
        let last = *run.end();
        let block = self
            .data
            .slice(s![first % capacity..=last % capacity, .., ..]);

        debug!(
            "Writing buffer for '{}': slots {}..={} ({} timesteps)",
            variable,
            first,
            last,
            last - first + 1
        );
        store.write_block(variable, first, block)
    }
}

/// Writes map stacks into a container with a bounded buffer
pub struct SeriesWriter<'a, R: RasterSource> {
    source: &'a R,
    geometry: GridGeometry,
    buffer_capacity: usize,
}

impl<'a, R: RasterSource> SeriesWriter<'a, R> {
    /// Writer reading maps through `source`, expecting every map to have the
    /// lattice of `geometry`.
    pub fn new(source: &'a R, geometry: GridGeometry) -> Self {
        Self {
            source,
            geometry,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Maximum number of timesteps held in memory
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Append the stack `prefix` in `source_dir` as variable `spec` to the
    /// container at `container_path`, then close the container.
    ///
    /// The `n`-th timestamp (1-based) is read from
    /// [`mapstack_file_name`]`(prefix, n)`.
    ///
    /// # Errors
    ///
    /// Fails on the first map that cannot be read, on a timestamp missing
    /// from the container's time axis and on any container I/O error.
    pub fn write_series(
        &self,
        source_dir: &Path,
        prefix: &str,
        container_path: &Path,
        spec: &VariableSpec,
        timestamps: &[NaiveDateTime],
        deflate_level: u8,
    ) -> Result<()> {
        let mut store = NetcdfStore::append(container_path)?.with_deflate_level(deflate_level);
        self.write_series_to(&mut store, source_dir, prefix, spec, timestamps)?;
        store.close()
    }

    /// Same as [`SeriesWriter::write_series`] against any [`SeriesStore`].
    pub fn write_series_to<S: SeriesStore>(
        &self,
        store: &mut S,
        source_dir: &Path,
        prefix: &str,
        spec: &VariableSpec,
        timestamps: &[NaiveDateTime],
    ) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(RuNeStackError::InvalidBufferCapacity { capacity: 0 });
        }
        let capacity = self.buffer_capacity.min(timestamps.len()).max(1);
        let prefix = truncate_prefix(prefix);
        info!(
            "Converting map stack '{}' to variable '{}' ({} timesteps, buffer of {})",
            prefix,
            spec.name,
            timestamps.len(),
            capacity
        );

        let slots = store.time_axis()?.slot_lookup()?;
        let fill = store.prepare_variable(spec)?;
        let mut window = BufferWindow::new(capacity, &self.geometry)?;

        for (index, &timestamp) in timestamps.iter().enumerate() {
            let path = map_path(source_dir, prefix, index + 1);
            let slot = *slots
                .get(&timestamp)
                .ok_or_else(|| RuNeStackError::TimestampNotInContainer {
                    timestamp,
                    path: path.clone(),
                })?;

            let grid = self
                .source
                .read(&path)
                .inspect_err(|e| error!("Cannot read {}: {}", path.display(), e))?;
            self.geometry.check_shape(&path, grid.data.dim())?;
            debug!("Adding time: {} from {}", timestamp, path.display());
            let data = grid.into_filled(fill);

            if !window.accepts(slot) {
                window.flush(store, &spec.name)?;
            }
            if window.store(slot, &data) {
                window.flush(store, &spec.name)?;
            }
        }

        // Tail that did not fill a whole window
        window.flush(store, &spec.name)
    }
}

fn map_path(source_dir: &Path, prefix: &str, step: usize) -> PathBuf {
    source_dir.join(mapstack_file_name(prefix, step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{TimeAxis, TimeEncoding};
    use crate::raster::Grid;
    use chrono::{Duration, NaiveDate};
    use ndarray::ArrayView3;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const NODATA: f32 = -999.0;

    fn geometry() -> GridGeometry {
        GridGeometry::from_geo_transform([0.0, 1.0, 0.0, 2.0, 0.0, -1.0], 2, 2)
    }

    fn days(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid timestamp");
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    /// Serves a grid per file name whose cells all equal the step number;
    /// cell (0, 0) of every map is missing.
    struct SyntheticStack {
        reads: RefCell<Vec<String>>,
    }

    impl SyntheticStack {
        fn new() -> Self {
            Self {
                reads: RefCell::new(Vec::new()),
            }
        }
    }

    fn step_of(name: &str) -> f32 {
        let (stem, ext) = name.split_once('.').expect("map stack name has extension");
        let thousands: usize = stem
            .trim_start_matches(|c: char| !c.is_ascii_digit())
            .parse()
            .unwrap_or(0);
        let below: usize = ext.parse().expect("numeric extension");
        (thousands * 1000 + below) as f32
    }

    impl RasterSource for SyntheticStack {
        fn read(&self, path: &Path) -> Result<Grid> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let mut data = Array2::from_elem((2, 2), step_of(&name));
            data[[0, 0]] = NODATA;
            self.reads.borrow_mut().push(name);
            Ok(Grid {
                geometry: geometry(),
                data,
                nodata: Some(NODATA),
            })
        }
    }

    /// In-memory store recording every block written
    struct MemoryStore {
        axis: TimeAxis,
        slots: HashMap<usize, Array2<f32>>,
        writes: Vec<(usize, usize)>,
        write_counts: HashMap<usize, usize>,
    }

    impl MemoryStore {
        fn new(timestamps: &[NaiveDateTime]) -> Self {
            Self {
                axis: TimeAxis::encode(timestamps, TimeEncoding::default()),
                slots: HashMap::new(),
                writes: Vec::new(),
                write_counts: HashMap::new(),
            }
        }
    }

    impl SeriesStore for MemoryStore {
        fn time_axis(&self) -> Result<TimeAxis> {
            Ok(self.axis.clone())
        }

        fn prepare_variable(&mut self, _spec: &VariableSpec) -> Result<f32> {
            Ok(-9999.0)
        }

        fn write_block(&mut self, _variable: &str, first_slot: usize, block: ArrayView3<f32>) -> Result<()> {
            let steps = block.dim().0;
            self.writes.push((first_slot, steps));
            for i in 0..steps {
                let slot = first_slot + i;
                *self.write_counts.entry(slot).or_default() += 1;
                self.slots.insert(slot, block.slice(s![i, .., ..]).to_owned());
            }
            Ok(())
        }
    }

    fn run(capacity: usize, timestamps: &[NaiveDateTime], store: &mut MemoryStore) -> Result<()> {
        let source = SyntheticStack::new();
        SeriesWriter::new(&source, geometry())
            .with_buffer_capacity(capacity)
            .write_series_to(store, Path::new("inmaps"), "P", &VariableSpec::new("P", "mm"), timestamps)
    }

    #[test]
    fn every_slot_is_written_exactly_once() {
        for capacity in 1..=7 {
            for len in 1..=20 {
                let stamps = days(len);
                let mut store = MemoryStore::new(&stamps);
                run(capacity, &stamps, &mut store).unwrap();

                for slot in 0..len {
                    assert_eq!(
                        store.write_counts.get(&slot),
                        Some(&1),
                        "capacity {capacity}, length {len}, slot {slot}"
                    );
                }
                assert_eq!(store.write_counts.len(), len);
            }
        }
    }

    #[test]
    fn tail_is_flushed_after_full_windows() {
        let stamps = days(5);
        let mut store = MemoryStore::new(&stamps);
        run(2, &stamps, &mut store).unwrap();
        assert_eq!(store.writes, vec![(0, 2), (2, 2), (4, 1)]);
    }

    #[test]
    fn capacity_larger_than_series_is_clamped() {
        let stamps = days(3);
        let mut store = MemoryStore::new(&stamps);
        run(600, &stamps, &mut store).unwrap();
        assert_eq!(store.writes, vec![(0, 3)]);
    }

    #[test]
    fn grids_land_in_their_slots_with_fill_value() {
        let stamps = days(4);
        let mut store = MemoryStore::new(&stamps);
        run(3, &stamps, &mut store).unwrap();

        for slot in 0..4 {
            let grid = &store.slots[&slot];
            assert_eq!(grid[[0, 0]], -9999.0);
            assert_eq!(grid[[1, 1]], (slot + 1) as f32);
        }
    }

    #[test]
    fn slots_follow_the_container_axis_not_the_step_number() {
        // The container starts two days before the stack
        let axis = days(8);
        let stack = &axis[2..7];
        let mut store = MemoryStore::new(&axis);
        run(4, stack, &mut store).unwrap();

        // slots 2..=3 close the first aligned window, 4..=6 are the tail
        assert_eq!(store.writes, vec![(2, 2), (4, 3)]);
        assert!(!store.slots.contains_key(&0));
        assert!(!store.slots.contains_key(&1));
        assert!(!store.slots.contains_key(&7));
        // map n = 1 goes to slot 2
        assert_eq!(store.slots[&2][[1, 1]], 1.0);
        assert_eq!(store.slots[&6][[1, 1]], 5.0);
    }

    #[test]
    fn reads_maps_in_stack_order_with_truncated_prefix() {
        let stamps = days(3);
        let mut store = MemoryStore::new(&stamps);
        let source = SyntheticStack::new();
        SeriesWriter::new(&source, geometry())
            .with_buffer_capacity(2)
            .write_series_to(
                &mut store,
                Path::new("inmaps"),
                "PRECIPITATION",
                &VariableSpec::new("P", "mm"),
                &stamps,
            )
            .unwrap();
        assert_eq!(
            *source.reads.borrow(),
            vec!["PRECIPIT0.001", "PRECIPIT0.002", "PRECIPIT0.003"]
        );
    }

    #[test]
    fn timestamp_outside_axis_is_an_error() {
        let axis = days(2);
        let stamps = days(3);
        let mut store = MemoryStore::new(&axis);
        let result = run(2, &stamps, &mut store);
        assert!(matches!(
            result,
            Err(RuNeStackError::TimestampNotInContainer { .. })
        ));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let stamps = days(2);
        let mut store = MemoryStore::new(&stamps);
        assert!(matches!(
            run(0, &stamps, &mut store),
            Err(RuNeStackError::InvalidBufferCapacity { capacity: 0 })
        ));
    }

    #[test]
    fn window_flushes_before_a_gap() {
        let mut window = BufferWindow::new(4, &geometry()).unwrap();
        let grid = Array2::from_elem((2, 2), 1.0);
        assert!(!window.store(0, &grid));
        assert!(window.accepts(1));
        assert!(!window.accepts(2));
        assert!(!window.accepts(4));
        assert_eq!(window.pending(), Some(0..=0));
    }
}
