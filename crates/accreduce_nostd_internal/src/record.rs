//! Defines the per-voxel accumulator record and its double precision twin.
//!
//! A record holds [`N_FIELDS`] vector-valued quantities (the current
//! densities `jx`, `jy`, `jz`), each with [`N_LANES`] single precision lanes.
//! Upstream code keeps one copy of every record per thread (or replica) so
//! that particles can be deposited without write contention. Those copies
//! are later combined with the reduction implemented in this crate.

/// The number of vector-valued fields in an [`AccumulatorRecord`]
pub const N_FIELDS: usize = 3;

/// The number of lanes in each field of an [`AccumulatorRecord`]
pub const N_LANES: usize = 4;

/// A single voxel's accumulator.
///
/// The layout is `#[repr(C)]` and 16-byte aligned so that a contiguous run of
/// records can be moved around as one block by a transfer engine.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AccumulatorRecord {
    pub fields: [[f32; N_LANES]; N_FIELDS],
}

impl AccumulatorRecord {
    pub const fn zeroed() -> Self {
        AccumulatorRecord {
            fields: [[0.0; N_LANES]; N_FIELDS],
        }
    }

    /// Create a record where every lane of every field holds `value`
    pub const fn splat(value: f32) -> Self {
        AccumulatorRecord {
            fields: [[value; N_LANES]; N_FIELDS],
        }
    }

    pub fn jx(&self) -> &[f32; N_LANES] {
        &self.fields[0]
    }

    pub fn jy(&self) -> &[f32; N_LANES] {
        &self.fields[1]
    }

    pub fn jz(&self) -> &[f32; N_LANES] {
        &self.fields[2]
    }

    /// iterate over every scalar in the record (field-major order)
    pub fn scalars(&self) -> impl Iterator<Item = f32> + '_ {
        self.fields.iter().flat_map(|field| field.iter().copied())
    }
}

/// Double precision counterpart of [`AccumulatorRecord`].
///
/// This only ever lives in scratch memory while a block is being summed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WideRecord {
    pub fields: [[f64; N_LANES]; N_FIELDS],
}

impl WideRecord {
    pub const fn zeroed() -> Self {
        WideRecord {
            fields: [[0.0; N_LANES]; N_FIELDS],
        }
    }

    /// overwrite `self` with the promoted values of `record`
    #[inline(always)]
    pub fn assign_promoted(&mut self, record: &AccumulatorRecord) {
        for (wide, narrow) in self.fields.iter_mut().zip(record.fields.iter()) {
            for k in 0..N_LANES {
                wide[k] = narrow[k] as f64;
            }
        }
    }

    /// add the promoted values of `record` to `self`
    #[inline(always)]
    pub fn add_promoted(&mut self, record: &AccumulatorRecord) {
        for (wide, narrow) in self.fields.iter_mut().zip(record.fields.iter()) {
            for k in 0..N_LANES {
                wide[k] += narrow[k] as f64;
            }
        }
    }

    /// round every lane to the nearest single precision value
    #[inline(always)]
    pub fn demote(&self) -> AccumulatorRecord {
        let mut out = AccumulatorRecord::zeroed();
        for (narrow, wide) in out.fields.iter_mut().zip(self.fields.iter()) {
            for k in 0..N_LANES {
                narrow[k] = wide[k] as f32;
            }
        }
        out
    }
}
