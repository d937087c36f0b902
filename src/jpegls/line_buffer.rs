//! Line buffers shared by the scan encoder and decoder.
//!
//! Each line keeps one extra sample on both sides: index 0 holds the left edge
//! (`Ra` of the first pixel) and index `width + 1` the right edge (`Rd` of the last pixel).

use crate::InterleaveMode;
use crate::error::JpeglsError;

#[derive(Debug, Clone, Copy)]
pub struct LineLayout {
    width: usize,
    component_count: usize,
    interleave_mode: InterleaveMode,
}

impl LineLayout {
    pub fn new(width: usize, component_count: usize, interleave_mode: InterleaveMode) -> Self {
        Self {
            width,
            component_count,
            interleave_mode,
        }
    }

    pub fn buffer_size(&self) -> usize {
        (self.width + 2) * self.component_count
    }

    /// Position of component `component` of pixel `x` in a line buffer.
    pub fn index(&self, x: usize, component: usize) -> usize {
        if self.interleave_mode == InterleaveMode::Sample {
            (x + 1) * self.component_count + component
        } else {
            component * (self.width + 2) + x + 1
        }
    }

    /// Number of regions coded one after the other per line, and the number of
    /// components coded together as one pixel inside a region.
    pub fn regions(&self) -> (usize, usize) {
        if self.interleave_mode == InterleaveMode::Sample {
            (1, self.component_count)
        } else {
            (self.component_count, 1)
        }
    }

    pub fn region_size(&self) -> usize {
        self.buffer_size() / self.regions().0
    }
}

pub fn allocate_line(size: usize) -> Result<Vec<i32>, JpeglsError> {
    let mut line = Vec::new();
    line.try_reserve_exact(size)?;
    line.resize(size, 0);
    Ok(line)
}

/// Sets the edge samples used for prediction at both ends of a line (A.2.1).
pub fn initialize_edges(
    previous: &mut [i32],
    current: &mut [i32],
    width: usize,
    pixel_size: usize,
) {
    for component in 0..pixel_size {
        previous[(width + 1) * pixel_size + component] = previous[width * pixel_size + component];
        current[component] = previous[pixel_size + component];
    }
}
