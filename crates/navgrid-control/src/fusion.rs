//! Role-tagged fan-in over observation buffers.
//!
//! Every source feeds one buffer. Each buffer is registered here once, with
//! flags deciding whether its observations mark obstacles, carve free space,
//! or both. Update cycles drain the roles separately.

use navgrid_perception::observation::SharedBuffer;
use navgrid_types::Observation;

#[derive(Default)]
pub struct ObservationFusionSet {
    buffers: Vec<SharedBuffer>,
    marking: Vec<SharedBuffer>,
    clearing: Vec<SharedBuffer>,
}

impl ObservationFusionSet {
    /// Register a buffer under the given roles. A buffer registered with
    /// neither role still has its staleness clock and frame managed.
    pub fn add(&mut self, buffer: SharedBuffer, marking: bool, clearing: bool) {
        if marking {
            self.marking.push(buffer.clone());
        }
        if clearing {
            self.clearing.push(buffer.clone());
        }
        self.buffers.push(buffer);
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Drain current observations from every marking buffer.
    pub fn marking_observations(&self) -> Vec<Observation> {
        Self::collect(&self.marking)
    }

    /// Drain current observations from every clearing buffer.
    pub fn clearing_observations(&self) -> Vec<Observation> {
        Self::collect(&self.clearing)
    }

    fn collect(buffers: &[SharedBuffer]) -> Vec<Observation> {
        let mut out = Vec::new();
        for buffer in buffers {
            buffer.lock().get_observations(&mut out);
        }
        out
    }

    /// Whether every marking and clearing buffer has seen data recently
    /// enough. Buffers registered under both roles are checked per role.
    pub fn is_current(&self) -> bool {
        let mut current = true;
        for buffer in self.marking.iter().chain(&self.clearing) {
            current = buffer.lock().is_current() && current;
        }
        current
    }

    /// Restart every buffer's staleness clock, counting from now.
    pub fn reset_staleness_clocks(&self) {
        for buffer in &self.buffers {
            buffer.lock().reset_last_updated();
        }
    }

    /// Rebind every buffer to a new global frame. Only the frame label
    /// changes; already-buffered observations keep their old coordinates
    /// until they age out.
    pub fn set_global_frame(&self, frame: &str) {
        for buffer in &self.buffers {
            buffer.lock().set_global_frame(frame);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
