//! Virtualized strip of reel slots.
//!
//! Slots are stored bottom to top. `base_y` is the lower edge of the bottom
//! slot and every other slot sits one `slot_height` above its neighbour, so a
//! slot's position is fully determined by its index. Scrolling moves
//! `base_y` down; slots that leave the bottom are dropped and `base_y` is
//! bumped by one slot so nothing else moves on screen.

use log::debug;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

/// Generation tag. Every populate call starts a new one; slots from older
/// generations are left to drain off the bottom instead of being recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SpinId(pub u32);

#[derive(Debug, Clone)]
pub struct Slot {
    pub id: SlotId,
    /// Id of the populated slot this one was (transitively) cloned from.
    pub lineage: SlotId,
    pub label: Arc<str>,
    pub is_odd: bool,
    pub spin_id: SpinId,
    pub has_been_duplicated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReelGeometry {
    pub slot_height: f32,
    pub slot_count: usize,
}

impl Default for ReelGeometry {
    fn default() -> Self {
        Self {
            slot_height: 1.0,
            slot_count: 16,
        }
    }
}

impl ReelGeometry {
    /// One trip around the drum: the visible window holds exactly one
    /// generation of slots.
    #[inline(always)]
    pub fn full_rotation(&self) -> f32 {
        self.slot_height * self.slot_count as f32
    }

    #[inline(always)]
    pub const fn view_bottom(&self) -> f32 {
        0.0
    }

    #[inline(always)]
    pub fn view_top(&self) -> f32 {
        self.view_bottom() + self.full_rotation()
    }

    /// Index within a populated generation that carries the target.
    #[inline(always)]
    pub const fn target_index(&self) -> usize {
        self.slot_count / 2
    }

    /// Lower edge of the reveal row.
    #[inline(always)]
    pub fn reveal_offset(&self) -> f32 {
        self.view_top() - self.target_index() as f32 * self.slot_height
    }
}

pub struct SegmentReel {
    geometry: ReelGeometry,
    slots: VecDeque<Slot>,
    base_y: f32,
    current_spin: SpinId,
    next_slot_id: u32,
    target_lineage: Option<SlotId>,
}

impl SegmentReel {
    pub fn new(geometry: ReelGeometry) -> Self {
        debug_assert!(geometry.slot_height > 0.0 && geometry.slot_count > 0);
        Self {
            geometry,
            slots: VecDeque::with_capacity(geometry.slot_count * 3),
            base_y: geometry.view_bottom(),
            current_spin: SpinId::default(),
            next_slot_id: 0,
            target_lineage: None,
        }
    }

    #[inline(always)]
    pub fn geometry(&self) -> &ReelGeometry {
        &self.geometry
    }

    #[cfg(test)]
    #[inline(always)]
    pub fn current_spin(&self) -> SpinId {
        self.current_spin
    }

    #[cfg(test)]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline(always)]
    fn position_of(&self, index: usize) -> f32 {
        self.base_y + index as f32 * self.geometry.slot_height
    }

    /// Slots bottom to top with the lower edge of each.
    pub fn iter(&self) -> impl Iterator<Item = (f32, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (self.position_of(i), s))
    }

    fn alloc_id(&mut self) -> SlotId {
        let id = SlotId(self.next_slot_id);
        self.next_slot_id = self.next_slot_id.wrapping_add(1);
        id
    }

    /// Parity the next slot on top must take to keep the stripes alternating.
    #[inline(always)]
    fn next_parity(&self) -> bool {
        self.slots.back().is_some_and(|s| !s.is_odd)
    }

    fn push_top(&mut self, label: Arc<str>, lineage: Option<SlotId>, spin_id: SpinId) -> SlotId {
        let id = self.alloc_id();
        let is_odd = self.next_parity();
        self.slots.push_back(Slot {
            id,
            lineage: lineage.unwrap_or(id),
            label,
            is_odd,
            spin_id,
            has_been_duplicated: false,
        });
        id
    }

    fn append_generation<S: AsRef<str>>(
        &mut self,
        labels: &[S],
        target_index: Option<usize>,
    ) -> Option<f32> {
        self.current_spin = SpinId(self.current_spin.0.wrapping_add(1));
        let spin = self.current_spin;
        let first_index = self.slots.len();
        self.target_lineage = None;

        let mut target_y = None;
        for (i, label) in labels.iter().enumerate() {
            let id = self.push_top(Arc::from(label.as_ref()), None, spin);
            if Some(i) == target_index {
                self.target_lineage = Some(id);
                target_y = Some(self.position_of(first_index + i));
            }
        }
        target_y
    }

    /// Stacks one new generation on top of whatever is on the strip and
    /// returns the current position (lower edge) of the slot at
    /// `target_index`.
    pub fn populate<S: AsRef<str>>(&mut self, labels: &[S], target_index: usize) -> f32 {
        debug_assert!(target_index < labels.len());
        self.append_generation(labels, Some(target_index))
            .unwrap_or_else(|| self.position_of(self.slots.len().saturating_sub(1)))
    }

    /// Same as `populate` with no target, for dressing an idle reel.
    pub fn populate_decoys<S: AsRef<str>>(&mut self, labels: &[S]) {
        self.append_generation(labels, None);
    }

    /// Scrolls the strip down by `delta` and recycles until the top of the
    /// view is covered again.
    pub fn advance(&mut self, delta: f32) {
        self.base_y -= delta;
        let top = self.geometry.view_top();
        while let Some(last) = self.slots.len().checked_sub(1) {
            if self.position_of(last) >= top {
                break;
            }
            if !self.recycle_pass() {
                debug!("Reel recycle pass made no progress; top of view left uncovered.");
                break;
            }
        }
    }

    /// One pass over the strip: clone current-generation slots entering the
    /// bottom row onto the top (once each), then drop slots that are fully
    /// below the view. Returns whether anything changed.
    fn recycle_pass(&mut self) -> bool {
        let h = self.geometry.slot_height;
        let bottom = self.geometry.view_bottom();
        let near_bottom = bottom + h;
        let spin = self.current_spin;

        let mut clones: Vec<(Arc<str>, SlotId, SpinId)> = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let y = self.base_y + i as f32 * h;
            if y >= near_bottom {
                break;
            }
            if !slot.has_been_duplicated && slot.spin_id == spin {
                slot.has_been_duplicated = true;
                clones.push((slot.label.clone(), slot.lineage, slot.spin_id));
            }
        }

        let mut destroyed = 0usize;
        while !self.slots.is_empty() && self.base_y + h <= bottom {
            self.slots.pop_front();
            self.base_y += h;
            destroyed += 1;
        }

        let cloned = clones.len();
        for (label, lineage, spin_id) in clones {
            self.push_top(label, Some(lineage), spin_id);
        }

        cloned > 0 || destroyed > 0
    }

    /// Slot whose row starts closest to `y`.
    pub fn slot_nearest(&self, y: f32) -> Option<(f32, &Slot)> {
        if self.slots.is_empty() {
            return None;
        }
        let h = self.geometry.slot_height;
        let idx = ((y - self.base_y) / h).round();
        let idx = idx.clamp(0.0, (self.slots.len() - 1) as f32) as usize;
        self.slots.get(idx).map(|s| (self.position_of(idx), s))
    }

    /// The copy of the target slot closest to `y`, if a target was populated.
    pub fn target_slot_nearest(&self, y: f32) -> Option<(f32, &Slot)> {
        let lineage = self.target_lineage?;
        self.iter()
            .filter(|(_, s)| s.lineage == lineage)
            .min_by(|(a, _), (b, _)| (a - y).abs().total_cmp(&(b - y).abs()))
    }

    #[cfg(test)]
    pub fn target_copies(&self) -> usize {
        self.target_lineage.map_or(0, |lineage| {
            self.slots.iter().filter(|s| s.lineage == lineage).count()
        })
    }
}
