use std::fmt::{Debug, Formatter};

/// Number of usable priority buckets. Bit 127 of the mask is reserved.
pub const MAX_PRIORITIES: usize = 127;

const COMPUTED_BIT: usize = 127;

/// Restricts which rules a find operation considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityFilter {
    /// Every rule, regardless of priority.
    #[default]
    Ignore,
    /// Only rules with this packed priority.
    Only(i32),
}

impl PriorityFilter {
    pub fn accepts(&self, priority: i32) -> bool {
        match self {
            PriorityFilter::Ignore => true,
            PriorityFilter::Only(p) => *p == priority,
        }
    }
}

/// 128-bit set of matched priorities for one group.
///
/// Bit `p` is set when a rule of packed priority `p` matched the group or
/// one of its coordinates. The top bit flags that the set has been computed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PriorityMask([u32; 4]);

impl PriorityMask {
    /// A mask with only the computed flag set.
    pub fn computed() -> Self {
        let mut mask = PriorityMask::default();
        mask.set_bit(COMPUTED_BIT);
        mask
    }

    pub fn from_words(words: [u32; 4]) -> Self {
        PriorityMask(words)
    }

    pub fn words(&self) -> [u32; 4] {
        self.0
    }

    pub fn is_computed(&self) -> bool {
        self.bit(COMPUTED_BIT)
    }

    /// Whether priority `priority` matched. Out-of-range priorities never do.
    pub fn contains(&self, priority: i32) -> bool {
        usize::try_from(priority)
            .ok()
            .filter(|p| *p < MAX_PRIORITIES)
            .is_some_and(|p| self.bit(p))
    }

    /// Marks priority `priority`. Out-of-range priorities are ignored.
    pub fn insert(&mut self, priority: i32) {
        if let Some(p) = usize::try_from(priority)
            .ok()
            .filter(|p| *p < MAX_PRIORITIES)
        {
            self.set_bit(p);
        }
    }

    /// Matched priorities in ascending order.
    pub fn priorities(&self) -> Vec<i32> {
        (0..MAX_PRIORITIES)
            .filter(|p| self.bit(*p))
            .map(|p| p as i32)
            .collect()
    }

    fn bit(&self, index: usize) -> bool {
        self.0[index / 32] & (1u32 << (index % 32)) != 0
    }

    fn set_bit(&mut self, index: usize) {
        self.0[index / 32] |= 1u32 << (index % 32);
    }
}

impl Debug for PriorityMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PriorityMask({:08x} {:08x} {:08x} {:08x})",
            self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}
