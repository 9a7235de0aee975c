//! Tier table — valid (memory, cpu) combinations and next-tier stepping.
//!
//! Each [`CpuClass`] row pairs one cpu size with the memory range valid
//! for it, on a fixed step grid. Rows are ordered by ascending cpu and
//! their memory ranges overlap; for any memory value the earliest row
//! containing it defines the optimal cpu.

use thiserror::Error;
use tracing::debug;

use memlift_core::CpuClass;

/// Valid Fargate-style cpu/memory classes, smallest first.
pub const DEFAULT_CPU_CLASSES: [CpuClass; 4] = [
    CpuClass { cpu: 512, memory_min: 1024, memory_max: 4096, step: 1024 },
    CpuClass { cpu: 1024, memory_min: 2048, memory_max: 8192, step: 1024 },
    CpuClass { cpu: 2048, memory_min: 4096, memory_max: 16384, step: 1024 },
    CpuClass { cpu: 4096, memory_min: 8192, memory_max: 30720, step: 1024 },
];

/// A concrete (memory, cpu) sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTier {
    pub memory_mb: u32,
    pub cpu_units: u32,
}

impl ResourceTier {
    pub fn new(memory_mb: u32, cpu_units: u32) -> Self {
        Self { memory_mb, cpu_units }
    }
}

/// Errors from validating a custom tier table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierTableError {
    #[error("tier table is empty")]
    Empty,

    #[error("tier row {index}: step must be greater than zero")]
    ZeroStep { index: usize },

    #[error("tier row {index}: memory_min {min} exceeds memory_max {max}")]
    InvertedRange { index: usize, min: u32, max: u32 },

    #[error("tier row {index}: cpu {cpu} is not greater than the previous row's cpu")]
    NotAscending { index: usize, cpu: u32 },
}

/// An ordered, validated tier table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    classes: Vec<CpuClass>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            classes: DEFAULT_CPU_CLASSES.to_vec(),
        }
    }
}

impl TierTable {
    /// Build a table from rows, checking ordering and ranges.
    pub fn new(classes: Vec<CpuClass>) -> Result<Self, TierTableError> {
        if classes.is_empty() {
            return Err(TierTableError::Empty);
        }
        for (index, class) in classes.iter().enumerate() {
            if class.step == 0 {
                return Err(TierTableError::ZeroStep { index });
            }
            if class.memory_min > class.memory_max {
                return Err(TierTableError::InvertedRange {
                    index,
                    min: class.memory_min,
                    max: class.memory_max,
                });
            }
            if index > 0 && class.cpu <= classes[index - 1].cpu {
                return Err(TierTableError::NotAscending {
                    index,
                    cpu: class.cpu,
                });
            }
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[CpuClass] {
        &self.classes
    }

    /// The cpu the table pairs with `memory_mb`: the earliest row whose
    /// range contains it.
    pub fn optimal_cpu(&self, memory_mb: u32) -> Option<u32> {
        self.classes
            .iter()
            .find(|c| (c.memory_min..=c.memory_max).contains(&memory_mb))
            .map(|c| c.cpu)
    }

    /// The largest sizing the table allows.
    pub fn ceiling(&self) -> ResourceTier {
        let top = self
            .classes
            .iter()
            .max_by_key(|c| (c.memory_max, c.cpu))
            .unwrap_or(&self.classes[0]);
        ResourceTier::new(top.memory_max, top.cpu)
    }

    /// Next sizing above `memory_mb`, or `None` when the ceiling is reached.
    ///
    /// `current_cpu` is accepted for logging only: the result's cpu always
    /// comes from the table, so a host provisioned with more cpu than its
    /// memory needs is brought back onto the table.
    pub fn next_tier(&self, memory_mb: u32, current_cpu: u32) -> Option<ResourceTier> {
        let next = self
            .classes
            .iter()
            .find_map(|class| next_on_grid(class, memory_mb).map(|m| ResourceTier::new(m, class.cpu)));

        match next {
            Some(tier) => {
                debug!(
                    from_memory = memory_mb,
                    from_cpu = current_cpu,
                    to_memory = tier.memory_mb,
                    to_cpu = tier.cpu_units,
                    "next tier"
                );
                Some(tier)
            }
            None => {
                debug!(memory = memory_mb, cpu = current_cpu, "tier ceiling reached");
                None
            }
        }
    }
}

/// Smallest value on `class`'s grid strictly above `memory_mb`, if it fits.
fn next_on_grid(class: &CpuClass, memory_mb: u32) -> Option<u32> {
    let candidate = if memory_mb < class.memory_min {
        class.memory_min
    } else {
        let steps = (memory_mb - class.memory_min) / class.step + 1;
        class.memory_min.checked_add(steps.checked_mul(class.step)?)?
    };
    (candidate <= class.memory_max).then_some(candidate)
}

/// Next (memory, cpu) pair over the default table.
pub fn get_next_memory_cpu_tier(current_memory: u32, current_cpu: u32) -> Option<(u32, u32)> {
    TierTable::default()
        .next_tier(current_memory, current_cpu)
        .map(|t| (t.memory_mb, t.cpu_units))
}
