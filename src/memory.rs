use sysinfo::System;

// Spec'd driver default: one billion 4-byte item slots.
pub const DEFAULT_MAX_ITEMS_IN_RAM: u64 = 1_000_000_000;
pub const DEFAULT_MAX_ITEM_ID: u32 = 8_000_000;

const MIN_ITEMS_IN_RAM: u64 = 1_000_000;

/// RAM budget for the engines, counted in 4-byte item occurrences.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudget {
    pub max_items_in_ram: u64,
}

impl MemoryBudget {
    pub fn fixed(max_items_in_ram: u64) -> Self {
        MemoryBudget { max_items_in_ram }
    }

    /// Derives a budget from system RAM, targeting 75% of total memory
    /// at 4 bytes per retained item.
    pub fn from_system() -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let total_memory = sys.total_memory();
        let target_memory = (total_memory / 4) * 3;
        let max_items_in_ram = (target_memory / 4).max(MIN_ITEMS_IN_RAM);

        eprintln!(
            "[memory] total system RAM: {} MB",
            total_memory / 1_048_576
        );
        eprintln!(
            "[memory] target usage: {} MB (75%), item budget: {}",
            target_memory / 1_048_576,
            max_items_in_ram
        );

        MemoryBudget { max_items_in_ram }
    }
}
