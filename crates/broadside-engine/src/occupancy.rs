//! Ship occupancy: which grid cells a fleet covers.
//!
//! Placement validation here is best-effort. A placement that starts off
//! the grid, wraps past the end of its row, or runs off the bottom is
//! skipped on its own; the rest of the fleet is still counted. Ships may
//! overlap; the union simply absorbs the shared cells.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use broadside_protocol::ShipPlacement;

/// Width and height of the square grid.
pub const GRID_SIZE: usize = 10;

/// Number of cells on the grid. Valid cell indices are `0..CELL_COUNT`.
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// Length used for ships the catalog does not know.
const FALLBACK_LENGTH: usize = 1;

/// Resolves a ship id to the number of cells the ship covers.
pub trait ShipCatalog: Send + Sync + 'static {
    /// Returns the ship's length, or `None` if the id is unknown.
    fn ship_length(&self, ship_id: u64) -> Option<usize>;
}

impl<C: ShipCatalog + ?Sized> ShipCatalog for Arc<C> {
    fn ship_length(&self, ship_id: u64) -> Option<usize> {
        (**self).ship_length(ship_id)
    }
}

/// A [`ShipCatalog`] backed by an in-memory table.
#[derive(Debug, Clone, Default)]
pub struct FleetCatalog {
    lengths: HashMap<u64, usize>,
}

impl FleetCatalog {
    /// Creates an empty catalog. Every ship resolves to the fallback
    /// length until entries are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one entry.
    pub fn with_ship(mut self, ship_id: u64, length: usize) -> Self {
        self.lengths.insert(ship_id, length);
        self
    }

    /// The stock fleet: four singles, three doubles, two triples, and one
    /// four-cell carrier.
    ///
    /// | ids   | length |
    /// |-------|--------|
    /// | 1–4   | 1      |
    /// | 5–7   | 2      |
    /// | 8–9   | 3      |
    /// | 10    | 4      |
    pub fn standard() -> Self {
        (1..=10)
            .map(|id| {
                let length = match id {
                    1..=4 => 1,
                    5..=7 => 2,
                    8..=9 => 3,
                    _ => 4,
                };
                (id, length)
            })
            .collect()
    }

    /// Number of entries in the catalog.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Returns `true` if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

impl FromIterator<(u64, usize)> for FleetCatalog {
    fn from_iter<I: IntoIterator<Item = (u64, usize)>>(iter: I) -> Self {
        Self {
            lengths: iter.into_iter().collect(),
        }
    }
}

impl ShipCatalog for FleetCatalog {
    fn ship_length(&self, ship_id: u64) -> Option<usize> {
        self.lengths.get(&ship_id).copied()
    }
}

/// Computes the set of cells covered by `placements`.
///
/// Pure and idempotent. Malformed placements are skipped individually
/// (see the module docs); the result is the union of every valid ship.
///
/// ```rust
/// use broadside_engine::{FleetCatalog, occupied_cells};
/// use broadside_protocol::ShipPlacement;
///
/// let catalog = FleetCatalog::new().with_ship(5, 2);
/// let cells = occupied_cells(&[ShipPlacement::horizontal(5, 0)], &catalog);
/// assert_eq!(cells.into_iter().collect::<Vec<_>>(), vec![0, 1]);
/// ```
pub fn occupied_cells<C: ShipCatalog + ?Sized>(
    placements: &[ShipPlacement],
    catalog: &C,
) -> BTreeSet<u8> {
    let mut occupied = BTreeSet::new();

    for placement in placements {
        let length = placement
            .ship_id
            .and_then(|id| catalog.ship_length(id))
            .filter(|len| *len > 0)
            .unwrap_or(FALLBACK_LENGTH);

        match ship_cells(placement, length) {
            Some(cells) => occupied.extend(cells),
            None => {
                tracing::debug!(
                    ship_id = ?placement.ship_id,
                    start = placement.start_cell_index,
                    horizontal = placement.is_horizontal,
                    length,
                    "skipping placement that does not fit the grid"
                );
            }
        }
    }

    occupied
}

/// Returns the cells of one ship, or `None` if any part leaves the grid.
fn ship_cells(placement: &ShipPlacement, length: usize) -> Option<Vec<u8>> {
    let start = usize::try_from(placement.start_cell_index)
        .ok()
        .filter(|s| *s < CELL_COUNT)?;

    let step = if placement.is_horizontal { 1 } else { GRID_SIZE };
    let end = (length - 1).checked_mul(step)?.checked_add(start)?;
    if end >= CELL_COUNT {
        return None;
    }
    if placement.is_horizontal && start / GRID_SIZE != end / GRID_SIZE {
        return None;
    }

    // Every index is below CELL_COUNT (100), so the narrowing is lossless.
    Some((0..length).map(|i| (start + i * step) as u8).collect())
}
