//! Benchmark profiles for the simheap simulation heap.
//!
//! Provides a pre-built unit roster shaped like an RTS game state:
//!
//! - [`reference_registry`]: the `Unit` record layout
//! - [`reference_world`]: `n` units with waypoint paths and target links,
//!   all reachable from one roster array
//! - [`target_indices`]: deterministic target selection via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use simheap_arena::{ArrayPtr, ArrayRef, Heap, HeapError, ObjectRef, RecordPtr};
use simheap_core::{
    ElementType, IntRect, IntVector, Num, NumVector, RegistryError, TypeId, TypeRegistry,
    ValueType,
};

/// Field indices of the `Unit` record.
pub mod unit {
    /// `id: int`
    pub const ID: usize = 0;
    /// `pos: numvect`
    pub const POS: usize = 1;
    /// `bounds: intrect`
    pub const BOUNDS: usize = 2;
    /// `target: Unit*`
    pub const TARGET: usize = 3;
    /// `path: intvect*`
    pub const PATH: usize = 4;
}

/// Longest waypoint path in the reference world.
pub const MAX_PATH: usize = 8;

/// Registry holding the `Unit` record. Returns the registry and the type id.
pub fn reference_registry() -> Result<(Arc<TypeRegistry>, TypeId), RegistryError> {
    let mut registry = TypeRegistry::new();
    let unit = registry.register(
        "Unit",
        &[
            ("id", "int"),
            ("pos", "numvect"),
            ("bounds", "intrect"),
            ("target", "Unit*"),
            ("path", "intvect*"),
        ],
    )?;
    Ok((Arc::new(registry), unit))
}

/// Build a roster of `n` units in `heap`.
///
/// Unit `i` gets a path of `1 + i % MAX_PATH` waypoints and targets the
/// unit chosen by [`target_indices`]. Returns the roster array (element
/// type `Unit*`), which reaches every unit.
pub fn reference_world(heap: &mut Heap, unit_type: TypeId, n: usize, seed: u64) -> Result<ArrayRef, HeapError> {
    let count = i32::try_from(n).map_err(|_| HeapError::InvalidLength { count: n as i64 })?;
    let roster = heap.new_array(ElementType::Ptr(unit_type), count)?;

    let mut units: Vec<ObjectRef> = Vec::with_capacity(n);
    for i in 0..n {
        let u = heap.new_object(unit_type)?;
        let x = i as i32;
        heap.set(u, unit::ID, x)?;
        heap.set(u, unit::POS, NumVector::new(Num::from_int(x % 100), Num::from_int(x / 100)))?;
        heap.set(u, unit::BOUNDS, IntRect::new(x % 100, x / 100, 1, 1))?;

        let waypoints = 1 + i % MAX_PATH;
        let path = heap.new_array(ElementType::Value(ValueType::IntVector), waypoints as i32)?;
        for k in 0..waypoints {
            heap.set_item(path, k, IntVector::new(x + k as i32, x - k as i32))?;
        }
        let slot = heap.field::<ArrayPtr>(u, unit::PATH)?;
        heap.point_to_array(slot, Some(path))?;

        let slot = heap.item::<RecordPtr>(roster, i)?;
        heap.point_to(slot, Some(u))?;
        units.push(u);
    }

    for (i, target) in target_indices(n, seed).into_iter().enumerate() {
        let slot = heap.field::<RecordPtr>(units[i], unit::TARGET)?;
        heap.point_to(slot, Some(units[target]))?;
    }
    Ok(roster)
}

/// Deterministic target choice for each of `n` units.
///
/// Never selects the unit itself when `n > 1`.
pub fn target_indices(n: usize, seed: u64) -> Vec<usize> {
    (0..n)
        .map(|i| {
            if n < 2 {
                return i;
            }
            let pick = (seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add((i as u64).wrapping_mul(1442695040888963407))
                % n as u64) as usize;
            if pick == i {
                (pick + 1) % n
            } else {
                pick
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_world_builds() {
        let (registry, unit_type) = reference_registry().unwrap();
        let mut heap = Heap::new(registry);
        let roster = reference_world(&mut heap, unit_type, 100, 42).unwrap();
        assert_eq!(heap.array_len(roster).unwrap(), 100);
        // Roster + one unit and one path per entry.
        assert_eq!(heap.live_count(), 1 + 2 * 100);

        let slot = heap.item::<RecordPtr>(roster, 37).unwrap();
        let u = heap.deref(slot).unwrap().unwrap();
        assert_eq!(heap.get::<i32>(u, unit::ID).unwrap(), 37);
        let path = heap.deref_array(heap.field::<ArrayPtr>(u, unit::PATH).unwrap()).unwrap().unwrap();
        assert_eq!(heap.array_len(path).unwrap() as usize, 1 + 37 % MAX_PATH);
    }

    #[test]
    fn targets_never_self() {
        let targets = target_indices(1000, 7);
        for (i, &t) in targets.iter().enumerate() {
            assert_ne!(i, t);
            assert!(t < 1000);
        }
    }

    #[test]
    fn targets_deterministic() {
        assert_eq!(target_indices(500, 42), target_indices(500, 42));
        assert_eq!(target_indices(1, 42), vec![0]);
    }

    #[test]
    fn large_rosters_do_not_overflow() {
        // Index products exceed u64 from i = 13 onward.
        let targets = target_indices(100_000, u64::MAX);
        assert_eq!(targets.len(), 100_000);
        assert!(targets.iter().all(|&t| t < 100_000));
    }
}
