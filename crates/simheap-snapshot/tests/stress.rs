//! Churn and save/load stress over the every-value-type record.
//!
//! Builds a 100-object chain (each object owning nine arrays), saves it
//! from the head, loads it back, verifies every array, then frees the odd
//! objects (relinking the even ones) followed by the even ones. The heap
//! must end with a single unbounded free range at the first address.

use simheap_arena::{Extent, FreeSpan, Heap, ObjectRef};
use simheap_core::Address;
use simheap_snapshot::{load_state, save_state, state_hash};
use simheap_test_utils::StressFixture;

const OBJECTS: usize = 100;

fn single_tail() -> Vec<FreeSpan> {
    vec![FreeSpan {
        address: Address::FIRST,
        extent: Extent::Unbounded,
    }]
}

fn walk(fx: &StressFixture, heap: &Heap, head: ObjectRef) -> Vec<ObjectRef> {
    let mut objects = Vec::new();
    let mut cursor = Some(head);
    while let Some(obj) = cursor {
        assert!(fx.check(heap, obj).unwrap(), "object {} lost data", objects.len());
        objects.push(obj);
        cursor = fx.next(heap, obj).unwrap();
    }
    objects
}

fn delete_odd_then_even(fx: &StressFixture, heap: &mut Heap, objects: &[ObjectRef]) {
    let half = objects.len() / 2;
    for i in 0..half {
        fx.delete(heap, objects[2 * i + 1]).unwrap();
        let next = (i + 1 < half).then(|| objects[2 * i + 2]);
        fx.link(heap, objects[2 * i], next).unwrap();
    }
    for i in 0..half {
        fx.delete(heap, objects[2 * i]).unwrap();
    }
}

#[test]
fn save_load_then_delete_everything() {
    let fx = StressFixture::new().unwrap();
    let mut heap = fx.heap();
    let objects = fx.chain(&mut heap, OBJECTS).unwrap();

    let saved = save_state(&heap, &[objects[0].into()]).unwrap();
    let roots = load_state(&mut heap, &saved).unwrap();
    assert_eq!(roots.len(), 1);
    assert!(!heap.is_live(objects[0].into()));

    let head = roots[0].as_object().unwrap();
    let loaded = walk(&fx, &heap, head);
    assert_eq!(loaded.len(), OBJECTS);
    assert_eq!(heap.live_count(), OBJECTS * 10);

    delete_odd_then_even(&fx, &mut heap, &loaded);
    assert_eq!(heap.free_spans(), single_tail());
    assert_eq!(heap.free_spans()[0].length(), -1);
    assert_eq!(heap.live_count(), 0);
    assert_eq!(heap.used_bytes(), 0);
}

#[test]
fn churn_without_snapshot_collapses_free_list() {
    let fx = StressFixture::new().unwrap();
    let mut heap = fx.heap();
    let objects = fx.chain(&mut heap, OBJECTS).unwrap();
    assert_eq!(walk(&fx, &heap, objects[0]).len(), OBJECTS);
    delete_odd_then_even(&fx, &mut heap, &objects);
    assert_eq!(heap.free_spans(), single_tail());
}

#[test]
fn reload_reproduces_allocation_layout() {
    // Creation order matches breadth-first discovery order, so the loaded
    // heap occupies the same addresses as the original.
    let fx = StressFixture::new().unwrap();
    let mut heap = fx.heap();
    let objects = fx.chain(&mut heap, 10).unwrap();
    let original: Vec<_> = heap.live_blocks().collect();

    let saved = save_state(&heap, &[objects[0].into()]).unwrap();
    let roots = load_state(&mut heap, &saved).unwrap();
    assert_eq!(heap.live_blocks().collect::<Vec<_>>(), original);
    assert_eq!(roots[0].address(), objects[0].address());

    let resaved = save_state(&heap, &roots).unwrap();
    assert_eq!(resaved, saved);
    assert_eq!(state_hash(&resaved), state_hash(&saved));
}

#[test]
fn partial_delete_then_save_compacts() {
    let fx = StressFixture::new().unwrap();
    let mut heap = fx.heap();
    let objects = fx.chain(&mut heap, 20).unwrap();
    for i in 0..10 {
        fx.delete(&mut heap, objects[2 * i + 1]).unwrap();
        let next = (i + 1 < 10).then(|| objects[2 * i + 2]);
        fx.link(&mut heap, objects[2 * i], next).unwrap();
    }
    assert!(heap.free_spans().len() > 1);

    let saved = save_state(&heap, &[objects[0].into()]).unwrap();
    let mut fresh = fx.heap();
    let roots = load_state(&mut fresh, &saved).unwrap();
    let loaded = walk(&fx, &fresh, roots[0].as_object().unwrap());
    assert_eq!(loaded.len(), 10);
    // Compacted: no holes before the tail.
    assert_eq!(fresh.free_spans().len(), 1);
    assert_eq!(
        u64::from(fresh.free_spans()[0].address.0),
        u64::from(Address::FIRST.0) + fresh.used_bytes()
    );
}
