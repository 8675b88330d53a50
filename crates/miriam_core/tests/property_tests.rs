//! Property-based tests for registry model invariants.

use proptest::prelude::*;

use miriam_core::model::health::reliability;
use miriam_core::{diff_resources, Resource};

fn resource(id: Option<u32>, prefix: String) -> Resource {
    let mut resource = Resource::new(prefix, "", "http://root/");
    resource.id = id.map(|sequence| format!("MIR:001{sequence:05}"));
    resource
}

/// Resources with ids drawn from a small pool so that old and new lists overlap.
fn resource_list() -> impl Strategy<Value = Vec<Resource>> {
    prop::collection::vec(
        (prop::option::of(1u32..8), "http://[a-z]{1,6}/"),
        0..8,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .map(|(id, prefix)| resource(id, prefix))
            .collect()
    })
}

proptest! {
    #[test]
    fn diff_partitions_the_new_list(old in resource_list(), new in resource_list()) {
        let diff = diff_resources(&old, &new);

        prop_assert_eq!(diff.unchanged.len() + diff.added.len(), new.len());
        prop_assert!(diff.unchanged.iter().all(|resource| resource.id.is_some()));
        prop_assert!(diff.added.iter().all(|resource| resource.id.is_none()));
    }

    #[test]
    fn removed_resources_are_old_ones_missing_from_new(
        old in resource_list(),
        new in resource_list(),
    ) {
        let diff = diff_resources(&old, &new);

        for removed in &diff.removed {
            prop_assert!(old.contains(removed));
            prop_assert!(!new.iter().any(|candidate| candidate.is_same(removed)));
        }
        for kept in old.iter().filter(|previous| new.iter().any(|candidate| candidate.is_same(previous))) {
            prop_assert!(!diff.removed.contains(kept));
        }
    }

    #[test]
    fn reliability_is_a_percentage(uptime in 0u64..10_000, downtime in 0u64..10_000) {
        let value = reliability(uptime, downtime);
        prop_assert!(value <= 100);
        if downtime == 0 && uptime > 0 {
            prop_assert_eq!(value, 100);
        }
        if uptime == 0 {
            prop_assert_eq!(value, 0);
        }
    }
}
