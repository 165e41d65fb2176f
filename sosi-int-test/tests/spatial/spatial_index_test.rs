use sosi::common::{GroupRef, LayerMask};
use sosi::errors::SosiResult;
use sosi::store::StoredGroup;
use sosi_int_test::test_util::{cleanup, create_test_context, run_test};
use sosi_spatial::{BoundingBox, IndexChange, SpatialIndex, SpatialStore};

fn sorted(mut groups: Vec<GroupRef>) -> Vec<GroupRef> {
    groups.sort();
    groups
}

#[test]
fn test_window_query_over_three_boxes() {
    let g1 = GroupRef::new(1, 1);
    let g2 = GroupRef::new(1, 2);
    let g3 = GroupRef::new(1, 3);

    let mut index = SpatialIndex::new();
    index.insert(g1, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    index.insert(g2, BoundingBox::new(5.0, 5.0, 6.0, 6.0));
    index.insert(g3, BoundingBox::new(0.5, 0.5, 2.0, 2.0));

    let hits = sorted(index.query(&BoundingBox::new(0.0, 0.0, 1.5, 1.5)).collect());
    assert_eq!(hits, vec![g1, g3]);
    index.check_invariants().unwrap();
}

#[test]
fn test_index_built_from_base() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            ctx.index().read(|index| -> SosiResult<()> {
                assert_eq!(index.len(), 8);
                assert!(index.height() > 1);
                index.check_invariants()?;

                let extent = index.extent().unwrap();
                assert_eq!(extent, BoundingBox::new(9.0, -1.0, 951.0, 901.0));

                assert!(index.has_reference_box(groups.lake));
                assert!(!index.has_reference_box(groups.lake_edge));
                assert_eq!(
                    index.group_box(groups.lake),
                    Some(BoundingBox::new(699.0, 699.0, 901.0, 901.0))
                );
                Ok(())
            })
        },
        cleanup,
    )
}

#[test]
fn test_flate_query_resolves_members() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let window = BoundingBox::new(750.0, 750.0, 760.0, 760.0);

            let hits = ctx.index().read(|index| {
                ctx.with_store(|store| {
                    let plain = sorted(index.query(&window).collect());
                    assert_eq!(plain, vec![groups.lake_edge, groups.shore_edge, groups.lake]);
                    index.query_flate(&window, LayerMask::FOREGROUND, store)
                })
            })?;

            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].flate, groups.lake);
            assert_eq!(hits[0].members, vec![groups.lake_edge, groups.shore_edge]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_layer_filtered_query() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let everything = BoundingBox::new(-10.0, -10.0, 1010.0, 1010.0);

            ctx.index().read(|index| {
                ctx.with_store(|store| {
                    let background: Vec<GroupRef> = index
                        .query_in_layers(&everything, LayerMask::BACKGROUND, store)
                        .collect();
                    assert_eq!(background, vec![groups.survey_point]);

                    let foreground = index
                        .query_in_layers(&everything, LayerMask::FOREGROUND, store)
                        .count();
                    assert_eq!(foreground, 7);
                })
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_moved_group_follows_new_geometry() {
    run_test(
        create_test_context,
        |ctx| {
            let bridge = ctx.groups().bridge;
            let old_spot = BoundingBox::new(500.0, 145.0, 510.0, 155.0);
            let new_spot = BoundingBox::new(95.0, 495.0, 105.0, 505.0);

            let new_box = ctx.with_store_mut(|store| {
                store.insert_group(
                    bridge,
                    StoredGroup::point()
                        .with_attribute("..OBJTYPE Bru")
                        .with_coordinates(&[(100.0, 500.0)]),
                );
                store.group_box(bridge)
            });

            ctx.index().write(|index| -> SosiResult<()> {
                let change = index.index_group(bridge, new_box);
                assert!(matches!(change, IndexChange::Updated(_)));
                assert!(matches!(
                    index.index_group(bridge, new_box),
                    IndexChange::Unchanged(_)
                ));

                assert!(!index.query(&old_spot).any(|g| g == bridge));
                assert_eq!(index.query(&new_spot).collect::<Vec<_>>(), vec![bridge]);
                index.check_invariants()?;
                Ok(())
            })
        },
        cleanup,
    )
}

#[test]
fn test_removed_groups_leave_the_index() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let removed = [groups.main_road, groups.side_street, groups.bridge];

            ctx.with_store_mut(|store| {
                for group in removed {
                    store.remove_group(group);
                }
            });

            ctx.index().write(|index| -> SosiResult<()> {
                for group in removed {
                    assert_eq!(index.index_group(group, None), IndexChange::Removed);
                    assert_eq!(index.index_group(group, None), IndexChange::NotIndexed);
                }
                assert_eq!(index.len(), 5);
                index.check_invariants()?;

                let west = BoundingBox::new(0.0, 0.0, 450.0, 450.0);
                assert_eq!(index.query(&west).count(), 0);
                Ok(())
            })
        },
        cleanup,
    )
}
