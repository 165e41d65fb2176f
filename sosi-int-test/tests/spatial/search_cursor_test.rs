use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sosi::common::{GroupRef, LayerMask};
use sosi::errors::SosiResult;
use sosi::store::{GroupStore, MemoryGroupStore, StoredGroup};
use sosi::{SelectionEngine, SweepOutcome};
use sosi_int_test::test_util::{cleanup, create_test_context, index_store, run_test};
use sosi_spatial::{BoundingBox, SearchCursor, SearchMethod};

fn sorted(mut groups: Vec<GroupRef>) -> Vec<GroupRef> {
    groups.sort();
    groups
}

fn random_window(rng: &mut StdRng) -> BoundingBox {
    let x = rng.gen_range(-50.0..1000.0);
    let y = rng.gen_range(-50.0..1000.0);
    let w = rng.gen_range(0.0..250.0);
    let h = rng.gen_range(0.0..250.0);
    BoundingBox::new(x, y, x + w, y + h)
}

#[test]
fn test_sequential_and_indexed_search_agree() {
    let mut rng = StdRng::seed_from_u64(0x5051);
    let mut store = MemoryGroupStore::new();
    store.set_base_extent([0.0, 0.0, 1000.0, 1000.0]);
    for _ in 0..400 {
        let east = rng.gen_range(0.0..990.0);
        let north = rng.gen_range(0.0..990.0);
        let coordinates = [
            (east, north),
            (east + rng.gen_range(0.0..10.0), north + rng.gen_range(0.0..10.0)),
        ];
        let layer = if rng.gen_bool(0.2) {
            LayerMask::BACKGROUND
        } else {
            LayerMask::FOREGROUND
        };
        store.add_group(
            1,
            StoredGroup::line()
                .with_coordinates(&coordinates)
                .in_layer(layer),
        );
    }
    let index = index_store(&store).unwrap();
    index.check_invariants().unwrap();

    for _ in 0..200 {
        let window = random_window(&mut rng);
        for layers in [LayerMask::FOREGROUND, LayerMask::ALL] {
            let mut sequential = SearchCursor::new(&index, SearchMethod::Sequential);
            let mut indexed = SearchCursor::new(&index, SearchMethod::Indexed);
            sequential.find_first(&store, &window, layers);
            indexed.find_first(&store, &window, layers);
            assert_eq!(
                sorted(sequential.results().to_vec()),
                sorted(indexed.results().to_vec()),
                "window {}",
                window
            );
        }
    }
}

#[test]
fn test_auto_method_follows_window_size() {
    run_test(
        create_test_context,
        |ctx| {
            let index = ctx.index();
            index.read(|index| {
                ctx.with_store(|store| {
                    let mut cursor = SearchCursor::new(index, SearchMethod::Auto);

                    let narrow = BoundingBox::new(0.0, 0.0, 50.0, 1000.0);
                    cursor.find_first(store, &narrow, LayerMask::ALL);
                    assert_eq!(cursor.used_method(), Some(SearchMethod::Indexed));

                    let wide = BoundingBox::new(0.0, 0.0, 500.0, 500.0);
                    cursor.find_first(store, &wide, LayerMask::ALL);
                    assert_eq!(cursor.used_method(), Some(SearchMethod::Sequential));
                })
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_cursor_walks_hits_in_store_order() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let window = BoundingBox::new(0.0, 0.0, 520.0, 160.0);

            let walked = ctx.index().read(|index| {
                ctx.with_store(|store| {
                    let mut cursor = SearchCursor::new(index, SearchMethod::Sequential);
                    let mut walked = Vec::new();
                    let mut hit = cursor.find_first(store, &window, LayerMask::FOREGROUND);
                    while let Some(group) = hit {
                        walked.push(group);
                        hit = cursor.find_next();
                    }
                    walked
                })
            });

            assert_eq!(
                walked,
                vec![groups.main_road, groups.side_street, groups.river, groups.bridge]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_flate_search_through_cursor() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let window = BoundingBox::new(850.0, 850.0, 860.0, 860.0);

            ctx.index().read(|index| {
                ctx.with_store(|store| {
                    for method in [SearchMethod::Sequential, SearchMethod::Indexed] {
                        let mut cursor = SearchCursor::new(index, method);
                        assert_eq!(
                            cursor.find_first_flate(store, &window, LayerMask::FOREGROUND),
                            Some(groups.lake)
                        );
                        assert_eq!(cursor.find_next(), None);
                    }
                })
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_geographic_search_then_rule_sweep() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let window = BoundingBox::new(0.0, 0.0, 520.0, 160.0);
            let mut engine = SelectionEngine::open_session();
            engine.load_rules_from_text(".GRUPPE-UTVALG Veg\n..VELG ..OBJTYPE = Veg\n..BRUK-REGEL VEG\n");

            let index = ctx.index();
            index.read(|index| {
                ctx.with_store_mut(|store| -> SosiResult<()> {
                    store.select_group(groups.lake)?;
                    let mut cursor = SearchCursor::new(index, SearchMethod::Indexed);
                    let found = cursor.find_all(store, &window, LayerMask::FOREGROUND)?;
                    assert_eq!(found, 4);
                    assert!(store.is_found(groups.bridge));
                    assert!(!store.is_found(groups.lake));
                    assert_eq!(store.current_group(), Some(groups.lake));

                    // the rule sweep starts from a clean found set
                    let outcome = engine.find_all_group_matches(
                        store,
                        LayerMask::FOREGROUND,
                        &mut || false,
                    )?;
                    assert_eq!(outcome, SweepOutcome::Completed(2));
                    assert!(!store.is_found(groups.bridge));
                    Ok(())
                })
            })
        },
        cleanup,
    )
}
