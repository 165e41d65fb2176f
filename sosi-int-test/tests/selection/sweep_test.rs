use sosi::common::{GroupRef, LayerMask, NeverCancel};
use sosi::errors::SosiResult;
use sosi::store::{BoundaryMember, GroupStore, MemoryGroupStore, StoredGroup};
use sosi::{CombinePolicy, SelectionEngine, SweepOutcome};
use sosi_int_test::test_util::{cleanup, create_test_context, run_test};

fn engine_with(text: &str) -> SelectionEngine {
    let mut engine = SelectionEngine::open_session();
    let report = engine.load_rules_from_text(text);
    assert!(!report.had_errors(), "{:?}", report.errors());
    engine
}

#[test]
fn test_group_sweep_marks_matches_and_restores_current() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine =
                engine_with(".GRUPPE-UTVALG Veg\n..VELG ..OBJTYPE = Veg\n..BRUK-REGEL VEG\n");

            ctx.with_store_mut(|store| -> SosiResult<()> {
                store.select_group(groups.bridge)?;
                let outcome =
                    engine.find_all_group_matches(store, LayerMask::FOREGROUND, &mut NeverCancel)?;

                assert_eq!(outcome, SweepOutcome::Completed(2));
                assert_eq!(
                    store.found_groups(),
                    vec![groups.main_road, groups.side_street]
                );
                assert_eq!(store.current_group(), Some(groups.bridge));
                Ok(())
            })
        },
        cleanup,
    )
}

#[test]
fn test_group_sweep_respects_layers() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine =
                engine_with(".GRUPPE-UTVALG Any\n..VELG ..OBJTYPE AL\n..BRUK-REGEL ANY\n");

            ctx.with_store_mut(|store| -> SosiResult<()> {
                let foreground =
                    engine.find_all_group_matches(store, LayerMask::FOREGROUND, &mut NeverCancel)?;
                assert_eq!(foreground.matches(), Some(7));
                assert!(!store.is_found(groups.survey_point));

                let background =
                    engine.find_all_group_matches(store, LayerMask::BACKGROUND, &mut NeverCancel)?;
                assert_eq!(background.matches(), Some(1));
                assert_eq!(store.found_groups(), vec![groups.survey_point]);

                let all = engine.find_all_group_matches(store, LayerMask::ALL, &mut NeverCancel)?;
                assert_eq!(all.matches(), Some(8));
                Ok(())
            })
        },
        cleanup,
    )
}

#[test]
fn test_cancelled_sweep_keeps_partial_marks() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine = SelectionEngine::builder()
                .cancel_poll_interval(1)
                .rules_from_text(".GRUPPE-UTVALG Any\n..VELG ..OBJTYPE AL\n..BRUK-REGEL ANY\n")
                .build()?;

            let mut polls = 0;
            let mut cancel = || {
                polls += 1;
                polls == 3
            };

            ctx.with_store_mut(|store| -> SosiResult<()> {
                store.select_group(groups.lake)?;
                let outcome =
                    engine.find_all_group_matches(store, LayerMask::FOREGROUND, &mut cancel)?;

                assert!(outcome.is_aborted());
                assert_eq!(outcome.matches(), None);
                assert_eq!(
                    store.found_groups(),
                    vec![groups.main_road, groups.side_street, groups.river]
                );
                assert_eq!(store.current_group(), Some(groups.lake));
                Ok(())
            })?;
            assert_eq!(polls, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_point_sweep_finds_coordinate_matches() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine =
                engine_with(".PUNKT-UTVALG High\n..VELG ..HØYDE > 20\n..BRUK-REGEL HIGH\n");

            ctx.with_store_mut(|store| -> SosiResult<()> {
                store.clear_current();
                let outcome =
                    engine.find_all_point_matches(store, LayerMask::ALL, &mut NeverCancel)?;

                // the survey point only carries its height as GINFO
                assert_eq!(outcome, SweepOutcome::Completed(1));
                assert_eq!(store.found_groups(), vec![groups.river]);
                assert_eq!(store.current_group(), None);
                Ok(())
            })
        },
        cleanup,
    )
}

#[test]
fn test_matched_priorities_per_group() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine = engine_with(
                "\
.GRUPPE-UTVALG Road
..VELG ..OBJTYPE = Veg
..PRIORITET 10
..BRUK-REGEL ROAD
.GRUPPE-UTVALG Named
..VELG ..NAVN AL
..PRIORITET 20
..BRUK-REGEL NAMED
.GRUPPE-UTVALG Bridge
..VELG ..OBJTYPE = Bru
..PRIORITET 30
..BRUK-REGEL BRIDGE
.PUNKT-UTVALG High
..VELG ..HØYDE > 20
..PRIORITET 40
..BRUK-REGEL HIGH
",
            );

            ctx.with_store_mut(|store| -> SosiResult<()> {
                store.select_group(groups.main_road)?;
                let road = engine.compute_matched_priorities(&*store)?;
                assert!(road.is_computed());
                assert_eq!(road.priorities(), vec![0, 1]);

                store.select_group(groups.river)?;
                let river = engine.compute_matched_priorities(&*store)?;
                assert_eq!(river.priorities(), vec![1, 3]);

                store.select_group(groups.bridge)?;
                let bridge = engine.compute_matched_priorities(&*store)?;
                assert_eq!(bridge.priorities(), vec![2]);
                Ok(())
            })
        },
        cleanup,
    )
}

const WATER: &str = ".GRUPPE-UTVALG Water\n..VELG ..OBJTYPE = Vann\n..BRUK-REGEL WATER\n";
const SHORE: &str = ".GRUPPE-UTVALG Shore\n..VELG ..OBJTYPE = Kant\n..BRUK-REGEL SHORE\n";

fn polygon_store(edge_types: &[&str]) -> (MemoryGroupStore, GroupRef) {
    let mut store = MemoryGroupStore::new();
    let mut polygon = StoredGroup::flate().with_attribute("..OBJTYPE Vann");
    for edge_type in edge_types {
        let edge = store.add_group(
            1,
            StoredGroup::line().with_attribute(&format!("..OBJTYPE {}", edge_type)),
        );
        polygon = polygon.with_boundary_member(BoundaryMember::outer(edge));
    }
    let flate = store.add_group(1, polygon);
    (store, flate)
}

fn combined(store: &mut MemoryGroupStore, policy: CombinePolicy) -> SweepOutcome {
    let mut polygon_rules = engine_with(WATER);
    let mut ring_rules = engine_with(SHORE);
    polygon_rules
        .find_all_combined_flate_matches(
            &mut ring_rules,
            store,
            LayerMask::FOREGROUND,
            policy,
            &mut NeverCancel,
        )
        .unwrap()
}

#[test]
fn test_combined_query_all_members_match() {
    let (mut store, flate) = polygon_store(&["Kant", "Kant", "Kant"]);
    assert_eq!(combined(&mut store, CombinePolicy::All), SweepOutcome::Completed(1));
    assert!(store.is_found(flate));
}

#[test]
fn test_combined_query_one_failing_member() {
    let (mut store, flate) = polygon_store(&["Kant", "Dam", "Kant"]);

    assert_eq!(combined(&mut store, CombinePolicy::All), SweepOutcome::Completed(0));
    assert!(!store.is_found(flate));

    assert_eq!(combined(&mut store, CombinePolicy::Any), SweepOutcome::Completed(1));
    assert!(store.is_found(flate));

    assert_eq!(combined(&mut store, CombinePolicy::None), SweepOutcome::Completed(0));
}

#[test]
fn test_combined_query_no_member_matches() {
    let (mut store, flate) = polygon_store(&["Dam", "Dam"]);
    assert_eq!(combined(&mut store, CombinePolicy::Any), SweepOutcome::Completed(0));
    assert_eq!(combined(&mut store, CombinePolicy::None), SweepOutcome::Completed(1));
    assert_eq!(store.found_groups(), vec![flate]);
}

#[test]
fn test_combined_query_on_loaded_base() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut lakes = engine_with(
                ".GRUPPE-UTVALG Lake\n..VELG ..NAVN = Sognsvann\n..BRUK-REGEL LAKE\n",
            );
            let mut edges = engine_with(
                ".GRUPPE-UTVALG Edge\n..VELG ..OBJTYPE = Strandlinje\n..BRUK-REGEL EDGE\n",
            );

            ctx.with_store_mut(|store| -> SosiResult<()> {
                store.select_group(groups.main_road)?;
                let all = lakes.find_all_combined_flate_matches(
                    &mut edges,
                    store,
                    LayerMask::FOREGROUND,
                    CombinePolicy::All,
                    &mut NeverCancel,
                )?;
                assert_eq!(all, SweepOutcome::Completed(0));

                let any = lakes.find_all_combined_flate_matches(
                    &mut edges,
                    store,
                    LayerMask::FOREGROUND,
                    CombinePolicy::Any,
                    &mut NeverCancel,
                )?;
                assert_eq!(any, SweepOutcome::Completed(1));
                assert_eq!(store.found_groups(), vec![groups.lake]);
                assert_eq!(store.current_group(), Some(groups.main_road));
                Ok(())
            })
        },
        cleanup,
    )
}
