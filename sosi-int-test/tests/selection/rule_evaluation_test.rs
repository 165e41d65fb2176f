use sosi::common::GroupRef;
use sosi::errors::ErrorKind;
use sosi::selection::{
    detect_value_type, AttributeLocation, LookupScope, PriorityFilter, ValueType,
};
use sosi::store::{GroupStore, MemoryGroupStore, StoredGroup};
use sosi::SelectionEngine;
use sosi_int_test::test_util::{cleanup, create_test_context, run_test};

fn engine_with(text: &str) -> SelectionEngine {
    let mut engine = SelectionEngine::open_session();
    let report = engine.load_rules_from_text(text);
    assert!(!report.had_errors(), "{:?}", report.errors());
    engine
}

fn matches(engine: &mut SelectionEngine, store: &mut MemoryGroupStore, group: GroupRef) -> bool {
    store.select_group(group).unwrap();
    engine
        .find_first_group_match(&*store, PriorityFilter::Ignore)
        .is_some()
}

#[test]
fn test_compact_rule_matches_on_equal_name() {
    let mut engine =
        engine_with("GRUPPE-UTVALG R1\n PRIORITET 0\n .NAVN = VEG\n BRUK-REGEL R1");
    let mut store = MemoryGroupStore::new();
    let veg = store.add_group(1, StoredGroup::line().with_attribute("..NAVN VEG"));
    let gate = store.add_group(1, StoredGroup::line().with_attribute("..NAVN GATE"));

    store.select_group(veg).unwrap();
    let hit = engine
        .find_first_group_match(&store, PriorityFilter::Ignore)
        .unwrap();
    assert_eq!(hit.rule_name, "R1");
    assert_eq!(hit.label.as_deref(), Some("R1"));

    assert!(!matches(&mut engine, &mut store, gate));
}

#[test]
fn test_not_more_than_once() {
    let mut engine = engine_with("GRUPPE-UTVALG Single\n .NAVN !FL\n BRUK-REGEL SINGLE");
    let mut store = MemoryGroupStore::new();
    let twice = store.add_group(
        1,
        StoredGroup::line()
            .with_attribute("..NAVN Storgata")
            .with_attribute("..NAVN Gamle Storgate"),
    );
    let once = store.add_group(1, StoredGroup::line().with_attribute("..NAVN Storgata"));

    assert!(!matches(&mut engine, &mut store, twice));
    assert!(matches(&mut engine, &mut store, once));
}

#[test]
fn test_rules_against_loaded_base() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine = engine_with(
                "\
.GRUPPE-UTVALG Riksveg
..VELG ..OBJTYPE = Veg
...OG ..VEGKATEGORI = r
..PRIORITET 1
..BRUK-REGEL RV
.GRUPPE-UTVALG Vann
..VELG ..OBJTYPE () vann
..ELLER ..OBJTYPE = ElvBekk
..PRIORITET 2
..BRUK-REGEL VANN
",
            );

            ctx.with_store_mut(|store| {
                assert!(matches(&mut engine, store, groups.main_road));
                assert!(!matches(&mut engine, store, groups.side_street));
                assert!(matches(&mut engine, store, groups.river));
                assert!(!matches(&mut engine, store, groups.bridge));
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_and_short_circuits_attribute_fetches() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine = engine_with(
                "\
.GRUPPE-UTVALG Named road
..VELG ..OBJTYPE = Veg
..OG ..NAVN = Storgata
..BRUK-REGEL NAMED
",
            );

            ctx.with_store_mut(|store| {
                store.reset_fetch_counter();
                assert!(!matches(&mut engine, store, groups.river));
                assert_eq!(store.attribute_fetches(), 1);

                store.reset_fetch_counter();
                assert!(matches(&mut engine, store, groups.main_road));
                assert_eq!(store.attribute_fetches(), 2);
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_or_short_circuits_attribute_fetches() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine = engine_with(
                "\
.GRUPPE-UTVALG Road or bridge
..VELG ..OBJTYPE = Veg
..ELLER ..OBJTYPE = Bru
..BRUK-REGEL RB
",
            );

            ctx.with_store_mut(|store| {
                store.reset_fetch_counter();
                assert!(matches(&mut engine, store, groups.main_road));
                assert_eq!(store.attribute_fetches(), 1);

                store.reset_fetch_counter();
                assert!(matches(&mut engine, store, groups.bridge));
                assert_eq!(store.attribute_fetches(), 2);
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_numeric_operands_compare_as_numbers() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine =
                engine_with(".GRUPPE-UTVALG Long\n..VELG ..VEGNUMMER > 500\n..BRUK-REGEL LONG\n");

            ctx.with_store_mut(|store| {
                // 1003 > 500 only holds as a number
                assert!(matches(&mut engine, store, groups.side_street));
                assert!(!matches(&mut engine, store, groups.main_road));
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_value_type_detection() {
    assert_eq!(detect_value_type("162", None, ValueType::Int), ValueType::Int);
    assert_eq!(detect_value_type("212.5", None, ValueType::Int), ValueType::Float);
    assert_eq!(detect_value_type(".5", None, ValueType::Int), ValueType::Float);
    assert_eq!(detect_value_type("15-0042", None, ValueType::Int), ValueType::Text);
    assert_eq!(detect_value_type("Veg", None, ValueType::Int), ValueType::Text);
    assert_eq!(
        detect_value_type("99999999999", None, ValueType::Int),
        ValueType::Text
    );
}

#[test]
fn test_float_rule_on_background_group() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            let mut engine =
                engine_with(".GRUPPE-UTVALG High\n..VELG ..HØYDE > 100.5\n..BRUK-REGEL HIGH\n");

            ctx.with_store_mut(|store| {
                assert!(matches(&mut engine, store, groups.survey_point));
                // only PINFO carries the height on the river
                assert!(!matches(&mut engine, store, groups.river));
            });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_lookup_falls_back_to_header() {
    run_test(
        create_test_context,
        |ctx| {
            let groups = ctx.groups().clone();
            ctx.with_store_mut(|store| -> sosi::errors::SosiResult<()> {
                store.select_group(groups.main_road)?;

                let own = SelectionEngine::lookup_attribute(
                    store,
                    "..NAVN AL",
                    LookupScope::GroupThenHeader,
                )?
                .unwrap();
                assert_eq!(own.location, AttributeLocation::Group);
                assert_eq!(own.occurrence.unwrap().value, "Storgata");

                let header = SelectionEngine::lookup_attribute(
                    store,
                    "..KOORDSYS = 22",
                    LookupScope::GroupThenHeader,
                )?
                .unwrap();
                assert_eq!(header.location, AttributeLocation::Header);
                assert_eq!(store.current_group(), Some(groups.main_road));

                let group_only =
                    SelectionEngine::lookup_attribute(store, "..KOORDSYS AL", LookupScope::Group)?;
                assert!(group_only.is_none());
                Ok(())
            })
        },
        cleanup,
    )
}

#[test]
fn test_lookup_without_current_group_fails() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.with_store_mut(|store| {
                store.clear_current();
                let err = SelectionEngine::lookup_attribute(store, "..NAVN AL", LookupScope::Group)
                    .unwrap_err();
                assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            });
            Ok(())
        },
        cleanup,
    )
}
