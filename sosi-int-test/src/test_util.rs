use sosi::common::{atomic, Atomic, GroupRef, LayerMask, ReadExecutor, WriteExecutor};
use sosi::errors::SosiResult;
use sosi::store::{BoundaryMember, GroupStore, MemoryGroupStore, StoredGroup, StoredPoint};
use sosi_spatial::{SharedSpatialIndex, SpatialIndex, SpatialStore};
use std::backtrace::Backtrace;
use std::time::Instant;

/// Runs `test` between `before` and `after`.
///
/// `after` runs whether the test body fails or not. Panics are caught and
/// reported together with the elapsed time before the test is failed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> SosiResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> SosiResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> SosiResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", message), Backtrace::capture().to_string())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("Test failed: {}", error);
}

/// Groups loaded by [`create_test_context`], by role.
#[derive(Clone, Debug)]
pub struct TestGroups {
    pub main_road: GroupRef,
    pub side_street: GroupRef,
    pub river: GroupRef,
    pub bridge: GroupRef,
    pub lake_edge: GroupRef,
    pub shore_edge: GroupRef,
    pub lake: GroupRef,
    pub survey_point: GroupRef,
}

#[derive(Clone)]
pub struct TestContext {
    store: Atomic<MemoryGroupStore>,
    index: SharedSpatialIndex,
    groups: TestGroups,
}

impl TestContext {
    pub fn new(store: MemoryGroupStore, index: SpatialIndex, groups: TestGroups) -> Self {
        Self {
            store: atomic(store),
            index: SharedSpatialIndex::new(index),
            groups,
        }
    }

    pub fn store(&self) -> Atomic<MemoryGroupStore> {
        self.store.clone()
    }

    pub fn index(&self) -> SharedSpatialIndex {
        self.index.clone()
    }

    pub fn groups(&self) -> &TestGroups {
        &self.groups
    }

    /// Runs `f` with shared access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&MemoryGroupStore) -> R) -> R {
        self.store.read_with(f)
    }

    /// Runs `f` with exclusive access to the store.
    pub fn with_store_mut<R>(&self, f: impl FnOnce(&mut MemoryGroupStore) -> R) -> R {
        self.store.write_with(f)
    }
}

/// A small base: two roads, a river with a bridge, a lake polygon bounded
/// by two edge lines and a background survey point.
pub fn create_test_context() -> SosiResult<TestContext> {
    let (store, groups) = create_test_store();
    let index = index_store(&store)?;
    Ok(TestContext::new(store, index, groups))
}

pub fn create_test_store() -> (MemoryGroupStore, TestGroups) {
    let mut store = MemoryGroupStore::new();
    store.set_header(
        1,
        StoredGroup::header()
            .with_attribute("..KOORDSYS 22")
            .with_attribute("..EIER Kartverket"),
    );
    store.set_base_extent([0.0, 0.0, 1000.0, 1000.0]);

    let main_road = store.add_group(
        1,
        StoredGroup::line()
            .with_attribute("..OBJTYPE Veg")
            .with_attribute("..NAVN Storgata")
            .with_attribute("..VEGKATEGORI R")
            .with_attribute("..VEGNUMMER 162")
            .with_coordinates(&[(10.0, 10.0), (200.0, 15.0), (400.0, 20.0)]),
    );
    let side_street = store.add_group(
        1,
        StoredGroup::line()
            .with_attribute("..OBJTYPE Veg")
            .with_attribute("..NAVN Kirkegata")
            .with_attribute("..VEGKATEGORI K")
            .with_attribute("..VEGNUMMER 1003")
            .with_coordinates(&[(50.0, 20.0), (55.0, 120.0)]),
    );
    let river = store.add_group(
        1,
        StoredGroup::line()
            .with_attribute("..OBJTYPE ElvBekk")
            .with_attribute("..NAVN Akerselva")
            .with_point(StoredPoint::new(500.0, 0.0))
            .with_point(StoredPoint::new(510.0, 300.0).with_info("..HØYDE 12"))
            .with_point(StoredPoint::new(520.0, 600.0).with_info("..HØYDE 25")),
    );
    let bridge = store.add_group(
        1,
        StoredGroup::point()
            .with_attribute("..OBJTYPE Bru")
            .with_attribute("..BRUNR 15-0042")
            .with_coordinates(&[(505.0, 150.0)]),
    );
    let lake_edge = store.add_group(
        1,
        StoredGroup::line()
            .with_attribute("..OBJTYPE Innsjøkant")
            .with_coordinates(&[(700.0, 700.0), (900.0, 700.0), (900.0, 900.0)]),
    );
    let shore_edge = store.add_group(
        1,
        StoredGroup::line()
            .with_attribute("..OBJTYPE Strandlinje")
            .with_coordinates(&[(900.0, 900.0), (700.0, 900.0), (700.0, 700.0)]),
    );
    let lake = store.add_group(
        1,
        StoredGroup::flate()
            .with_attribute("..OBJTYPE Innsjø")
            .with_attribute("..NAVN Sognsvann")
            .with_coordinates(&[(800.0, 800.0)])
            .with_boundary_member(BoundaryMember::outer(lake_edge))
            .with_boundary_member(BoundaryMember::outer(shore_edge)),
    );
    let survey_point = store.add_group(
        2,
        StoredGroup::point()
            .with_attribute("..OBJTYPE Fastmerke")
            .with_attribute("..HØYDE 212.5")
            .with_coordinates(&[(950.0, 50.0)])
            .in_layer(LayerMask::BACKGROUND),
    );

    let groups = TestGroups {
        main_road,
        side_street,
        river,
        bridge,
        lake_edge,
        shore_edge,
        lake,
        survey_point,
    };
    (store, groups)
}

/// Builds an index over every group of `store`. Polygons get a reference box.
pub fn index_store<S: SpatialStore + ?Sized>(store: &S) -> SosiResult<SpatialIndex> {
    let mut index = SpatialIndex::new();
    for group in store.groups(LayerMask::ALL) {
        if store.is_flate(group) {
            index.index_flate(store, group)?;
        } else {
            index.index_group(group, store.group_box(group));
        }
    }
    Ok(index)
}

pub fn cleanup(ctx: TestContext) -> SosiResult<()> {
    ctx.index().write(|index| index.clear());
    ctx.with_store_mut(|store| {
        store.clear_found();
        store.clear_current();
    });
    Ok(())
}
