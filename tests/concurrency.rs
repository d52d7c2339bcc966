use std::{sync::Arc, thread};

use rowmap::{
    Mapper,
    samples::{Statement, TenColumnRecord, ten_column_table},
};

#[test]
fn concurrent_configure_stores_one_entry_per_shape() {
    let mapper = Arc::new(Mapper::new());
    let handles = (0..8)
        .map(|_| {
            let mapper = Arc::clone(&mapper);
            thread::spawn(move || mapper.configure::<TenColumnRecord>())
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("thread").expect("configure");
    }

    assert_eq!(mapper.cache().len(), 1);
    assert!(mapper.cache().compilations() >= 1);
}

#[test]
fn concurrent_nested_configure_caches_each_shape_once() {
    let mapper = Arc::new(Mapper::new());
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| mapper.configure::<Statement>().expect("configure"));
        }
    });
    assert_eq!(mapper.cache().len(), 6);
}

#[test]
fn compiled_shapes_map_rows_from_many_threads() {
    let mapper = Mapper::new();
    mapper.configure::<TenColumnRecord>().unwrap();

    let mapped = thread::scope(|scope| {
        let handles = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let table = ten_column_table(50).expect("sample table");
                    let mut reader = table.reader();
                    mapper
                        .map_all::<TenColumnRecord, _>(&mut reader)
                        .collect::<Result<Vec<_>, _>>()
                        .expect("map rows")
                        .len()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .sum::<usize>()
    });
    assert_eq!(mapped, 200);
}
