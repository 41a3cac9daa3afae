#![forbid(unsafe_code)]

//! Property-based tests: operators over streams agree with the same
//! operations over plain iterators.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use rivulet_core::{Runtime, Stream, Update, pipe};
use rivulet_ops::{combine_all, filter, map, merge, scan, take};

fn record<T: Clone + 'static>(stream: &Stream<T>) -> Rc<RefCell<Vec<T>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_in = Rc::clone(&log);
    let _ = stream.derive(move |value: &T| {
        log_in.borrow_mut().push(value.clone());
        Update::<()>::Skip
    });
    log
}

fn inputs() -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(-500_i32..500, 0..40)
}

proptest! {
    #[test]
    fn filter_map_matches_iterator(values in inputs()) {
        let rt = Runtime::new();
        let source = rt.stream::<i32>();
        let out = pipe!(source, filter(|v: &i32| v % 3 == 0), map(|v: &i32| v * 2));
        let seen = record(&out);

        for &v in &values {
            source.set(v);
        }
        let expected: Vec<i32> = values.iter().filter(|v| *v % 3 == 0).map(|v| v * 2).collect();
        prop_assert_eq!(seen.borrow().clone(), expected);
    }

    #[test]
    fn take_emits_a_prefix_then_closes(values in inputs(), amount in 0_usize..10) {
        let rt = Runtime::new();
        let source = rt.stream::<i32>();
        let out = source.pipe(take(amount));
        let seen = record(&out);

        for &v in &values {
            source.set(v);
        }
        let expected: Vec<i32> = values.iter().copied().take(amount).collect();
        prop_assert_eq!(seen.borrow().clone(), expected);
        prop_assert_eq!(out.is_closed(), values.len() > amount);
    }

    #[test]
    fn scan_matches_running_fold(values in inputs()) {
        let rt = Runtime::new();
        let source = rt.stream::<i32>();
        let out = source.pipe(scan(0_i64, |acc: &i64, v: &i32| acc + i64::from(*v)));
        let seen = record(&out);

        for &v in &values {
            source.set(v);
        }
        let expected: Vec<i64> = values
            .iter()
            .scan(0_i64, |acc, v| {
                *acc += i64::from(*v);
                Some(*acc)
            })
            .collect();
        prop_assert_eq!(seen.borrow().clone(), expected);
    }

    #[test]
    fn merge_interleaves_in_write_order(writes in proptest::collection::vec((any::<bool>(), -500_i32..500), 0..40)) {
        let rt = Runtime::new();
        let left = rt.stream::<i32>();
        let right = rt.stream::<i32>();
        let merged = merge(&left, &right).expect("same runtime");
        let seen = record(&merged);

        for &(to_right, v) in &writes {
            if to_right { right.set(v); } else { left.set(v); }
        }
        let expected: Vec<i32> = writes.iter().map(|&(_, v)| v).collect();
        prop_assert_eq!(seen.borrow().clone(), expected);
    }

    #[test]
    fn combine_all_tracks_latest_values(
        width in 1_usize..6,
        writes in proptest::collection::vec((any::<prop::sample::Index>(), -500_i32..500), 0..40),
    ) {
        let rt = Runtime::new();
        let sources: Vec<Stream<i32>> = (0..width).map(|_| rt.stream::<i32>()).collect();
        let combined = combine_all(&sources).expect("non-empty");
        let mut latest: Vec<Option<i32>> = vec![None; width];

        for (pick, v) in writes {
            let index = pick.index(width);
            latest[index] = Some(v);
            sources[index].set(v);
            let expected: Option<Vec<i32>> = latest.iter().copied().collect();
            prop_assert_eq!(combined.get(), expected);
        }
    }
}
