use proptest::prelude::*;
use rollout::{Column, Record, Value};

fn float_column(xs: &[f32]) -> Column {
    Column::Values(xs.iter().map(|&x| Value::Float(x)).collect())
}

// A full width, a set of distinct in-range indices, and one value per index.
fn scatter_args() -> impl Strategy<Value = (usize, Vec<usize>, Vec<f32>)> {
    (2usize..16)
        .prop_flat_map(|size| {
            (
                Just(size),
                proptest::sample::subsequence((0..size).collect::<Vec<usize>>(), 1..size),
            )
        })
        .prop_flat_map(|(size, indices)| {
            let n = indices.len();
            (
                Just(size),
                Just(indices),
                proptest::collection::vec(-1000.0f32..1000.0, n),
            )
        })
}

proptest! {
    // Scattering a subset into a full-width record and selecting it back
    // recovers exactly the subset, in the same order.
    #[test]
    fn scatter_then_select_round_trips((size, indices, xs) in scatter_args()) {
        let mut sub = Record::new();
        sub.set("rew", float_column(&xs));
        let mut full = Record::new();
        sub.scatter_into(&mut full, &indices, size).unwrap();

        let back = full.select(&indices);
        prop_assert_eq!(back.column("rew"), &float_column(&xs));
        // the target was materialized at full width
        prop_assert_eq!(full.column("rew").len(), size);
    }

    // Two scatters through disjoint index sets never contaminate each
    // other's positions.
    #[test]
    fn disjoint_scatters_do_not_cross(size in 2usize..16) {
        let split = size / 2;
        let first: Vec<usize> = (0..split).collect();
        let second: Vec<usize> = (split..size).collect();
        let first_vals: Vec<f32> = first.iter().map(|&i| i as f32 + 1.0).collect();
        let second_vals: Vec<f32> = second.iter().map(|&i| -(i as f32) - 1.0).collect();

        let mut full = Record::new();
        let mut a = Record::new();
        a.set("rew", float_column(&first_vals));
        a.scatter_into(&mut full, &first, size).unwrap();
        let mut b = Record::new();
        b.set("rew", float_column(&second_vals));
        b.scatter_into(&mut full, &second, size).unwrap();

        let first_back = full.select(&first);
        prop_assert_eq!(first_back.column("rew"), &float_column(&first_vals));
        let second_back = full.select(&second);
        prop_assert_eq!(second_back.column("rew"), &float_column(&second_vals));
    }

    // Selection never materializes placeholder fields.
    #[test]
    fn select_keeps_placeholders_empty(
        xs in proptest::collection::vec(-10.0f32..10.0, 1..16),
    ) {
        let n = xs.len();
        let mut r = Record::transition();
        r.set("obs", float_column(&xs));
        let picked: Vec<usize> = (0..n).rev().collect();
        let sub = r.select(&picked);
        prop_assert!(sub.column("act").is_empty());
        prop_assert!(sub.column("policy").is_empty());
        prop_assert_eq!(sub.column("obs").len(), n);
    }
}
