// Property contracts for the dual-memory bookkeeping: whatever the stream
// looks like, the capacity bound, the history/STM synchronization and the
// distance-matrix contents must hold.

use super::*;
use proptest::prelude::*;

fn arbitrary_stream() -> impl Strategy<Value = (Vec<(f32, f32, usize)>, usize, usize, usize)> {
    (
        prop::collection::vec((-10.0f32..10.0, -10.0f32..10.0, 0usize..3), 20..120),
        1usize..6,
        10usize..40,
        2usize..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn capacity_and_history_sync_hold_for_any_stream(
        (stream, k, limit, min_stm) in arbitrary_stream()
    ) {
        let header = StreamHeader::numeric(2, 3);
        let mut model = SamKnn::new()
            .with_k(k)
            .with_limit(limit)
            .with_min_stm_size(min_stm);
        model.set_context(&header).expect("valid configuration");
        for &(a, b, label) in &stream {
            let x = Instance::shared(vec![a, b], label);
            model.predict(&x);
            model.train(&x);
            prop_assert!(model.stm().len() + model.ltm().len() <= limit);
            prop_assert_eq!(model.history_len(), model.stm().len());
            prop_assert!(
                model.distance_matrix().expect("context set").origin()
                    + model.stm().len()
                    <= limit + 1
            );
        }
    }

    #[test]
    fn matrix_rows_stay_consistent_with_kernel(
        (stream, k, limit, min_stm) in arbitrary_stream()
    ) {
        let header = StreamHeader::numeric(2, 3);
        let mut model = SamKnn::new()
            .with_k(k)
            .with_limit(limit)
            .with_min_stm_size(min_stm);
        model.set_context(&header).expect("valid configuration");
        for &(a, b, label) in &stream {
            let x = Instance::shared(vec![a, b], label);
            model.predict(&x);
            model.train(&x);
        }
        let kernel = model.kernel.as_ref().expect("context set");
        let matrix = model.distance_matrix().expect("context set");
        for i in 0..model.stm().len() {
            for j in 0..i {
                let fresh = kernel.dist(model.stm().get(i), model.stm().get(j));
                prop_assert!((matrix.get(i, j) - fresh).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn cleaning_never_grows_the_ltm(
        (stream, k, limit, min_stm) in arbitrary_stream()
    ) {
        let header = StreamHeader::numeric(2, 3);
        let mut model = SamKnn::new()
            .with_k(k)
            .with_limit(limit)
            .with_min_stm_size(min_stm);
        model.set_context(&header).expect("valid configuration");
        for &(a, b, label) in &stream {
            let x = Instance::shared(vec![a, b], label);
            model.train(&x);
        }
        let before = model.ltm().len();
        model.clean_incremental();
        prop_assert!(model.ltm().len() <= before);
    }
}
