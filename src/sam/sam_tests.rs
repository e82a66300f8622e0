pub(crate) use super::*;
use crate::metrics::PrequentialEvaluation;
use crate::synthetic::{alternating_label_stream, blob_stream, uniform_label_stream};

fn prequential_step(model: &mut SamKnn, x: &InstanceRef) -> Vec<f32> {
    let votes = model.predict(x);
    model.train(x);
    votes
}

#[test]
fn test_set_context_rejects_bad_config() {
    let header = StreamHeader::numeric(2, 2);
    assert!(SamKnn::new().with_k(0).set_context(&header).is_err());
    assert!(SamKnn::new().with_limit(0).set_context(&header).is_err());
    assert!(SamKnn::new()
        .with_relative_ltm_size(1.5)
        .set_context(&header)
        .is_err());
    assert!(SamKnn::new()
        .with_adaptation_interval(0)
        .set_context(&header)
        .is_err());
    assert!(SamKnn::new()
        .set_context(&StreamHeader::numeric(0, 2))
        .is_err());
}

#[test]
fn test_predict_on_empty_stm_is_uniform() {
    let header = StreamHeader::numeric(2, 4);
    let mut model = SamKnn::new();
    model.set_context(&header).expect("valid configuration");
    let x = Instance::shared(vec![0.0, 0.0], 1);
    let votes = model.predict(&x);
    assert_eq!(votes, vec![0.0; 4]);
    assert!((model.acc_current_concept() - 0.25).abs() < 1e-6);
    // The empty-memory prediction still records a history bit per memory.
    assert_eq!(model.history_len(), 1);
}

#[test]
fn test_single_class_stream_converges() {
    let header = StreamHeader::numeric(2, 2);
    let mut model = SamKnn::new().with_limit(100);
    model.set_context(&header).expect("valid configuration");
    for _ in 0..100 {
        let x = Instance::shared(vec![0.0, 0.0], 0);
        prequential_step(&mut model, &x);
    }
    let probe = Instance::shared(vec![0.0, 0.0], 0);
    let votes = model.predict(&probe);
    assert_eq!(class_from_votes(&votes), 0);
    // Five duplicate neighbors at the reciprocal floor.
    assert!(votes[0] > 1e9);
    assert!((model.acc_current_concept() - 1.0).abs() < 1e-6);
}

#[test]
fn test_uniform_weighting_counts_neighbors() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new()
        .with_k(3)
        .with_limit(100)
        .with_uniform_weighting(true);
    model.set_context(&header).expect("valid configuration");
    for i in 0..10 {
        let x = Instance::shared(vec![i as f32], 0);
        model.train(&x);
    }
    let votes = model.predict(&Instance::shared(vec![0.0], 0));
    assert_eq!(votes, vec![3.0]);
}

#[test]
fn test_histories_track_stm_size() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new()
        .with_k(3)
        .with_limit(40)
        .with_min_stm_size(5);
    model.set_context(&header).expect("valid configuration");
    let mut rng = rand::rngs::StdRng::seed_from_u64(17);
    let stream = alternating_label_stream(30, 10, 1, &mut rng);
    for x in &stream {
        prequential_step(&mut model, x);
        assert_eq!(model.history_len(), model.stm().len(), "after each step");
        assert_eq!(model.ltm_history.len(), model.stm_history.len());
        assert_eq!(model.cm_history.len(), model.stm_history.len());
        assert!(model.stm().len() + model.ltm().len() <= 40, "capacity bound");
    }
}

#[test]
fn test_matrix_rows_match_fresh_distances() {
    let header = StreamHeader::numeric(2, 2);
    let mut model = SamKnn::new()
        .with_k(3)
        .with_limit(30)
        .with_min_stm_size(4);
    model.set_context(&header).expect("valid configuration");
    let mut rng = rand::rngs::StdRng::seed_from_u64(23);
    let centers = vec![(vec![0.0, 0.0], 0), (vec![4.0, 4.0], 1)];
    for x in blob_stream(120, &centers, 1.0, &mut rng) {
        prequential_step(&mut model, &x);
    }
    let kernel = model.kernel.as_ref().expect("context set");
    let matrix = model.distance_matrix().expect("context set");
    for i in 0..model.stm().len() {
        for j in 0..i {
            let fresh = kernel.dist(model.stm().get(i), model.stm().get(j));
            assert!(
                (matrix.get(i, j) - fresh).abs() < 1e-5,
                "cached D[{i}][{j}]={} differs from fresh {fresh}",
                matrix.get(i, j)
            );
        }
        assert!((matrix.get(i, i) - 0.0).abs() < 1e-6);
    }
}

#[test]
fn test_train_reuses_last_voted_distances() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new().with_limit(20);
    model.set_context(&header).expect("valid configuration");
    for i in 0..5 {
        let x = Instance::shared(vec![i as f32], 0);
        model.train(&x);
    }
    let x = Instance::shared(vec![2.5], 0);
    model.predict(&x);
    model.train(&x);
    let matrix = model.distance_matrix().expect("context set");
    // Row of the newest instance: distances 2.5, 1.5, 0.5, 0.5, 1.5 and a
    // zero diagonal, written from the vector cached by predict.
    assert!((matrix.get(5, 0) - 2.5).abs() < 1e-6);
    assert!((matrix.get(5, 3) - 0.5).abs() < 1e-6);
    assert!((matrix.get(5, 5) - 0.0).abs() < 1e-6);
}

#[test]
fn test_incremental_clean_removes_contradicting_ltm_point() {
    let header = StreamHeader::numeric(2, 2);
    let mut model = SamKnn::new().with_k(3).with_limit(50);
    model.set_context(&header).expect("valid configuration");
    for values in [[0.1, 0.0], [0.0, 0.1], [0.1, 0.1], [0.05, 0.05]] {
        model.train(&Instance::shared(values.to_vec(), 0));
    }
    // A contradicting point of the other class inside the anchor's kNN ball
    // (the ball radius is the distance to the farthest same-class neighbor).
    model.ltm.push(Instance::shared(vec![0.01, 0.0], 1));
    model.max_class_seen = 1;
    model.train(&Instance::shared(vec![0.0, 0.0], 0));
    assert!(model.ltm().is_empty(), "contradicting LTM point survives");
}

#[test]
fn test_incremental_clean_keeps_consistent_ltm_point() {
    let header = StreamHeader::numeric(2, 2);
    let mut model = SamKnn::new().with_k(3).with_limit(50);
    model.set_context(&header).expect("valid configuration");
    for _ in 0..4 {
        model.train(&Instance::shared(vec![0.0, 0.0], 0));
    }
    // Same class near the anchor, and a far-away contradicting point:
    // neither satisfies the deletion rule.
    model.ltm.push(Instance::shared(vec![0.01, 0.0], 0));
    model.ltm.push(Instance::shared(vec![50.0, 50.0], 1));
    model.max_class_seen = 1;
    model.train(&Instance::shared(vec![0.0, 0.0], 0));
    assert_eq!(model.ltm().len(), 2);
}

#[test]
fn test_cluster_down_halves_classes() {
    let header = StreamHeader::numeric(2, 3);
    let mut model = SamKnn::new().with_limit(100);
    model.set_context(&header).expect("valid configuration");
    model.max_class_seen = 2;
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    for i in 0..7 {
        model
            .ltm
            .push(Instance::shared(vec![i as f32, rng.gen()], 0));
    }
    for i in 0..4 {
        model
            .ltm
            .push(Instance::shared(vec![i as f32, -1.0], 1));
    }
    model.ltm.push(Instance::shared(vec![9.0, 9.0], 2));
    model.cluster_down();
    let count = |c: usize| model.ltm.iter().filter(|x| x.label() == c).count();
    assert_eq!(count(0), 4, "ceil(7/2)");
    assert_eq!(count(1), 2, "ceil(4/2)");
    assert_eq!(count(2), 1, "singleton classes are kept");
}

#[test]
fn test_memory_shift_and_matrix_rewrite() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new().with_k(1).with_limit(4);
    model.set_context(&header).expect("valid configuration");
    assert_eq!(model.max_stm_size, 3);
    assert_eq!(model.max_ltm_size, 1);

    let points: Vec<InstanceRef> = (0..8)
        .map(|i| Instance::shared(vec![i as f32], 0))
        .collect();
    for (step, x) in points.iter().enumerate() {
        model.train(x);
        if step == 4 {
            // The overflow at step 5 shifts the origin past the physical
            // table end, forcing a rewrite back to 0.
            assert_eq!(
                model.distance_matrix().expect("context set").origin(),
                0
            );
        }
        assert!(model.stm().len() + model.ltm().len() <= 4);
    }

    // Surviving STM rows still answer distance queries exactly.
    let kernel = model.kernel.as_ref().expect("context set");
    let matrix = model.distance_matrix().expect("context set");
    for i in 0..model.stm().len() {
        for j in 0..i {
            let fresh = kernel.dist(model.stm().get(i), model.stm().get(j));
            assert!((matrix.get(i, j) - fresh).abs() < 1e-6);
        }
    }
}

#[test]
fn test_zero_ltm_budget_never_populates_ltm() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new()
        .with_k(1)
        .with_limit(20)
        .with_relative_ltm_size(0.0)
        .with_min_stm_size(3);
    model.set_context(&header).expect("valid configuration");
    let mut rng = rand::rngs::StdRng::seed_from_u64(2);
    for x in alternating_label_stream(10, 6, 1, &mut rng) {
        prequential_step(&mut model, &x);
        assert!(model.ltm().is_empty());
        assert!(model.stm().len() <= 20);
    }
}

#[test]
fn test_abrupt_label_drift_shrinks_stm() {
    let header = StreamHeader::numeric(2, 2);
    let mut model = SamKnn::new().with_limit(400);
    model.set_context(&header).expect("valid configuration");
    let mut rng = rand::rngs::StdRng::seed_from_u64(77);
    let mut stream = uniform_label_stream(200, 2, 0, &mut rng);
    stream.extend(uniform_label_stream(200, 2, 1, &mut rng));

    let mut eval = PrequentialEvaluation::new(50);
    eval.run(&mut model, &stream);

    // The size adaptation cut the pre-drift prefix away.
    assert!(
        model.stm().len() <= 250,
        "STM still holds {} instances",
        model.stm().len()
    );
    assert!(model.acc_current_concept() > 0.8);
    assert!(eval.window_accuracy() > 0.8, "recent accuracy recovered");
    let probe = Instance::shared(vec![0.5, 0.5], 1);
    assert_eq!(class_from_votes(&model.predict(&probe)), 1);
}

#[test]
fn test_recurrent_drift_retains_both_concepts_in_ltm() {
    let header = StreamHeader::numeric(3, 2);
    let mut model = SamKnn::new().with_limit(150).with_min_stm_size(30);
    model.set_context(&header).expect("valid configuration");
    let mut rng = rand::rngs::StdRng::seed_from_u64(41);
    // Two geometric concepts that swap labels every block.
    let concept_a = vec![(vec![0.0, 0.0, 0.0], 0), (vec![5.0, 5.0, 5.0], 1)];
    let concept_b = vec![(vec![0.0, 0.0, 0.0], 1), (vec![5.0, 5.0, 5.0], 0)];
    let mut stream = Vec::new();
    for _ in 0..4 {
        stream.extend(blob_stream(100, &concept_a, 0.5, &mut rng));
        stream.extend(blob_stream(100, &concept_b, 0.5, &mut rng));
    }
    let mut eval = PrequentialEvaluation::new(100);
    eval.run(&mut model, &stream);

    assert!(!model.ltm().is_empty(), "past concepts were archived");
    let labels: std::collections::HashSet<usize> =
        model.ltm().iter().map(|x| x.label()).collect();
    assert!(labels.contains(&0) && labels.contains(&1));
    assert!(model.stm().len() + model.ltm().len() <= 150);
}

#[test]
fn test_adapt_histories_rekeys_relative_to_new_minimum() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new();
    model.set_context(&header).expect("valid configuration");
    model.prediction_histories.insert(0, vec![1, 1, 1]);
    model.prediction_histories.insert(5, vec![1, 0]);
    model.prediction_histories.insert(7, vec![0]);
    model.adapt_histories(1);
    assert_eq!(model.prediction_histories.len(), 2);
    assert_eq!(model.prediction_histories[&0], vec![1, 0]);
    assert_eq!(model.prediction_histories[&2], vec![0]);
}

#[test]
fn test_candidate_sizes_progression() {
    let model = SamKnn::new().with_min_stm_size(50);
    assert_eq!(model.candidate_sizes(200), vec![200, 100, 50]);
    assert_eq!(model.candidate_sizes(150), vec![150, 75]);
}

#[test]
fn test_history_error_rates() {
    assert!((history_error(&[1, 1, 0, 0]) - 0.5).abs() < 1e-9);
    assert!((history_error(&[1, 1]) - 0.0).abs() < 1e-9);
    assert!(history_error(&[]).is_infinite());
}

#[test]
fn test_randomize_features_limits_kernel() {
    let header = StreamHeader::numeric(10, 2);
    let mut model = SamKnn::new();
    model.set_context(&header).expect("valid configuration");
    let mut rng = rand::rngs::StdRng::seed_from_u64(8);
    model
        .randomize_features(4, &mut rng)
        .expect("subset size within range");
    let kernel = model.kernel.as_ref().expect("context set");
    assert_eq!(kernel.attributes().len(), 4);
    let mut sorted = kernel.attributes().to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 4, "attribute indices are unique");

    assert!(model.randomize_features(0, &mut rng).is_err());
    assert!(model.randomize_features(11, &mut rng).is_err());
}

#[test]
fn test_reset_clears_learned_state() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new().with_limit(30);
    model.set_context(&header).expect("valid configuration");
    for i in 0..10 {
        let x = Instance::shared(vec![i as f32], i % 2);
        prequential_step(&mut model, &x);
    }
    model.reset();
    assert!(model.stm().is_empty());
    assert!(model.ltm().is_empty());
    assert_eq!(model.history_len(), 0);
    assert!(model.prediction_histories.is_empty());
}

#[test]
#[should_panic(expected = "no model context")]
fn test_train_without_context_panics() {
    let mut model = SamKnn::new();
    model.train(&Instance::shared(vec![0.0], 0));
}

#[test]
#[should_panic(expected = "no model context")]
fn test_predict_after_after_learning_panics() {
    let header = StreamHeader::numeric(1, 2);
    let mut model = SamKnn::new();
    model.set_context(&header).expect("valid configuration");
    model.after_learning();
    model.predict(&Instance::shared(vec![0.0], 0));
}
