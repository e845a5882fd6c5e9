use rprop_net::{
    Activation, Dataset, EndIterationsStrategy, EndMinutesStrategy, Error, ErrorMode,
    FlatNetwork, Greedy, NetworkBuilder, Optimizer, Propagation, PropagationConfig, Train,
    train_to_error,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn xor() -> Dataset {
    Dataset::from_rows(
        &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        &[vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
    )
    .unwrap()
}

fn or() -> Dataset {
    Dataset::from_rows(
        &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        &[vec![0.0], vec![1.0], vec![1.0], vec![1.0]],
    )
    .unwrap()
}

fn xor_net(seed: u64) -> FlatNetwork {
    NetworkBuilder::new(2)
        .unwrap()
        .add_layer(4, Activation::Tanh)
        .unwrap()
        .add_layer(1, Activation::Sigmoid)
        .unwrap()
        .build_with_seed(seed)
        .unwrap()
}

fn perceptron(seed: u64) -> FlatNetwork {
    NetworkBuilder::from_sizes(&[2, 1], &[Activation::Sigmoid])
        .unwrap()
        .build_with_seed(seed)
        .unwrap()
}

#[test]
fn rprop_learns_xor() {
    init_logger();
    let data = xor();

    let mut converged = 0;
    for seed in 0..5 {
        let network = xor_net(seed);
        let initial = network.calculate_error(&data, ErrorMode::Mse).unwrap();

        let mut train = Propagation::resilient(network, &data).unwrap();
        train_to_error(&mut train, 0.01, 1_000).unwrap();
        assert!(train.is_training_done());
        assert!(
            train.error() < initial,
            "seed {seed}: error {} did not improve on {initial}",
            train.error()
        );
        if train.error() <= 0.01 {
            converged += 1;
        }
    }
    assert!(converged > 0, "no seed converged on xor");
}

#[test]
fn backprop_and_manhattan_learn_or() {
    init_logger();
    let data = or();

    for optimizer in [
        Optimizer::Backprop {
            learning_rate: 0.5,
            momentum: 0.5,
        },
        Optimizer::Manhattan {
            learning_rate: 0.01,
            zero_tolerance: 1e-12,
        },
    ] {
        let config = PropagationConfig {
            optimizer,
            ..PropagationConfig::default()
        };
        let mut train = Propagation::new(perceptron(1), &data, config).unwrap();
        for _ in 0..2_000 {
            train.iteration().unwrap();
        }
        assert!(
            train.error() < 0.05,
            "{} ended at error {}",
            optimizer.name(),
            train.error()
        );

        let mut network = train.into_network();
        assert!(network.compute_to_vec(&[0.0, 0.0]).unwrap()[0] < 0.5);
        assert!(network.compute_to_vec(&[1.0, 1.0]).unwrap()[0] > 0.5);
    }
}

#[test]
fn greedy_with_iteration_limit() {
    init_logger();
    let data = xor();
    let mut train = Propagation::resilient(xor_net(7), &data).unwrap();
    train.add_strategy(Box::new(Greedy::new())).unwrap();
    train
        .add_strategy(Box::new(EndIterationsStrategy::new(40)))
        .unwrap();
    train.add_strategy(Box::new(EndMinutesStrategy::new(10))).unwrap();

    let mut errors = Vec::new();
    while !train.is_training_done() {
        train.iteration().unwrap();
        errors.push(train.error());

        // The reported error always belongs to the weights that were kept.
        let actual = train.network().calculate_error(&data, ErrorMode::Mse).unwrap();
        assert!((actual - train.error()).abs() < 1e-12);
    }

    assert_eq!(train.iteration_count(), 40);
    for pair in errors.windows(2) {
        assert!(pair[1] <= pair[0], "greedy let the error rise: {pair:?}");
    }
}

#[test]
fn pause_and_resume_continue_identically() {
    let data = xor();
    let mut a = Propagation::resilient(xor_net(3), &data).unwrap();
    for _ in 0..10 {
        a.iteration().unwrap();
    }
    let snapshot = a.pause().unwrap();
    let network = a.network().clone();

    let mut b = Propagation::resilient(network, &data).unwrap();
    assert!(b.is_valid_resume(&snapshot));
    b.resume(&snapshot).unwrap();

    for _ in 0..10 {
        a.iteration().unwrap();
        b.iteration().unwrap();
    }
    assert_eq!(a.network().weights(), b.network().weights());
    assert_eq!(a.error(), b.error());
}

#[test]
fn resume_rejects_foreign_continuation() {
    let data = xor();
    let single = Dataset::from_rows(&[vec![0.0, 1.0]], &[vec![1.0]]).unwrap();
    let mut small = Propagation::resilient(perceptron(0), &single).unwrap();
    let snapshot = small.pause().unwrap();

    let mut train = Propagation::resilient(xor_net(0), &data).unwrap();
    assert!(!train.is_valid_resume(&snapshot));
    assert!(matches!(train.resume(&snapshot), Err(Error::InvalidData(_))));

    small.finish_training();
    assert!(small.iteration().is_err());
}

#[test]
fn parallel_workers_match_serial() {
    let inputs: Vec<Vec<f64>> = (0..37)
        .map(|i| vec![(i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()])
        .collect();
    let ideals: Vec<Vec<f64>> = inputs
        .iter()
        .map(|x| vec![0.5 + 0.4 * (x[0] * x[1]).tanh()])
        .collect();
    let data = Dataset::from_rows(&inputs, &ideals).unwrap();

    let mut serial = Propagation::resilient(xor_net(11), &data).unwrap();
    let config = PropagationConfig {
        workers: 4,
        ..PropagationConfig::default()
    };
    let mut parallel = Propagation::new(xor_net(11), &data, config).unwrap();

    serial.iteration().unwrap();
    parallel.iteration().unwrap();
    for (s, p) in serial.gradients().iter().zip(parallel.gradients()) {
        assert!((s - p).abs() < 1e-12, "{s} vs {p}");
    }

    for _ in 0..5 {
        serial.iteration().unwrap();
        parallel.iteration().unwrap();
    }
    for (s, p) in serial.network().weights().iter().zip(parallel.network().weights()) {
        assert!((s - p).abs() < 1e-9, "{s} vs {p}");
    }
    assert!((serial.error() - parallel.error()).abs() < 1e-12);
}

#[test]
fn empty_and_mismatched_data_are_rejected() {
    let empty = Dataset::from_flat(vec![], vec![], 2, 1).unwrap();
    assert!(matches!(
        Propagation::resilient(xor_net(0), &empty),
        Err(Error::EmptyDataset)
    ));

    let wrong_ideal = Dataset::from_rows(&[vec![0.0, 0.0]], &[vec![0.0, 1.0]]).unwrap();
    assert!(matches!(
        Propagation::resilient(xor_net(0), &wrong_ideal),
        Err(Error::InvalidData(_))
    ));
}
