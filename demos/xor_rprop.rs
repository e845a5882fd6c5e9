use rprop_net::{
    Activation, Dataset, EndMinutesStrategy, Greedy, NetworkBuilder, Propagation, Train,
    train_to_error,
};

fn main() -> rprop_net::Result<()> {
    env_logger::init();

    // Classic XOR dataset.
    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let data = Dataset::from_rows(&xs, &ys)?;

    // 2 -> 4 -> 1 network: tanh hidden layer, sigmoid output.
    let network = NetworkBuilder::new(2)?
        .add_layer(4, Activation::Tanh)?
        .add_layer(1, Activation::Sigmoid)?
        .build_with_seed(0)?;

    let mut train = Propagation::resilient(network, &data)?;
    train.add_strategy(Box::new(Greedy::new()))?;
    train.add_strategy(Box::new(EndMinutesStrategy::new(1)))?;

    let iterations = train_to_error(&mut train, 0.001, 10_000)?;
    println!("iterations={iterations} error={}", train.error());

    let mut network = train.into_network();
    for x in xs {
        let y = network.compute_to_vec(&x)?;
        println!("x={x:?} y={:.4}", y[0]);
    }

    Ok(())
}
