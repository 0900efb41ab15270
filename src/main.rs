use burn::tensor::backend::Backend;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use rand::{rngs::StdRng, Rng, SeedableRng};

use knotnet::knotnet::architectures::base::{
    mlp::MlpConfig,
    train::{LogMetricLogger, Targets, Trainer},
};
use knotnet::settings;
use knotnet::test_utils::tensor_from_f32_vec;

type DemoBackend = Autodiff<NdArray<f32>>;

fn main() {
    env_logger::init();

    let config = settings();
    println!("knotnet starting...");
    println!("Data dir: {:?}", config.knotnet.data_dir);
    println!("Default seed: {}", config.knotnet.default_seed);

    let device = <DemoBackend as Backend>::Device::default();
    let mut rng = StdRng::seed_from_u64(config.knotnet.default_seed);

    // Tiny regression demo: 8 random 7x7 Lk matrices with synthetic
    // signature targets, a few optimizer steps on the shared contract.
    let model = MlpConfig::new(7, 64, 0.1)
        .init::<DemoBackend>(&device)
        .expect("valid demo configuration");
    let mut trainer = Trainer::new(model).expect("valid demo schedule");
    let mut logger = LogMetricLogger;

    let batch_size = 8;
    let input_width = 7 * 7;
    for step in 0..5 {
        let inputs: Vec<f32> = (0..batch_size * input_width)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        let targets: Vec<f32> = (0..batch_size).map(|_| rng.gen_range(-4.0..4.0)).collect();

        let input =
            tensor_from_f32_vec::<DemoBackend, 2>(&inputs, &[batch_size, input_width], &device);
        let target = Targets::Values(tensor_from_f32_vec::<DemoBackend, 2>(
            &targets,
            &[batch_size, 1],
            &device,
        ));

        match trainer.train_step(input, &target, &mut logger) {
            Ok(loss) => println!(
                "step {}: train_loss = {:.6} (lr {:.6})",
                step,
                loss,
                trainer.learning_rate()
            ),
            Err(err) => {
                eprintln!("training step failed: {}", err);
                return;
            }
        }
    }
    trainer.end_epoch();
    println!("epoch complete, next lr {:.6}", trainer.learning_rate());
}
