use ndarray::arr1;
use rs_sghmc::target::GaussianMixture;
use rs_sghmc::{DualAveragingStepsizeSchedule, SamplerError, SghmcConfig, Sghmc};

/// Samples from a mixture of three normals, with the stepsize tuned by dual averaging.
fn main() -> Result<(), SamplerError> {
    let target = GaussianMixture::new(
        arr1(&[0.3, 0.3, 0.4]),
        arr1(&[-5., 0., 5.]),
        arr1(&[1., 1., 1.]),
    )?;
    let config = SghmcConfig {
        burn_in_steps: 1000,
        seed: Some(1),
        ..Default::default()
    };
    let mut sghmc = Sghmc::new(target, vec![arr1(&[1.]).into_dyn()], config)?;
    let mut schedule = DualAveragingStepsizeSchedule::new(1.).with_adaptation_steps(1000);
    let epsilon = schedule.initialize_from(&mut sghmc)?;
    eprintln!("initial stepsize {epsilon}");
    let mut sghmc = sghmc.with_stepsize_schedule(schedule);
    sghmc
        .sample(10000)?
        .iter()
        .for_each(|s| println!("{}", s.params[0][[0]]));
    Ok(())
}
