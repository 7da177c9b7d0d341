use ndarray::arr0;
use rs_sghmc::target::Banana;
use rs_sghmc::{SamplerError, SghmcConfig, Sghmc};

/// Samples from the banana density with the libs SGHMC implementation.
fn main() -> Result<(), SamplerError> {
    let config = SghmcConfig {
        epsilon: 0.1,
        burn_in_steps: 1000,
        seed: Some(1),
        ..Default::default()
    };
    let mut sghmc = Sghmc::new(Banana, vec![arr0(0.).into_dyn(), arr0(10.).into_dyn()], config)?;
    sghmc
        .sample(10000)?
        .iter()
        .for_each(|s| println!("{}\t{}", s.params[0], s.params[1]));
    Ok(())
}
