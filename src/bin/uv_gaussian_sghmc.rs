use ndarray::arr1;
use rs_sghmc::target::IsotropicGaussian;
use rs_sghmc::{SamplerError, SghmcConfig, Sghmc};

/// Samples from a standard normal using the libs SGHMC implementation.
fn main() -> Result<(), SamplerError> {
    let mut sghmc = Sghmc::new(
        IsotropicGaussian::standard(),
        vec![arr1(&[2.]).into_dyn()],
        SghmcConfig::default(),
    )?;
    sghmc
        .sample(10000)?
        .iter()
        .for_each(|s| println!("{}", s.params[0][[0]]));
    Ok(())
}
