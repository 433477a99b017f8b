#![recursion_limit = "256"]

use clap::Parser;
use mnist_classifier::{cli::Cli, Result};

#[cfg(any(feature = "tch-cpu", feature = "tch-gpu"))]
use burn::backend::{libtorch::LibTorchDevice, LibTorch};
#[cfg(any(
    feature = "ndarray",
    feature = "ndarray-blas-netlib",
    feature = "ndarray-blas-openblas",
    feature = "ndarray-blas-accelerate",
))]
use burn::backend::{ndarray::NdArrayDevice, NdArray};
#[cfg(feature = "wgpu")]
use burn::backend::{wgpu::WgpuDevice, Wgpu};
#[allow(unused_imports)]
use burn::backend::Autodiff;

#[allow(unreachable_code)]
fn launch(cli: &Cli) -> Result<()> {
    #[cfg(any(
        feature = "ndarray",
        feature = "ndarray-blas-netlib",
        feature = "ndarray-blas-openblas",
        feature = "ndarray-blas-accelerate",
    ))]
    return cli.run::<Autodiff<NdArray>>(NdArrayDevice::Cpu);

    #[cfg(all(feature = "tch-gpu", not(target_os = "macos")))]
    return cli.run::<Autodiff<LibTorch>>(LibTorchDevice::Cuda(0));

    #[cfg(all(feature = "tch-gpu", target_os = "macos"))]
    return cli.run::<Autodiff<LibTorch>>(LibTorchDevice::Mps);

    #[cfg(feature = "tch-cpu")]
    return cli.run::<Autodiff<LibTorch>>(LibTorchDevice::Cpu);

    #[cfg(feature = "wgpu")]
    return cli.run::<Autodiff<Wgpu>>(WgpuDevice::default());

    unreachable!("At least one backend will be selected.")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    launch(&cli)
}
