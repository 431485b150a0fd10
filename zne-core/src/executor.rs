//! Execution backends
//!
//! The sweep driver only sees the [`Executor`] trait. The local state-vector
//! simulator lives in [`crate::simulator`]; hardware executors are provided
//! by integration crates.

use crate::circuit::Circuit;
use crate::error::Result;
use crate::histogram::Histogram;
use crate::noise_model::NoiseModel;
use async_trait::async_trait;

/// A backend that can run a circuit for a number of shots
#[async_trait]
pub trait Executor: Send + Sync {
    /// Backend name, used in logs and errors
    fn name(&self) -> &str;

    /// Rewrite a circuit into the form the backend executes
    ///
    /// Called once on the base circuit and again on every amplified circuit.
    fn transpile(&self, circuit: &Circuit) -> Result<Circuit> {
        Ok(circuit.clone())
    }

    /// Widest circuit the backend accepts, if it has a limit
    fn max_qubits(&self) -> Option<usize> {
        None
    }

    /// Run `circuit` for `shots` shots, optionally under `noise`
    ///
    /// Backends that cannot apply a software noise model ignore it.
    async fn execute(
        &self,
        circuit: &Circuit,
        shots: u32,
        noise: Option<&NoiseModel>,
    ) -> Result<Histogram>;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for &E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transpile(&self, circuit: &Circuit) -> Result<Circuit> {
        (**self).transpile(circuit)
    }

    fn max_qubits(&self) -> Option<usize> {
        (**self).max_qubits()
    }

    async fn execute(
        &self,
        circuit: &Circuit,
        shots: u32,
        noise: Option<&NoiseModel>,
    ) -> Result<Histogram> {
        (**self).execute(circuit, shots, noise).await
    }
}
