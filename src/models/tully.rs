//! Tully's one-dimensional two-state models, JCP 93, 1061 (1990), and a pair of
//! uncoupled states with a constant gap.
use crate::models::DiabaticModel;
use ndarray::prelude::*;

/// Model I
pub struct SimpleAvoidedCrossing {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl DiabaticModel for SimpleAvoidedCrossing {
    fn nstates(&self) -> usize {
        2
    }

    fn hamiltonian(&self, x: f64) -> Array2<f64> {
        let v11: f64 = x.signum() * self.a * (1.0 - (-self.b * x.abs()).exp());
        let v12: f64 = self.c * (-self.d * x * x).exp();
        array![[v11, v12], [v12, -v11]]
    }

    fn hamiltonian_derivative(&self, x: f64) -> Array2<f64> {
        let dv11: f64 = self.a * self.b * (-self.b * x.abs()).exp();
        let dv12: f64 = -2.0 * self.c * self.d * x * (-self.d * x * x).exp();
        array![[dv11, dv12], [dv12, -dv11]]
    }
}

/// Model II
pub struct DualAvoidedCrossing {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e0: f64,
}

impl DiabaticModel for DualAvoidedCrossing {
    fn nstates(&self) -> usize {
        2
    }

    fn hamiltonian(&self, x: f64) -> Array2<f64> {
        let v22: f64 = -self.a * (-self.b * x * x).exp() + self.e0;
        let v12: f64 = self.c * (-self.d * x * x).exp();
        array![[0.0, v12], [v12, v22]]
    }

    fn hamiltonian_derivative(&self, x: f64) -> Array2<f64> {
        let dv22: f64 = 2.0 * self.a * self.b * x * (-self.b * x * x).exp();
        let dv12: f64 = -2.0 * self.c * self.d * x * (-self.d * x * x).exp();
        array![[0.0, dv12], [dv12, dv22]]
    }
}

/// Model III
pub struct ExtendedCouplingReflection {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl DiabaticModel for ExtendedCouplingReflection {
    fn nstates(&self) -> usize {
        2
    }

    fn hamiltonian(&self, x: f64) -> Array2<f64> {
        let v12: f64 = if x < 0.0 {
            self.b * (self.c * x).exp()
        } else {
            self.b * (2.0 - (-self.c * x).exp())
        };
        array![[self.a, v12], [v12, -self.a]]
    }

    fn hamiltonian_derivative(&self, x: f64) -> Array2<f64> {
        let dv12: f64 = self.b * self.c * (-self.c * x.abs()).exp();
        array![[0.0, dv12], [dv12, 0.0]]
    }
}

pub struct ConstantGap {
    pub gap: f64,
}

impl DiabaticModel for ConstantGap {
    fn nstates(&self) -> usize {
        2
    }

    fn hamiltonian(&self, _x: f64) -> Array2<f64> {
        array![[0.0, 0.0], [0.0, self.gap]]
    }

    fn hamiltonian_derivative(&self, _x: f64) -> Array2<f64> {
        Array2::zeros((2, 2))
    }
}
