// conversion from femtoseconds to atomic units of time
pub const FS_TO_AU: f64 = 41.341_373_335_18;
// Boltzmann constant in hartree per kelvin
pub const K_BOLTZMANN: f64 = 3.166_811_563e-6;
