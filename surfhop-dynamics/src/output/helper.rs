use log::{debug, info, warn};

pub fn print_header_dynamics(nstep: usize, ntraj: usize, nstates: usize) {
    warn!("{: ^90}", "Surface Hopping Dynamics");
    warn!("{:-^90}", "");
    info!("{: <30} {:>12}", "Number of steps:", nstep);
    info!("{: <30} {:>12}", "Number of trajectories:", ntraj);
    info!("{: <30} {:>12}", "Number of electronic states:", nstates);
    warn!("{:-^90}", "");
}

pub fn print_header_dynamics_step(step: usize) {
    debug!("{:^90}", "");
    debug!("{: ^90}", format!("Molecular Dynamics Step {}", step));
    debug!("{:-^90}", "");
}

pub fn print_step_summary(
    time: f64,
    total_energy: f64,
    populations: &[f64],
    accepted: usize,
    frustrated: usize,
) {
    let pops: String = populations
        .iter()
        .map(|p| format!("{:>8.4}", p))
        .collect::<Vec<String>>()
        .join(" ");
    debug!(
        "t = {:>10.3} fs  E_tot = {:>14.8} Eh  pops: {}",
        time, total_energy, pops
    );
    if accepted > 0 || frustrated > 0 {
        info!("accepted hops: {:>5}  frustrated hops: {:>5}", accepted, frustrated);
    }
}

pub fn print_footer_dynamics_step(timing: f64) {
    debug!("{:-<90} ", "");
    debug!(
        "{:>78} {:>8.2} s",
        "Molecular Dynamics Step finished in", timing
    );
}

pub fn print_footer_dynamics(timing: f64) {
    warn!("{:-<90} ", "");
    warn!("{:>78} {:>8.2} s", "Surface Hopping Dynamics finished in", timing);
}
