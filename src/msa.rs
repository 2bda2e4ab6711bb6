use std::time::Instant;

use super::bush::BushSet;
use super::error::AssignError;
use super::network::Network;
use super::settings::MsaSettings;

/// What the solver did, for callers that want more than log lines.
#[derive(Clone, Debug)]
pub struct SolveStats {
    pub iterations: u32,
    /// average absolute link-flow gap at the last convergence check
    pub flow_gap: f64,
    pub elapsed_s: f64,
    /// false when the run stopped on the iteration or time limit instead
    pub converged: bool,
    pub num_bush_links: usize,
    pub num_bush_paths: u64,
}

/// Method of successive averages with fixed step size.  Each iteration
/// recomputes link costs from the current flows, computes the logit target
/// via Dial loading, and steps the flows a fraction `lambda` toward it.
/// Hitting the time or iteration limit is a normal termination, not an
/// error; the current iterate is kept either way.
pub fn solve(network: &mut Network, theta: f64, lambda: f64,
             settings: &MsaSettings) -> Result<SolveStats, AssignError> {
    if !(theta > 0.0) {
        return Err(AssignError::Parameter(
            format!("theta must be positive, got {}", theta)));
    }
    if !(lambda > 0.0 && lambda <= 1.0) {
        return Err(AssignError::Parameter(
            format!("lambda must be in (0, 1], got {}", lambda)));
    }

    let start = Instant::now();
    let mut bushes = initialize_solution(network, theta)?;
    let num_bush_links = bushes.total_links();
    let num_bush_paths = bushes.total_paths();
    log::debug!("{} bush links, {} paths", num_bush_links, num_bush_paths);
    log::info!("initialization done in {:.3} s", start.elapsed().as_secs_f64());

    let mut iteration = 0;
    loop {
        network.update_link_costs();
        let target = calculate_target(network, &mut bushes, theta);
        let flow_gap = avg_flow_diff(network, &target);
        let elapsed_s = start.elapsed().as_secs_f64();
        log::info!("iteration {}: flow diff {:.3}, time {:.3}",
                   iteration, flow_gap, elapsed_s);

        let converged = flow_gap < settings.link_flow_tolerance;
        if converged || elapsed_s > settings.max_time_s
            || iteration >= settings.max_iterations {
            return Ok(SolveStats {
                iterations: iteration,
                flow_gap,
                elapsed_s,
                converged,
                num_bush_links,
                num_bush_paths,
            });
        }

        shift_flows(network, &target, lambda);
        iteration += 1;
    }
}

/// Build the bushes and set the initial flows to the free-flow-cost target,
/// i.e. a pure Dial loading before any averaging has happened.
fn initialize_solution(network: &mut Network, theta: f64) -> Result<BushSet, AssignError> {
    let mut bushes = BushSet::initialize(network)?;
    let target = calculate_target(network, &mut bushes, theta);
    for (link, target_flow) in network.links_mut().zip(&target) {
        link.flow = *target_flow;
    }
    return Ok(bushes);
}

/// Sum each origin's Dial flows into a single target vector.  The scratch
/// flow array is overwritten by the next origin, so it is folded in before
/// the loop advances.
pub fn calculate_target(network: &Network, bushes: &mut BushSet, theta: f64) -> Vec<f64> {
    let mut target = vec![0.0; network.num_links()];
    for rr in 0..network.num_zones() {
        bushes.dial_flows(network, rr, theta);
        for (target_flow, flow) in target.iter_mut().zip(&bushes.scratch().flow) {
            *target_flow += *flow;
        }
    }
    return target;
}

/// Average absolute difference between current link flows and the target.
pub fn avg_flow_diff(network: &Network, target: &[f64]) -> f64 {
    let total: f64 = network.links().zip(target)
        .map(|(link, target_flow)| (link.flow - target_flow).abs())
        .sum();
    return total / network.num_links() as f64;
}

/// Step every link flow by `step_size` toward the target.
pub fn shift_flows(network: &mut Network, target: &[f64], step_size: f64) {
    for (link, target_flow) in network.links_mut().zip(target) {
        link.flow += step_size * (target_flow - link.flow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Link;
    use approx::assert_relative_eq;

    /// the two-node, one-link network of the convergence scenario
    fn single_link_network() -> Network {
        let mut network = Network::new(2, 2, 0);
        network.add_link(0, 1, Link::new(100.0, 0.0, 1.0, 0.15, 4.0, 0.0, 0.0, 1));
        network.finalize(0.0, 0.0, 0.0);
        network.set_demand(0, 1, 50.0);
        return network;
    }

    #[test]
    fn test_flow_diff_zero_iff_equal() {
        let mut network = single_link_network();
        for link in network.links_mut() {
            link.flow = 50.0;
        }
        assert_eq!(avg_flow_diff(&network, &[50.0]), 0.0);
        assert!(avg_flow_diff(&network, &[49.0]) > 0.0);
    }

    #[test]
    fn test_shift_flows_is_convex_combination() {
        let mut network = single_link_network();
        for link in network.links_mut() {
            link.flow = 10.0;
        }
        shift_flows(&mut network, &[30.0], 0.5);
        let flow = network.links().next().unwrap().flow;
        assert_relative_eq!(flow, 20.0);
        // a full step lands exactly on the target
        shift_flows(&mut network, &[30.0], 1.0);
        assert_relative_eq!(network.links().next().unwrap().flow, 30.0);
    }

    #[test]
    fn test_solve_single_link() {
        let mut network = single_link_network();
        let stats = solve(&mut network, 1.0, 0.5, &MsaSettings::default()).unwrap();
        assert!(stats.converged);
        let link = network.links().next().unwrap();
        assert_relative_eq!(link.flow, 50.0);
        // BPR at half capacity with the quartic exponent
        assert_relative_eq!(link.cost, 1.0 + 0.15 * 0.5f64.powi(4), epsilon = 1e-9);
    }

    #[test]
    fn test_solve_rejects_bad_parameters() {
        let mut network = single_link_network();
        assert!(solve(&mut network, 0.0, 0.5, &MsaSettings::default()).is_err());
        assert!(solve(&mut network, 1.0, 0.0, &MsaSettings::default()).is_err());
        assert!(solve(&mut network, 1.0, 1.5, &MsaSettings::default()).is_err());
    }

    #[test]
    fn test_flows_stay_nonnegative() {
        let mut network = single_link_network();
        network.add_link(1, 0, Link::new(100.0, 0.0, 1.0, 0.15, 4.0, 0.0, 0.0, 1));
        network.finalize(0.0, 0.0, 0.0);
        network.set_demand(0, 1, 50.0);
        let settings = MsaSettings { max_iterations: 20, ..MsaSettings::default() };
        solve(&mut network, 1.0, 0.7, &settings).unwrap();
        for link in network.links() {
            assert!(link.flow >= 0.0);
        }
    }
}
