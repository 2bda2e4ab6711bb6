// Stochastic user equilibrium traffic assignment: the method of successive
// averages with a fixed step size, using Dial's STOCH loading on per-origin
// reasonable-link bushes and BPR link cost functions.

mod network;
pub use network::{Link, Network, Node};

mod dijkstra;
pub use dijkstra::shortest_path;

mod bush;
pub use bush::{Bush, BushSet, LoadingScratch, MIN_LINK_COST};

mod msa;
pub use msa::{avg_flow_diff, calculate_target, shift_flows, solve, SolveStats};

mod settings;
pub use settings::MsaSettings;

mod tntp;
pub use tntp::read_tntp_network;

mod error;
pub use error::AssignError;
