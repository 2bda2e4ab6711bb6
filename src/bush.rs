use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex};
use rayon::prelude::*;

use super::dijkstra::shortest_path;
use super::error::AssignError;
use super::network::Network;

/// Floor applied to free-flow costs when classifying reasonable links, so
/// zero-cost links cannot produce equal labels and sneak a cycle into a bush.
pub const MIN_LINK_COST: f64 = 1e-6;

/// The acyclic "reasonable link" subgraph for one origin.  A link (i,j) is
/// reasonable iff the free-flow shortest-path label of i is strictly below
/// that of j, i.e. the link leads strictly farther from the origin.  The
/// topology is fixed when the bush is built and never updated afterwards.
pub struct Bush {
    pub origin: NodeIndex,
    /// every node, in a topological order of the bush; order[0] is the origin
    pub order: Vec<NodeIndex>,
    /// reasonable links out of each node
    pub forward: Vec<Vec<EdgeIndex>>,
    /// reasonable links into each node
    pub reverse: Vec<Vec<EdgeIndex>>,
    pub num_links: usize,
    /// bush paths to zones this origin actually sends demand to; saturates
    /// rather than overflowing since path counts grow exponentially
    pub num_paths: u64,
}

impl Bush {
    /// Classify reasonable links from the origin's free-flow labels and sort
    /// them topologically.  Link costs must already hold free-flow values
    /// (see `BushSet::initialize`).
    fn build(network: &Network, origin: NodeIndex) -> Result<Bush, AssignError> {
        let num_nodes = network.num_nodes();
        let sp_cost = shortest_path(network, origin);

        let mut forward: Vec<Vec<EdgeIndex>> = vec![vec![]; num_nodes];
        let mut reverse: Vec<Vec<EdgeIndex>> = vec![vec![]; num_nodes];
        let mut num_links = 0;
        for link_id in network.link_ids() {
            let (tail, head) = network.link_endpoints(link_id);
            if sp_cost[tail.index()] < sp_cost[head.index()] {
                forward[tail.index()].push(link_id);
                reverse[head.index()].push(link_id);
                num_links += 1;
            }
        }

        let order = topological_order(network, origin, &forward, &reverse)?;
        let mut bush = Bush {
            origin,
            order,
            forward,
            reverse,
            num_links,
            num_paths: 0,
        };
        bush.num_paths = bush.count_paths(network);
        return Ok(bush);
    }

    /// Count distinct bush paths from the origin to each zone with positive
    /// demand.  Uses the recurrence paths(j) = sum of paths(i) over
    /// reasonable links (i,j), evaluated in topological order.
    fn count_paths(&self, network: &Network) -> u64 {
        let mut path_count = vec![0u64; network.num_nodes()];
        path_count[self.origin.index()] = 1;
        let mut total: u64 = 0;
        for &jj in &self.order[1..] {
            let mut count: u64 = 0;
            for &link_id in &self.reverse[jj.index()] {
                let (tail, _) = network.link_endpoints(link_id);
                count = count.saturating_add(path_count[tail.index()]);
            }
            path_count[jj.index()] = count;
            if jj.index() < network.num_zones()
                && network.demand(self.origin.index(), jj.index()) > 0.0
            {
                total = total.saturating_add(count);
            }
        }
        return total;
    }
}

/// Kahn's algorithm over the reasonable links, with the origin forced into
/// position zero.  Nodes outside the bush have no reasonable links at all
/// and land wherever their zero in-degree puts them.
fn topological_order(network: &Network, origin: NodeIndex, forward: &[Vec<EdgeIndex>],
                     reverse: &[Vec<EdgeIndex>]) -> Result<Vec<NodeIndex>, AssignError> {
    let num_nodes = forward.len();
    let mut indegree: Vec<usize> = reverse.iter().map(|links| links.len()).collect();

    // no reasonable link can enter the origin (its label is zero), so a
    // nonzero in-degree here means the subgraph is malformed
    if indegree[origin.index()] != 0 {
        return Err(AssignError::CyclicBush { origin: origin.index() });
    }

    let mut queue = VecDeque::new();
    queue.push_back(origin);
    for ii in 0..num_nodes {
        if indegree[ii] == 0 && ii != origin.index() {
            queue.push_back(NodeIndex::new(ii));
        }
    }

    let mut order = Vec::with_capacity(num_nodes);
    while let Some(ii) = queue.pop_front() {
        order.push(ii);
        for &link_id in &forward[ii.index()] {
            let (_, head) = network.link_endpoints(link_id);
            indegree[head.index()] -= 1;
            if indegree[head.index()] == 0 {
                queue.push_back(head);
            }
        }
    }

    if order.len() < num_nodes {
        return Err(AssignError::CyclicBush { origin: origin.index() });
    }
    return Ok(order);
}

/// Scratch arrays for the loading sweeps, shared across origins.  Contents
/// are only meaningful for the origin passed to the most recent
/// `bush_shortest_path` / `dial_flows` call; the aggregator must read them
/// before moving on to the next origin.
pub struct LoadingScratch {
    pub sp_cost: Vec<f64>,
    pub flow: Vec<f64>,
    pub node_flow: Vec<f64>,
    pub weight: Vec<f64>,
    pub node_weight: Vec<f64>,
    pub likelihood: Vec<f64>,
}

impl LoadingScratch {
    fn new(num_nodes: usize, num_links: usize) -> LoadingScratch {
        return LoadingScratch {
            sp_cost: vec![0.0; num_nodes],
            flow: vec![0.0; num_links],
            node_flow: vec![0.0; num_nodes],
            weight: vec![0.0; num_links],
            node_weight: vec![0.0; num_nodes],
            likelihood: vec![0.0; num_links],
        };
    }
}

/// One bush per origin zone plus the shared loading scratch.
pub struct BushSet {
    bushes: Vec<Bush>,
    scratch: LoadingScratch,
}

impl BushSet {
    /// Build all bushes from free-flow costs.  Each origin's build only
    /// needs its own label vector, so the origins run in parallel.
    pub fn initialize(network: &mut Network) -> Result<BushSet, AssignError> {
        network.set_free_flow_costs(MIN_LINK_COST);
        let shared: &Network = network;
        let bushes: Vec<Bush> = (0..shared.num_zones())
            .into_par_iter()
            .map(|rr| Bush::build(shared, NodeIndex::new(rr)))
            .collect::<Result<_, _>>()?;
        let scratch = LoadingScratch::new(network.num_nodes(), network.num_links());
        return Ok(BushSet { bushes, scratch });
    }

    pub fn bush(&self, origin: usize) -> &Bush {
        return &self.bushes[origin];
    }

    pub fn num_bushes(&self) -> usize {
        return self.bushes.len();
    }

    pub fn total_links(&self) -> usize {
        return self.bushes.iter().map(|bush| bush.num_links).sum();
    }

    pub fn total_paths(&self) -> u64 {
        return self.bushes.iter().fold(0u64, |acc, bush| acc.saturating_add(bush.num_paths));
    }

    pub fn scratch(&self) -> &LoadingScratch {
        return &self.scratch;
    }

    /// Shortest path labels over bush links only, from current link costs.
    /// The bush is acyclic, so one relaxation pass in topological order
    /// suffices.  Nodes unreachable within the bush keep infinity.
    pub fn bush_shortest_path(&mut self, network: &Network, origin: usize) {
        let bush = &self.bushes[origin];
        let scratch = &mut self.scratch;
        scratch.sp_cost[bush.origin.index()] = 0.0;
        for &ii in &bush.order[1..] {
            let mut best = f64::INFINITY;
            for &link_id in &bush.reverse[ii.index()] {
                let (tail, _) = network.link_endpoints(link_id);
                let candidate = scratch.sp_cost[tail.index()] + network.link(link_id).cost;
                best = best.min(candidate);
            }
            scratch.sp_cost[ii.index()] = best;
        }
    }

    /// Dial's STOCH loading for one origin: likelihoods from the bush
    /// labels, a forward weight sweep, then a reverse flow sweep.  Leaves
    /// this origin's link flows in `scratch.flow`; links outside the bush
    /// are exactly zero.
    pub fn dial_flows(&mut self, network: &Network, origin: usize, theta: f64) {
        self.bush_shortest_path(network, origin);
        let bush = &self.bushes[origin];
        let scratch = &mut self.scratch;

        // 1. link likelihoods, resetting flows so unreasonable links stay zero
        for link_id in network.link_ids() {
            let (ii, jj) = network.link_endpoints(link_id);
            let ij = link_id.index();
            scratch.flow[ij] = 0.0;
            scratch.likelihood[ij] = if scratch.sp_cost[ii.index()].is_infinite() {
                0.0
            } else {
                let gap = scratch.sp_cost[jj.index()] - scratch.sp_cost[ii.index()]
                    - network.link(link_id).cost;
                (theta * gap).exp()
            };
        }

        // 2. node and link weights, in topological order.  The origin's
        //    weight is one; every bush link's weight is its tail's node
        //    weight times its likelihood.
        scratch.node_weight[bush.origin.index()] = 1.0;
        for (position, &ii) in bush.order.iter().enumerate() {
            if position > 0 {
                let mut node_weight = 0.0;
                for &link_id in &bush.reverse[ii.index()] {
                    node_weight += scratch.weight[link_id.index()];
                }
                scratch.node_weight[ii.index()] = node_weight;
            }
            for &link_id in &bush.forward[ii.index()] {
                scratch.weight[link_id.index()] =
                    scratch.node_weight[ii.index()] * scratch.likelihood[link_id.index()];
            }
        }

        // 3. node and link flows, in reverse topological order.  A node's
        //    flow is its own demand plus everything passing through it;
        //    incoming links split that in proportion to their weights.
        for &ii in bush.order.iter().rev() {
            let mut node_flow = if ii.index() < network.num_zones() {
                network.demand(origin, ii.index())
            } else {
                0.0
            };
            for &link_id in &bush.forward[ii.index()] {
                node_flow += scratch.flow[link_id.index()];
            }
            scratch.node_flow[ii.index()] = node_flow;
            for &link_id in &bush.reverse[ii.index()] {
                let ij = link_id.index();
                scratch.flow[ij] = if scratch.node_weight[ii.index()] == 0.0 {
                    0.0
                } else {
                    node_flow * scratch.weight[ij] / scratch.node_weight[ii.index()]
                };
            }
        }
    }
}
