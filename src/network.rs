use ndarray::prelude::*;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};

/// Nodes carry no data of their own; everything interesting lives on the
/// links and in the demand matrix.
#[derive(Clone, Debug, Default)]
pub struct Node;

/// Selects the BPR evaluation branch once when the link is constructed, so
/// the per-link inner loop does no dispatch on beta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BprKind {
    Linear,
    Quartic,
    General,
}

impl BprKind {
    fn from_beta(beta: f64) -> BprKind {
        if beta == 1.0 {
            return BprKind::Linear;
        } else if beta == 4.0 {
            return BprKind::Quartic;
        } else {
            return BprKind::General;
        }
    }
}

/// A directed road link.  Field order follows the TNTP link-file columns;
/// `fixed_cost`, `flow` and `cost` are filled in by `Network::finalize` and
/// the solver rather than the input file.
#[derive(Clone, Debug)]
pub struct Link {
    pub capacity: f64,
    pub length: f64,
    pub free_flow_time: f64,
    pub alpha: f64,
    pub beta: f64,
    pub speed_limit: f64,
    pub toll: f64,
    pub link_type: i32,
    /// length * distance factor + toll * toll factor, set once at finalization.
    pub fixed_cost: f64,
    pub flow: f64,
    pub cost: f64,
    bpr: BprKind,
}

impl Link {
    pub fn new(capacity: f64, length: f64, free_flow_time: f64, alpha: f64, beta: f64,
               speed_limit: f64, toll: f64, link_type: i32) -> Link {
        return Link {
            capacity,
            length,
            free_flow_time,
            alpha,
            beta,
            speed_limit,
            toll,
            link_type,
            fixed_cost: 0.0,
            flow: 0.0,
            cost: free_flow_time,
            bpr: BprKind::from_beta(beta),
        };
    }

    /// Evaluate the BPR congestion function at the link's current flow.
    pub fn evaluate_cost(&self) -> f64 {
        match self.bpr {
            BprKind::Linear => {
                self.fixed_cost
                    + self.free_flow_time * (1.0 + self.alpha * self.flow / self.capacity)
            }
            BprKind::Quartic => {
                let mut yy = self.flow / self.capacity;
                yy *= yy;
                yy *= yy;
                self.fixed_cost + self.free_flow_time * (1.0 + self.alpha * yy)
            }
            BprKind::General => {
                if self.flow <= 0.0 {
                    // guards 0^0 and negative bases for non-integer exponents
                    return self.free_flow_time + self.fixed_cost;
                }
                self.fixed_cost
                    + self.free_flow_time
                        * (1.0 + self.alpha * (self.flow / self.capacity).powf(self.beta))
            }
        }
    }
}

/// The road network: topology and link attributes in a petgraph digraph,
/// plus the zone-to-zone demand matrix.  Zones occupy node indices
/// `0..num_zones`; nodes below `first_through_node` are centroids and may
/// never be transited during shortest-path search.
pub struct Network {
    graph: DiGraph<Node, Link>,
    demand: Array2<f64>,
    num_zones: usize,
    first_through_node: usize,
    total_od_flow: f64,
    distance_factor: f64,
    toll_factor: f64,
}

impl Network {
    pub fn new(num_nodes: usize, num_zones: usize, first_through_node: usize) -> Network {
        let mut graph = DiGraph::with_capacity(num_nodes, 0);
        for _ in 0..num_nodes {
            graph.add_node(Node);
        }
        return Network {
            graph,
            demand: Array2::zeros((num_zones, num_zones)),
            num_zones,
            first_through_node,
            total_od_flow: 0.0,
            distance_factor: 0.0,
            toll_factor: 0.0,
        };
    }

    /// Link ids are assigned in insertion order, so the i-th link added gets
    /// `EdgeIndex` i.  The TNTP reader relies on this to keep file order.
    pub fn add_link(&mut self, tail: usize, head: usize, link: Link) -> EdgeIndex {
        return self.graph.add_edge(NodeIndex::new(tail), NodeIndex::new(head), link);
    }

    pub fn set_demand(&mut self, origin: usize, dest: usize, demand: f64) {
        self.demand[[origin, dest]] = demand;
    }

    pub fn demand(&self, origin: usize, dest: usize) -> f64 {
        return self.demand[[origin, dest]];
    }

    pub fn total_demand_from(&self, origin: usize) -> f64 {
        return self.demand.row(origin).sum();
    }

    /// Bind the cost factors and derive each link's fixed cost.  Costs are
    /// reset to free-flow values and flows to zero, matching a freshly
    /// loaded network.
    pub fn finalize(&mut self, distance_factor: f64, toll_factor: f64, total_od_flow: f64) {
        self.distance_factor = distance_factor;
        self.toll_factor = toll_factor;
        self.total_od_flow = total_od_flow;
        for link in self.graph.edge_weights_mut() {
            link.fixed_cost = link.length * distance_factor + link.toll * toll_factor;
            link.cost = link.free_flow_time + link.fixed_cost;
            link.flow = 0.0;
        }
    }

    pub fn num_nodes(&self) -> usize {
        return self.graph.node_count();
    }

    pub fn num_links(&self) -> usize {
        return self.graph.edge_count();
    }

    pub fn num_zones(&self) -> usize {
        return self.num_zones;
    }

    pub fn first_through_node(&self) -> usize {
        return self.first_through_node;
    }

    pub fn total_od_flow(&self) -> f64 {
        return self.total_od_flow;
    }

    pub fn graph(&self) -> &DiGraph<Node, Link> {
        return &self.graph;
    }

    pub fn link(&self, id: EdgeIndex) -> &Link {
        return &self.graph[id];
    }

    pub fn link_mut(&mut self, id: EdgeIndex) -> &mut Link {
        return &mut self.graph[id];
    }

    pub fn link_endpoints(&self, id: EdgeIndex) -> (NodeIndex, NodeIndex) {
        return self.graph.edge_endpoints(id).expect("link id out of range");
    }

    pub fn link_ids(&self) -> petgraph::graph::EdgeIndices {
        return self.graph.edge_indices();
    }

    /// Links in id order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        return self.graph.edge_weights();
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut Link> {
        return self.graph.edge_weights_mut();
    }

    /// Refresh every link's cost from its current flow.
    pub fn update_link_costs(&mut self) {
        for link in self.graph.edge_weights_mut() {
            link.cost = link.evaluate_cost();
        }
    }

    /// Set every link's cost to its free-flow value, floored at `floor` so
    /// that zero-cost links cannot produce ties in the reasonable-link test.
    pub fn set_free_flow_costs(&mut self, floor: f64) {
        for link in self.graph.edge_weights_mut() {
            link.cost = (link.free_flow_time + link.fixed_cost).max(floor);
        }
    }

    pub fn log_summary(&self) {
        log::debug!("network has {} nodes, {} links, {} zones, first through node {}",
                    self.num_nodes(), self.num_links(), self.num_zones,
                    self.first_through_node);
        log::debug!("distance factor {}, toll factor {}",
                    self.distance_factor, self.toll_factor);
    }
}
