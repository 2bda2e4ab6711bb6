use std::cmp::Ordering;

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use priority_queue::PriorityQueue;

use super::network::Network;

#[derive(Clone, Debug)]
struct QueueEntry {
    node_id: usize,
    cost_label: f64,
}

impl QueueEntry {
    fn new(node_id: usize, cost_label: f64) -> QueueEntry {
        return QueueEntry { node_id, cost_label };
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse the ordering so the max-priority queue pops the cheapest label
        if self.cost_label < other.cost_label {
            return Ordering::Greater;
        } else if self.cost_label > other.cost_label {
            return Ordering::Less;
        } else {
            return other.node_id.cmp(&self.node_id);
        }
    }
}

// Implementing Ord requires all of the below traits
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        return self.cmp(other) == Ordering::Equal;
    }
}

impl Eq for QueueEntry {}

/// Single-origin Dijkstra over the full network using current link costs.
/// Returns one cost label per node; unreached nodes keep infinity.  Only the
/// labels are needed to identify reasonable links, so no predecessor tree is
/// built.
///
/// Nodes below the network's first through node are centroids: their labels
/// are updated when an edge reaches them, but they are never queued for
/// expansion, so no route may pass through them.  The origin itself is
/// exempt from this rule.
pub fn shortest_path(network: &Network, origin: NodeIndex) -> Vec<f64> {
    let mut labels = vec![f64::INFINITY; network.num_nodes()];
    labels[origin.index()] = 0.0;

    let mut queue = PriorityQueue::new();
    queue.push(origin, QueueEntry::new(origin.index(), 0.0));

    while let Some((curnode, _)) = queue.pop() {
        for edge in network.graph().edges_directed(curnode, Direction::Outgoing) {
            let jj = edge.target();
            let temp_label = labels[curnode.index()] + edge.weight().cost;
            if temp_label < labels[jj.index()] {
                labels[jj.index()] = temp_label;
                if jj.index() < network.first_through_node() && jj != origin {
                    // centroid: record the label but don't expand out of it
                    continue;
                }
                let entry = QueueEntry::new(jj.index(), temp_label);
                // update the priority if it's in the queue, or insert it if not
                if queue.change_priority(&jj, entry.clone()).is_none() {
                    queue.push(jj, entry);
                }
            }
        }
    }

    return labels;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Link;

    fn unit_link(free_flow_time: f64) -> Link {
        return Link::new(100.0, 0.0, free_flow_time, 0.0, 1.0, 0.0, 0.0, 1);
    }

    fn build_network(num_nodes: usize, num_zones: usize, first_through_node: usize,
                     links: &[(usize, usize, f64)]) -> Network {
        let mut network = Network::new(num_nodes, num_zones, first_through_node);
        for (tail, head, time) in links {
            network.add_link(*tail, *head, unit_link(*time));
        }
        network.finalize(0.0, 0.0, 0.0);
        return network;
    }

    #[test]
    fn test_labels_on_diamond() {
        // 0 -> 1 -> 3 and 0 -> 2 -> 3, with the lower branch cheaper
        let network = build_network(4, 1, 0, &[
            (0, 1, 2.0),
            (0, 2, 1.0),
            (1, 3, 2.0),
            (2, 3, 1.0),
        ]);
        let labels = shortest_path(&network, NodeIndex::new(0));
        assert_eq!(labels, vec![0.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_unreached_nodes_stay_infinite() {
        let network = build_network(3, 1, 0, &[(0, 1, 1.0)]);
        let labels = shortest_path(&network, NodeIndex::new(0));
        assert_eq!(labels[1], 1.0);
        assert!(labels[2].is_infinite());
    }

    #[test]
    fn test_centroids_are_never_transited() {
        // node 0 is a centroid.  Going 1 -> 0 -> 2 would cost 2, but routes
        // may not pass through a centroid, so node 2 costs 10 via the direct
        // link.  Node 0 itself still gets the cheap label as an endpoint.
        let network = build_network(3, 2, 1, &[
            (1, 0, 1.0),
            (0, 2, 1.0),
            (1, 2, 10.0),
        ]);
        let labels = shortest_path(&network, NodeIndex::new(1));
        assert_eq!(labels[0], 1.0);
        assert_eq!(labels[2], 10.0);
    }

    #[test]
    fn test_centroid_origin_is_expanded() {
        let network = build_network(3, 2, 2, &[(0, 2, 1.0), (2, 1, 1.0)]);
        let labels = shortest_path(&network, NodeIndex::new(0));
        assert_eq!(labels, vec![0.0, 2.0, 1.0]);
    }
}
