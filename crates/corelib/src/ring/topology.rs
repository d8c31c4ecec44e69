//! Ring pointer state and local routing decisions.

use crate::node::NodeInfo;
use crate::token::RingId;
use parking_lot::RwLock;

/// Snapshot of a node's ring pointers.
///
/// # Invariants
///
/// - `successors` is never empty; `successors[0]` is the successor
/// - a node alone in its ring has `successors == [self]`
/// - no id appears twice in `successors`, and `self` only appears when alone
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pointers {
    pub predecessor: Option<NodeInfo>,
    pub successors: Vec<NodeInfo>,
}

impl Pointers {
    pub fn successor(&self) -> NodeInfo {
        self.successors[0]
    }
}

/// Outcome of a local routing decision for an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// This node is responsible.
    Local,
    /// The id lies in `(self, successor]`: the successor is responsible.
    Successor(NodeInfo),
    /// Ask one of these nodes, closest preceding first.
    Forward(Vec<NodeInfo>),
}

/// Result of dropping a dead node from the successor list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedSuccessor {
    /// The dead node was the immediate successor.
    pub was_successor: bool,
    /// Successor after the removal (self when the list ran out).
    pub successor: NodeInfo,
}

/// Ring Topology Manager for one node.
///
/// Predecessor, successor and successor list sit behind a single lock so a
/// reader never sees a half-applied update.
#[derive(Debug)]
pub struct RingTopology {
    local: NodeInfo,
    list_len: usize,
    pointers: RwLock<Pointers>,
}

impl RingTopology {
    /// Topology of a node that has not joined yet: no predecessor and
    /// itself as successor.
    pub fn new(local: NodeInfo, list_len: usize) -> Self {
        Self {
            local,
            list_len: list_len.max(1),
            pointers: RwLock::new(Pointers {
                predecessor: None,
                successors: vec![local],
            }),
        }
    }

    pub fn local(&self) -> NodeInfo {
        self.local
    }

    pub fn snapshot(&self) -> Pointers {
        self.pointers.read().clone()
    }

    pub fn successor(&self) -> NodeInfo {
        self.pointers.read().successor()
    }

    pub fn predecessor(&self) -> Option<NodeInfo> {
        self.pointers.read().predecessor
    }

    pub fn successor_list(&self) -> Vec<NodeInfo> {
        self.pointers.read().successors.clone()
    }

    /// True when the successor is this node.
    pub fn is_alone(&self) -> bool {
        self.successor().id == self.local.id
    }

    /// Turns this node into a one-member ring.
    pub fn create(&self) {
        let mut pointers = self.pointers.write();
        pointers.predecessor = Some(self.local);
        pointers.successors = vec![self.local];
    }

    /// Responsibility arc `(predecessor, self]`, if the predecessor is known.
    pub fn arc(&self) -> Option<(RingId, RingId)> {
        self.predecessor().map(|pred| (pred.id, self.local.id))
    }

    /// True if this node is the primary owner of `id`.
    ///
    /// Without a known predecessor ownership is only certain when alone.
    pub fn owns(&self, id: RingId) -> bool {
        let pointers = self.pointers.read();
        match pointers.predecessor {
            Some(pred) => id.in_half_open(pred.id, self.local.id),
            None => pointers.successor().id == self.local.id,
        }
    }

    /// Decides where a lookup for `id` goes next.
    pub fn route(&self, id: RingId) -> Route {
        let pointers = self.pointers.read();
        let successor = pointers.successor();

        if successor.id == self.local.id {
            return Route::Local;
        }
        if let Some(pred) = pointers.predecessor {
            if id.in_half_open(pred.id, self.local.id) {
                return Route::Local;
            }
        }
        if id.in_half_open(self.local.id, successor.id) {
            return Route::Successor(successor);
        }
        Route::Forward(self.preceding_candidates(&pointers, id))
    }

    /// Furthest known node strictly between self and `id`, or the successor.
    pub fn closest_preceding_node(&self, id: RingId) -> NodeInfo {
        let pointers = self.pointers.read();
        self.preceding_candidates(&pointers, id)
            .first()
            .copied()
            .unwrap_or_else(|| pointers.successor())
    }

    // Successor-list entries inside (self, id), closest to `id` first; the
    // successor always closes the list as the last resort.
    fn preceding_candidates(&self, pointers: &Pointers, id: RingId) -> Vec<NodeInfo> {
        let mut candidates: Vec<NodeInfo> = pointers
            .successors
            .iter()
            .rev()
            .filter(|node| node.id.in_open(self.local.id, id))
            .copied()
            .collect();
        let successor = pointers.successor();
        if !candidates.contains(&successor) {
            candidates.push(successor);
        }
        candidates
    }

    /// Handles a predecessor claim. Returns true if the candidate was adopted.
    pub fn notify(&self, candidate: NodeInfo) -> bool {
        if candidate.id == self.local.id {
            return false;
        }
        let mut pointers = self.pointers.write();
        let accept = match pointers.predecessor {
            None => true,
            Some(pred) => candidate.id.in_open(pred.id, self.local.id),
        };
        if accept {
            pointers.predecessor = Some(candidate);
            // A lone node learns its first peer through notify.
            if pointers.successor().id == self.local.id {
                pointers.successors = vec![candidate];
            }
        }
        accept
    }

    /// Adopts `node` as the new immediate successor, keeping the rest of
    /// the list behind it.
    pub fn adopt_successor(&self, node: NodeInfo) {
        let mut pointers = self.pointers.write();
        let mut list = Vec::with_capacity(pointers.successors.len() + 1);
        list.push(node);
        list.extend(pointers.successors.iter().copied());
        pointers.successors = self.normalize(list);
    }

    /// Rebuilds the successor list as `head` followed by `tail` (usually the
    /// head's own successor list), cut where the ring wraps back to self.
    pub fn refresh_successors(&self, head: NodeInfo, tail: &[NodeInfo]) {
        let mut list = Vec::with_capacity(tail.len() + 1);
        list.push(head);
        list.extend(tail.iter().copied());
        let normalized = self.normalize(list);
        self.pointers.write().successors = normalized;
    }

    /// Overwrites the predecessor pointer (graceful-leave relinking).
    ///
    /// A predecessor equal to self means the ring shrank to this node.
    pub fn set_predecessor(&self, predecessor: Option<NodeInfo>) {
        let mut pointers = self.pointers.write();
        pointers.predecessor = predecessor;
        if predecessor.map(|p| p.id) == Some(self.local.id) {
            pointers.successors = vec![self.local];
        }
    }

    /// Clears the predecessor if it is `dead`. Returns true if cleared.
    pub fn clear_predecessor(&self, dead: RingId) -> bool {
        let mut pointers = self.pointers.write();
        match pointers.predecessor {
            Some(pred) if pred.id == dead && dead != self.local.id => {
                pointers.predecessor = None;
                true
            }
            _ => false,
        }
    }

    /// Drops `dead` from the successor list, promoting the next entry.
    /// Returns `None` if the node was not in the list.
    pub fn remove_successor(&self, dead: RingId) -> Option<RemovedSuccessor> {
        if dead == self.local.id {
            return None;
        }
        let mut pointers = self.pointers.write();
        let position = pointers.successors.iter().position(|n| n.id == dead)?;
        pointers.successors.remove(position);
        if pointers.successors.is_empty() {
            pointers.successors.push(self.local);
        }
        Some(RemovedSuccessor {
            was_successor: position == 0,
            successor: pointers.successor(),
        })
    }

    /// Nodes the failure detector should probe: predecessor and successor
    /// list, without self or duplicates.
    pub fn monitored(&self) -> Vec<NodeInfo> {
        let pointers = self.pointers.read();
        let mut nodes: Vec<NodeInfo> = Vec::with_capacity(pointers.successors.len() + 1);
        for node in pointers.predecessor.iter().chain(pointers.successors.iter()) {
            if node.id != self.local.id && !nodes.iter().any(|n| n.id == node.id) {
                nodes.push(*node);
            }
        }
        nodes
    }

    // Cut at self, de-duplicate by id, truncate; never leaves the list empty.
    fn normalize(&self, list: Vec<NodeInfo>) -> Vec<NodeInfo> {
        let mut out: Vec<NodeInfo> = Vec::with_capacity(self.list_len);
        for node in list {
            if node.id == self.local.id {
                break;
            }
            if out.iter().any(|n| n.id == node.id) {
                continue;
            }
            out.push(node);
            if out.len() == self.list_len {
                break;
            }
        }
        if out.is_empty() {
            out.push(self.local);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn node(id: u64) -> NodeInfo {
        let addr: SocketAddr = format!("127.0.0.1:{}", 10_000 + id).parse().unwrap();
        NodeInfo::new(RingId(id), addr)
    }

    #[test]
    fn test_new_node_is_unjoined() {
        let topology = RingTopology::new(node(10), 3);
        assert_eq!(topology.predecessor(), None);
        assert_eq!(topology.successor(), node(10));
        assert!(topology.is_alone());
    }

    #[test]
    fn test_single_node_ring_owns_everything() {
        let topology = RingTopology::new(node(10), 3);
        topology.create();
        assert_eq!(topology.predecessor(), Some(node(10)));
        assert!(topology.owns(RingId(0)));
        assert!(topology.owns(RingId(u64::MAX)));
        assert_eq!(topology.route(RingId(999)), Route::Local);
    }

    #[test]
    fn test_notify_accepts_closer_predecessor_only() {
        let topology = RingTopology::new(node(100), 3);
        topology.create();

        assert!(topology.notify(node(50)));
        assert_eq!(topology.predecessor(), Some(node(50)));
        // lone node adopts its first peer as successor as well
        assert_eq!(topology.successor(), node(50));

        assert!(topology.notify(node(80)));
        assert!(!topology.notify(node(20)));
        assert!(!topology.notify(node(100)));
        assert_eq!(topology.predecessor(), Some(node(80)));
    }

    #[test]
    fn test_route_decisions() {
        let topology = RingTopology::new(node(100), 3);
        topology.refresh_successors(node(200), &[node(300), node(400)]);
        topology.set_predecessor(Some(node(50)));

        assert_eq!(topology.route(RingId(75)), Route::Local);
        assert_eq!(topology.route(RingId(150)), Route::Successor(node(200)));
        assert_eq!(
            topology.route(RingId(350)),
            Route::Forward(vec![node(300), node(200)])
        );
        assert_eq!(topology.closest_preceding_node(RingId(450)), node(400));
        assert_eq!(topology.closest_preceding_node(RingId(10)), node(400));
    }

    #[test]
    fn test_refresh_cuts_at_self_and_dedupes() {
        let topology = RingTopology::new(node(100), 4);
        topology.refresh_successors(node(200), &[node(300), node(200), node(100), node(400)]);
        assert_eq!(topology.successor_list(), vec![node(200), node(300)]);
    }

    #[test]
    fn test_refresh_truncates() {
        let topology = RingTopology::new(node(100), 2);
        topology.refresh_successors(node(200), &[node(300), node(400)]);
        assert_eq!(topology.successor_list(), vec![node(200), node(300)]);
    }

    #[test]
    fn test_remove_successor_promotes_next() {
        let topology = RingTopology::new(node(100), 3);
        topology.refresh_successors(node(200), &[node(300)]);

        let removed = topology.remove_successor(RingId(200)).unwrap();
        assert!(removed.was_successor);
        assert_eq!(removed.successor, node(300));

        let removed = topology.remove_successor(RingId(300)).unwrap();
        assert_eq!(removed.successor, node(100));
        assert!(topology.is_alone());

        assert!(topology.remove_successor(RingId(999)).is_none());
    }

    #[test]
    fn test_clear_predecessor() {
        let topology = RingTopology::new(node(100), 3);
        topology.refresh_successors(node(200), &[]);
        topology.set_predecessor(Some(node(50)));
        assert!(topology.owns(RingId(75)));

        assert!(!topology.clear_predecessor(RingId(60)));
        assert!(topology.clear_predecessor(RingId(50)));
        assert_eq!(topology.predecessor(), None);
        // predecessor unknown with a real successor: ownership uncertain
        assert!(!topology.owns(RingId(75)));
    }

    #[test]
    fn test_lone_node_owns_after_clearing_predecessor() {
        let topology = RingTopology::new(node(100), 3);
        topology.create();
        topology.set_predecessor(Some(node(50)));
        assert!(!topology.owns(RingId(150)));

        assert!(topology.clear_predecessor(RingId(50)));
        assert!(topology.is_alone());
        assert!(topology.owns(RingId(75)));
        assert!(topology.owns(RingId(150)));
    }

    #[test]
    fn test_monitored_excludes_self_and_duplicates() {
        let topology = RingTopology::new(node(100), 3);
        topology.refresh_successors(node(200), &[node(300)]);
        topology.set_predecessor(Some(node(300)));
        assert_eq!(topology.monitored(), vec![node(300), node(200)]);
    }
}
