/// Directed arc in the residual graph.
///
/// Every arc is stored together with a paired reverse arc of zero initial
/// capacity; `rev` is the index of that partner inside `to`'s arc list, so
/// the pair can reference each other without ownership cycles.
#[derive(Debug, Clone)]
pub struct Edge {
    pub to: usize,
    pub capacity: i64,
    pub flow: i64,
    pub rev: usize,
}

impl Edge {
    /// Remaining augmentable amount along this arc
    pub fn residual(&self) -> i64 {
        self.capacity - self.flow
    }
}

/// Residual flow network over integer capacities.
///
/// Nodes own their outgoing arc lists; the network is built once per
/// refinement round and discarded after the cut is read back.
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    nodes: Vec<Vec<Edge>>,
    source: usize,
    sink: usize,
}

impl FlowNetwork {
    pub fn new(node_count: usize, source: usize, sink: usize) -> Self {
        Self {
            nodes: vec![Vec::new(); node_count],
            source,
            sink,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn sink(&self) -> usize {
        self.sink
    }

    /// Append a forward arc and its zero-capacity reverse partner.
    ///
    /// `capacity` must already be non-negative; the energy builder clamps
    /// computed weights before they get here.
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: i64) {
        debug_assert!(capacity >= 0, "negative capacity {capacity}");
        let forward_pos = self.nodes[from].len();
        // A self-loop puts both arcs in the same list, one after the other.
        let reverse_pos = if from == to {
            forward_pos + 1
        } else {
            self.nodes[to].len()
        };
        self.nodes[from].push(Edge {
            to,
            capacity,
            flow: 0,
            rev: reverse_pos,
        });
        self.nodes[to].push(Edge {
            to: from,
            capacity: 0,
            flow: 0,
            rev: forward_pos,
        });
    }

    pub fn edges(&self, node: usize) -> &[Edge] {
        &self.nodes[node]
    }

    /// Push `amount` along the arc at `index` in `node`'s list, keeping the
    /// paired reverse arc complementary: `flow(e) == -flow(rev(e))`.
    pub fn augment(&mut self, node: usize, index: usize, amount: i64) {
        let (to, rev) = {
            let edge = &self.nodes[node][index];
            (edge.to, edge.rev)
        };
        self.nodes[node][index].flow += amount;
        self.nodes[to][rev].flow -= amount;
    }
}
