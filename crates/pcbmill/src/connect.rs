//! Toolpath joining over an R-tree of chain endpoints.
//!
//! Both connectors consume their input chains and hand back new ones; the
//! index lives only for the duration of a single call.

use geo::{Area, BooleanOps, Buffer, Coord, LineString, MultiPolygon};
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// Slack on the `tool_diameter` search radius so that endpoints exactly one
/// diameter apart are still candidates.
const RADIUS_EPSILON: f64 = 1e-9;

/// Ordered, directed polyline or ring produced by a connector.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolpathChain {
    pub coords: Vec<Coord<f64>>,
    /// A ring: first coordinate equals the last.
    pub closed: bool,
    /// Indices of the input chains merged into this one, in cut order.
    pub sources: Vec<usize>,
}

impl ToolpathChain {
    /// Wrap a line; closed line strings become rings.
    pub fn from_line(line: &LineString<f64>, source: usize) -> Self {
        Self {
            coords: line.0.clone(),
            closed: line.0.len() >= 4 && line.is_closed(),
            sources: vec![source],
        }
    }

    /// One chain per line, numbered in input order.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Vec<Self> {
        lines
            .into_iter()
            .enumerate()
            .map(|(index, line)| Self::from_line(line, index))
            .collect()
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::from(self.coords.clone())
    }

    pub fn first(&self) -> Option<Coord<f64>> {
        self.coords.first().copied()
    }

    pub fn last(&self) -> Option<Coord<f64>> {
        self.coords.last().copied()
    }

    /// Append `other`, dropping its first coordinate when it repeats our last.
    fn splice(&mut self, other: ToolpathChain) {
        let skip = usize::from(self.last().is_some() && self.last() == other.first());
        self.coords.extend(other.coords.into_iter().skip(skip));
        self.sources.extend(other.sources);
        self.closed = false;
    }

    /// `other` followed by `self`.
    fn prepend(&mut self, mut other: ToolpathChain) {
        let skip = usize::from(other.last().is_some() && other.last() == self.first());
        other.coords.extend(self.coords.drain(..).skip(skip));
        other.sources.append(&mut self.sources);
        self.coords = other.coords;
        self.sources = other.sources;
        self.closed = false;
    }

    fn reverse(&mut self) {
        self.coords.reverse();
    }

    /// The ring re-started at `vertex`.
    fn rotated(mut self, vertex: usize) -> Self {
        if self.closed && vertex > 0 && vertex < self.coords.len() - 1 {
            self.coords.pop();
            self.coords.rotate_left(vertex);
            let start = self.coords[0];
            self.coords.push(start);
        }
        self
    }
}

/// A chain endpoint (or, for rings in paint mode, a ring vertex).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Endpoint {
    chain: usize,
    vertex: usize,
    closed: bool,
}

type EndpointEntry = GeomWithData<[f64; 2], Endpoint>;

/// Arena of chains plus the endpoint index over the ones not yet consumed.
struct SpatialConnector {
    tree: RTree<EndpointEntry>,
    slots: Vec<Option<ToolpathChain>>,
    /// Index every vertex of rings so they can be entered anywhere.
    rings_eligible: bool,
}

impl SpatialConnector {
    fn new(chains: Vec<ToolpathChain>, rings_eligible: bool) -> Self {
        let mut connector = Self {
            tree: RTree::new(),
            slots: Vec::new(),
            rings_eligible,
        };
        let entries: Vec<EndpointEntry> = chains
            .iter()
            .enumerate()
            .flat_map(|(id, chain)| connector.entries(id, chain))
            .collect();
        connector.tree = RTree::bulk_load(entries);
        connector.slots = chains.into_iter().map(Some).collect();
        connector
    }

    fn entries(&self, id: usize, chain: &ToolpathChain) -> Vec<EndpointEntry> {
        let entry = |vertex: usize| {
            let c = chain.coords[vertex];
            GeomWithData::new(
                [c.x, c.y],
                Endpoint {
                    chain: id,
                    vertex,
                    closed: chain.closed,
                },
            )
        };
        match (chain.coords.len(), chain.closed) {
            (0, _) => Vec::new(),
            (n, true) if self.rings_eligible => (0..n - 1).map(entry).collect(),
            (_, true) => Vec::new(),
            (1, false) => vec![entry(0)],
            (n, false) => vec![entry(0), entry(n - 1)],
        }
    }

    /// Remove chain `id` from the arena and the index.
    fn take(&mut self, id: usize) -> Option<ToolpathChain> {
        let chain = self.slots.get_mut(id)?.take()?;
        for entry in self.entries(id, &chain) {
            self.tree.remove(&entry);
        }
        Some(chain)
    }

    /// Take the chain owning `endpoint`, oriented to start there.
    fn take_from(&mut self, endpoint: Endpoint) -> Option<ToolpathChain> {
        let mut chain = self.take(endpoint.chain)?;
        if chain.closed {
            return Some(chain.rotated(endpoint.vertex));
        }
        if endpoint.vertex != 0 {
            chain.reverse();
        }
        Some(chain)
    }

    /// Some open chain with an endpoint exactly at `at`.
    fn exact_open(&self, at: Coord<f64>) -> Option<Endpoint> {
        self.tree
            .locate_all_at_point(&[at.x, at.y])
            .map(|entry| entry.data)
            .find(|endpoint| !endpoint.closed)
    }

    /// Endpoints within `radius` of `at`, nearest first, yielded on demand.
    fn within(
        &self,
        at: Coord<f64>,
        radius: f64,
    ) -> impl Iterator<Item = (Coord<f64>, Endpoint)> + '_ {
        let limit = radius * radius;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[at.x, at.y])
            .take_while(move |(_, distance_2)| *distance_2 <= limit)
            .map(|(entry, _)| {
                let [x, y] = *entry.geom();
                (Coord { x, y }, entry.data)
            })
    }
}

/// Join open chains that share an exact endpoint.
///
/// Each open chain is extended from its tail, then from its head, while another
/// open chain touches that end. Rings pass through untouched and never absorb
/// or join an open chain.
pub fn path_connect(chains: Vec<ToolpathChain>) -> Vec<ToolpathChain> {
    let total = chains.len();
    let mut connector = SpatialConnector::new(chains, false);
    let mut output = Vec::new();

    for id in 0..total {
        let Some(mut chain) = connector.take(id) else {
            continue;
        };
        if chain.closed {
            output.push(chain);
            continue;
        }

        while let Some(endpoint) = chain.last().and_then(|tail| connector.exact_open(tail)) {
            match connector.take_from(endpoint) {
                Some(next) => chain.splice(next),
                None => break,
            }
        }
        while let Some(endpoint) = chain.first().and_then(|head| connector.exact_open(head)) {
            match connector.take_from(endpoint) {
                Some(mut previous) => {
                    previous.reverse();
                    chain.prepend(previous);
                }
                None => break,
            }
        }
        output.push(chain);
    }

    log::info!("path_connect: {total} chains joined into {}", output.len());
    output
}

/// Join clearing passes by short in-material moves.
///
/// From the tail of the current chain, the nearest remaining endpoint (or ring
/// vertex) within `tool_diameter` is tried first; it is spliced on when the
/// straight bridge to it, widened by the tool radius, stays inside `boundary`
/// (WALK). When no candidate qualifies the chain ends and the tool lifts (FLY).
/// `tolerance` is the share of the bridge area allowed outside `boundary`.
pub fn paint_connect(
    chains: Vec<ToolpathChain>,
    boundary: &MultiPolygon<f64>,
    tool_diameter: f64,
    tolerance: f64,
) -> Vec<ToolpathChain> {
    let total = chains.len();
    let mut connector = SpatialConnector::new(chains, true);
    let mut output = Vec::new();
    let mut walks = 0;

    for id in 0..total {
        let Some(mut chain) = connector.take(id) else {
            continue;
        };

        while let Some(tail) = chain.last() {
            let candidate = connector
                .within(tail, tool_diameter + RADIUS_EPSILON)
                .find(|(point, _)| bridge_within(tail, *point, boundary, tool_diameter, tolerance));
            let Some(next) = candidate.and_then(|(_, endpoint)| connector.take_from(endpoint))
            else {
                break;
            };
            chain.splice(next);
            walks += 1;
        }
        output.push(chain);
    }

    log::info!(
        "paint_connect: {total} chains, {walks} walks, {} lifts",
        output.len().saturating_sub(1)
    );
    output
}

/// Whether the tool can travel from `from` to `to` without leaving `boundary`.
pub fn bridge_within(
    from: Coord<f64>,
    to: Coord<f64>,
    boundary: &MultiPolygon<f64>,
    tool_diameter: f64,
    tolerance: f64,
) -> bool {
    if (from.x - to.x).hypot(from.y - to.y) <= RADIUS_EPSILON {
        return true;
    }
    let bridge = LineString::from(vec![from, to]).buffer(tool_diameter / 2.0);
    let bridge_area = bridge.unsigned_area();
    if bridge_area <= 0.0 {
        return false;
    }
    let outside = bridge.difference(boundary).unsigned_area();
    outside <= tolerance * bridge_area
}

/// Coordinates of each chain as line strings.
pub fn chains_to_lines(chains: &[ToolpathChain]) -> Vec<LineString<f64>> {
    chains.iter().map(ToolpathChain::to_line_string).collect()
}
