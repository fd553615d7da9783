//! Layered (Sugiyama-style) layout for the graph-backed families.
//!
//! Stages: greedy cycle breaking, longest-path ranking, virtual-node
//! insertion for long edges, barycenter sweeps plus transpose refinement,
//! coordinate assignment, edge routing, cluster boxes and fit-to-width
//! scaling.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use fd_core::{Cluster, Graph, GraphDirection, LayoutSettings, Point, Rect, Size, scale_to_fit};
use tracing::{debug, trace};

use crate::{LayoutOutcome, LayoutStageSnapshot, LayoutStats, LayoutTrace};

const SELF_LOOP_SIZE: f32 = 24.0;
const PARALLEL_EDGE_STEP: f32 = 12.0;
const MEDIAN_PASSES: usize = 4;
const LABEL_CLEARANCE: f32 = 16.0;
const EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrientedEdge {
    source: usize,
    target: usize,
    edge_index: usize,
}

/// A real node (same index as in the graph) or a bend point of a long edge.
#[derive(Debug, Clone, Copy)]
struct LayerNode {
    is_virtual: bool,
    width: f32,
    height: f32,
    rank: usize,
    /// Centre along the rank axis.
    primary: f32,
    /// Centre along the in-rank axis.
    secondary: f32,
}

#[derive(Debug, Clone)]
struct Layering {
    nodes: Vec<LayerNode>,
    ranks: Vec<Vec<usize>>,
    upper: Vec<Vec<usize>>,
    lower: Vec<Vec<usize>>,
    /// Layer nodes from oriented source to oriented target, per edge index.
    chains: BTreeMap<usize, Vec<usize>>,
    virtual_count: usize,
}

impl Layering {
    fn positions(&self) -> Vec<usize> {
        let mut positions = vec![0_usize; self.nodes.len()];
        for rank in &self.ranks {
            for (position, node) in rank.iter().enumerate() {
                positions[*node] = position;
            }
        }
        positions
    }
}

/// Runs the layered engine on a pre-sized graph.
///
/// Node `width`/`height` and edge `label_size` must already hold unscaled
/// extents; everything else geometric is overwritten.
pub(crate) fn layout_graph(
    graph: &mut Graph,
    direction: GraphDirection,
    clusters: &mut [Cluster],
    available_width: f32,
    settings: &LayoutSettings,
) -> LayoutOutcome {
    if graph.is_empty() {
        reset_clusters(clusters);
        return LayoutOutcome::default();
    }

    let mut trace = LayoutTrace::default();
    let node_count = graph.node_count();
    let edges = resolved_edges(graph);

    let reversed = cycle_removal_greedy(node_count, &edges);
    push_snapshot(&mut trace, "cycle_removal", reversed.len(), 0, 0);

    let oriented = oriented_edges(&edges, &reversed);
    let ranks = rank_assignment(node_count, &oriented);
    let mut layering = build_layering(graph, &ranks, &oriented);
    push_snapshot(
        &mut trace,
        "rank_assignment",
        reversed.len(),
        0,
        layering.virtual_count,
    );

    let crossings_before = crossing_minimization(&mut layering, settings.crossing_sweeps);
    push_snapshot(
        &mut trace,
        "crossing_minimization",
        reversed.len(),
        crossings_before,
        layering.virtual_count,
    );

    let crossings = transpose_refinement(&mut layering, settings.transpose_passes);
    push_snapshot(
        &mut trace,
        "crossing_refinement",
        reversed.len(),
        crossings,
        layering.virtual_count,
    );

    let horizontal = direction.is_horizontal();
    let max_label_extent = graph
        .edges()
        .iter()
        .map(|edge| {
            if horizontal {
                edge.label_size.width
            } else {
                edge.label_size.height
            }
        })
        .fold(0.0_f32, f32::max);
    let rank_gap = settings
        .rank_spacing
        .max(max_label_extent + LABEL_CLEARANCE * 2.0);
    assign_coordinates(&mut layering, direction, rank_gap, settings.node_spacing);
    write_node_positions(graph, &layering, horizontal);
    route_edges(graph, &edges, &reversed, &layering, horizontal);
    for cluster in clusters.iter_mut() {
        fit_cluster(cluster, graph, settings.cluster_padding);
    }
    push_snapshot(
        &mut trace,
        "coordinate_assignment",
        reversed.len(),
        crossings,
        layering.virtual_count,
    );

    let natural = normalize(graph, clusters, settings.diagram_padding);
    let scale = scale_to_fit(natural.width, available_width);
    if scale < 1.0 {
        apply_scale(graph, clusters, scale);
    }

    let stats = LayoutStats {
        node_count,
        edge_count: graph.edge_count(),
        rank_count: layering.ranks.len(),
        crossing_count: crossings,
        crossing_count_before_refinement: crossings_before,
        reversed_edges: reversed.len(),
        virtual_nodes: layering.virtual_count,
        scale,
    };
    debug!(
        nodes = stats.node_count,
        edges = stats.edge_count,
        ranks = stats.rank_count,
        crossings = stats.crossing_count,
        reversed = stats.reversed_edges,
        virtual_nodes = stats.virtual_nodes,
        scale,
        "layered layout finished"
    );

    LayoutOutcome {
        size: natural.scaled(scale),
        stats,
        trace,
    }
}

fn push_snapshot(
    trace: &mut LayoutTrace,
    stage: &'static str,
    reversed_edges: usize,
    crossing_count: usize,
    virtual_nodes: usize,
) {
    trace!(stage, reversed_edges, crossing_count, virtual_nodes, "layout stage");
    trace.snapshots.push(LayoutStageSnapshot {
        stage,
        reversed_edges,
        crossing_count,
        virtual_nodes,
    });
}

fn resolved_edges(graph: &Graph) -> Vec<OrientedEdge> {
    graph
        .edges()
        .iter()
        .enumerate()
        .filter_map(|(edge_index, edge)| {
            Some(OrientedEdge {
                source: graph.node_index(&edge.from)?,
                target: graph.node_index(&edge.to)?,
                edge_index,
            })
        })
        .collect()
}

fn oriented_edges(edges: &[OrientedEdge], reversed: &BTreeSet<usize>) -> Vec<OrientedEdge> {
    edges
        .iter()
        .map(|edge| {
            let mut edge = *edge;
            if reversed.contains(&edge.edge_index) {
                std::mem::swap(&mut edge.source, &mut edge.target);
            }
            edge
        })
        .collect()
}

/// Subgraph left to order while breaking cycles. Self-loops are ignored.
struct Peeling {
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    out_degree: Vec<usize>,
    removed: Vec<bool>,
    remaining: usize,
}

impl Peeling {
    fn new(node_count: usize, edges: &[OrientedEdge]) -> Self {
        let mut peeling = Self {
            successors: vec![Vec::new(); node_count],
            predecessors: vec![Vec::new(); node_count],
            in_degree: vec![0; node_count],
            out_degree: vec![0; node_count],
            removed: vec![false; node_count],
            remaining: node_count,
        };
        for edge in edges.iter().filter(|edge| edge.source != edge.target) {
            peeling.successors[edge.source].push(edge.target);
            peeling.predecessors[edge.target].push(edge.source);
            peeling.out_degree[edge.source] += 1;
            peeling.in_degree[edge.target] += 1;
        }
        peeling
    }

    fn live(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.removed.len()).filter(|node| !self.removed[*node])
    }

    fn balance(&self, node: usize) -> isize {
        self.out_degree[node] as isize - self.in_degree[node] as isize
    }

    fn take(&mut self, node: usize) {
        if std::mem::replace(&mut self.removed[node], true) {
            return;
        }
        self.remaining -= 1;
        for &target in &self.successors[node] {
            if !self.removed[target] {
                self.in_degree[target] = self.in_degree[target].saturating_sub(1);
            }
        }
        for &source in &self.predecessors[node] {
            if !self.removed[source] {
                self.out_degree[source] = self.out_degree[source].saturating_sub(1);
            }
        }
    }
}

/// Greedy feedback arc set: sinks peel to the tail, sources to the head,
/// otherwise the node with the largest out-minus-in balance goes to the head.
/// Returns the edge indexes pointing backwards in the resulting order.
fn cycle_removal_greedy(node_count: usize, edges: &[OrientedEdge]) -> BTreeSet<usize> {
    let mut peeling = Peeling::new(node_count, edges);
    let mut head = Vec::with_capacity(node_count);
    let mut tail = Vec::new();

    while peeling.remaining > 0 {
        let sinks: Vec<usize> = peeling
            .live()
            .filter(|node| peeling.out_degree[*node] == 0)
            .collect();
        if !sinks.is_empty() {
            for node in sinks {
                peeling.take(node);
                tail.push(node);
            }
            continue;
        }

        let sources: Vec<usize> = peeling
            .live()
            .filter(|node| peeling.in_degree[*node] == 0)
            .collect();
        if !sources.is_empty() {
            for node in sources {
                peeling.take(node);
                head.push(node);
            }
            continue;
        }

        // Ties go to the lowest index.
        let Some(node) = peeling
            .live()
            .max_by_key(|node| (peeling.balance(*node), Reverse(*node)))
        else {
            break;
        };
        peeling.take(node);
        head.push(node);
    }

    head.extend(tail.into_iter().rev());
    let mut position = vec![0_usize; node_count];
    for (order, node) in head.into_iter().enumerate() {
        position[node] = order;
    }

    edges
        .iter()
        .filter(|edge| position[edge.source] > position[edge.target])
        .map(|edge| edge.edge_index)
        .collect()
}

/// Longest path from the sources over the acyclic oriented edges.
fn rank_assignment(node_count: usize, edges: &[OrientedEdge]) -> Vec<usize> {
    let mut ranks = vec![0_usize; node_count];
    let mut in_degree = vec![0_usize; node_count];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];

    for edge in edges {
        if edge.source == edge.target {
            continue;
        }
        in_degree[edge.target] = in_degree[edge.target].saturating_add(1);
        outgoing[edge.source].push(edge.target);
    }

    let mut heap: BinaryHeap<Reverse<usize>> = (0..node_count)
        .filter(|node| in_degree[*node] == 0)
        .map(Reverse)
        .collect();

    let mut visited = 0_usize;
    while let Some(Reverse(node_index)) = heap.pop() {
        visited = visited.saturating_add(1);
        let candidate_rank = ranks[node_index].saturating_add(1);
        for target in outgoing[node_index].iter().copied() {
            if candidate_rank > ranks[target] {
                ranks[target] = candidate_rank;
            }
            in_degree[target] = in_degree[target].saturating_sub(1);
            if in_degree[target] == 0 {
                heap.push(Reverse(target));
            }
        }
    }

    if visited < node_count {
        // Cycle removal leaves a DAG, so this only guards against bad input.
        let guard = edges.len().saturating_mul(2).saturating_add(1);
        for _ in 0..guard {
            let mut changed = false;
            for edge in edges {
                if edge.source == edge.target {
                    continue;
                }
                let candidate_rank = ranks[edge.source].saturating_add(1);
                if candidate_rank > ranks[edge.target] && candidate_rank <= node_count {
                    ranks[edge.target] = candidate_rank;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    ranks
}

/// Splits every multi-rank edge into a chain through virtual nodes.
fn build_layering(graph: &Graph, ranks: &[usize], edges: &[OrientedEdge]) -> Layering {
    let rank_count = ranks.iter().copied().max().map_or(0, |max| max + 1);
    let mut layering = Layering {
        nodes: graph
            .nodes()
            .iter()
            .zip(ranks)
            .map(|(node, rank)| LayerNode {
                is_virtual: false,
                width: node.width,
                height: node.height,
                rank: *rank,
                primary: 0.0,
                secondary: 0.0,
            })
            .collect(),
        ranks: vec![Vec::new(); rank_count],
        upper: vec![Vec::new(); graph.node_count()],
        lower: vec![Vec::new(); graph.node_count()],
        chains: BTreeMap::new(),
        virtual_count: 0,
    };
    for (node, rank) in ranks.iter().enumerate() {
        layering.ranks[*rank].push(node);
    }

    for edge in edges {
        if edge.source == edge.target {
            continue;
        }
        let source_rank = ranks[edge.source];
        let target_rank = ranks[edge.target];
        let mut chain = vec![edge.source];
        for rank in source_rank + 1..target_rank {
            let id = layering.nodes.len();
            layering.nodes.push(LayerNode {
                is_virtual: true,
                width: 0.0,
                height: 0.0,
                rank,
                primary: 0.0,
                secondary: 0.0,
            });
            layering.upper.push(Vec::new());
            layering.lower.push(Vec::new());
            layering.ranks[rank].push(id);
            layering.virtual_count += 1;
            chain.push(id);
        }
        chain.push(edge.target);
        for pair in chain.windows(2) {
            layering.lower[pair[0]].push(pair[1]);
            layering.upper[pair[1]].push(pair[0]);
        }
        layering.chains.insert(edge.edge_index, chain);
    }
    layering
}

/// Alternating barycenter sweeps, keeping the best ordering seen.
fn crossing_minimization(layering: &mut Layering, sweeps: usize) -> usize {
    let mut best_crossings = total_crossings(layering);
    if layering.ranks.len() <= 1 || best_crossings == 0 {
        return best_crossings;
    }
    let mut best_ranks = layering.ranks.clone();

    for _ in 0..sweeps {
        for rank in 1..layering.ranks.len() {
            reorder_rank_by_barycenter(layering, rank, true);
        }
        for rank in (0..layering.ranks.len().saturating_sub(1)).rev() {
            reorder_rank_by_barycenter(layering, rank, false);
        }
        let crossings = total_crossings(layering);
        if crossings < best_crossings {
            best_crossings = crossings;
            best_ranks = layering.ranks.clone();
            if crossings == 0 {
                break;
            }
        }
    }

    layering.ranks = best_ranks;
    best_crossings
}

fn reorder_rank_by_barycenter(layering: &mut Layering, rank: usize, use_upper: bool) {
    let positions = layering.positions();
    let neighbours = if use_upper {
        &layering.upper
    } else {
        &layering.lower
    };

    let mut scored: Vec<(f32, usize, usize)> = layering.ranks[rank]
        .iter()
        .enumerate()
        .map(|(current, node)| {
            let adjacent = &neighbours[*node];
            let barycenter = if adjacent.is_empty() {
                current as f32
            } else {
                adjacent
                    .iter()
                    .map(|neighbour| positions[*neighbour] as f32)
                    .sum::<f32>()
                    / adjacent.len() as f32
            };
            (barycenter, current, *node)
        })
        .collect();

    scored.sort_by(|left, right| left.0.total_cmp(&right.0).then_with(|| left.1.cmp(&right.1)));
    layering.ranks[rank] = scored.into_iter().map(|(_, _, node)| node).collect();
}

fn total_crossings(layering: &Layering) -> usize {
    let positions = layering.positions();
    let mut total = 0_usize;
    for rank in &layering.ranks {
        let mut pairs: Vec<(usize, usize)> = rank
            .iter()
            .flat_map(|node| {
                layering.lower[*node]
                    .iter()
                    .map(|lower| (positions[*node], positions[*lower]))
            })
            .collect();
        pairs.sort_unstable();
        let mut targets: Vec<usize> = pairs.into_iter().map(|(_, target)| target).collect();
        total = total.saturating_add(count_inversions(&mut targets));
    }
    total
}

fn count_inversions(values: &mut [usize]) -> usize {
    if values.len() <= 1 {
        return 0;
    }

    let mid = values.len() / 2;
    let mut inversions = 0_usize;
    inversions = inversions.saturating_add(count_inversions(&mut values[..mid]));
    inversions = inversions.saturating_add(count_inversions(&mut values[mid..]));

    let mut merged = Vec::with_capacity(values.len());
    let (left, right) = values.split_at(mid);
    let mut left_idx = 0_usize;
    let mut right_idx = 0_usize;

    while left_idx < left.len() && right_idx < right.len() {
        if left[left_idx] <= right[right_idx] {
            merged.push(left[left_idx]);
            left_idx += 1;
        } else {
            merged.push(right[right_idx]);
            inversions = inversions.saturating_add(left.len() - left_idx);
            right_idx += 1;
        }
    }

    merged.extend_from_slice(&left[left_idx..]);
    merged.extend_from_slice(&right[right_idx..]);
    values.copy_from_slice(&merged);
    inversions
}

/// Crossings between the edges of `left` and `right` when `left` comes first.
fn pair_crossings(layering: &Layering, positions: &[usize], left: usize, right: usize) -> usize {
    let mut count = 0_usize;
    for neighbours in [&layering.upper, &layering.lower] {
        for a in &neighbours[left] {
            for b in &neighbours[right] {
                if positions[*a] > positions[*b] {
                    count += 1;
                }
            }
        }
    }
    count
}

/// Adjacent-swap refinement; returns the final crossing count.
fn transpose_refinement(layering: &mut Layering, passes: usize) -> usize {
    for _ in 0..passes {
        let mut improved = false;
        for rank in 0..layering.ranks.len() {
            let mut positions = layering.positions();
            for index in 0..layering.ranks[rank].len().saturating_sub(1) {
                let left = layering.ranks[rank][index];
                let right = layering.ranks[rank][index + 1];
                let current = pair_crossings(layering, &positions, left, right);
                let swapped = pair_crossings(layering, &positions, right, left);
                if swapped < current {
                    layering.ranks[rank].swap(index, index + 1);
                    positions[left] = index + 1;
                    positions[right] = index;
                    improved = true;
                }
            }
        }
        if !improved {
            break;
        }
    }
    total_crossings(layering)
}

fn extents(node: &LayerNode, horizontal: bool) -> (f32, f32) {
    if horizontal {
        (node.width, node.height)
    } else {
        (node.height, node.width)
    }
}

/// Minimum centre distance between in-rank neighbours.
fn separation(layering: &Layering, a: usize, b: usize, horizontal: bool, spacing: f32) -> f32 {
    let (_, a_extent) = extents(&layering.nodes[a], horizontal);
    let (_, b_extent) = extents(&layering.nodes[b], horizontal);
    let gap = if layering.nodes[a].is_virtual || layering.nodes[b].is_virtual {
        spacing / 2.0
    } else {
        spacing
    };
    (a_extent + b_extent) / 2.0 + gap
}

fn assign_coordinates(
    layering: &mut Layering,
    direction: GraphDirection,
    rank_gap: f32,
    node_spacing: f32,
) {
    let horizontal = direction.is_horizontal();

    let spans: Vec<f32> = layering
        .ranks
        .iter()
        .map(|rank| {
            rank.iter()
                .map(|node| extents(&layering.nodes[*node], horizontal).0)
                .fold(0.0_f32, f32::max)
        })
        .collect();
    let order: Vec<usize> = if direction.is_reversed() {
        (0..spans.len()).rev().collect()
    } else {
        (0..spans.len()).collect()
    };
    let mut cursor = 0.0_f32;
    for rank in order {
        let centre = cursor + spans[rank] / 2.0;
        for node in &layering.ranks[rank] {
            layering.nodes[*node].primary = centre;
        }
        cursor += spans[rank] + rank_gap;
    }

    // Pack each rank, then centre it on the widest one.
    let mut widths = Vec::with_capacity(layering.ranks.len());
    for rank in 0..layering.ranks.len() {
        let mut position = 0.0_f32;
        let mut previous: Option<usize> = None;
        for node in layering.ranks[rank].clone() {
            position = match previous {
                Some(prev) => {
                    position + separation(layering, prev, node, horizontal, node_spacing)
                }
                None => extents(&layering.nodes[node], horizontal).1 / 2.0,
            };
            layering.nodes[node].secondary = position;
            previous = Some(node);
        }
        let width = previous.map_or(0.0, |last| {
            position + extents(&layering.nodes[last], horizontal).1 / 2.0
        });
        widths.push(width);
    }
    let widest = widths.iter().copied().fold(0.0_f32, f32::max);
    for (rank, width) in widths.into_iter().enumerate() {
        let shift = (widest - width) / 2.0;
        for node in &layering.ranks[rank] {
            layering.nodes[*node].secondary += shift;
        }
    }

    for _ in 0..MEDIAN_PASSES {
        for rank in 1..layering.ranks.len() {
            pull_towards_medians(layering, rank, true, horizontal, node_spacing);
        }
        for rank in (0..layering.ranks.len().saturating_sub(1)).rev() {
            pull_towards_medians(layering, rank, false, horizontal, node_spacing);
        }
    }
}

/// Moves a rank towards its neighbours' median positions without overlap.
fn pull_towards_medians(
    layering: &mut Layering,
    rank: usize,
    use_upper: bool,
    horizontal: bool,
    node_spacing: f32,
) {
    let members = layering.ranks[rank].clone();
    if members.is_empty() {
        return;
    }
    let desired: Vec<f32> = members
        .iter()
        .map(|node| {
            let neighbours = if use_upper {
                &layering.upper[*node]
            } else {
                &layering.lower[*node]
            };
            let mut values: Vec<f32> = neighbours
                .iter()
                .map(|neighbour| layering.nodes[*neighbour].secondary)
                .collect();
            if values.is_empty() {
                return layering.nodes[*node].secondary;
            }
            values.sort_by(f32::total_cmp);
            let mid = values.len() / 2;
            if values.len() % 2 == 1 {
                values[mid]
            } else {
                (values[mid - 1] + values[mid]) / 2.0
            }
        })
        .collect();

    let mut placed = Vec::with_capacity(members.len());
    for (index, node) in members.iter().enumerate() {
        let position = match index.checked_sub(1) {
            Some(prev) => desired[index].max(
                placed[prev] + separation(layering, members[prev], *node, horizontal, node_spacing),
            ),
            None => desired[index],
        };
        placed.push(position);
    }
    let drift = desired
        .iter()
        .zip(&placed)
        .map(|(want, got)| want - got)
        .sum::<f32>()
        / members.len() as f32;
    for (node, position) in members.iter().zip(placed) {
        layering.nodes[*node].secondary = position + drift;
    }
}

fn write_node_positions(graph: &mut Graph, layering: &Layering, horizontal: bool) {
    for (node, layer) in graph.nodes_mut().iter_mut().zip(&layering.nodes) {
        let (cx, cy) = if horizontal {
            (layer.primary, layer.secondary)
        } else {
            (layer.secondary, layer.primary)
        };
        node.x = cx - node.width / 2.0;
        node.y = cy - node.height / 2.0;
    }
}

fn layer_point(node: &LayerNode, horizontal: bool) -> Point {
    if horizontal {
        Point::new(node.primary, node.secondary)
    } else {
        Point::new(node.secondary, node.primary)
    }
}

/// Point on the border of `rect` facing `towards` along the rank axis.
fn anchor(rect: &Rect, towards: Point, horizontal: bool) -> Point {
    let centre = rect.center();
    if horizontal {
        let x = if towards.x >= centre.x { rect.right() } else { rect.x };
        Point::new(x, centre.y)
    } else {
        let y = if towards.y >= centre.y { rect.bottom() } else { rect.y };
        Point::new(centre.x, y)
    }
}

fn route_edges(
    graph: &mut Graph,
    edges: &[OrientedEdge],
    reversed: &BTreeSet<usize>,
    layering: &Layering,
    horizontal: bool,
) {
    let mut pair_total: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for edge in edges {
        let key = (edge.source.min(edge.target), edge.source.max(edge.target));
        *pair_total.entry(key).or_insert(0) += 1;
    }
    let mut pair_seen: BTreeMap<(usize, usize), usize> = BTreeMap::new();

    let rects: Vec<Rect> = graph.nodes().iter().map(|node| node.bounds()).collect();
    let (_, graph_edges) = graph.parts_mut();
    for edge in edges {
        let Some(target_edge) = graph_edges.get_mut(edge.edge_index) else {
            continue;
        };
        let key = (edge.source.min(edge.target), edge.source.max(edge.target));
        let total = pair_total.get(&key).copied().unwrap_or(1);
        let seen = pair_seen.entry(key).or_insert(0);
        let offset = if total > 1 {
            (*seen as f32 - (total - 1) as f32 / 2.0) * PARALLEL_EDGE_STEP
        } else {
            0.0
        };
        *seen += 1;

        let mut points = if edge.source == edge.target {
            route_self_loop(&rects[edge.source], horizontal)
        } else {
            let Some(chain) = layering.chains.get(&edge.edge_index) else {
                continue;
            };
            let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
                continue;
            };
            let bends: Vec<Point> = chain[1..chain.len() - 1]
                .iter()
                .map(|node| layer_point(&layering.nodes[*node], horizontal))
                .collect();
            let next = bends.first().copied().unwrap_or_else(|| rects[*last].center());
            let previous = bends.last().copied().unwrap_or_else(|| rects[*first].center());
            let start = anchor(&rects[*first], next, horizontal);
            let end = anchor(&rects[*last], previous, horizontal);
            let mut points = if bends.is_empty() {
                route_edge_points(start, end, horizontal)
            } else {
                let mut points = Vec::with_capacity(bends.len() + 2);
                points.push(start);
                points.extend(bends);
                points.push(end);
                points
            };
            if reversed.contains(&edge.edge_index) {
                points.reverse();
            }
            points
        };

        if offset.abs() > 0.01 {
            apply_parallel_offset(&mut points, offset, horizontal);
        }
        target_edge.label_pos = target_edge
            .label
            .as_ref()
            .and_then(|_| point_along(&points, 0.5));
        target_edge.points = points;
    }
}

/// Loop leaving one side of the node and re-entering another.
fn route_self_loop(b: &Rect, horizontal: bool) -> Vec<Point> {
    if horizontal {
        vec![
            Point::new(b.right(), b.y + b.height * 0.4),
            Point::new(b.right() + SELF_LOOP_SIZE, b.y + b.height * 0.4),
            Point::new(b.right() + SELF_LOOP_SIZE, b.y - SELF_LOOP_SIZE),
            Point::new(b.x + b.width * 0.6, b.y - SELF_LOOP_SIZE),
            Point::new(b.x + b.width * 0.6, b.y),
        ]
    } else {
        vec![
            Point::new(b.x + b.width * 0.6, b.bottom()),
            Point::new(b.x + b.width * 0.6, b.bottom() + SELF_LOOP_SIZE),
            Point::new(b.right() + SELF_LOOP_SIZE, b.bottom() + SELF_LOOP_SIZE),
            Point::new(b.right() + SELF_LOOP_SIZE, b.y + b.height * 0.4),
            Point::new(b.right(), b.y + b.height * 0.4),
        ]
    }
}

fn apply_parallel_offset(points: &mut [Point], offset: f32, horizontal: bool) {
    if points.len() < 2 {
        return;
    }
    for point in points.iter_mut() {
        if horizontal {
            point.y += offset;
        } else {
            point.x += offset;
        }
    }
}

/// Straight segment, or an elbow through the midline when misaligned.
fn route_edge_points(source: Point, target: Point, horizontal: bool) -> Vec<Point> {
    let points = if horizontal {
        if (source.y - target.y).abs() < EPSILON {
            vec![source, target]
        } else {
            let mid_x = (source.x + target.x) / 2.0;
            vec![
                source,
                Point::new(mid_x, source.y),
                Point::new(mid_x, target.y),
                target,
            ]
        }
    } else if (source.x - target.x).abs() < EPSILON {
        vec![source, target]
    } else {
        let mid_y = (source.y + target.y) / 2.0;
        vec![
            source,
            Point::new(source.x, mid_y),
            Point::new(target.x, mid_y),
            target,
        ]
    };

    simplify_polyline(points)
}

fn simplify_polyline(points: Vec<Point>) -> Vec<Point> {
    if points.len() <= 2 {
        return points;
    }

    let mut simplified: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        if simplified.last() == Some(&point) {
            continue;
        }
        simplified.push(point);

        while simplified.len() >= 3 {
            let c = simplified[simplified.len() - 1];
            let b = simplified[simplified.len() - 2];
            let a = simplified[simplified.len() - 3];
            if is_axis_aligned_collinear(a, b, c) {
                simplified.remove(simplified.len() - 2);
            } else {
                break;
            }
        }
    }

    simplified
}

fn is_axis_aligned_collinear(a: Point, b: Point, c: Point) -> bool {
    ((a.x - b.x).abs() < EPSILON && (b.x - c.x).abs() < EPSILON)
        || ((a.y - b.y).abs() < EPSILON && (b.y - c.y).abs() < EPSILON)
}

/// Point at `fraction` of the polyline's length.
fn point_along(points: &[Point], fraction: f32) -> Option<Point> {
    let first = *points.first()?;
    let lengths: Vec<f32> = points
        .windows(2)
        .map(|pair| (pair[1].x - pair[0].x).hypot(pair[1].y - pair[0].y))
        .collect();
    let total: f32 = lengths.iter().sum();
    if total <= EPSILON {
        return Some(first);
    }
    let mut remaining = total * fraction;
    for (pair, length) in points.windows(2).zip(lengths) {
        if remaining <= length && length > EPSILON {
            let t = remaining / length;
            return Some(Point::new(
                pair[0].x + (pair[1].x - pair[0].x) * t,
                pair[0].y + (pair[1].y - pair[0].y) * t,
            ));
        }
        remaining -= length;
    }
    points.last().copied()
}

/// Writes bounds for a cluster and its children; `None` when it has no members.
fn fit_cluster(cluster: &mut Cluster, graph: &Graph, padding: f32) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for child in &mut cluster.children {
        if let Some(child_bounds) = fit_cluster(child, graph, padding) {
            bounds = Some(bounds.map_or(child_bounds, |acc| acc.union(&child_bounds)));
        }
    }
    for member in &cluster.members {
        if let Some(node) = graph.node(member) {
            let rect = node.bounds();
            bounds = Some(bounds.map_or(rect, |acc| acc.union(&rect)));
        }
    }
    cluster.bounds = bounds.map_or_else(Rect::default, |rect| rect.inflated(padding));
    bounds.map(|_| cluster.bounds)
}

fn reset_clusters(clusters: &mut [Cluster]) {
    for cluster in clusters {
        cluster.bounds = Rect::default();
        reset_clusters(&mut cluster.children);
    }
}

fn for_each_cluster(clusters: &mut [Cluster], apply: &mut impl FnMut(&mut Cluster)) {
    for cluster in clusters {
        apply(cluster);
        for_each_cluster(&mut cluster.children, apply);
    }
}

/// Moves the drawing so its top-left content corner sits at `padding`.
fn normalize(graph: &mut Graph, clusters: &mut [Cluster], padding: f32) -> Size {
    let mut bounds = graph.node_bounds().unwrap_or_default();
    for edge in graph.edges() {
        for point in &edge.points {
            bounds = bounds.union(&Rect::new(point.x, point.y, 0.0, 0.0));
        }
        if let Some(pos) = edge.label_pos {
            let size = edge.label_size;
            bounds = bounds.union(&Rect::new(
                pos.x - size.width / 2.0,
                pos.y - size.height / 2.0,
                size.width,
                size.height,
            ));
        }
    }
    for_each_cluster(clusters, &mut |cluster| {
        if cluster.bounds.width > 0.0 {
            bounds = bounds.union(&cluster.bounds);
        }
    });

    let dx = padding - bounds.x;
    let dy = padding - bounds.y;
    let (nodes, edges) = graph.parts_mut();
    for node in nodes {
        node.x += dx;
        node.y += dy;
    }
    for edge in edges {
        for point in &mut edge.points {
            *point = point.translated(dx, dy);
        }
        edge.label_pos = edge.label_pos.map(|pos| pos.translated(dx, dy));
    }
    for_each_cluster(clusters, &mut |cluster| {
        if cluster.bounds.width > 0.0 {
            cluster.bounds = cluster.bounds.translated(dx, dy);
        }
    });

    Size::new(bounds.width + padding * 2.0, bounds.height + padding * 2.0)
}

fn apply_scale(graph: &mut Graph, clusters: &mut [Cluster], scale: f32) {
    let (nodes, edges) = graph.parts_mut();
    for node in nodes {
        node.x *= scale;
        node.y *= scale;
        node.width *= scale;
        node.height *= scale;
    }
    for edge in edges {
        for point in &mut edge.points {
            *point = point.scaled(scale);
        }
        edge.label_pos = edge.label_pos.map(|pos| pos.scaled(scale));
        edge.label_size = edge.label_size.scaled(scale);
    }
    for_each_cluster(clusters, &mut |cluster| {
        cluster.bounds = cluster.bounds.scaled(scale);
    });
}

#[cfg(test)]
mod tests {
    use fd_core::{Cluster, Edge, Graph, GraphDirection, LayoutSettings, Point};

    use super::{
        OrientedEdge, count_inversions, cycle_removal_greedy, layout_graph, point_along,
        route_edge_points, simplify_polyline,
    };

    fn graph(edges: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for (from, to) in edges {
            graph.add_edge(Edge::new(*from, *to));
        }
        graph
    }

    fn run(graph: &mut Graph, direction: GraphDirection) -> crate::LayoutOutcome {
        layout_graph(
            graph,
            direction,
            &mut [],
            f32::INFINITY,
            &LayoutSettings::default(),
        )
    }

    fn overlaps(graph: &Graph) -> bool {
        let nodes = graph.nodes();
        for (index, a) in nodes.iter().enumerate() {
            for b in &nodes[index + 1..] {
                let (ra, rb) = (a.bounds(), b.bounds());
                if ra.x < rb.right() - 0.01
                    && rb.x < ra.right() - 0.01
                    && ra.y < rb.bottom() - 0.01
                    && rb.y < ra.bottom() - 0.01
                {
                    return true;
                }
            }
        }
        false
    }

    #[test]
    fn chain_ranks_flow_top_to_bottom() {
        let mut g = graph(&[("A", "B"), ("B", "C")]);
        let outcome = run(&mut g, GraphDirection::TD);
        let ys: Vec<f32> = g.nodes().iter().map(|node| node.y).collect();
        assert!(ys[0] < ys[1] && ys[1] < ys[2]);
        assert_eq!(outcome.stats.rank_count, 3);
        assert_eq!(outcome.stats.reversed_edges, 0);
        assert_eq!(g.edges()[0].points.len(), 2);
    }

    #[test]
    fn directions_pick_the_rank_axis() {
        let mut lr = graph(&[("A", "B")]);
        run(&mut lr, GraphDirection::LR);
        assert!(lr.nodes()[0].x < lr.nodes()[1].x);

        let mut rl = graph(&[("A", "B")]);
        run(&mut rl, GraphDirection::RL);
        assert!(rl.nodes()[0].x > rl.nodes()[1].x);

        let mut bt = graph(&[("A", "B")]);
        run(&mut bt, GraphDirection::BT);
        assert!(bt.nodes()[0].y > bt.nodes()[1].y);
    }

    #[test]
    fn cycles_are_broken_and_edges_keep_their_direction() {
        let mut g = graph(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let outcome = run(&mut g, GraphDirection::TD);
        assert_eq!(outcome.stats.reversed_edges, 1);
        let back = &g.edges()[2];
        let c = g.node("C").expect("C").bounds();
        let a = g.node("A").expect("A").bounds();
        let first = back.points.first().copied().expect("routed");
        let last = back.points.last().copied().expect("routed");
        assert!((first.y - c.y).abs() < 0.01 || (first.y - c.bottom()).abs() < 0.01);
        assert!((last.y - a.y).abs() < 0.01 || (last.y - a.bottom()).abs() < 0.01);
    }

    fn oriented(pairs: &[(usize, usize)]) -> Vec<OrientedEdge> {
        pairs
            .iter()
            .enumerate()
            .map(|(edge_index, &(source, target))| OrientedEdge {
                source,
                target,
                edge_index,
            })
            .collect()
    }

    #[test]
    fn greedy_ordering_reverses_only_back_edges() {
        let two_cycle = oriented(&[(0, 1), (1, 0)]);
        assert_eq!(cycle_removal_greedy(2, &two_cycle).into_iter().collect::<Vec<_>>(), vec![1]);

        let dag = oriented(&[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert!(cycle_removal_greedy(4, &dag).is_empty());

        let looped = oriented(&[(0, 0), (0, 1)]);
        assert!(cycle_removal_greedy(2, &looped).is_empty());

        let disjoint = oriented(&[(0, 1), (1, 0), (2, 3), (3, 4), (4, 2)]);
        assert_eq!(cycle_removal_greedy(5, &disjoint).len(), 2);
    }

    #[test]
    fn long_edges_bend_through_virtual_nodes() {
        let mut g = graph(&[("A", "B"), ("B", "C"), ("A", "C")]);
        let outcome = run(&mut g, GraphDirection::TD);
        assert_eq!(outcome.stats.virtual_nodes, 1);
        assert_eq!(g.edges()[2].points.len(), 3);
    }

    #[test]
    fn crossing_reduction_untangles_a_swap() {
        let mut g = graph(&[("A", "D"), ("B", "C"), ("A", "X"), ("B", "Y")]);
        let outcome = run(&mut g, GraphDirection::TD);
        assert_eq!(outcome.stats.crossing_count, 0);
        assert!(!overlaps(&g));
    }

    #[test]
    fn complete_bipartite_keeps_a_crossing() {
        let mut g = graph(&[("A", "C"), ("A", "D"), ("B", "C"), ("B", "D")]);
        let outcome = run(&mut g, GraphDirection::TD);
        assert_eq!(outcome.stats.crossing_count, 1);
    }

    #[test]
    fn self_loops_and_parallel_edges_are_routed() {
        let mut g = graph(&[("A", "A"), ("A", "B"), ("A", "B")]);
        run(&mut g, GraphDirection::TD);
        assert_eq!(g.edges()[0].points.len(), 5);
        let first_x = g.edges()[1].points[0].x;
        let second_x = g.edges()[2].points[0].x;
        assert!((first_x - second_x).abs() > 1.0);
    }

    #[test]
    fn labels_sit_on_their_edge() {
        let mut g = Graph::new();
        g.add_edge(Edge::new("A", "B").with_label(Some("yes".to_string())));
        g.add_edge(Edge::new("A", "C"));
        run(&mut g, GraphDirection::TD);
        assert!(g.edges()[0].label_pos.is_some());
        assert!(g.edges()[1].label_pos.is_none());
    }

    #[test]
    fn clusters_wrap_their_members() {
        let mut g = graph(&[("A", "B"), ("B", "C")]);
        let mut outer = Cluster::new("outer");
        outer.members.push("A".to_string());
        let mut inner = Cluster::new("inner");
        inner.members.push("B".to_string());
        outer.children.push(inner);
        let mut clusters = vec![outer, Cluster::new("empty")];
        layout_graph(
            &mut g,
            GraphDirection::TD,
            &mut clusters,
            f32::INFINITY,
            &LayoutSettings::default(),
        );
        let outer = &clusters[0];
        let inner = &outer.children[0];
        let b = g.node("B").expect("B").bounds();
        assert!(inner.bounds.x < b.x && inner.bounds.right() > b.right());
        assert!(outer.bounds.x <= inner.bounds.x && outer.bounds.bottom() >= inner.bounds.bottom());
        assert_eq!(clusters[1].bounds.width, 0.0);
    }

    #[test]
    fn wide_graphs_scale_uniformly() {
        let edges: Vec<(String, String)> = (0..12).map(|i| ("root".to_string(), format!("leaf{i}"))).collect();
        let mut g = Graph::new();
        for (from, to) in &edges {
            g.add_edge(Edge::new(from.as_str(), to.as_str()));
        }
        let natural_height = g.nodes()[0].height;
        let outcome = layout_graph(
            &mut g,
            GraphDirection::TD,
            &mut [],
            300.0,
            &LayoutSettings::default(),
        );
        assert!(outcome.stats.scale < 1.0);
        assert!(outcome.size.width <= 300.0 + 0.01);
        let root = g.node("root").expect("root");
        assert!((root.height - natural_height * outcome.stats.scale).abs() < 0.01);
        assert!(g.nodes().iter().all(|node| node.x >= 0.0));
    }

    #[test]
    fn inversions_count_pairs() {
        let mut values = vec![3, 1, 2];
        assert_eq!(count_inversions(&mut values), 2);
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn polylines_simplify_and_measure() {
        let path = route_edge_points(Point::new(0.0, 0.0), Point::new(0.0, 10.0), false);
        assert_eq!(path.len(), 2);
        let elbow = route_edge_points(Point::new(0.0, 0.0), Point::new(10.0, 10.0), false);
        assert_eq!(elbow.len(), 4);
        let collinear = simplify_polyline(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 5.0),
            Point::new(0.0, 10.0),
        ]);
        assert_eq!(collinear.len(), 2);
        assert_eq!(
            point_along(&[Point::new(0.0, 0.0), Point::new(0.0, 10.0)], 0.5),
            Some(Point::new(0.0, 5.0))
        );
    }
}
