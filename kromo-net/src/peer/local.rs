//! A peer's view of the graph: the vertices it owns plus ghost copies of
//! their neighbours in other partitions.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use kromo_core::{Color, Graph, Node};
use tracing::warn;

use crate::{
    error::{NetError, ProtocolError},
    wire::{Opcode, Subgraph, VertexColor},
};

/// Owned vertices occupy local indices `0..owned`; ghosts follow.
#[derive(Debug)]
pub(crate) struct LocalGraph {
    graph: Option<Arc<Graph>>,
    globals: Vec<u32>,
    locals: HashMap<u32, usize>,
    owned: usize,
    ghost_owners: Vec<u8>,
    max_color: Color,
    pending: Vec<usize>,
}

fn rejected(reason: String) -> NetError {
    NetError::Protocol(ProtocolError::Rejected {
        opcode: Opcode::Subgraph,
        reason,
    })
}

impl LocalGraph {
    /// Builds the local graph for `node` from its share.
    pub(crate) fn build(share: &Subgraph, node: u8) -> Result<Self, NetError> {
        let range = share
            .owned_range(node)
            .ok_or_else(|| rejected(format!("partition table has no entry for node {node}")))?;
        if share.adjacency().len() != range.len() {
            return Err(rejected(format!(
                "{} adjacency lists for {} owned vertices",
                share.adjacency().len(),
                range.len()
            )));
        }

        let mut globals: Vec<u32> = range.clone().collect();
        let owned = globals.len();
        let mut locals: HashMap<u32, usize> = globals
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();
        let mut ghost_owners = Vec::new();
        let mut lists: Vec<Vec<usize>> = vec![Vec::new(); owned];

        for (local, neighbours) in share.adjacency().iter().enumerate() {
            for &global in neighbours {
                let neighbour = match locals.get(&global) {
                    Some(&known) => known,
                    None => {
                        let owner = share.owner_of(global).ok_or_else(|| {
                            rejected(format!("vertex {global} has no owner"))
                        })?;
                        let ghost = globals.len();
                        globals.push(global);
                        locals.insert(global, ghost);
                        ghost_owners.push(owner);
                        lists.push(Vec::new());
                        ghost
                    }
                };
                if let Some(list) = lists.get_mut(local) {
                    list.push(neighbour);
                }
                if neighbour >= owned
                    && let Some(list) = lists.get_mut(neighbour)
                {
                    list.push(local);
                }
            }
        }

        let graph = if lists.is_empty() {
            None
        } else {
            Some(Arc::new(Graph::from_adjacency(lists)?))
        };
        Ok(Self {
            graph,
            globals,
            locals,
            owned,
            ghost_owners,
            max_color: share.max_color(),
            pending: (0..owned).collect(),
        })
    }

    /// Returns the shared graph, or `None` when this node owns nothing.
    pub(crate) fn graph(&self) -> Option<Arc<Graph>> {
        self.graph.clone()
    }

    pub(crate) const fn owned(&self) -> usize {
        self.owned
    }

    pub(crate) const fn ghosts(&self) -> usize {
        self.ghost_owners.len()
    }

    pub(crate) const fn max_color(&self) -> Color {
        self.max_color
    }

    /// Owned vertices still waiting for a colour, as local indices.
    pub(crate) fn pending(&self) -> &[usize] {
        &self.pending
    }

    fn global(&self, local: usize) -> Option<u32> {
        self.globals.get(local).copied()
    }

    fn color(&self, local: usize) -> Option<Color> {
        self.graph
            .as_ref()
            .and_then(|graph| graph.node(local))
            .and_then(Node::color)
    }

    fn set_color(&self, local: usize, color: Option<Color>) -> Result<(), NetError> {
        if let Some(graph) = &self.graph {
            graph.set_color(local, color)?;
        }
        Ok(())
    }

    fn neighbours(&self, local: usize) -> &[usize] {
        self.graph
            .as_ref()
            .and_then(|graph| graph.node(local))
            .map(Node::neighbours)
            .unwrap_or_default()
    }

    fn ghost_neighbours(&self, local: usize) -> impl Iterator<Item = usize> + '_ {
        self.neighbours(local)
            .iter()
            .copied()
            .filter(|&neighbour| neighbour >= self.owned)
    }

    /// Records colours committed by other nodes for our ghosts and returns
    /// how many entries named vertices that are not ghosts here.
    pub(crate) fn apply_remote(&self, colors: &[VertexColor]) -> Result<usize, NetError> {
        let mut ignored = 0;
        for entry in colors {
            match self.locals.get(&entry.vertex) {
                Some(&local) if local >= self.owned => self.set_color(local, Some(entry.color))?,
                _ => {
                    warn!(vertex = entry.vertex, "ignoring colour for a vertex that is not a ghost");
                    ignored += 1;
                }
            }
        }
        Ok(ignored)
    }

    /// Groups the colours of `colored` boundary vertices by the nodes that
    /// hold them as ghosts.
    pub(crate) fn boundary_updates(&self, colored: &[usize]) -> BTreeMap<u8, Vec<VertexColor>> {
        let mut updates: BTreeMap<u8, Vec<VertexColor>> = BTreeMap::new();
        for &local in colored {
            let (Some(color), Some(vertex)) = (self.color(local), self.global(local)) else {
                continue;
            };
            let owners: BTreeSet<u8> = self
                .ghost_neighbours(local)
                .filter_map(|ghost| self.ghost_owners.get(ghost - self.owned).copied())
                .collect();
            for owner in owners {
                updates
                    .entry(owner)
                    .or_default()
                    .push(VertexColor { vertex, color });
            }
        }
        updates
    }

    /// Settles conflicts between `colored` vertices and ghosts coloured in
    /// the same round, returning how many owned vertices went back to
    /// pending.
    ///
    /// The endpoint with the higher global index always yields. A ghost that
    /// yields to one of ours is cleared here because its owner resets it.
    pub(crate) fn resolve_conflicts(&mut self, colored: &[usize]) -> Result<u32, NetError> {
        let mut resets = Vec::new();
        let mut yielded_ghosts = BTreeSet::new();
        for &local in colored {
            let (Some(color), Some(global)) = (self.color(local), self.global(local)) else {
                continue;
            };
            let mut lost = false;
            for ghost in self.ghost_neighbours(local) {
                if self.color(ghost) != Some(color) {
                    continue;
                }
                if self.global(ghost).is_some_and(|other| other < global) {
                    lost = true;
                } else {
                    yielded_ghosts.insert(ghost);
                }
            }
            if lost {
                resets.push(local);
            }
        }

        for &ghost in &yielded_ghosts {
            self.set_color(ghost, None)?;
        }
        for &local in &resets {
            self.set_color(local, None)?;
        }
        let count = u32::try_from(resets.len()).unwrap_or(u32::MAX);
        self.pending = resets;
        Ok(count)
    }

    /// Returns the colour of every coloured owned vertex.
    pub(crate) fn owned_colors(&self) -> Vec<VertexColor> {
        (0..self.owned)
            .filter_map(|local| {
                Some(VertexColor {
                    vertex: self.global(local)?,
                    color: self.color(local)?,
                })
            })
            .collect()
    }
}
