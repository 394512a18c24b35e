//! The placement function: maps a content hash to a placement group and its hosts.

use serde::{Deserialize, Serialize};

use crate::types::ContentHash;

/// A placement group: an ordered tuple of node ids. The first id is the primary; the
/// remainder are replicas.
pub type PlacementGroup = Vec<u32>;

/// The cluster-wide placement table: an ordered list of placement groups plus the
/// host address of every node id referenced by them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlacementTable {
    pub node_hosts: Vec<String>,
    pub placement_groups: Vec<PlacementGroup>,
}

/// The outcome of resolving a key against a [`PlacementTable`] from the perspective of
/// one particular node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub pg_index: u32,
    pub is_primary: bool,
    pub is_in_placement_group: bool,
    pub primary_host: String,
    pub replica_hosts: Vec<String>,
}

impl PlacementTable {
    /// Resolve the placement group for `key` and describe it from `node_id`'s perspective.
    ///
    /// The PG index is the big-endian interpretation of the first 4 bytes of the key
    /// modulo the number of placement groups.
    pub fn resolve(&self, key: &ContentHash, node_id: u32) -> Placement {
        let prefix = u32::from_be_bytes(key.as_bytes()[0..4].try_into().unwrap());
        let pg_index = prefix % self.placement_groups.len() as u32;
        let pg = &self.placement_groups[pg_index as usize];

        let is_primary = pg[0] == node_id;
        let is_in_placement_group = is_primary || pg.iter().any(|&n| n == node_id);
        let primary_host = self.node_hosts[pg[0] as usize].clone();

        let replica_ids: &[u32] = if is_primary { &pg[1..] } else { &pg[..] };
        let replica_hosts = replica_ids
            .iter()
            .map(|&id| self.node_hosts[id as usize].clone())
            .collect();

        Placement {
            pg_index,
            is_primary,
            is_in_placement_group,
            primary_host,
            replica_hosts,
        }
    }
}
