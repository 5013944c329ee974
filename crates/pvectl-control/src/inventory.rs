//! Inventory aggregation.
//!
//! Listings walk the cluster in three levels: one node enumeration, one guest
//! enumeration per node, and one config fetch per guest. Records keep node
//! order, then each node's own order; nothing is sorted.
//!
//! A failed config fetch never drops a record, it only degrades the enriched
//! fields to `"N/A"`. A failed node-level enumeration aborts the listing
//! unless the node failure policy says to skip that node.

use pvectl_client::{HypervisorClient, NodeEntry, RemoteError};
use pvectl_core::{NodeName, VmId};

use crate::error::{ControlError, Result};
use crate::types::{
    ClusterNodeRecord, ClusterStatusRecord, ContainerRecord, Enrichment, InventoryRecord,
    NodeFailurePolicy, NodeRecord, NodeStatusRecord, StorageRecord,
};

/// List every VM on every node.
///
/// # Errors
///
/// Returns `ControlError::RemoteFailure` (context `get VMs`) if the node
/// enumeration fails, or if a node's VM enumeration fails under
/// [`NodeFailurePolicy::Abort`].
pub async fn list_vms<C>(client: &C, policy: NodeFailurePolicy) -> Result<Vec<InventoryRecord>>
where
    C: HypervisorClient + ?Sized,
{
    const CONTEXT: &str = "get VMs";

    let mut records = Vec::new();
    for node in enumerate_nodes(client, CONTEXT).await? {
        let vms = match client.list_vms(&node).await {
            Ok(vms) => vms,
            Err(err) => {
                node_failed(policy, CONTEXT, &node, err)?;
                continue;
            }
        };

        for vm in vms {
            let cpu_cores = match guest_id(&vm.vmid) {
                Some(vmid) => match client.read_config(&node, &vmid).await {
                    Ok(config) => Enrichment::from(config.cores),
                    Err(err) => {
                        tracing::warn!(node = %node, vmid = %vmid, error = %err, "VM config unavailable");
                        Enrichment::Unavailable
                    }
                },
                None => Enrichment::Unavailable,
            };

            records.push(InventoryRecord {
                vmid: vm.vmid,
                name: vm.name,
                status: vm.status,
                node: node.to_string(),
                cpu_cores,
                memory_used: vm.mem,
                memory_total: vm.maxmem,
            });
        }
    }

    Ok(records)
}

/// List every LXC container on every node.
///
/// # Errors
///
/// Same as [`list_vms`], with context `get containers`.
pub async fn list_containers<C>(
    client: &C,
    policy: NodeFailurePolicy,
) -> Result<Vec<ContainerRecord>>
where
    C: HypervisorClient + ?Sized,
{
    const CONTEXT: &str = "get containers";

    let mut records = Vec::new();
    for node in enumerate_nodes(client, CONTEXT).await? {
        let containers = match client.list_containers(&node).await {
            Ok(containers) => containers,
            Err(err) => {
                node_failed(policy, CONTEXT, &node, err)?;
                continue;
            }
        };

        for ct in containers {
            let config = match guest_id(&ct.vmid) {
                Some(vmid) => match client.read_container_config(&node, &vmid).await {
                    Ok(config) => Some(config),
                    Err(err) => {
                        tracing::warn!(node = %node, vmid = %vmid, error = %err, "Container config unavailable");
                        None
                    }
                },
                None => None,
            };

            let (cpu_cores, template) = match config {
                Some(config) => (
                    Enrichment::from(config.cores),
                    Enrichment::from(config.template),
                ),
                None => (Enrichment::Unavailable, Enrichment::Unavailable),
            };

            records.push(ContainerRecord {
                vmid: ct.vmid,
                name: ct.name,
                status: ct.status,
                node: node.to_string(),
                cpu_cores,
                memory_used: ct.mem,
                memory_total: ct.maxmem,
                template,
            });
        }
    }

    Ok(records)
}

/// List cluster nodes with their resource usage.
///
/// # Errors
///
/// Returns `ControlError::RemoteFailure` (context `get nodes`).
pub async fn list_nodes<C>(client: &C) -> Result<Vec<NodeRecord>>
where
    C: HypervisorClient + ?Sized,
{
    let nodes = client
        .list_nodes()
        .await
        .map_err(|e| ControlError::remote("get nodes", e))?;

    Ok(nodes.into_iter().map(node_record).collect())
}

/// Read detailed status of one node.
///
/// # Errors
///
/// Returns `ControlError::RemoteFailure` (context `get node status for {node}`).
pub async fn node_status<C>(client: &C, node: &NodeName) -> Result<NodeStatusRecord>
where
    C: HypervisorClient + ?Sized,
{
    let status = client
        .node_status(node)
        .await
        .map_err(|e| ControlError::remote(format!("get node status for {node}"), e))?;

    let cpuinfo = status.cpuinfo.unwrap_or_default();
    let memory = status.memory.unwrap_or_default();

    Ok(NodeStatusRecord {
        node: node.to_string(),
        uptime: status.uptime.unwrap_or(0),
        cpu_usage: status.cpu.unwrap_or(0.0),
        cpu_count: cpuinfo.cpus.unwrap_or(0),
        cpu_model: cpuinfo.model.unwrap_or_default(),
        memory_used: memory.used,
        memory_total: memory.total,
        load_average: status.loadavg,
        kernel: status.kversion.unwrap_or_default(),
        pve_version: status.pveversion.unwrap_or_default(),
    })
}

/// List storage pools on every node.
///
/// # Errors
///
/// Same as [`list_vms`], with context `get storage`.
pub async fn list_storage<C>(client: &C, policy: NodeFailurePolicy) -> Result<Vec<StorageRecord>>
where
    C: HypervisorClient + ?Sized,
{
    const CONTEXT: &str = "get storage";

    let mut records = Vec::new();
    for node in enumerate_nodes(client, CONTEXT).await? {
        let pools = match client.list_storage(&node).await {
            Ok(pools) => pools,
            Err(err) => {
                node_failed(policy, CONTEXT, &node, err)?;
                continue;
            }
        };

        records.extend(pools.into_iter().map(|pool| StorageRecord {
            storage: pool.storage,
            node: node.to_string(),
            kind: pool.kind,
            content: pool.content,
            enabled: pool.enabled.unwrap_or(true),
            active: pool.active.unwrap_or(false),
            used: pool.used,
            total: pool.total,
            available: pool.avail,
        }));
    }

    Ok(records)
}

/// Read cluster membership and quorum.
///
/// A standalone node reports no `cluster` entry; it is treated as an unnamed,
/// quorate cluster of its own node entries.
///
/// # Errors
///
/// Returns `ControlError::RemoteFailure` (context `get cluster status`).
pub async fn cluster_status<C>(client: &C) -> Result<ClusterStatusRecord>
where
    C: HypervisorClient + ?Sized,
{
    let entries = client
        .cluster_status()
        .await
        .map_err(|e| ControlError::remote("get cluster status", e))?;

    let cluster = entries.iter().find(|e| e.kind == "cluster");
    let nodes: Vec<ClusterNodeRecord> = entries
        .iter()
        .filter(|e| e.kind == "node")
        .map(|e| ClusterNodeRecord {
            name: e.name.clone(),
            online: e.online.unwrap_or(false),
            ip: e.ip.clone(),
            local: e.local.unwrap_or(false),
        })
        .collect();

    let node_count = cluster
        .and_then(|c| c.nodes)
        .unwrap_or_else(|| u32::try_from(nodes.len()).unwrap_or(u32::MAX));

    Ok(ClusterStatusRecord {
        name: cluster.map(|c| c.name.clone()).unwrap_or_default(),
        quorate: match cluster {
            Some(c) => c.quorate.unwrap_or(false),
            None => true,
        },
        node_count,
        nodes,
    })
}

async fn enumerate_nodes<C>(client: &C, context: &str) -> Result<Vec<NodeName>>
where
    C: HypervisorClient + ?Sized,
{
    let entries = client
        .list_nodes()
        .await
        .map_err(|e| ControlError::remote(context, e))?;

    entries
        .into_iter()
        .map(|entry| {
            NodeName::new(entry.node).map_err(|e| {
                ControlError::remote(context, RemoteError::Decode(e.to_string()))
            })
        })
        .collect()
}

fn node_failed(
    policy: NodeFailurePolicy,
    context: &str,
    node: &NodeName,
    err: RemoteError,
) -> Result<()> {
    match policy {
        NodeFailurePolicy::Abort => Err(ControlError::remote(context, err)),
        NodeFailurePolicy::Skip => {
            tracing::warn!(node = %node, error = %err, operation = context, "Skipping node");
            Ok(())
        }
    }
}

fn guest_id(raw: &str) -> Option<VmId> {
    VmId::new(raw).ok()
}

fn node_record(entry: NodeEntry) -> NodeRecord {
    NodeRecord {
        node: entry.node,
        status: entry.status.unwrap_or_else(|| "unknown".to_string()),
        cpu_usage: entry.cpu.unwrap_or(0.0),
        cpu_count: entry.maxcpu.unwrap_or(0),
        memory_used: entry.mem.unwrap_or(0),
        memory_total: entry.maxmem.unwrap_or(0),
        uptime: entry.uptime.unwrap_or(0),
    }
}
