//! Multi-node ring scenarios over the in-memory transport, driven by manual
//! stabilization ticks.

use async_trait::async_trait;
use chord_core::{Id, NodeInfo, RingConfig, RingInfo};
use chord_net::{Handler, PeerRequest, PeerResponse, Route, Transport};
use chord_node::memory::MEMORY_ADDRESS;
use chord_node::{ChordNode, MemoryTransport, NodeBuilder, NodeError, Phase, Stabilizer};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

fn small_ring() -> RingConfig {
    RingConfig::new("r")
        .with_modulo(2, 8)
        .with_timeout_ms(100)
        .with_finger_table_length(5)
        .with_next_buffer_length(4)
}

async fn create(transport: &MemoryTransport, id: u64) -> Arc<ChordNode> {
    NodeBuilder::new(Arc::new(transport.clone()))
        .id(Id(id))
        .create(&small_ring())
        .await
        .unwrap()
}

async fn join(transport: &MemoryTransport, id: u64, bootstrap: &ChordNode) -> Arc<ChordNode> {
    NodeBuilder::new(Arc::new(transport.clone()))
        .id(Id(id))
        .join("r", &bootstrap.info().address, bootstrap.info().port)
        .await
        .unwrap()
}

async fn tick(node: &Arc<ChordNode>) {
    Stabilizer::new(node.clone()).tick().await;
}

async fn tick_all(nodes: &[Arc<ChordNode>], rounds: usize) {
    for _ in 0..rounds {
        for node in nodes {
            tick(node).await;
        }
    }
}

/// Builds a ring joining every node through the first one, ticking the
/// whole ring after each join.
async fn build_ring(transport: &MemoryTransport, ids: &[u64]) -> Vec<Arc<ChordNode>> {
    let mut nodes = vec![create(transport, ids[0]).await];
    for &id in &ids[1..] {
        let node = join(transport, id, &nodes[0]).await;
        nodes.push(node);
        tick_all(&nodes, 2).await;
    }
    tick_all(&nodes, 8).await;
    nodes
}

/// Owner of `target` among `ids`: the first identifier at or after it.
fn expected_owner(ids: &[u64], target: u64) -> u64 {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .copied()
        .find(|&id| id >= target)
        .unwrap_or(sorted[0])
}

fn by_id(nodes: &[Arc<ChordNode>], id: u64) -> NodeInfo {
    nodes
        .iter()
        .find(|n| n.id() == Id(id))
        .map(|n| n.info().clone())
        .unwrap()
}

/// A peer that answers consistently about ring membership but always
/// forwards routing steps to `other`.
struct Forwarder {
    ring: RingInfo,
    other: NodeInfo,
}

#[async_trait]
impl Handler<PeerRequest, PeerResponse> for Forwarder {
    async fn handle(&self, request: PeerRequest) -> PeerResponse {
        match request {
            PeerRequest::GetRingInfo => PeerResponse::Ring(self.ring.clone()),
            PeerRequest::FindSuccessor(_) => PeerResponse::Node(self.other.clone()),
            PeerRequest::ClosestPrecedingFinger(_) => {
                PeerResponse::Route(Route::Forward(self.other.clone()))
            }
            PeerRequest::GetPredecessor => PeerResponse::Predecessor(None),
            PeerRequest::GetSuccessorList => PeerResponse::Successors(vec![self.other.clone()]),
            _ => PeerResponse::Ack,
        }
    }
}

const IDS: [u64; 8] = [10, 40, 75, 100, 130, 170, 200, 240];

// ============================================================================
// Creation and the two-node scenario
// ============================================================================

#[tokio::test]
async fn test_create_ring() {
    let transport = MemoryTransport::new();
    let a = create(&transport, 42).await;

    assert_eq!(a.ring().modulo, 255);
    assert_eq!(a.successor(), a.info().clone());
    assert_eq!(a.predecessor(), None);
    assert_eq!(a.phase(), Phase::Stable);
    assert_eq!(
        Stabilizer::new(a.clone()).interval(),
        Duration::from_millis(100)
    );
}

#[tokio::test]
async fn test_single_node_owns_every_key() {
    let transport = MemoryTransport::new();
    let a = create(&transport, 42).await;

    for key in ["00000", "a", "b", "homering.ga"] {
        assert_eq!(a.lookup(key).await.unwrap(), a.info().clone());
        assert_eq!(a.simple_lookup(key).await.unwrap(), a.info().clone());
    }
    tick(&a).await;
    assert_eq!(a.successor(), a.info().clone());
}

#[tokio::test]
async fn test_two_node_ring_links_after_one_tick_each() {
    let transport = MemoryTransport::new();
    let a = create(&transport, 50).await;
    let b = join(&transport, 150, &a).await;
    assert_eq!(b.ring(), a.ring());
    assert_eq!(b.successor(), a.info().clone());

    tick(&b).await;
    tick(&a).await;

    assert_eq!(a.successor(), b.info().clone());
    assert_eq!(b.successor(), a.info().clone());
    assert_eq!(a.predecessor(), Some(b.info().clone()));
    assert_eq!(b.predecessor(), Some(a.info().clone()));
}

#[tokio::test]
async fn test_join_with_wrong_name_is_rejected() {
    let transport = MemoryTransport::new();
    let a = create(&transport, 50).await;
    let err = NodeBuilder::new(Arc::new(transport.clone()))
        .join("other", &a.info().address, a.info().port)
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::RingMismatch { .. }));
    assert!(err.is_config());
}

#[tokio::test]
async fn test_join_with_taken_id_is_rejected() {
    let transport = MemoryTransport::new();
    let a = create(&transport, 50).await;
    let err = NodeBuilder::new(Arc::new(transport.clone()))
        .id(Id(50))
        .join("r", &a.info().address, a.info().port)
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::IdCollision { .. }));
}

#[tokio::test]
async fn test_join_through_dead_bootstrap() {
    let transport = MemoryTransport::new();
    let a = create(&transport, 50).await;
    transport.crash(a.info());
    let err = NodeBuilder::new(Arc::new(transport.clone()))
        .join("r", &a.info().address, a.info().port)
        .await
        .unwrap_err();
    assert!(err.is_connectivity());
}

// ============================================================================
// Lookup on a stable ring
// ============================================================================

#[tokio::test]
async fn test_ring_is_linked_in_id_order() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &IDS).await;

    for node in &nodes {
        let me = node.id().0;
        let next = expected_owner(&IDS, (me + 1) % 255);
        assert_eq!(node.successor().id, Id(next), "successor of {}", me);
        let list = node.successors();
        assert_eq!(list.len(), 4, "successor list of {}", me);
        assert!(!list.iter().any(|n| n.id == node.id()));
    }
}

#[tokio::test]
async fn test_lookup_and_simple_lookup_agree() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &IDS).await;

    for target in (0..255).step_by(7) {
        let expected = by_id(&nodes, expected_owner(&IDS, target));
        for node in &nodes {
            let fast = node.find_successor(Id(target)).await.unwrap();
            let slow = node.simple_find_successor(Id(target)).await.unwrap();
            assert_eq!(fast, expected, "lookup of {} from {}", target, node.id());
            assert_eq!(slow, expected, "simple lookup of {} from {}", target, node.id());
        }
    }
}

#[tokio::test]
async fn test_key_on_node_id_resolves_to_that_node() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &IDS).await;

    for owner in &nodes {
        for node in &nodes {
            assert_eq!(node.find_successor(owner.id()).await.unwrap(), owner.info().clone());
            assert_eq!(
                node.simple_find_successor(owner.id()).await.unwrap(),
                owner.info().clone()
            );
        }
    }
}

#[tokio::test]
async fn test_lookup_by_key_matches_hash() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &IDS).await;

    for key in ["00000", "alpha", "beta", "gamma"] {
        let target = nodes[0].space().hash(key);
        let expected = by_id(&nodes, expected_owner(&IDS, target.0));
        for node in &nodes {
            assert_eq!(node.lookup(key).await.unwrap(), expected);
        }
    }
}

#[tokio::test]
async fn test_stabilization_is_idempotent_on_stable_ring() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &IDS).await;

    let before: Vec<_> = nodes.iter().map(|n| n.topology()).collect();
    tick_all(&nodes, 3).await;
    let after: Vec<_> = nodes.iter().map(|n| n.topology()).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_fingers_point_at_offset_owners() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &IDS).await;

    for node in &nodes {
        for entry in node.fingers() {
            let expected = expected_owner(&IDS, entry.start.0);
            assert_eq!(entry.node.map(|n| n.id), Some(Id(expected)));
        }
    }
}

// ============================================================================
// Membership changes
// ============================================================================

#[tokio::test]
async fn test_join_converges() {
    let transport = MemoryTransport::new();
    let mut nodes = build_ring(&transport, &IDS).await;

    let newcomer = join(&transport, 120, &nodes[2]).await;
    nodes.push(newcomer.clone());
    // ceil(log_2(255)) rounds
    tick_all(&nodes, 8).await;

    let ids: Vec<u64> = nodes.iter().map(|n| n.id().0).collect();
    for target in [101, 110, 120, 121, 130] {
        let expected = by_id(&nodes, expected_owner(&ids, target));
        for node in &nodes {
            assert_eq!(node.find_successor(Id(target)).await.unwrap(), expected);
        }
    }
    assert_eq!(newcomer.predecessor().map(|p| p.id), Some(Id(100)));
    assert_eq!(nodes[3].successor().id, Id(120));
}

#[tokio::test]
async fn test_graceful_leave_patches_neighbours() {
    let transport = MemoryTransport::new();
    let mut nodes = build_ring(&transport, &IDS).await;

    // 100 sits between 75 and 130
    let leaving = nodes.remove(3);
    leaving.leave().await;
    assert_eq!(leaving.phase(), Phase::Left);

    let pred = nodes.iter().find(|n| n.id() == Id(75)).unwrap();
    let succ = nodes.iter().find(|n| n.id() == Id(130)).unwrap();
    assert_eq!(pred.successor().id, Id(130));
    assert_eq!(succ.predecessor().map(|p| p.id), Some(Id(75)));

    tick_all(&nodes, 6).await;
    let ids: Vec<u64> = nodes.iter().map(|n| n.id().0).collect();
    for target in (0..255).step_by(11) {
        let expected = by_id(&nodes, expected_owner(&ids, target));
        for node in &nodes {
            assert_eq!(node.find_successor(Id(target)).await.unwrap(), expected);
            assert_eq!(node.simple_find_successor(Id(target)).await.unwrap(), expected);
        }
    }
}

#[tokio::test]
async fn test_last_member_leaves_without_remote_calls() {
    let transport = MemoryTransport::new();
    let a = create(&transport, 42).await;
    a.leave().await;
    assert_eq!(a.phase(), Phase::Left);
    assert!(a.shutdown_token().is_cancelled());
}

#[tokio::test]
async fn test_crash_is_repaired_by_stabilization() {
    let transport = MemoryTransport::new();
    let mut nodes = build_ring(&transport, &IDS).await;

    let crashed = nodes.remove(5); // 170
    transport.crash(crashed.info());
    tick_all(&nodes, 10).await;

    let ids: Vec<u64> = nodes.iter().map(|n| n.id().0).collect();
    for node in &nodes {
        assert!(!node.successors().iter().any(|n| n.id == crashed.id()));
        assert_ne!(node.predecessor().map(|p| p.id), Some(crashed.id()));
    }
    for target in (0..255).step_by(5) {
        let expected = by_id(&nodes, expected_owner(&ids, target));
        for node in &nodes {
            assert_eq!(node.find_successor(Id(target)).await.unwrap(), expected);
            assert_eq!(node.simple_find_successor(Id(target)).await.unwrap(), expected);
        }
    }
}

#[tokio::test]
async fn test_lookup_routes_around_dead_hop_before_repair() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &IDS).await;

    // every path from 10 towards 160 goes through 130
    transport.crash(nodes[4].info());

    let slow = nodes[0].simple_find_successor(Id(160)).await.unwrap();
    assert_eq!(slow.id, Id(170));
    let fast = nodes[0].find_successor(Id(160)).await.unwrap();
    assert_eq!(fast.id, Id(170));
}

#[tokio::test]
async fn test_every_successor_dead_falls_back_to_self() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &[10, 100]).await;

    transport.crash(nodes[1].info());
    tick(&nodes[0]).await;

    assert_eq!(nodes[0].successor(), nodes[0].info().clone());
    assert_eq!(nodes[0].predecessor(), None);
    assert_eq!(nodes[0].lookup("anything").await.unwrap(), nodes[0].info().clone());
}

// ============================================================================
// Lookup failures
// ============================================================================

#[tokio::test]
async fn test_forwarding_cycle_exhausts_hop_budget() {
    let transport = MemoryTransport::new();
    let ring = small_ring().validate().unwrap();
    let x = NodeInfo::new(Id(200), MEMORY_ADDRESS, 20_001);
    let y = NodeInfo::new(Id(60), MEMORY_ADDRESS, 20_002);
    let _x = transport
        .listen(
            x.port,
            Arc::new(Forwarder {
                ring: ring.clone(),
                other: y.clone(),
            }),
        )
        .await
        .unwrap();
    let _y = transport
        .listen(
            y.port,
            Arc::new(Forwarder {
                ring,
                other: x.clone(),
            }),
        )
        .await
        .unwrap();

    let node = NodeBuilder::new(Arc::new(transport.clone()))
        .id(Id(10))
        .join("r", &x.address, x.port)
        .await
        .unwrap();
    assert_eq!(node.successors(), vec![y.clone(), x.clone()]);

    let err = node.find_successor(Id(150)).await.unwrap_err();
    assert!(
        matches!(err, NodeError::HopBudgetExhausted { target: Id(150), .. }),
        "unexpected error {:?}",
        err
    );
    assert!(!err.is_connectivity());
}

#[tokio::test]
async fn test_lookup_with_every_candidate_dead_has_no_route() {
    let transport = MemoryTransport::new();
    let nodes = build_ring(&transport, &[10, 100, 200]).await;
    transport.crash(nodes[1].info());
    transport.crash(nodes[2].info());

    let err = nodes[0].find_successor(Id(150)).await.unwrap_err();
    assert!(
        matches!(err, NodeError::NoRoute(Id(150))),
        "unexpected error {:?}",
        err
    );
    assert!(err.is_connectivity());
}
