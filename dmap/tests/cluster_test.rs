use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dmap::codec::{Codec, CodecRegistry, Value};
use dmap::forward::LoopbackForwarder;
use dmap::metadata::{Member, OwnershipOracle, PartitionTable};
use dmap::hkey::HASH_VERSION;
use dmap::proto::{KeyRequest, Operation, Request};
use dmap::{derive, DMapError, DMapNode, ForwardError, NodeConfig};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

const PARTITIONS: u64 = 16;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
struct Profile {
    name: String,
    visits: u64,
}

struct TestCluster {
    forwarder: Arc<LoopbackForwarder>,
    nodes: Vec<Arc<DMapNode>>,
    tables: Vec<Arc<PartitionTable>>,
}

impl TestCluster {
    fn new(size: u16) -> Self {
        let members: Vec<Member> =
            (0..size).map(|i| Member::new("127.0.0.1", 3320 + i)).collect();
        let registry = Arc::new(
            CodecRegistry::builder()
                .with_builtin()
                .register::<Profile>("test.Profile")
                .build()
                .unwrap(),
        );
        let forwarder = Arc::new(LoopbackForwarder::new());
        let mut nodes = vec![];
        let mut tables = vec![];
        for m in &members {
            let table = Arc::new(PartitionTable::new(PARTITIONS, members.clone()));
            let mut config = NodeConfig::new(m.clone());
            config.partition_count = PARTITIONS;
            let node = Arc::new(DMapNode::new(
                config,
                table.clone(),
                forwarder.clone(),
                Codec::new(registry.clone()),
            ));
            forwarder.register(&node);
            nodes.push(node);
            tables.push(table);
        }
        TestCluster {
            forwarder,
            nodes,
            tables,
        }
    }

    fn owner_index(&self, map: &str, key: &str) -> usize {
        let owner = self.tables[0].owner_of(derive(map, key)).unwrap();
        self.nodes.iter().position(|n| *n.this() == owner).unwrap()
    }

    /// Index of some node that does not own `key`.
    fn non_owner_index(&self, map: &str, key: &str) -> usize {
        (self.owner_index(map, key) + 1) % self.nodes.len()
    }
}

#[tokio::test]
async fn test_owner_is_agreed_by_all_nodes() {
    let cluster = TestCluster::new(3);
    for i in 0..500 {
        let hk = derive("users", &format!("user-{i}"));
        let owners: Vec<Member> =
            cluster.tables.iter().map(|t| t.owner_of(hk).unwrap()).collect();
        assert!(owners.windows(2).all(|w| w[0] == w[1]));
    }
}

#[traced_test]
#[tokio::test]
async fn test_forwarded_put_get_delete() {
    let cluster = TestCluster::new(3);
    let owner = cluster.owner_index("users", "alice");
    let caller = cluster.non_owner_index("users", "alice");
    let users = cluster.nodes[caller].dmap("users");

    users.put("alice", &Value::from("V")).await.unwrap();
    assert_eq!(cluster.nodes[owner].partitions().len("users"), 1);
    assert_eq!(cluster.nodes[caller].partitions().len("users"), 0);

    let v: Value = users.get("alice").await.unwrap();
    assert_eq!(v, Value::from("V"));

    users.delete("alice").await.unwrap();
    assert!(matches!(
        users.get::<Value>("alice").await,
        Err(DMapError::KeyNotFound)
    ));
}

#[tokio::test]
async fn test_local_and_forwarded_reads_agree() {
    let cluster = TestCluster::new(3);
    let profile = Profile {
        name: "bob".into(),
        visits: 3,
    };
    cluster.nodes[0]
        .dmap("profiles")
        .put("bob", &profile)
        .await
        .unwrap();
    for node in &cluster.nodes {
        let out: Profile = node.dmap("profiles").get("bob").await.unwrap();
        assert_eq!(out, profile);
    }
}

#[tokio::test]
async fn test_delete_is_idempotent_across_nodes() {
    let cluster = TestCluster::new(3);
    let caller = cluster.non_owner_index("users", "ghost");
    let users = cluster.nodes[caller].dmap("users");
    users.delete("ghost").await.unwrap();
    users.put("ghost", &1i64).await.unwrap();
    users.delete("ghost").await.unwrap();
    users.delete("ghost").await.unwrap();
    assert!(matches!(
        users.get::<i64>("ghost").await,
        Err(DMapError::KeyNotFound)
    ));
}

#[tokio::test]
async fn test_destroy_reaches_every_member() {
    let cluster = TestCluster::new(3);
    let users = cluster.nodes[0].dmap("users");
    let orders = cluster.nodes[0].dmap("orders");
    for i in 0..60 {
        users.put(&format!("u{i}"), &(i as i64)).await.unwrap();
        orders.put(&format!("o{i}"), &(i as i64)).await.unwrap();
    }
    assert!(cluster.nodes.iter().all(|n| n.partitions().len("users") > 0));

    cluster.nodes[1].dmap("users").destroy().await.unwrap();
    for node in &cluster.nodes {
        assert_eq!(node.partitions().len("users"), 0);
    }
    let total: usize = cluster.nodes.iter().map(|n| n.partitions().len("orders")).sum();
    assert_eq!(total, 60);

    cluster.nodes[2].dmap("users").destroy().await.unwrap();
    cluster.nodes[2].dmap("never-written").destroy().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_forwarded_lock_lifecycle() {
    let cluster = TestCluster::new(3);
    let caller = cluster.non_owner_index("users", "alice");
    let users = cluster.nodes[caller].dmap("users");

    users.lock_with_timeout("alice", "2s").await.unwrap();
    assert!(matches!(
        users.lock_with_timeout("alice", "2s").await,
        Err(DMapError::AlreadyLocked)
    ));
    let owner = cluster.owner_index("users", "alice");
    let other = cluster.nodes[owner].dmap("users");
    assert!(matches!(
        other.lock_with_timeout("alice", "2s").await,
        Err(DMapError::AlreadyLocked)
    ));

    tokio::time::advance(Duration::from_secs(2)).await;
    users.lock_with_timeout("alice", "2s").await.unwrap();

    users.unlock("alice").await.unwrap();
    assert!(matches!(
        users.unlock("alice").await,
        Err(DMapError::NoSuchLock)
    ));
}

#[tokio::test]
async fn test_lock_does_not_need_a_value() {
    let cluster = TestCluster::new(2);
    let users = cluster.nodes[0].dmap("users");
    users.lock_with_timeout("nobody", "10s").await.unwrap();
    assert!(matches!(
        users.get::<Value>("nobody").await,
        Err(DMapError::KeyNotFound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lock_from_two_nodes() {
    let cluster = TestCluster::new(3);
    for i in 0..20 {
        let key = format!("job-{i}");
        let a = cluster.nodes[0].dmap("jobs");
        let b = cluster.nodes[1].dmap("jobs");
        let (ka, kb) = (key.clone(), key.clone());
        let ta = tokio::spawn(async move { a.lock_with_timeout(&ka, "30s").await });
        let tb = tokio::spawn(async move { b.lock_with_timeout(&kb, "30s").await });
        let results = [ta.await.unwrap(), tb.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "{key}");
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(DMapError::AlreadyLocked)))
        );
    }
}

#[tokio::test]
async fn test_malformed_timeouts() {
    let cluster = TestCluster::new(3);
    let caller = cluster.non_owner_index("users", "alice");
    let users = cluster.nodes[caller].dmap("users");
    assert!(matches!(
        users.lock_with_timeout("alice", "two seconds").await,
        Err(DMapError::Internal(_))
    ));
    assert!(matches!(
        users
            .put_with_timeout("alice", &1i64, Some("5 minutes".into()))
            .await,
        Err(DMapError::Internal(_))
    ));
    assert!(matches!(
        users.get::<i64>("alice").await,
        Err(DMapError::KeyNotFound)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_forwarded_ttl_expires() {
    let cluster = TestCluster::new(3);
    let caller = cluster.non_owner_index("sessions", "s1");
    let sessions = cluster.nodes[caller].dmap("sessions");
    sessions
        .put_ex("s1", &"token".to_string(), Duration::from_secs(1))
        .await
        .unwrap();
    sessions
        .put_with_timeout("s2", &"token".to_string(), Some("0".into()))
        .await
        .unwrap();
    assert_eq!(sessions.get::<String>("s1").await.unwrap(), "token");
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(matches!(
        sessions.get::<String>("s1").await,
        Err(DMapError::KeyNotFound)
    ));
    assert_eq!(sessions.get::<String>("s2").await.unwrap(), "token");
}

#[tokio::test]
async fn test_unregistered_values_are_rejected() {
    #[derive(serde::Serialize)]
    struct Unknown(u8);

    let cluster = TestCluster::new(3);
    let users = cluster.nodes[0].dmap("users");
    assert!(matches!(
        users.put("x", &Unknown(1)).await,
        Err(DMapError::Codec(_))
    ));

    let caller = cluster.non_owner_index("users", "raw");
    let out = cluster.nodes[caller]
        .execute(
            "users",
            "raw",
            Operation::Put {
                value: Bytes::from_static(b"not an envelope"),
                timeout: None,
            },
            None,
        )
        .await;
    assert!(matches!(out, Err(DMapError::Codec(_))));
}

#[tokio::test]
async fn test_stale_owner_forwards_again() {
    let cluster = TestCluster::new(3);
    let hk = derive("users", "carol");
    let partition = cluster.tables[0].partition_of(hk);
    let owner = cluster.owner_index("users", "carol");
    let stale = (owner + 1) % 3;
    let caller = (owner + 2) % 3;

    // the caller still believes `stale` owns the key, everyone else knows
    // the real owner
    cluster.tables[caller].set_owner(partition, cluster.nodes[stale].this().clone());

    cluster.nodes[caller]
        .dmap("users")
        .put("carol", &7i64)
        .await
        .unwrap();
    assert_eq!(cluster.nodes[owner].partitions().len("users"), 1);
    assert_eq!(cluster.nodes[stale].partitions().len("users"), 0);
    assert_eq!(
        cluster.nodes[caller].dmap("users").get::<i64>("carol").await.unwrap(),
        7
    );
}

#[traced_test]
#[tokio::test]
async fn test_forwarding_loop_is_bounded() {
    let cluster = TestCluster::new(2);
    let hk = derive("users", "dave");
    let partition = cluster.tables[0].partition_of(hk);
    let a = cluster.nodes[0].this().clone();
    let b = cluster.nodes[1].this().clone();
    cluster.tables[0].set_owner(partition, b);
    cluster.tables[1].set_owner(partition, a);

    let out = cluster.nodes[0].dmap("users").put("dave", &1i64).await;
    assert!(matches!(
        out,
        Err(DMapError::Forwarding {
            source: ForwardError::HopLimit(3),
            ..
        })
    ));
}

#[tokio::test]
async fn test_unreachable_owner() {
    let cluster = TestCluster::new(3);
    let owner = cluster.owner_index("users", "erin");
    let caller = cluster.non_owner_index("users", "erin");
    let owner_member = cluster.nodes[owner].this().clone();
    cluster.forwarder.unregister(&owner_member);

    let out = cluster.nodes[caller].dmap("users").put("erin", &1i64).await;
    match out {
        Err(DMapError::Forwarding {
            owner,
            source: ForwardError::Transport(_),
        }) => assert_eq!(owner, owner_member),
        other => panic!("expected forwarding error, got {other:?}"),
    }

    let out = cluster.nodes[caller].dmap("users").destroy().await;
    assert!(matches!(out, Err(DMapError::Forwarding { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_forward_deadline() {
    let cluster = TestCluster::new(3);
    let owner = cluster.owner_index("users", "frank");
    let caller = cluster.non_owner_index("users", "frank");
    cluster
        .forwarder
        .set_delay(cluster.nodes[owner].this(), Duration::from_secs(60));

    let users = cluster.nodes[caller]
        .dmap("users")
        .with_deadline(Duration::from_millis(100));
    let out = users.put("frank", &1i64).await;
    assert!(matches!(
        out,
        Err(DMapError::Forwarding {
            source: ForwardError::Timeout(d),
            ..
        }) if d == Duration::from_millis(100)
    ));

    // default deadline from the node config
    let out = cluster.nodes[caller].dmap("users").get::<i64>("frank").await;
    assert!(matches!(
        out,
        Err(DMapError::Forwarding {
            source: ForwardError::Timeout(_),
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reclaimer_sweeps_expired_entries() {
    let cluster = TestCluster::new(1);
    let node = cluster.nodes[0].clone();
    node.clone().start_reclaimer(Duration::from_millis(500));
    let cache = node.dmap("cache");
    for i in 0..10 {
        cache
            .put_ex(&format!("k{i}"), &(i as i64), Duration::from_secs(1))
            .await
            .unwrap();
    }
    cache.lock_with_timeout("k0", "1s").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    let now = tokio::time::Instant::now();
    assert_eq!(node.partitions().reclaim(now), 0);
    assert_eq!(node.leases().reclaim(now), 0);
    node.close();
}

#[tokio::test]
async fn test_zero_reclaim_interval_disables_reclaimer() {
    let cluster = TestCluster::new(1);
    let node = cluster.nodes[0].clone();
    assert!(node.clone().start_reclaimer(Duration::ZERO).is_none());
    let task = node.clone().start_reclaimer(Duration::from_millis(100)).unwrap();
    node.close();
    task.await.unwrap();
}

#[tokio::test]
async fn test_hash_version_mismatch_is_rejected() {
    let cluster = TestCluster::new(2);
    let owner = cluster.owner_index("users", "grace");
    let req = KeyRequest {
        map_name: "users".into(),
        hkey: derive("users", "grace"),
        hash_version: HASH_VERSION + 1,
        op: Operation::Get,
        hops: 1,
    };
    let out = cluster.nodes[owner].handle(Request::Key(req)).await;
    match out {
        Err(DMapError::HashVersionMismatch { expected, found }) => {
            assert_eq!(expected, HASH_VERSION);
            assert_eq!(found, HASH_VERSION + 1);
        }
        other => panic!("expected hash version mismatch, got {other:?}"),
    }
}
