#[cfg(test)]
mod tests {
    use crate::callbacks::{CallbackRegistry, RunContext};
    use crate::fleet::Fleet;
    use crate::infrastructure::PeerStore;
    use crate::types::{AcquireRequest, Grant, LockName, LockStatus, NodeId, Request, WorkloadStatus};
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type RunLog = Arc<Mutex<Vec<NodeId>>>;

    fn logging(log: &RunLog) -> CallbackRegistry {
        let log = log.clone();
        CallbackRegistry::new(move |ctx: &RunContext| {
            log.lock().unwrap().push(ctx.node.clone());
            Ok(())
        })
    }

    fn fleet(nodes: &[&str], log: &RunLog) -> Fleet {
        let mut fleet = Fleet::new("restart");
        for node in nodes {
            fleet.join(NodeId::from(*node), logging(log)).unwrap();
        }
        fleet
    }

    #[test]
    fn test_fleet_rolls_peer_then_leader() {
        let log = RunLog::default();
        let mut fleet = fleet(&["rolling-ops/0", "rolling-ops/1"], &log);
        let unit0 = NodeId::from("rolling-ops/0");
        let unit1 = NodeId::from("rolling-ops/1");
        let name = LockName::from("restart");
        fleet.set_leader(&unit0).unwrap();

        fleet.request(&unit0, &AcquireRequest::new("restart")).unwrap();
        fleet.request(&unit1, &AcquireRequest::new("restart")).unwrap();

        // Leader sees both requests first and picks the peer.
        fleet.deliver(&unit0).unwrap();
        let store = fleet.store();
        assert_eq!(store.read_grant(&name, &unit1).unwrap(), Grant::Granted);
        assert_eq!(store.read_request(&name, &unit0).unwrap(), Some(Request::Acquire));
        assert_eq!(
            store.app_status(),
            WorkloadStatus::Maintenance("Beginning rolling restart".to_string())
        );
        assert_eq!(
            store.unit_status(&unit0),
            WorkloadStatus::Waiting("Awaiting restart operation".to_string())
        );

        fleet.run_until_quiescent(100).unwrap();

        let store = fleet.store();
        assert!(fleet.is_quiescent());
        assert_eq!(*log.lock().unwrap(), vec![unit1.clone(), unit0.clone()]);
        assert_eq!(store.read_request(&name, &unit0).unwrap(), Some(Request::Release));
        assert_eq!(store.read_request(&name, &unit1).unwrap(), Some(Request::Release));
        assert_eq!(store.read_grant(&name, &unit0).unwrap(), Grant::Idle);
        assert_eq!(store.read_grant(&name, &unit1).unwrap(), Grant::Idle);
        assert_eq!(store.app_status(), WorkloadStatus::Active);
        assert_eq!(store.unit_status(&unit0), WorkloadStatus::Active);
        assert_eq!(store.unit_status(&unit1), WorkloadStatus::Active);
    }

    #[test]
    fn test_fleet_without_requests_stays_idle() {
        let log = RunLog::default();
        let mut fleet = fleet(&["unit/0", "unit/1", "unit/2"], &log);
        fleet.set_leader(&NodeId::from("unit/0")).unwrap();
        let writes = fleet.store().write_count();

        fleet.run_until_quiescent(100).unwrap();

        assert!(fleet.is_quiescent());
        assert!(fleet.runs().is_empty());
        assert_eq!(fleet.store().write_count(), writes);
    }

    #[test]
    fn test_fleet_without_leader_never_grants() {
        let log = RunLog::default();
        let mut fleet = fleet(&["unit/0", "unit/1"], &log);
        fleet
            .request(&NodeId::from("unit/1"), &AcquireRequest::new("restart"))
            .unwrap();

        fleet.run_until_quiescent(100).unwrap();
        assert!(log.lock().unwrap().is_empty());

        fleet.set_leader(&NodeId::from("unit/0")).unwrap();
        fleet.run_until_quiescent(100).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![NodeId::from("unit/1")]);
    }

    #[test]
    fn test_unknown_leader_is_rejected() {
        let log = RunLog::default();
        let fleet = fleet(&["unit/0"], &log);
        assert!(fleet.set_leader(&NodeId::from("unit/7")).is_err());
        assert_eq!(fleet.leader(), None);
    }

    #[test]
    fn test_instances_sharing_a_store_do_not_interact() {
        let log = RunLog::default();
        let mut restart = fleet(&["unit/0", "unit/1"], &log);
        let upgrade_log = RunLog::default();
        let mut upgrade = Fleet::with_store("upgrade", restart.store().clone());
        for node in ["unit/0", "unit/1"] {
            upgrade.join(NodeId::from(node), logging(&upgrade_log)).unwrap();
        }
        restart.set_leader(&NodeId::from("unit/0")).unwrap();

        upgrade
            .request(&NodeId::from("unit/1"), &AcquireRequest::new("upgrade"))
            .unwrap();
        // A request addressed to the other instance is not ours to handle.
        assert!(!restart
            .request(&NodeId::from("unit/1"), &AcquireRequest::new("upgrade"))
            .unwrap());

        // Both fleets share per-node inboxes; drive both until nothing is left.
        loop {
            let a = restart.step().unwrap();
            let b = upgrade.step().unwrap();
            if !a && !b {
                break;
            }
        }

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(*upgrade_log.lock().unwrap(), vec![NodeId::from("unit/1")]);
        let statuses = restart.statuses().unwrap();
        assert!(statuses.iter().all(|(_, status)| *status == LockStatus::Idle));
    }

    #[derive(Debug, Clone)]
    struct Plan {
        nodes: usize,
        leader: usize,
        requesters: Vec<bool>,
        schedule: Vec<usize>,
        /// (step, new leader)
        handover: Option<(usize, usize)>,
    }

    fn plan_strategy() -> impl Strategy<Value = Plan> {
        (1usize..6).prop_flat_map(|nodes| {
            (
                Just(nodes),
                0..nodes,
                prop::collection::vec(any::<bool>(), nodes),
                prop::collection::vec(0usize..16, 0..120),
                prop::option::of((0usize..60, 0..nodes)),
            )
                .prop_map(|(nodes, leader, requesters, schedule, handover)| Plan {
                    nodes,
                    leader,
                    requesters,
                    schedule,
                    handover,
                })
        })
    }

    proptest! {
        #[test]
        fn fleet_serializes_every_request_exactly_once(plan in plan_strategy()) {
            let log = RunLog::default();
            let ids: Vec<NodeId> = (0..plan.nodes).map(|i| NodeId::new(format!("unit/{}", i))).collect();
            let mut fleet = Fleet::new("restart");
            for id in &ids {
                fleet.join(id.clone(), logging(&log)).unwrap();
            }
            fleet.set_leader(&ids[plan.leader]).unwrap();
            for (id, requests) in ids.iter().zip(&plan.requesters) {
                if *requests {
                    fleet.request(id, &AcquireRequest::new("restart")).unwrap();
                }
            }

            // Arbitrary delivery order, checking mutual exclusion after every step.
            for (step, pick) in plan.schedule.iter().enumerate() {
                if let Some((at, leader)) = plan.handover {
                    if at == step {
                        fleet.set_leader(&ids[leader]).unwrap();
                    }
                }
                let ready: Vec<NodeId> = ids
                    .iter()
                    .filter(|id| fleet.pending(id) > 0)
                    .cloned()
                    .collect();
                if ready.is_empty() {
                    break;
                }
                fleet.deliver(&ready[pick % ready.len()]).unwrap();
                prop_assert!(fleet.holders().unwrap().len() <= 1);
            }

            fleet.run_until_quiescent(10_000).unwrap();
            prop_assert!(fleet.is_quiescent());

            let mut runs: HashMap<NodeId, usize> = HashMap::new();
            for node in log.lock().unwrap().iter() {
                *runs.entry(node.clone()).or_default() += 1;
            }
            for (id, requested) in ids.iter().zip(&plan.requesters) {
                let expected = usize::from(*requested);
                prop_assert_eq!(runs.get(id).copied().unwrap_or(0), expected, "node {}", id);
            }
            for (_, status) in fleet.statuses().unwrap() {
                prop_assert_eq!(status, LockStatus::Idle);
            }
            prop_assert_eq!(fleet.runs().len(), log.lock().unwrap().len());
        }
    }
}
