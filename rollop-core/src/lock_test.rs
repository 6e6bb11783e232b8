#[cfg(test)]
mod tests {
    use crate::error::LockError;
    use crate::infrastructure::PeerStore;
    use crate::infrastructure_in_memory::InMemoryPeerStore;
    use crate::lock::{Arbiter, Lock, Requester};
    use crate::types::{Grant, LockName, LockStatus, NodeId, Request};
    use proptest::prelude::*;

    fn setup() -> (InMemoryPeerStore, LockName, NodeId, NodeId) {
        let store = InMemoryPeerStore::new();
        let name = LockName::from("restart");
        let leader = NodeId::from("unit/0");
        let peer = NodeId::from("unit/1");
        store.create_relation(&name);
        store.join(&name, &leader).unwrap();
        store.join(&name, &peer).unwrap();
        store.set_leader(Some(leader.clone()));
        (store, name, leader, peer)
    }

    fn request_strategy() -> impl Strategy<Value = Option<Request>> {
        prop_oneof![
            Just(None),
            Just(Some(Request::Acquire)),
            Just(Some(Request::Release)),
        ]
    }

    fn grant_strategy() -> impl Strategy<Value = Grant> {
        prop_oneof![Just(Grant::Idle), Just(Grant::Granted)]
    }

    #[test]
    fn test_status_derivation_table() {
        use LockStatus::*;
        let cases = [
            (Grant::Granted, Some(Request::Release), Release),
            (Grant::Granted, Some(Request::Acquire), Granted),
            (Grant::Granted, None, Granted),
            (Grant::Idle, Some(Request::Acquire), Acquire),
            (Grant::Idle, Some(Request::Release), Idle),
            (Grant::Idle, None, Idle),
        ];
        for (grant, request, expected) in cases {
            assert_eq!(
                LockStatus::derive(request, grant),
                expected,
                "grant={:?} request={:?}",
                grant,
                request
            );
        }
    }

    proptest! {
        #[test]
        fn status_reads_are_pure(request in request_strategy(), grant in grant_strategy()) {
            let (store, name, _, peer) = setup();
            if let Some(request) = request {
                store.write_request(&name, &peer, request).unwrap();
            }
            store.write_grant(&name, &peer, grant).unwrap();
            let writes = store.write_count();

            let lock = Lock::open(&store, &name, &peer).unwrap();
            let first = lock.status().unwrap();
            for _ in 0..5 {
                prop_assert_eq!(lock.status().unwrap(), first);
            }
            prop_assert_eq!(first, LockStatus::derive(request, grant));
            prop_assert_eq!(store.write_count(), writes);
        }
    }

    #[test]
    fn test_open_without_relation_is_not_ready() {
        let store = InMemoryPeerStore::new();
        let name = LockName::from("restart");
        let node = NodeId::from("unit/0");

        let err = Lock::open(&store, &name, &node).unwrap_err();
        assert_eq!(err, LockError::NotReady(name.clone()));
        assert!(err.is_retryable());
        assert!(matches!(
            Requester::open(&store, &name, &node),
            Err(LockError::NotReady(_))
        ));
    }

    #[test]
    fn test_acquire_sets_pending() {
        let (store, name, _, peer) = setup();
        let requester = Requester::open(&store, &name, &peer).unwrap();

        requester.acquire().unwrap();

        assert_eq!(store.read_request(&name, &peer).unwrap(), Some(Request::Acquire));
        assert_eq!(store.read_grant(&name, &peer).unwrap(), Grant::Idle);
        assert_eq!(requester.status().unwrap(), LockStatus::Acquire);
        assert!(requester.is_pending().unwrap());
        assert!(!requester.is_held().unwrap());
    }

    #[test]
    fn test_repeated_acquire_is_a_no_op() {
        let (store, name, _, peer) = setup();
        let requester = Requester::open(&store, &name, &peer).unwrap();
        requester.acquire().unwrap();
        let writes = store.write_count();

        requester.acquire().unwrap();

        assert_eq!(store.write_count(), writes);
        assert_eq!(requester.status().unwrap(), LockStatus::Acquire);
    }

    #[test]
    fn test_acquire_with_override_is_stored_and_cleared() {
        let (store, name, _, peer) = setup();
        let requester = Requester::open(&store, &name, &peer).unwrap();

        requester.acquire_with(Some("custom-restart")).unwrap();
        assert_eq!(
            requester.callback_override().unwrap(),
            Some("custom-restart".to_string())
        );

        requester.acquire().unwrap();
        assert_eq!(requester.callback_override().unwrap(), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (store, name, leader, peer) = setup();
        let requester = Requester::open(&store, &name, &peer).unwrap();
        let arbiter = Arbiter::claim(&store, &store.leadership(&leader), &name, &leader).unwrap();
        requester.acquire().unwrap();
        arbiter.grant(&requester).unwrap();
        assert!(requester.is_held().unwrap());

        requester.release().unwrap();
        assert_eq!(requester.status().unwrap(), LockStatus::Release);
        let writes = store.write_count();

        requester.release().unwrap();
        assert_eq!(requester.status().unwrap(), LockStatus::Release);
        assert!(requester.release_requested().unwrap());
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn test_release_leaves_the_held_set() {
        let (store, name, leader, peer) = setup();
        let requester = Requester::open(&store, &name, &peer).unwrap();
        let arbiter = Arbiter::claim(&store, &store.leadership(&leader), &name, &leader).unwrap();
        requester.acquire().unwrap();
        arbiter.grant(&requester).unwrap();

        requester.release().unwrap();

        assert!(!requester.is_held().unwrap());
        arbiter.clear(&requester).unwrap();
        assert_eq!(requester.status().unwrap(), LockStatus::Idle);
        assert_eq!(store.read_request(&name, &peer).unwrap(), Some(Request::Release));
    }

    #[test]
    fn test_only_the_leader_can_claim_the_arbiter() {
        let (store, name, _, peer) = setup();

        let err = Arbiter::claim(&store, &store.leadership(&peer), &name, &peer).unwrap_err();
        assert_eq!(
            err,
            LockError::NotLeader {
                name: name.clone(),
                node: peer.clone(),
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_grant_and_clear_only_touch_the_grant_field() {
        let (store, name, leader, peer) = setup();
        let arbiter = Arbiter::claim(&store, &store.leadership(&leader), &name, &leader).unwrap();
        let lock = Lock::open(&store, &name, &peer).unwrap();

        arbiter.grant(&lock).unwrap();
        assert_eq!(store.read_grant(&name, &peer).unwrap(), Grant::Granted);
        assert_eq!(store.read_request(&name, &peer).unwrap(), None);
        assert_eq!(lock.status().unwrap(), LockStatus::Granted);

        arbiter.clear(&lock).unwrap();
        assert_eq!(store.read_grant(&name, &peer).unwrap(), Grant::Idle);
        assert_eq!(lock.status().unwrap(), LockStatus::Idle);
    }
}
