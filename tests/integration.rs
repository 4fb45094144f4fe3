//! In-process integration tests exercising whole flows across modules:
//! a two-node election converging on one leader, a full local match, and
//! a simulated Shadow promotion. None of these touch the network -- peer
//! interactions are driven directly against each node's handler methods
//! rather than through real HTTP calls.

use std::sync::Arc;

use cardcluster::{
    LeaderAnnouncement, Match, MatchOutcome, MatchPhase, MatchPlayerSlot, MatchRole,
    PeerRegistry, VoteRequest,
};

const SECRET: &str = "integration-test-secret";

#[test]
fn two_node_election_converges_on_one_leader() {
    // Node "a" starts a term-1 election and asks node "b" for a vote by
    // calling straight into its handler, simulating the RPC without a
    // socket. Node "b" grants it (higher term than its own 0), so "a"
    // can declare itself leader and broadcast, which "b" accepts.
    let peers_a = Arc::new(PeerRegistry::new("a".into(), &["b".into()]));
    let peers_b = Arc::new(PeerRegistry::new("b".into(), &["a".into()]));

    let client_a = cardcluster::PeerClient::new(SECRET.into()).with_self_id("a".into());
    let client_b = cardcluster::PeerClient::new(SECRET.into()).with_self_id("b".into());

    let elector_a = cardcluster::LeaderElector::new("a".into(), peers_a.clone(), client_a);
    let elector_b = cardcluster::LeaderElector::new("b".into(), peers_b.clone(), client_b);

    assert_eq!(elector_a.term(), 0);
    assert_eq!(elector_b.term(), 0);

    let vote_req = VoteRequest {
        candidato: "a".into(),
        termo: 1,
    };
    let resp = elector_b.handle_vote_request(&vote_req);
    assert!(resp.voto_concedido);
    assert_eq!(elector_b.term(), 1);

    let ann = LeaderAnnouncement {
        novo_lider: "a".into(),
        termo: 1,
    };
    elector_b.handle_leader_announcement(&ann);
    assert_eq!(elector_b.known_leader().as_deref(), Some("a"));
    assert_eq!(elector_b.term(), 1);
    assert!(!elector_b.is_leader());
}

#[test]
fn full_local_match_reaches_a_winner() {
    use cardcluster::{Card, Rarity, Suit};

    let mut p1 = MatchPlayerSlot::new("p1".into(), "Ann".into(), true);
    let mut p2 = MatchPlayerSlot::new("p2".into(), "Bob".into(), true);
    p1.inventory.push(Card {
        id: "c1".into(),
        name: "Sentinel".into(),
        suit: Suit::Clubs,
        power: 40,
        rarity: Rarity::Common,
    });
    p2.inventory.push(Card {
        id: "c2".into(),
        name: "Wisp".into(),
        suit: Suit::Spades,
        power: 10,
        rarity: Rarity::Common,
    });

    let mut m = Match::new("m-it".into(), MatchRole::Host, "a".into(), "a".into(), p1, p2);
    m.apply_ready(SECRET, "p1", 1).unwrap();
    m.apply_ready(SECRET, "p2", 1).unwrap();
    assert_eq!(m.phase, MatchPhase::Playing);

    m.apply_card_played(SECRET, "p1", "c1").unwrap();
    let update = m.apply_card_played(SECRET, "p2", "c2").unwrap();

    assert_eq!(m.phase, MatchPhase::Finished);
    assert_eq!(update.match_finished, Some(MatchOutcome::Winner("p1".into())));
    assert_eq!(m.event_log.len(), 5); // 2 ready + 2 card_played + 1 match_end
}

#[test]
fn shadow_promotes_to_host_and_continues_applying_locally() {
    use cardcluster::{Card, Rarity, Suit};

    let mut host_p1 = MatchPlayerSlot::new("p1".into(), "Ann".into(), true);
    let host_p2 = MatchPlayerSlot::new("p2".into(), "Bob".into(), false);
    host_p1.inventory.push(Card {
        id: "c1".into(),
        name: "Sentinel".into(),
        suit: Suit::Clubs,
        power: 40,
        rarity: Rarity::Common,
    });
    let mut host = Match::new(
        "m-promote".into(),
        MatchRole::Host,
        "host-addr".into(),
        "shadow-addr".into(),
        host_p1,
        host_p2,
    );
    host.apply_ready(SECRET, "p1", 1).unwrap();
    host.apply_ready(SECRET, "p2", 1).unwrap();

    let shadow_p1 = MatchPlayerSlot::new("p1".into(), "Ann".into(), false);
    let mut shadow_p2 = MatchPlayerSlot::new("p2".into(), "Bob".into(), true);
    shadow_p2.inventory.push(Card {
        id: "c2".into(),
        name: "Wisp".into(),
        suit: Suit::Spades,
        power: 10,
        rarity: Rarity::Common,
    });
    let mut shadow = Match::new(
        "m-promote".into(),
        MatchRole::Shadow,
        "host-addr".into(),
        "shadow-addr".into(),
        shadow_p1,
        shadow_p2,
    );

    // Host plays its card and replicates a snapshot to the shadow.
    let update = host.apply_card_played(SECRET, "p1", "c1").unwrap();
    shadow.apply_snapshot(SECRET, update.snapshot).unwrap();
    assert_eq!(shadow.phase, MatchPhase::Playing);
    assert_eq!(shadow.turn_owner, "p2");

    // The host is now unreachable; the shadow is promoted and continues
    // the match using its own locally-held inventory for "p2".
    shadow.promote_to_host("shadow-addr".into());
    assert_eq!(shadow.role, MatchRole::Host);

    let finish = shadow.apply_card_played(SECRET, "p2", "c2").unwrap();
    assert_eq!(shadow.phase, MatchPhase::Finished);
    assert_eq!(finish.match_finished, Some(MatchOutcome::Winner("p1".into())));
}
