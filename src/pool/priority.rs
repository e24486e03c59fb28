//! The coordination-free tie-break between two usable sockets to the same peer.
//!
//! Both ends evaluate `peer_has_priority` with the nonces swapped, so one side prefers its
//! inbound socket exactly when the other prefers its outbound one. Since one side's inbound
//! socket is the other side's outbound socket, both keep the same connection.

use crate::peer::Nonce;
use crate::socket::{Direction, Socket};

use ring::digest;

fn sha1_hex(input: &str) -> String {
    hex::encode(digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, input.as_bytes()))
}

/// `SHA1(peer + system) > SHA1(system + peer)`, comparing the hex digests.
pub fn peer_has_priority(peer_nonce: &Nonce, system_nonce: &Nonce) -> bool {
    let hash_a = sha1_hex(&format!("{}{}", peer_nonce, system_nonce));
    let hash_b = sha1_hex(&format!("{}{}", system_nonce, peer_nonce));
    hash_a > hash_b
}

/// An outbound socket is usable as soon as it exists, an inbound one only while open.
/// A closed socket is never usable.
pub fn is_usable(socket: &Socket) -> bool {
    !socket.is_closed() && (socket.is_outbound() || socket.is_open())
}

/// Ranking score: direction match, then open state, then the lower socket id.
pub fn score(direction: Direction, open: bool, lower_id: bool, prioritize_inbound: bool) -> u8 {
    let inbound_bit = prioritize_inbound as u8;
    let outbound_bit = inbound_bit ^ 1;
    let direction_bit = match direction {
        Direction::Inbound => inbound_bit,
        Direction::Outbound => outbound_bit,
    };
    (direction_bit << 2) | ((open as u8) << 1) | lower_id as u8
}

pub fn socket_score(socket: &Socket, other: &Socket, prioritize_inbound: bool) -> u8 {
    score(socket.direction(), socket.is_open(), socket.id() < other.id(), prioritize_inbound)
}

/// Ranks two sockets, returning `(kept, deprecated)`. On equal scores `a` is kept.
pub fn rank(a: Socket, b: Socket, prioritize_inbound: bool) -> (Socket, Socket) {
    if socket_score(&b, &a, prioritize_inbound) > socket_score(&a, &b, prioritize_inbound) {
        (b, a)
    } else {
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::socket::LifecycleState;
    use crate::transport::testing::mock_socket;

    #[test]
    fn test_priority_is_antisymmetric() {
        for _ in 0..100 {
            let a = Nonce::generate();
            let b = Nonce::generate();
            assert_ne!(peer_has_priority(&a, &b), peer_has_priority(&b, &a));
        }
    }

    #[test]
    fn test_priority_is_stable() {
        let a = Nonce::from("ABCDEFGHijklmn01");
        let b = Nonce::from("ZYXWVUTSrqponm99");
        assert_eq!(peer_has_priority(&a, &b), peer_has_priority(&a, &b));
        let expected = sha1_hex("ABCDEFGHijklmn01ZYXWVUTSrqponm99")
            > sha1_hex("ZYXWVUTSrqponm99ABCDEFGHijklmn01");
        assert_eq!(peer_has_priority(&a, &b), expected);
    }

    #[test]
    fn test_sha1() {
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_score_bits() {
        assert_eq!(score(Direction::Inbound, true, true, true), 0b111);
        assert_eq!(score(Direction::Outbound, true, true, true), 0b011);
        assert_eq!(score(Direction::Outbound, false, false, false), 0b100);
        assert_eq!(score(Direction::Inbound, false, true, false), 0b001);
    }

    #[actix_rt::test]
    async fn test_usable() {
        let (outbound, _) = mock_socket(Direction::Outbound, LifecycleState::Connecting);
        let (open, _) = mock_socket(Direction::Inbound, LifecycleState::Open);
        let (connecting, _) = mock_socket(Direction::Inbound, LifecycleState::Connecting);
        assert!(is_usable(&outbound));
        assert!(is_usable(&open));
        assert!(!is_usable(&connecting));
    }

    #[actix_rt::test]
    async fn test_closed_outbound_is_not_usable() {
        let (outbound, _) = mock_socket(Direction::Outbound, LifecycleState::Open);
        outbound.hang_up(1006, "lost");
        assert!(outbound.is_closed());
        assert!(!is_usable(&outbound));
    }

    #[actix_rt::test]
    async fn test_rank_follows_direction_first() {
        let (inbound, _) = mock_socket(Direction::Inbound, LifecycleState::Open);
        let (outbound, _) = mock_socket(Direction::Outbound, LifecycleState::Connecting);

        let (kept, deprecated) = rank(inbound.clone(), outbound.clone(), true);
        assert_eq!(kept.id(), inbound.id());
        assert_eq!(deprecated.id(), outbound.id());

        let (kept, deprecated) = rank(inbound.clone(), outbound.clone(), false);
        assert_eq!(kept.id(), outbound.id());
        assert_eq!(deprecated.id(), inbound.id());
    }

    #[actix_rt::test]
    async fn test_rank_same_direction() {
        let (older, _) = mock_socket(Direction::Outbound, LifecycleState::Connecting);
        let (newer, _) = mock_socket(Direction::Outbound, LifecycleState::Open);
        let (kept, _) = rank(older.clone(), newer.clone(), false);
        // open beats the lower id
        assert_eq!(kept.id(), newer.id());

        let (first, _) = mock_socket(Direction::Outbound, LifecycleState::Open);
        let (second, _) = mock_socket(Direction::Outbound, LifecycleState::Open);
        let (kept, _) = rank(second.clone(), first.clone(), false);
        assert_eq!(kept.id(), first.id());
    }
}
