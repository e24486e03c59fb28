//! Admission of inbound sessions, decided from the connection headers alone.

use crate::failure_codes::{
    PeerUpdateError, INCOMPATIBLE_NETWORK, INCOMPATIBLE_NONCE, INCOMPATIBLE_VERSION,
    INVALID_HEADERS,
};
use crate::peer::{is_version_compatible, PeerObject, SystemHeaders};

use std::net::IpAddr;

/// Validates the headers of a remote node against our own. On success the peer object
/// of the remote side is returned, otherwise the first failure.
pub fn admit(
    system: &SystemHeaders,
    remote_ip: IpAddr,
    headers: &SystemHeaders,
) -> Result<PeerObject, PeerUpdateError> {
    if let Err(violation) = headers.validate() {
        return Err(PeerUpdateError::with_description(INVALID_HEADERS, violation));
    }
    if headers.nonce == system.nonce {
        return Err(PeerUpdateError::with_description(
            INCOMPATIBLE_NONCE,
            format!("Expected nonce to be not equal to: {}", system.nonce),
        ));
    }
    if headers.nethash != system.nethash {
        return Err(PeerUpdateError::with_description(
            INCOMPATIBLE_NETWORK,
            format!("Expected nethash: {} but received: {}", system.nethash, headers.nethash),
        ));
    }
    if !is_version_compatible(&headers.version, &system.min_version) {
        return Err(PeerUpdateError::with_description(
            INCOMPATIBLE_VERSION,
            format!("Expected version: {} but received: {}", system.min_version, headers.version),
        ));
    }
    Ok(PeerObject::from_headers(remote_ip, headers))
}
