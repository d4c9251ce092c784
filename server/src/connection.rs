//! Per-connection state machine (spec.md §4.7): `Listening → Identifying
//! → Ready → Streaming ↔ Ready → Disconnected`. Grounded on the
//! teacher's `EventManager` (one state object driving a wire protocol
//! loop) but tracks an explicit enum instead of implicit control flow,
//! since this protocol's states are part of the contract (§4.7) rather
//! than an implementation detail.

use crate::identify::{compute_mac, verify_mac};
use crate::message::{Animation, Bounds, LightEntry, Variant};
use std::collections::HashMap;
use utils::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Listening,
    Identifying,
    Ready,
    Streaming,
    Disconnected,
}

/// A resize request received mid-stream, deferred until the current
/// frame's `Last` tile ships (spec.md §4.7 point 6).
#[derive(Debug, Clone, Copy)]
pub struct PendingResize {
    pub view_num: u32,
    pub width: u32,
    pub height: u32,
}

/// One client connection's protocol state. `server::pipeline` drives a
/// `Connection` through frames; this type only tracks the state machine
/// and the session-level bookkeeping the wire messages describe.
pub struct Connection {
    state: ConnectionState,
    session_key: Vec<u8>,
    role_tag: Vec<u8>,
    lights_update_count: u64,
    variants: HashMap<String, bool>,
    bounds: Option<Bounds>,
    animation: Option<Animation>,
    pending_resizes: Vec<PendingResize>,
}

impl Connection {
    pub fn new(session_key: Vec<u8>) -> Self {
        Connection {
            state: ConnectionState::Listening,
            session_key,
            role_tag: Vec::new(),
            lights_update_count: 0,
            variants: HashMap::new(),
            bounds: None,
            animation: None,
            pending_resizes: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `Listening` -> `Identifying`: the peer has announced a role tag.
    pub fn begin_identify(&mut self, role_tag: Vec<u8>) -> CoreResult<()> {
        if self.state != ConnectionState::Listening {
            return Err(CoreError::ConsistencyError("begin_identify called outside Listening".to_string()));
        }
        self.role_tag = role_tag;
        self.state = ConnectionState::Identifying;
        Ok(())
    }

    /// The MAC this side expects the peer to present (or to check
    /// against what the peer sent).
    pub fn local_mac(&self) -> Vec<u8> {
        compute_mac(&self.session_key, &self.role_tag)
    }

    /// Verifies a peer-supplied MAC. On success, moves to `Ready` (the
    /// caller should then send a variant sync, per §4.7). On failure,
    /// resets the connection back to `Listening`.
    pub fn verify(&mut self, supplied_mac: &[u8]) -> CoreResult<()> {
        if self.state != ConnectionState::Identifying {
            return Err(CoreError::ConsistencyError("verify called outside Identifying".to_string()));
        }
        match verify_mac(&self.session_key, &self.role_tag, supplied_mac) {
            Ok(()) => {
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Err(e) => {
                log::error!("connection failed MAC verification, resetting to Listening");
                self.state = ConnectionState::Listening;
                Err(e)
            }
        }
    }

    /// `Ready` -> `Streaming`: a frame's `Matrices` batch committed
    /// (`last = true` on the final view) and tile dispatch begins.
    pub fn begin_streaming(&mut self) -> CoreResult<()> {
        if self.state != ConnectionState::Ready {
            return Err(CoreError::ConsistencyError("begin_streaming called outside Ready".to_string()));
        }
        self.state = ConnectionState::Streaming;
        Ok(())
    }

    /// `Streaming` -> `Ready`: every view's `Last` tile has shipped.
    /// Returns the resizes that were deferred during this frame so the
    /// caller can apply them before the next one (§4.7 point 6).
    pub fn end_streaming(&mut self) -> Vec<PendingResize> {
        self.state = ConnectionState::Ready;
        self.pending_resizes.drain(..).collect()
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Queues a resize while streaming; returns `false` (meaning: apply
    /// immediately) when not mid-frame.
    pub fn defer_resize(&mut self, resize: PendingResize) -> bool {
        if self.state == ConnectionState::Streaming {
            self.pending_resizes.push(resize);
            true
        } else {
            false
        }
    }

    /// `Lights` is equality-tested to detect real changes (§4.7);
    /// returns whether `lights_update_count` was bumped.
    pub fn apply_lights(&mut self, previous: &[LightEntry], incoming: &[LightEntry]) -> bool {
        if previous != incoming {
            self.lights_update_count += 1;
            true
        } else {
            false
        }
    }

    pub fn lights_update_count(&self) -> u64 {
        self.lights_update_count
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = Some(bounds);
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn set_animation(&mut self, animation: Animation) {
        self.animation = Some(animation);
    }

    pub fn animation(&self) -> Option<Animation> {
        self.animation
    }

    /// Applies a `Variant` message (§4.7): manages named visibility.
    pub fn apply_variant(&mut self, v: &Variant) {
        if v.remove {
            self.variants.remove(&v.name);
        } else if v.configure_visibility {
            self.variants.insert(v.name.clone(), v.visible);
        }
    }

    /// Variants to relay to a client that just reached `Ready` (§4.7:
    /// "server relays local variants to client on connect").
    pub fn variant_sync(&self) -> Vec<Variant> {
        self.variants
            .iter()
            .map(|(name, visible)| Variant { name: name.clone(), configure_visibility: true, visible: *visible, remove: false })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_listening_to_streaming_and_back() {
        let mut conn = Connection::new(b"key".to_vec());
        assert_eq!(conn.state(), ConnectionState::Listening);
        conn.begin_identify(b"render-client".to_vec()).unwrap();
        assert_eq!(conn.state(), ConnectionState::Identifying);
        let mac = conn.local_mac();
        conn.verify(&mac).unwrap();
        assert_eq!(conn.state(), ConnectionState::Ready);
        conn.begin_streaming().unwrap();
        assert_eq!(conn.state(), ConnectionState::Streaming);
        let resizes = conn.end_streaming();
        assert!(resizes.is_empty());
        assert_eq!(conn.state(), ConnectionState::Ready);
    }

    #[test]
    fn failed_verification_resets_to_listening() {
        let mut conn = Connection::new(b"key".to_vec());
        conn.begin_identify(b"render-client".to_vec()).unwrap();
        let err = conn.verify(b"not-the-mac").unwrap_err();
        assert!(matches!(err, CoreError::MacVerificationFailed));
        assert_eq!(conn.state(), ConnectionState::Listening);
    }

    #[test]
    fn resize_is_deferred_only_while_streaming() {
        let mut conn = Connection::new(b"key".to_vec());
        conn.begin_identify(b"c".to_vec()).unwrap();
        let mac = conn.local_mac();
        conn.verify(&mac).unwrap();
        assert!(!conn.defer_resize(PendingResize { view_num: 0, width: 10, height: 10 }));
        conn.begin_streaming().unwrap();
        assert!(conn.defer_resize(PendingResize { view_num: 0, width: 20, height: 20 }));
        let resizes = conn.end_streaming();
        assert_eq!(resizes.len(), 1);
        assert_eq!(resizes[0].width, 20);
    }

    #[test]
    fn variant_sync_relays_configured_variants_and_honors_removal() {
        let mut conn = Connection::new(b"key".to_vec());
        conn.apply_variant(&Variant { name: "wireframe".to_string(), configure_visibility: true, visible: true, remove: false });
        conn.apply_variant(&Variant { name: "axes".to_string(), configure_visibility: true, visible: false, remove: false });
        assert_eq!(conn.variant_sync().len(), 2);
        conn.apply_variant(&Variant { name: "axes".to_string(), configure_visibility: false, visible: false, remove: true });
        assert_eq!(conn.variant_sync().len(), 1);
    }
}
