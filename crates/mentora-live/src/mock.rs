//! Mock media and transport for testing

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{LiveError, LiveResult, LiveTransport, MediaGrant, MediaPermission, RoomHandoff};

/// Mock permission source for unit/integration testing
pub struct MockMedia {
    next_id: AtomicU64,
    held: Mutex<HashSet<u64>>,
    requests: AtomicU64,

    /// Configure the user to refuse access
    pub deny: AtomicBool,

    /// Configure the prompt to never answer
    pub hang: AtomicBool,
}

impl MockMedia {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            held: Mutex::new(HashSet::new()),
            requests: AtomicU64::new(0),
            deny: AtomicBool::new(false),
            hang: AtomicBool::new(false),
        }
    }

    /// Grants acquired and not yet released
    pub fn held_grants(&self) -> usize {
        self.held().len()
    }

    /// How many times access was asked for
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn held(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaPermission for MockMedia {
    async fn request(&self) -> LiveResult<MediaGrant> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.deny.load(Ordering::SeqCst) {
            return Err(LiveError::PermissionDenied("Mock user refused access".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.held().insert(id);
        Ok(MediaGrant::new(id))
    }

    async fn release(&self, grant: MediaGrant) -> LiveResult<()> {
        if self.held().remove(&grant.id()) {
            Ok(())
        } else {
            Err(LiveError::UnknownGrant(grant.id()))
        }
    }
}

/// Mock transport that records every hand-off
pub struct MockTransport {
    rooms: Mutex<Vec<RoomHandoff>>,

    /// Configure the transport to fail initialization
    pub fail_init: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(Vec::new()),
            fail_init: AtomicBool::new(false),
        }
    }

    /// Hand-offs received so far
    pub fn handoffs(&self) -> Vec<RoomHandoff> {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveTransport for MockTransport {
    async fn hand_off(&self, handoff: &RoomHandoff, _grant: &MediaGrant) -> LiveResult<()> {
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(LiveError::TransportInit("Mock transport failure".into()));
        }
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handoff.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentora_config::LiveRoomSettings;
    use mentora_util::SessionId;

    #[tokio::test]
    async fn mock_grant_and_release() {
        let media = MockMedia::new();

        let grant = media.request().await.unwrap();
        assert_eq!(media.held_grants(), 1);

        media.release(grant).await.unwrap();
        assert_eq!(media.held_grants(), 0);
        assert!(matches!(
            media.release(grant).await,
            Err(LiveError::UnknownGrant(_))
        ));
    }

    #[tokio::test]
    async fn mock_denial() {
        let media = MockMedia::new();
        media.deny.store(true, Ordering::SeqCst);

        assert!(matches!(
            media.request().await,
            Err(LiveError::PermissionDenied(_))
        ));
        assert_eq!(media.held_grants(), 0);
        assert_eq!(media.request_count(), 1);
    }

    #[tokio::test]
    async fn mock_transport_records_rooms() {
        let transport = MockTransport::new();
        let handoff =
            RoomHandoff::for_session(&LiveRoomSettings::default(), &SessionId::new(), "Guardian");

        transport
            .hand_off(&handoff, &MediaGrant::new(1))
            .await
            .unwrap();
        assert_eq!(transport.handoffs(), vec![handoff.clone()]);

        transport.fail_init.store(true, Ordering::SeqCst);
        assert!(transport.hand_off(&handoff, &MediaGrant::new(1)).await.is_err());
    }
}
