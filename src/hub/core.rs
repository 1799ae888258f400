//! Connection registry and broadcast fan-out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Hub                       │
//! │  Mutex<HubState>                             │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ connections: id → Connection           │  │
//! │  │ groups:      name → { id → Connection }│  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! One mutex guards both maps. Every registration, membership edit and
//! broadcast target lookup runs under it, and nothing under it blocks:
//! enqueueing is `try_send`. Connections are closed only after the lock is
//! released, since closing re-enters the hub to detach.
//!
//! Invariant: `c ∈ groups[g]` exactly when `g ∈ c.groups()`.

// ============================================================================
// Imports
// ============================================================================

use std::collections::hash_map::Entry;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identifiers::{ConnectionId, IdGenerator};
use crate::protocol::{Codec, SharedHandler};
use crate::transport::pump::{self, Pumps};
use crate::transport::Connection;

use super::builder::HubBuilder;
use super::options::ConnectionOptions;

// ============================================================================
// Types
// ============================================================================

/// Members of one group.
type Members = FxHashMap<ConnectionId, Arc<Connection>>;

/// Everything the hub lock protects.
#[derive(Default)]
struct HubState {
    /// Registered connections.
    connections: Members,
    /// Named groups.
    groups: FxHashMap<String, Members>,
}

// ============================================================================
// Hub
// ============================================================================

/// Registry of live connections and named groups.
///
/// Create one per application with [`Hub::new`] or [`Hub::builder`] and
/// share the returned `Arc<Hub>` with whatever needs to broadcast. All
/// operations are synchronous and never wait on I/O.
///
/// # Example
///
/// ```ignore
/// let hub = Hub::new();
/// let pumps = hub.connect(ws_stream, Some(handler), &["lobby"]);
/// hub.broadcast("welcome", "lobby");
/// pumps.join().await;
/// ```
pub struct Hub {
    /// Connection set and groups.
    state: Mutex<HubState>,
    /// Options for attached connections.
    options: ConnectionOptions,
    /// Custom id generator, UUID v4 when `None`.
    id_generator: Option<IdGenerator>,
}

// ============================================================================
// Hub - Constructor
// ============================================================================

impl Hub {
    /// Creates a hub with default options.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_parts(ConnectionOptions::default(), None)
    }

    /// Creates a builder for a configured hub.
    #[inline]
    #[must_use]
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    /// Assembles a hub from validated parts.
    pub(crate) fn with_parts(
        options: ConnectionOptions,
        id_generator: Option<IdGenerator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState::default()),
            options,
            id_generator,
        })
    }
}

// ============================================================================
// Hub - Attaching Connections
// ============================================================================

impl Hub {
    /// Attaches an upgraded WebSocket stream.
    ///
    /// Builds the connection, registers it, joins each of `groups`, and
    /// spawns its read and write workers. Must be called inside a tokio
    /// runtime.
    ///
    /// # Arguments
    ///
    /// * `ws_stream` - Already-upgraded WebSocket stream
    /// * `handler` - Optional handler for inbound payloads
    /// * `groups` - Groups to join right after registration
    pub fn connect<S, G>(
        self: &Arc<Self>,
        ws_stream: WebSocketStream<S>,
        handler: Option<SharedHandler>,
        groups: &[G],
    ) -> Pumps
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        G: AsRef<str>,
    {
        let (connection, outbound) = Connection::new(
            self.next_id(),
            self,
            handler,
            self.options.queue_capacity,
        );

        if !self.register(&connection) {
            connection.close();
        }
        for group in groups {
            self.add_to_group(group.as_ref(), &connection);
        }

        info!(
            conn_id = %connection.id(),
            groups = groups.len(),
            "Connection established"
        );

        pump::spawn(
            Arc::clone(self),
            connection,
            outbound,
            ws_stream,
            self.options,
        )
    }

    /// Attaches a stream and waits until the connection is torn down.
    ///
    /// Equivalent to [`connect`](Self::connect) followed by
    /// [`Pumps::join`]. Returns the id the connection had.
    pub async fn serve<S, G>(
        self: &Arc<Self>,
        ws_stream: WebSocketStream<S>,
        handler: Option<SharedHandler>,
        groups: &[G],
    ) -> ConnectionId
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        G: AsRef<str>,
    {
        let pumps = self.connect(ws_stream, handler, groups);
        let id = pumps.connection().id().clone();
        pumps.join().await;
        id
    }

    /// Produces the id for the next connection.
    pub(crate) fn next_id(&self) -> ConnectionId {
        match &self.id_generator {
            Some(generator) => ConnectionId::new(generator()),
            None => ConnectionId::generate(),
        }
    }
}

// ============================================================================
// Hub - Registration
// ============================================================================

impl Hub {
    /// Adds a connection to the connection set.
    ///
    /// No-op if it is already registered or no longer open. Refused if the
    /// connection was created for another hub or if its id is already held
    /// by a different connection.
    ///
    /// Returns `true` if the connection is registered after the call.
    pub fn register(&self, connection: &Arc<Connection>) -> bool {
        if !connection.belongs_to(self) {
            warn!(conn_id = %connection.id(), "Refusing connection owned by another hub");
            return false;
        }

        let mut state = self.state.lock();

        if !connection.is_open() {
            debug!(conn_id = %connection.id(), "Not registering closed connection");
            return false;
        }

        match state.connections.entry(connection.id().clone()) {
            Entry::Occupied(entry) => {
                if same_connection(entry.get(), connection) {
                    return true;
                }
                warn!(conn_id = %connection.id(), "Connection id already in use, refusing registration");
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(connection));
                debug!(conn_id = %connection.id(), total = state.connections.len(), "Connection registered");
                true
            }
        }
    }

    /// Removes a connection from the hub and every group, then closes it.
    ///
    /// Idempotent.
    pub fn unregister(&self, connection: &Arc<Connection>) {
        {
            let mut state = self.state.lock();
            if Self::detach_locked(&mut state, connection).is_some() {
                debug!(conn_id = %connection.id(), total = state.connections.len(), "Connection unregistered");
            }
        }

        connection.close();
    }

    /// Forcibly empties the connection set and closes every connection.
    ///
    /// Groups survive, empty. Intended for tests.
    pub fn clear_connections(&self) {
        let drained: Vec<Arc<Connection>> = {
            let mut state = self.state.lock();
            let drained: Vec<_> = state.connections.drain().map(|(_, conn)| conn).collect();
            for conn in &drained {
                Self::detach_locked(&mut state, conn);
            }
            // Members that were never registered
            let stragglers: Vec<_> = state
                .groups
                .values()
                .flat_map(|members| members.values().cloned())
                .collect();
            for conn in &stragglers {
                Self::detach_locked(&mut state, conn);
            }
            drained.into_iter().chain(stragglers).collect()
        };

        for conn in &drained {
            conn.close();
        }

        info!(closed = drained.len(), "All connections cleared");
    }

    /// Removes a closing connection from the set and every group.
    ///
    /// Called by [`Connection::close`].
    pub(crate) fn detach(&self, connection: &Connection) {
        let mut state = self.state.lock();
        Self::detach_locked(&mut state, connection);
    }

    /// Detaches under an already-held lock.
    ///
    /// Entries are matched by identity, so another connection that shares
    /// the id is left alone.
    fn detach_locked(state: &mut HubState, connection: &Connection) -> Option<Arc<Connection>> {
        let removed = remove_same(&mut state.connections, connection);

        let groups = std::mem::take(&mut *connection.membership().lock());
        for group in &groups {
            if let Some(members) = state.groups.get_mut(group) {
                remove_same(members, connection);
            }
        }

        removed
    }
}

// ============================================================================
// Hub - Groups
// ============================================================================

impl Hub {
    /// Creates an empty group if it does not exist.
    pub fn create_group(&self, name: &str) {
        let mut state = self.state.lock();
        if !state.groups.contains_key(name) {
            state.groups.insert(name.to_string(), Members::default());
            debug!(group = name, "Group created");
        }
    }

    /// Deletes a group and closes every connection in it.
    ///
    /// Members are also removed from the connection set and from any other
    /// group. A later group with the same name starts empty. Returns the
    /// number of connections closed.
    pub fn delete_group(&self, name: &str) -> usize {
        let members: Vec<Arc<Connection>> = {
            let mut state = self.state.lock();
            let Some(group) = state.groups.remove(name) else {
                debug!(group = name, "Delete of unknown group ignored");
                return 0;
            };

            let members: Vec<_> = group.into_values().collect();
            for conn in &members {
                Self::detach_locked(&mut state, conn);
            }
            members
        };

        for conn in &members {
            conn.close();
        }

        info!(group = name, closed = members.len(), "Group deleted");
        members.len()
    }

    /// Adds a connection to a group, creating the group if needed.
    ///
    /// Idempotent. Ignored for connections that are no longer open, that
    /// belong to another hub, or whose id is held by a different connection.
    pub fn add_to_group(&self, name: &str, connection: &Arc<Connection>) {
        if !connection.belongs_to(self) {
            warn!(conn_id = %connection.id(), group = name, "Refusing connection owned by another hub");
            return;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !connection.is_open() {
            debug!(conn_id = %connection.id(), group = name, "Not adding closed connection to group");
            return;
        }

        if held_by_other(&state.connections, connection)
            || state
                .groups
                .get(name)
                .is_some_and(|members| held_by_other(members, connection))
        {
            warn!(conn_id = %connection.id(), group = name, "Connection id already in use, refusing group join");
            return;
        }

        state
            .groups
            .entry(name.to_string())
            .or_default()
            .insert(connection.id().clone(), Arc::clone(connection));
        connection.membership().lock().insert(name.to_string());

        debug!(conn_id = %connection.id(), group = name, "Joined group");
    }

    /// Removes a connection from a group.
    ///
    /// Idempotent; unknown groups and non-members are ignored.
    pub fn remove_from_group(&self, name: &str, connection: &Connection) {
        let mut state = self.state.lock();

        let removed = state
            .groups
            .get_mut(name)
            .and_then(|members| remove_same(members, connection))
            .is_some();
        connection.membership().lock().remove(name);

        if removed {
            debug!(conn_id = %connection.id(), group = name, "Left group");
        }
    }
}

// ============================================================================
// Hub - Broadcast
// ============================================================================

impl Hub {
    /// Queues a payload on every target connection.
    ///
    /// `group` selects the targets: `""` means every registered connection,
    /// otherwise the members of that group. An unknown group is a logged
    /// no-op. Full queues drop the payload for that connection only.
    ///
    /// Returns the number of connections the payload was queued on.
    pub fn broadcast(&self, payload: impl Into<Bytes>, group: &str) -> usize {
        let payload = payload.into();
        let state = self.state.lock();

        let targets = if group.is_empty() {
            &state.connections
        } else if let Some(members) = state.groups.get(group) {
            members
        } else {
            warn!(group, "Broadcast to unknown group ignored");
            return 0;
        };

        let mut delivered = 0;
        for conn in targets.values() {
            match conn.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(conn_id = %conn.id(), group, error = %e, "Broadcast delivery dropped"),
            }
        }

        debug!(
            group,
            recipients = targets.len(),
            delivered,
            len = payload.len(),
            "Broadcast"
        );
        delivered
    }

    /// Queues a payload on every registered connection.
    #[inline]
    pub fn broadcast_all(&self, payload: impl Into<Bytes>) -> usize {
        self.broadcast(payload, "")
    }

    /// Serializes a value once and broadcasts it.
    ///
    /// # Errors
    ///
    /// Returns the codec's error if serialization fails; nothing is sent.
    pub fn broadcast_value<C: Codec>(
        &self,
        codec: &C,
        value: &C::Value,
        group: &str,
    ) -> Result<usize> {
        let payload = codec.serialize(value).inspect_err(|e| {
            warn!(codec = codec.type_tag(), group, error = %e, "Broadcast aborted, serialization failed");
        })?;

        Ok(self.broadcast(payload, group))
    }
}

// ============================================================================
// Hub - Queries
// ============================================================================

impl Hub {
    /// Returns the options applied to new connections.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Returns the number of groups, empty ones included.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    /// Returns `true` if the group exists.
    #[must_use]
    pub fn has_group(&self, name: &str) -> bool {
        self.state.lock().groups.contains_key(name)
    }

    /// Looks up a registered connection.
    #[must_use]
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.state.lock().connections.get(id).cloned()
    }

    /// Returns the sorted member ids of a group, or `None` if it does not exist.
    #[must_use]
    pub fn group_members(&self, name: &str) -> Option<Vec<ConnectionId>> {
        let state = self.state.lock();
        let members = state.groups.get(name)?;
        let mut ids: Vec<_> = members.keys().cloned().collect();
        ids.sort_unstable();
        Some(ids)
    }
}

/// Returns `true` if `entry` is `connection` itself.
#[inline]
fn same_connection(entry: &Arc<Connection>, connection: &Connection) -> bool {
    std::ptr::eq(Arc::as_ptr(entry), connection)
}

/// Returns `true` if a different connection holds this connection's id.
fn held_by_other(members: &Members, connection: &Connection) -> bool {
    members
        .get(connection.id())
        .is_some_and(|entry| !same_connection(entry, connection))
}

/// Removes `connection` from `members` only if the entry is that connection.
fn remove_same(members: &mut Members, connection: &Connection) -> Option<Arc<Connection>> {
    if members
        .get(connection.id())
        .is_some_and(|entry| same_connection(entry, connection))
    {
        members.remove(connection.id())
    } else {
        None
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Hub")
            .field("connections", &state.connections.len())
            .field("groups", &state.groups.len())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Serialize;
    use tokio::sync::mpsc;

    use crate::error::Error;
    use crate::protocol::{ByteCodec, JsonCodec};
    use crate::transport::ConnectionState;

    fn attached(hub: &Arc<Hub>) -> (Arc<Connection>, mpsc::Receiver<Bytes>) {
        let (conn, rx) = Connection::detached(hub);
        hub.register(&conn);
        (conn, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            out.push(payload);
        }
        out
    }

    /// Checks both membership views agree.
    fn assert_consistent(hub: &Hub, conns: &[&Arc<Connection>]) {
        let state = hub.state.lock();
        for (name, members) in &state.groups {
            for (id, conn) in members {
                assert_eq!(id, conn.id());
                assert!(conn.in_group(name), "{id} in {name} but not mirrored");
            }
        }
        for conn in conns {
            for name in conn.groups() {
                let members = state.groups.get(&name).expect("mirrored group exists");
                assert!(members.contains_key(conn.id()), "{name} mirrored but missing");
            }
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let hub = Hub::new();
        let (conn, _rx) = attached(&hub);
        assert!(hub.register(&conn));
        assert!(hub.register(&conn));
        assert_eq!(hub.connection_count(), 1);
        assert!(hub.get(conn.id()).is_some());
    }

    #[test]
    fn test_duplicate_id_is_refused() {
        let hub = Hub::builder().id_generator(|| "same".to_string()).build().unwrap();
        let (a, _ra) = attached(&hub);
        let (b, mut rb) = Connection::detached(&hub);
        assert_eq!(a.id(), b.id());

        assert!(!hub.register(&b));
        hub.add_to_group("g", &a);
        hub.add_to_group("g", &b);

        assert!(!b.in_group("g"));
        assert!(Arc::ptr_eq(&hub.get(a.id()).unwrap(), &a));
        assert_consistent(&hub, &[&a, &b]);

        // Closing the holder must not touch the refused one, and vice versa
        b.close();
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.group_members("g"), Some(vec![a.id().clone()]));
        a.close();
        assert_eq!(hub.connection_count(), 0);
        assert_consistent(&hub, &[&a, &b]);
        assert!(drain(&mut rb).is_empty());
    }

    #[test]
    fn test_detach_leaves_reused_id_alone() {
        let hub = Hub::builder().id_generator(|| "same".to_string()).build().unwrap();
        let (a, _ra) = attached(&hub);
        hub.add_to_group("g", &a);
        a.close();

        let (b, mut rb) = attached(&hub);
        hub.add_to_group("g", &b);
        assert_eq!(hub.connection_count(), 1);

        // Stale handle for the old connection
        hub.unregister(&a);
        hub.remove_from_group("g", &a);

        assert!(b.is_open());
        assert!(b.in_group("g"));
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.broadcast("still routed", "g"), 1);
        assert_eq!(drain(&mut rb), vec![Bytes::from_static(b"still routed")]);
        assert_consistent(&hub, &[&a, &b]);
    }

    #[test]
    fn test_foreign_connection_is_refused() {
        let owner = Hub::new();
        let other = Hub::new();
        let (conn, _rx) = Connection::detached(&owner);

        assert!(!other.register(&conn));
        other.add_to_group("g", &conn);

        assert_eq!(other.connection_count(), 0);
        assert!(!other.has_group("g"));
        assert!(conn.groups().is_empty());
        assert!(owner.register(&conn));
    }

    #[test]
    fn test_unregister_closes_queue() {
        let hub = Hub::new();
        let (conn, mut rx) = attached(&hub);
        hub.add_to_group("a", &conn);

        hub.unregister(&conn);
        hub.unregister(&conn);

        assert_eq!(hub.connection_count(), 0);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
        assert_consistent(&hub, &[&conn]);
    }

    #[test]
    fn test_register_closed_connection_is_ignored() {
        let hub = Hub::new();
        let (conn, _rx) = Connection::detached(&hub);
        conn.close();
        assert!(!hub.register(&conn));
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_create_group_is_idempotent() {
        let hub = Hub::new();
        let (conn, _rx) = attached(&hub);
        hub.create_group("lobby");
        hub.add_to_group("lobby", &conn);
        hub.create_group("lobby");

        assert_eq!(hub.group_count(), 1);
        assert_eq!(hub.group_members("lobby"), Some(vec![conn.id().clone()]));
    }

    #[test]
    fn test_add_to_group_auto_creates() {
        let hub = Hub::new();
        let (conn, _rx) = attached(&hub);
        assert!(!hub.has_group("new"));

        hub.add_to_group("new", &conn);
        hub.add_to_group("new", &conn);

        assert!(hub.has_group("new"));
        assert_eq!(hub.group_members("new").unwrap().len(), 1);
        assert_eq!(conn.groups(), vec!["new".to_string()]);
    }

    #[test]
    fn test_remove_from_group_is_idempotent() {
        let hub = Hub::new();
        let (conn, _rx) = attached(&hub);
        hub.add_to_group("g", &conn);

        hub.remove_from_group("g", &conn);
        hub.remove_from_group("g", &conn);
        hub.remove_from_group("missing", &conn);

        assert_eq!(hub.group_members("g"), Some(Vec::new()));
        assert!(!conn.in_group("g"));
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_add_closed_connection_to_group_is_ignored() {
        let hub = Hub::new();
        let (conn, _rx) = attached(&hub);
        conn.close();
        hub.add_to_group("late", &conn);
        assert!(!hub.has_group("late"));
        assert!(conn.groups().is_empty());
    }

    #[test]
    fn test_membership_stays_consistent() {
        let hub = Hub::new();
        let (c1, _r1) = attached(&hub);
        let (c2, _r2) = attached(&hub);
        let (c3, _r3) = attached(&hub);
        let all = [&c1, &c2, &c3];

        hub.add_to_group("a", &c1);
        hub.add_to_group("a", &c2);
        hub.add_to_group("b", &c2);
        hub.add_to_group("b", &c3);
        assert_consistent(&hub, &all);

        hub.remove_from_group("a", &c2);
        assert_consistent(&hub, &all);

        c3.close();
        assert_consistent(&hub, &all);

        hub.delete_group("a");
        assert_consistent(&hub, &all);

        hub.add_to_group("b", &c2);
        assert_consistent(&hub, &all);
        assert_eq!(hub.group_members("b"), Some(vec![c2.id().clone()]));
    }

    #[test]
    fn test_broadcast_to_group() {
        let hub = Hub::new();
        let (c1, mut r1) = attached(&hub);
        let (c2, mut r2) = attached(&hub);
        let (_c3, mut r3) = attached(&hub);

        hub.add_to_group("A", &c1);
        hub.add_to_group("A", &c2);

        assert_eq!(hub.broadcast("payload", "A"), 2);
        assert_eq!(drain(&mut r1), vec![Bytes::from_static(b"payload")]);
        assert_eq!(drain(&mut r2), vec![Bytes::from_static(b"payload")]);
        assert!(drain(&mut r3).is_empty());
    }

    #[test]
    fn test_broadcast_to_all() {
        let hub = Hub::new();
        let (c1, mut r1) = attached(&hub);
        let (_c2, mut r2) = attached(&hub);
        let (_c3, mut r3) = attached(&hub);
        hub.add_to_group("A", &c1);

        assert_eq!(hub.broadcast("everyone", ""), 3);
        assert_eq!(hub.broadcast_all("again"), 3);
        for rx in [&mut r1, &mut r2, &mut r3] {
            assert_eq!(
                drain(rx),
                vec![Bytes::from_static(b"everyone"), Bytes::from_static(b"again")]
            );
        }
    }

    #[test]
    fn test_broadcast_unknown_group_is_noop() {
        let hub = Hub::new();
        let (_c1, mut r1) = attached(&hub);
        assert_eq!(hub.broadcast("x", "nobody-here"), 0);
        assert!(drain(&mut r1).is_empty());
        assert!(!hub.has_group("nobody-here"));
    }

    #[test]
    fn test_broadcast_drops_only_for_full_queue() {
        let hub = Hub::builder().queue_capacity(2).build().unwrap();
        let (slow, mut slow_rx) = attached(&hub);
        let (_fast, mut fast_rx) = attached(&hub);

        slow.send("a").unwrap();
        slow.send("b").unwrap();

        assert_eq!(hub.broadcast_all("c"), 1);
        assert_eq!(
            drain(&mut slow_rx),
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
        );
        assert_eq!(drain(&mut fast_rx), vec![Bytes::from_static(b"c")]);
    }

    #[test]
    fn test_delete_group_closes_members() {
        let hub = Hub::new();
        let (c1, _r1) = attached(&hub);
        let (c2, _r2) = attached(&hub);
        let (c3, mut r3) = attached(&hub);
        hub.add_to_group("A", &c1);
        hub.add_to_group("A", &c2);
        hub.add_to_group("B", &c2);

        assert_eq!(hub.delete_group("A"), 2);

        assert!(!hub.has_group("A"));
        assert_eq!(c1.state(), ConnectionState::Closed);
        assert_eq!(c2.state(), ConnectionState::Closed);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.group_members("B"), Some(Vec::new()));

        hub.add_to_group("A", &c3);
        assert_eq!(hub.group_members("A"), Some(vec![c3.id().clone()]));
        assert_eq!(hub.broadcast("fresh", "A"), 1);
        assert_eq!(drain(&mut r3), vec![Bytes::from_static(b"fresh")]);
    }

    #[test]
    fn test_delete_unknown_group() {
        let hub = Hub::new();
        assert_eq!(hub.delete_group("ghost"), 0);
    }

    #[test]
    fn test_clear_connections() {
        let hub = Hub::new();
        let (c1, _r1) = attached(&hub);
        let (c2, _r2) = attached(&hub);
        hub.add_to_group("g", &c1);

        hub.clear_connections();

        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.group_members("g"), Some(Vec::new()));
        assert_eq!(c1.state(), ConnectionState::Closed);
        assert_eq!(c2.state(), ConnectionState::Closed);
        assert_consistent(&hub, &[&c1, &c2]);
    }

    #[derive(Serialize)]
    struct Notice<'a> {
        from: &'a str,
        message: &'a str,
    }

    #[test]
    fn test_broadcast_value_serializes_once() {
        let hub = Hub::new();
        let (c1, mut r1) = attached(&hub);
        let (c2, mut r2) = attached(&hub);
        hub.add_to_group("room", &c1);
        hub.add_to_group("room", &c2);

        let codec = JsonCodec::<serde_json::Value>::new();
        let value = serde_json::to_value(Notice {
            from: "c1",
            message: "hi",
        })
        .unwrap();

        assert_eq!(hub.broadcast_value(&codec, &value, "room").unwrap(), 2);
        let expected = Bytes::from_static(br#"{"from":"c1","message":"hi"}"#);
        assert_eq!(drain(&mut r1), vec![expected.clone()]);
        assert_eq!(drain(&mut r2), vec![expected]);
    }

    #[test]
    fn test_broadcast_value_with_byte_codec() {
        let hub = Hub::new();
        let (_c1, mut r1) = attached(&hub);
        let raw = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(hub.broadcast_value(&ByteCodec, &raw, "").unwrap(), 1);
        assert_eq!(drain(&mut r1), vec![raw]);
    }

    struct Unencodable;

    impl Codec for Unencodable {
        type Value = ();

        fn serialize(&self, _: &()) -> Result<Bytes> {
            Err(Error::codec("broken", "cannot encode"))
        }

        fn deserialize(&self, _: &[u8]) -> Result<()> {
            Ok(())
        }

        fn type_tag(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_broadcast_value_aborts_on_serialize_error() {
        let hub = Hub::new();
        let (_c1, mut r1) = attached(&hub);

        let err = hub.broadcast_value(&Unencodable, &(), "").unwrap_err();
        assert!(matches!(err, Error::Codec { codec: "broken", .. }));
        assert!(drain(&mut r1).is_empty());
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_concurrent_edits_keep_views_consistent() {
        let hub = Hub::new();
        let conns: Vec<_> = (0..16).map(|_| attached(&hub)).collect();

        let threads: Vec<_> = conns
            .iter()
            .enumerate()
            .map(|(i, (conn, _))| {
                let hub = Arc::clone(&hub);
                let conn = Arc::clone(conn);
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let group = format!("g{}", (i + round) % 4);
                        hub.add_to_group(&group, &conn);
                        hub.broadcast("tick", &group);
                        if round % 3 == 0 {
                            hub.remove_from_group(&group, &conn);
                        }
                    }
                    if i % 4 == 0 {
                        conn.close();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let refs: Vec<_> = conns.iter().map(|(conn, _)| conn).collect();
        assert_consistent(&hub, &refs);
        assert_eq!(hub.connection_count(), 12);
    }
}
