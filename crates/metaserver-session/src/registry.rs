//! The client registry: everyone who is logged in.
//!
//! Display names are unique among logged-in clients at all times. The
//! registry enforces that on every insert: registered users get their name
//! or an error, anonymous users get their name or the same name with the
//! smallest free numeric suffix.
//!
//! # Ordering
//!
//! `CLIENTS` lists clients in login order, and a relogin takeover keeps
//! the original slot. A plain `HashMap` can't remember order, so the
//! registry keeps a `Vec` of ids beside the maps.
//!
//! # Concurrency note
//!
//! Not thread-safe by itself. The engine owns the registry and is the
//! only one touching it.

use std::collections::HashMap;

use metaserver_protocol::{ClientEntry, ConnectionId, Credentials, Permission};

use crate::{Client, SessionError};

/// All logged-in clients.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    /// Login order.
    order: Vec<ConnectionId>,
    clients: HashMap<ConnectionId, Client>,
    /// Name → owner, kept in sync with `clients`.
    names: HashMap<String, ConnectionId>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs a connection in.
    ///
    /// `reserved` marks names an anonymous client may not take even when
    /// nobody online holds them (registered users' names). It doesn't
    /// apply to registered logins, whose name the credential store
    /// already vouched for.
    ///
    /// # Errors
    /// - [`SessionError::InvalidName`] for an empty name.
    /// - [`SessionError::AlreadyLoggedIn`] if the connection is already
    ///   logged in, or a registered name is in use.
    pub fn login<F>(
        &mut self,
        id: ConnectionId,
        creds: &Credentials,
        permission: Permission,
        reserved: F,
    ) -> Result<&Client, SessionError>
    where
        F: Fn(&str) -> bool,
    {
        if creds.name.is_empty() {
            return Err(SessionError::InvalidName(creds.name.clone()));
        }
        if let Some(existing) = self.clients.get(&id) {
            return Err(SessionError::AlreadyLoggedIn(existing.name.clone()));
        }

        let name = if creds.registered {
            if self.names.contains_key(&creds.name) {
                return Err(SessionError::AlreadyLoggedIn(creds.name.clone()));
            }
            creds.name.clone()
        } else {
            self.unique_name(&creds.name, reserved)
        };

        let client = Client {
            id,
            name: name.clone(),
            build_id: creds.build_id.clone(),
            protocol_version: creds.protocol_version,
            registered: creds.registered,
            permission,
            game: None,
        };
        tracing::info!(conn_id = %id, %name, %permission, "client logged in");

        self.order.push(id);
        self.names.insert(name, id);
        Ok(self.clients.entry(id).or_insert(client))
    }

    /// `base` if it's free, otherwise `base1`, `base2`, … whichever comes
    /// first.
    fn unique_name<F>(&self, base: &str, reserved: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let taken = |name: &str| self.names.contains_key(name) || reserved(name);
        if !taken(base) {
            return base.to_string();
        }
        (1u64..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !taken(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Logs a connection out, returning its record.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        self.names.remove(&client.name);
        self.order.retain(|other| *other != id);
        tracing::info!(conn_id = %id, name = %client.name, "client logged out");
        Some(client)
    }

    /// Moves the record held by `old` to `new`, keeping its name and its
    /// place in login order. Used by relogin takeovers.
    ///
    /// Returns `None` (and changes nothing) if `old` isn't logged in or
    /// `new` already is.
    pub fn replace(&mut self, old: ConnectionId, new: ConnectionId) -> Option<&Client> {
        if self.clients.contains_key(&new) {
            return None;
        }
        let mut client = self.clients.remove(&old)?;
        client.id = new;
        self.names.insert(client.name.clone(), new);
        if let Some(slot) = self.order.iter_mut().find(|id| **id == old) {
            *slot = new;
        }
        tracing::info!(from = %old, to = %new, name = %client.name, "client taken over");
        Some(self.clients.entry(new).or_insert(client))
    }

    /// Sets the game shown for a client. Returns whether anything changed.
    pub fn set_game(&mut self, id: ConnectionId, game: Option<String>) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) if client.game != game => {
                client.game = game;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Client> {
        self.names.get(name).and_then(|id| self.clients.get(id))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Clients in login order.
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.order.iter().filter_map(|id| self.clients.get(id))
    }

    /// Connection ids in login order, for broadcasts.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.order.clone()
    }

    /// The `CLIENTS` reply rows.
    pub fn roster(&self) -> Vec<ClientEntry> {
        self.iter().map(Client::entry).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn anon(name: &str) -> Credentials {
        Credentials {
            protocol_version: 0,
            name: name.into(),
            build_id: "build-17".into(),
            registered: false,
            password: None,
        }
    }

    fn registered(name: &str) -> Credentials {
        Credentials {
            registered: true,
            password: Some("pw".into()),
            ..anon(name)
        }
    }

    fn nothing_reserved(_: &str) -> bool {
        false
    }

    fn login_anon(reg: &mut ClientRegistry, id: u64, name: &str) -> String {
        reg.login(cid(id), &anon(name), Permission::Unregistered, nothing_reserved)
            .unwrap()
            .name
            .clone()
    }

    // =====================================================================
    // login()
    // =====================================================================

    #[test]
    fn test_login_anonymous_keeps_free_name() {
        let mut reg = ClientRegistry::new();
        assert_eq!(login_anon(&mut reg, 1, "bert"), "bert");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_login_anonymous_collision_gets_smallest_suffix() {
        let mut reg = ClientRegistry::new();
        assert_eq!(login_anon(&mut reg, 1, "testuser"), "testuser");
        assert_eq!(login_anon(&mut reg, 2, "testuser"), "testuser1");
        assert_eq!(login_anon(&mut reg, 3, "testuser"), "testuser2");

        // A freed suffix is reused.
        reg.remove(cid(2));
        assert_eq!(login_anon(&mut reg, 4, "testuser"), "testuser1");
    }

    #[test]
    fn test_login_anonymous_skips_reserved_names() {
        let mut reg = ClientRegistry::new();
        let client = reg
            .login(cid(1), &anon("SirVer"), Permission::Unregistered, |n| {
                n == "SirVer"
            })
            .unwrap();
        assert_eq!(client.name, "SirVer1");
    }

    #[test]
    fn test_login_registered_name_in_use_rejected() {
        let mut reg = ClientRegistry::new();
        reg.login(cid(1), &registered("otto"), Permission::Registered, nothing_reserved)
            .unwrap();
        let err = reg
            .login(cid(2), &registered("otto"), Permission::Registered, nothing_reserved)
            .unwrap_err();
        assert_eq!(err, SessionError::AlreadyLoggedIn("otto".into()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_login_registered_ignores_reservation() {
        let mut reg = ClientRegistry::new();
        let client = reg
            .login(cid(1), &registered("SirVer"), Permission::Superuser, |_| true)
            .unwrap();
        assert_eq!(client.name, "SirVer");
        assert_eq!(client.permission, Permission::Superuser);
    }

    #[test]
    fn test_login_same_connection_twice_rejected() {
        let mut reg = ClientRegistry::new();
        login_anon(&mut reg, 1, "bert");
        let err = reg
            .login(cid(1), &anon("ernie"), Permission::Unregistered, nothing_reserved)
            .unwrap_err();
        assert_eq!(err, SessionError::AlreadyLoggedIn("bert".into()));
    }

    #[test]
    fn test_login_empty_name_rejected() {
        let mut reg = ClientRegistry::new();
        let err = reg
            .login(cid(1), &anon(""), Permission::Unregistered, nothing_reserved)
            .unwrap_err();
        assert_eq!(err.reason(), "Invalid name: ''");
        assert!(reg.is_empty());
    }

    // =====================================================================
    // remove() / replace()
    // =====================================================================

    #[test]
    fn test_remove_frees_name() {
        let mut reg = ClientRegistry::new();
        login_anon(&mut reg, 1, "bert");
        let removed = reg.remove(cid(1)).unwrap();
        assert_eq!(removed.name, "bert");
        assert!(reg.by_name("bert").is_none());
        assert!(reg.remove(cid(1)).is_none());
    }

    #[test]
    fn test_replace_keeps_name_slot_and_game() {
        let mut reg = ClientRegistry::new();
        login_anon(&mut reg, 1, "bert");
        login_anon(&mut reg, 2, "otto");
        login_anon(&mut reg, 3, "ernie");
        reg.set_game(cid(1), Some("my cool game".into()));

        let taken = reg.replace(cid(1), cid(9)).unwrap();
        assert_eq!(taken.id, cid(9));
        assert_eq!(taken.game.as_deref(), Some("my cool game"));

        assert!(reg.get(cid(1)).is_none());
        assert_eq!(reg.by_name("bert").unwrap().id, cid(9));
        let order: Vec<&str> = reg.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, ["bert", "otto", "ernie"]);
    }

    #[test]
    fn test_replace_unknown_old_is_noop() {
        let mut reg = ClientRegistry::new();
        login_anon(&mut reg, 1, "bert");
        assert!(reg.replace(cid(5), cid(6)).is_none());
        assert!(reg.replace(cid(1), cid(1)).is_none());
        assert_eq!(reg.by_name("bert").unwrap().id, cid(1));
    }

    // =====================================================================
    // set_game() / roster()
    // =====================================================================

    #[test]
    fn test_set_game_reports_change() {
        let mut reg = ClientRegistry::new();
        login_anon(&mut reg, 1, "bert");
        assert!(reg.set_game(cid(1), Some("g".into())));
        assert!(!reg.set_game(cid(1), Some("g".into())));
        assert!(reg.set_game(cid(1), None));
        assert!(!reg.set_game(cid(2), None));
    }

    #[test]
    fn test_roster_in_login_order() {
        let mut reg = ClientRegistry::new();
        login_anon(&mut reg, 5, "zed");
        login_anon(&mut reg, 2, "amy");
        reg.set_game(cid(2), Some("g".into()));

        let roster = reg.roster();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].name, "zed");
        assert_eq!(roster[0].game, "");
        assert_eq!(roster[1].name, "amy");
        assert_eq!(roster[1].game, "g");
        assert_eq!(reg.ids(), vec![cid(5), cid(2)]);
    }
}
