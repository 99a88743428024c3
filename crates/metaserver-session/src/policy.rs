//! Permission policy: what a set of credentials earns, and what each
//! permission level may do.

use metaserver_protocol::{Credentials, Permission};

use crate::{Client, CredentialStore, SessionError};

/// Lobby actions restricted by permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Replace the message of the day.
    SetMotd,
    /// Broadcast a system announcement.
    Announce,
}

/// Whether `permission` grants `privilege`. Only superusers get either.
pub fn permits(permission: Permission, privilege: Privilege) -> bool {
    match privilege {
        Privilege::SetMotd | Privilege::Announce => {
            permission == Permission::Superuser
        }
    }
}

/// Decides the permission level for a login.
///
/// Anonymous logins are always `Unregistered`. A registered login must
/// name a known user with the right password, and then gets whatever the
/// store says that user is.
///
/// # Errors
/// [`SessionError::WrongPassword`] for an unknown user or a bad password.
pub fn authorize<S>(store: &S, creds: &Credentials) -> Result<Permission, SessionError>
where
    S: CredentialStore + ?Sized,
{
    if !creds.registered {
        return Ok(Permission::Unregistered);
    }
    let password = creds.password.as_deref().unwrap_or_default();
    if store.is_registered(&creds.name) && store.verify_password(&creds.name, password) {
        Ok(store.permission_for(&creds.name))
    } else {
        Err(SessionError::WrongPassword(creds.name.clone()))
    }
}

/// Checks that a relogin presents the same identity as the session it
/// wants to take over.
///
/// Protocol version, build id and the registered flag must match; a
/// registered session additionally needs the correct password.
///
/// # Errors
/// [`SessionError::WrongInformation`] on any mismatch.
pub fn check_relogin<S>(
    store: &S,
    existing: &Client,
    creds: &Credentials,
) -> Result<(), SessionError>
where
    S: CredentialStore + ?Sized,
{
    let same_identity = existing.protocol_version == creds.protocol_version
        && existing.build_id == creds.build_id
        && existing.registered == creds.registered;
    let password_ok = !creds.registered
        || store.verify_password(
            &creds.name,
            creds.password.as_deref().unwrap_or_default(),
        );

    if same_identity && password_ok {
        Ok(())
    } else {
        Err(SessionError::WrongInformation(creds.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use metaserver_protocol::ConnectionId;

    use super::*;
    use crate::MemoryCredentials;

    fn store() -> MemoryCredentials {
        let mut store = MemoryCredentials::new();
        store.insert("SirVer", "123456", Permission::Superuser);
        store.insert("otto", "ottoiscool", Permission::Registered);
        store
    }

    fn creds(name: &str, registered: bool, password: Option<&str>) -> Credentials {
        Credentials {
            protocol_version: 0,
            name: name.into(),
            build_id: "build-17".into(),
            registered,
            password: password.map(str::to_string),
        }
    }

    fn client(name: &str, registered: bool) -> Client {
        Client {
            id: ConnectionId::new(1),
            name: name.into(),
            build_id: "build-17".into(),
            protocol_version: 0,
            registered,
            permission: Permission::Unregistered,
            game: None,
        }
    }

    #[test]
    fn test_authorize_anonymous_is_unregistered() {
        let perm = authorize(&store(), &creds("bert", false, None)).unwrap();
        assert_eq!(perm, Permission::Unregistered);
    }

    #[test]
    fn test_authorize_registered_gets_stored_permission() {
        let s = store();
        assert_eq!(
            authorize(&s, &creds("SirVer", true, Some("123456"))),
            Ok(Permission::Superuser)
        );
        assert_eq!(
            authorize(&s, &creds("otto", true, Some("ottoiscool"))),
            Ok(Permission::Registered)
        );
    }

    #[test]
    fn test_authorize_wrong_password_rejected() {
        let result = authorize(&store(), &creds("SirVer", true, Some("12345")));
        assert_eq!(result, Err(SessionError::WrongPassword("SirVer".into())));
    }

    #[test]
    fn test_authorize_unknown_registered_user_rejected() {
        let result = authorize(&store(), &creds("bert", true, Some("")));
        assert!(matches!(result, Err(SessionError::WrongPassword(_))));
    }

    #[test]
    fn test_permits_only_superuser() {
        assert!(permits(Permission::Superuser, Privilege::SetMotd));
        assert!(permits(Permission::Superuser, Privilege::Announce));
        assert!(!permits(Permission::Registered, Privilege::SetMotd));
        assert!(!permits(Permission::Unregistered, Privilege::Announce));
    }

    #[test]
    fn test_check_relogin_accepts_matching_anonymous() {
        let existing = client("bert", false);
        assert!(check_relogin(&store(), &existing, &creds("bert", false, None)).is_ok());
    }

    #[test]
    fn test_check_relogin_rejects_other_build() {
        let existing = client("bert", false);
        let mut c = creds("bert", false, None);
        c.build_id = "build-18".into();
        assert_eq!(
            check_relogin(&store(), &existing, &c),
            Err(SessionError::WrongInformation("bert".into()))
        );
    }

    #[test]
    fn test_check_relogin_rejects_flag_mismatch() {
        let existing = client("otto", true);
        let c = creds("otto", false, None);
        assert!(check_relogin(&store(), &existing, &c).is_err());
    }

    #[test]
    fn test_check_relogin_registered_needs_password() {
        let existing = client("otto", true);
        assert!(
            check_relogin(&store(), &existing, &creds("otto", true, Some("ottoiscool")))
                .is_ok()
        );
        assert!(
            check_relogin(&store(), &existing, &creds("otto", true, Some("nope")))
                .is_err()
        );
    }
}
