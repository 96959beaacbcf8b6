#[cfg(unix)]
use std::{
    ffi::{CStr, CString, OsStr},
    io,
    mem::MaybeUninit,
    os::unix::ffi::OsStrExt,
    ptr,
};
use std::path::PathBuf;

#[cfg(unix)]
use tracing::debug;

use crate::{
    desired::Identity,
    error::{Result, SyncError},
};

/// Starting size of the scratch buffer handed to the `get*nam_r` calls.
#[cfg(unix)]
const INITIAL_BUFFER: usize = 1024;

/// Upper bound for the scratch buffer before giving up on `ERANGE`.
#[cfg(unix)]
const MAX_BUFFER: usize = 1 << 20;

/// Numeric ids and home directory for a run-as identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// User id to run as, when a user was requested.
    pub uid: Option<u32>,
    /// Group id to run as.
    pub gid: Option<u32>,
    /// Home directory exported as `HOME`.
    pub home: Option<PathBuf>,
}

/// Resolve user and group names against the system databases.
///
/// A user without a resolvable home directory is an error, since git reads its
/// configuration and credentials from there.
#[cfg(unix)]
pub fn resolve(identity: &Identity) -> Result<ResolvedIdentity> {
    let mut resolved = ResolvedIdentity {
        uid: None,
        gid: None,
        home: None,
    };

    if let Some(user) = identity.user.as_deref() {
        let entry = lookup_user(user)
            .map_err(|e| identity_error(user, format!("user lookup failed: {e}")))?
            .ok_or_else(|| identity_error(user, "no such user".to_string()))?;
        let home = entry.home.ok_or_else(|| {
            identity_error(user, "could not determine HOME for user".to_string())
        })?;
        resolved.uid = Some(entry.uid);
        resolved.gid = Some(entry.gid);
        resolved.home = Some(home);
    }

    if let Some(group) = identity.group.as_deref() {
        let gid = lookup_group(group)
            .map_err(|e| identity_error(group, format!("group lookup failed: {e}")))?
            .ok_or_else(|| identity_error(group, "no such group".to_string()))?;
        resolved.gid = Some(gid);
    }

    debug!(?resolved, "resolved run-as identity");
    Ok(resolved)
}

/// Run-as identities need a Unix user database.
#[cfg(not(unix))]
pub fn resolve(identity: &Identity) -> Result<ResolvedIdentity> {
    let name = identity
        .user
        .as_deref()
        .or(identity.group.as_deref())
        .unwrap_or_default();
    Err(identity_error(
        name,
        "run-as identities are only supported on Unix".to_string(),
    ))
}

/// Build an identity error for `name`.
fn identity_error(name: &str, message: String) -> SyncError {
    SyncError::Identity {
        user: name.to_string(),
        message,
    }
}

/// Fields we need from a passwd entry.
#[cfg(unix)]
struct UserEntry {
    /// Numeric user id.
    uid: u32,
    /// Primary group id.
    gid: u32,
    /// Home directory, absent when the database leaves it empty.
    home: Option<PathBuf>,
}

/// Convert a name into a C string, rejecting interior NULs.
#[cfg(unix)]
fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Look up `name` in the passwd database.
#[cfg(unix)]
fn lookup_user(name: &str) -> io::Result<Option<UserEntry>> {
    let cname = c_name(name)?;
    let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUFFER];
    loop {
        let mut pwd = MaybeUninit::<libc::passwd>::uninit();
        let mut result: *mut libc::passwd = ptr::null_mut();
        // SAFETY: every pointer is valid for the duration of the call and
        // `buf.len()` is the writable length of `buf`.
        let rc = unsafe {
            libc::getpwnam_r(
                cname.as_ptr(),
                pwd.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        // SAFETY: a non-null result means `pwd` was filled in and its string
        // fields point into `buf`, which is still alive.
        let pwd = unsafe { pwd.assume_init() };
        let home = if pwd.pw_dir.is_null() {
            None
        } else {
            // SAFETY: checked non-null above; the string is NUL terminated.
            let bytes = unsafe { CStr::from_ptr(pwd.pw_dir) }.to_bytes();
            (!bytes.is_empty()).then(|| PathBuf::from(OsStr::from_bytes(bytes)))
        };
        return Ok(Some(UserEntry {
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
            home,
        }));
    }
}

/// Look up `name` in the group database, returning its gid.
#[cfg(unix)]
fn lookup_group(name: &str) -> io::Result<Option<u32>> {
    let cname = c_name(name)?;
    let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUFFER];
    loop {
        let mut grp = MaybeUninit::<libc::group>::uninit();
        let mut result: *mut libc::group = ptr::null_mut();
        // SAFETY: as in `lookup_user`.
        let rc = unsafe {
            libc::getgrnam_r(
                cname.as_ptr(),
                grp.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        // SAFETY: a non-null result means `grp` was filled in.
        let grp = unsafe { grp.assume_init() };
        return Ok(Some(grp.gr_gid));
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn resolves_root() {
        let identity = Identity {
            user: Some("root".to_string()),
            group: None,
        };
        let resolved = resolve(&identity).unwrap();
        assert_eq!(resolved.uid, Some(0));
        assert_eq!(resolved.gid, Some(0));
        assert_eq!(resolved.home, Some(PathBuf::from("/root")));
    }

    #[test]
    fn group_alone_sets_only_gid() {
        let identity = Identity {
            user: None,
            group: Some("root".to_string()),
        };
        let resolved = resolve(&identity).unwrap();
        assert_eq!(resolved.uid, None);
        assert_eq!(resolved.gid, Some(0));
        assert_eq!(resolved.home, None);
    }

    #[test]
    fn unknown_user_is_an_identity_error() {
        let identity = Identity {
            user: Some("reposync-no-such-user".to_string()),
            group: None,
        };
        let err = resolve(&identity).unwrap_err();
        match err {
            SyncError::Identity { user, message } => {
                assert_eq!(user, "reposync-no-such-user");
                assert_eq!(message, "no such user");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_group_is_an_identity_error() {
        let identity = Identity {
            user: None,
            group: Some("reposync-no-such-group".to_string()),
        };
        assert!(matches!(
            resolve(&identity),
            Err(SyncError::Identity { .. })
        ));
    }
}
