use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::unistd::{Group, User};

use crate::converge::ApplyError;
use crate::desired::Attributes;

/// Resolves the requested owner and group to numeric ids.
fn resolve(path: &Path, attributes: &Attributes) -> Result<(Option<u32>, Option<u32>), ApplyError> {
    let uid = match attributes.owner.as_deref() {
        None => None,
        Some(name) => Some(
            User::from_name(name)
                .map_err(io::Error::from)
                .map_err(ApplyError::io(path, "look up user"))?
                .ok_or_else(|| ApplyError::UnknownUser {
                    path: path.to_path_buf(),
                    name: name.to_owned(),
                })?
                .uid
                .as_raw(),
        ),
    };
    let gid = match attributes.group.as_deref() {
        None => None,
        Some(name) => Some(
            Group::from_name(name)
                .map_err(io::Error::from)
                .map_err(ApplyError::io(path, "look up group"))?
                .ok_or_else(|| ApplyError::UnknownGroup {
                    path: path.to_path_buf(),
                    name: name.to_owned(),
                })?
                .gid
                .as_raw(),
        ),
    };
    Ok((uid, gid))
}

/// Applies owner and group when they differ from `metadata`.
pub(super) fn apply_ownership(
    path: &Path,
    metadata: &Metadata,
    attributes: &Attributes,
) -> Result<bool, ApplyError> {
    let (uid, gid) = resolve(path, attributes)?;
    let uid = uid.filter(|uid| *uid != metadata.uid());
    let gid = gid.filter(|gid| *gid != metadata.gid());
    if uid.is_none() && gid.is_none() {
        return Ok(false);
    }
    std::os::unix::fs::chown(path, uid, gid).map_err(ApplyError::io(path, "change ownership of"))?;
    Ok(true)
}
