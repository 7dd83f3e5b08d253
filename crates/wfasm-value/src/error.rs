//! Host-facing misuse errors for this crate's value/heap model. Distinct
//! from [`crate::Status`]: a `Status` is a VM-observable fault a script can
//! raise and catch; a `ValueError` means the host (or a bug in the VM
//! itself) did something the data model doesn't allow, e.g. trying to key a
//! MAP with a DOUBLE or touching a heap cell through a stale id.

use thiserror::Error;

use crate::heap::HeapId;
use crate::value::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{tag} cannot be used as a MAP key (only INT64/UINT64/STRING/BOOL can)")]
    NotAMapKey { tag: Type },
    #[error("heap id {0:?} does not name a live cell")]
    HeapIdNotFound(HeapId),
}
