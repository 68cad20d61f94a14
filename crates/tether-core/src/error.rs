//! Error types for Tether.
//!
//! Every recoverable condition at the handle boundary is an ordinary value:
//! a missing parent, exhausted storage, a handle that was already closed, or
//! a parent closed out of order.

use std::fmt;

use thiserror::Error;

use crate::arena::HandleId;

/// The kind of object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Database,
    Table,
    Row,
    Adder,
}

impl HandleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleKind::Database => "database",
            HandleKind::Table => "table",
            HandleKind::Row => "row",
            HandleKind::Adder => "adder",
        }
    }

    /// The kind of object created from this one, if any.
    pub fn child(&self) -> Option<HandleKind> {
        match self {
            HandleKind::Database => Some(HandleKind::Table),
            HandleKind::Table => Some(HandleKind::Row),
            HandleKind::Row | HandleKind::Adder => None,
        }
    }

    /// The kind of object this one is created from, if any.
    pub fn parent(&self) -> Option<HandleKind> {
        match self {
            HandleKind::Table => Some(HandleKind::Database),
            HandleKind::Row => Some(HandleKind::Table),
            HandleKind::Database | HandleKind::Adder => None,
        }
    }

    fn parent_label(&self) -> &'static str {
        self.parent().map_or("object", |p| p.as_str())
    }

    fn children_label(&self) -> &'static str {
        match self.child() {
            Some(HandleKind::Table) => "table(s)",
            Some(HandleKind::Row) => "row(s)",
            _ => "child(ren)",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the Tether library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TetherError {
    /// A child was requested from an absent parent.
    #[error("Cannot create {kind} without a parent {}", .kind.parent_label())]
    NullParent { kind: HandleKind },

    /// The handle was closed (or never issued by this registry).
    #[error("Stale {kind} handle {id}")]
    StaleHandle { kind: HandleKind, id: HandleId },

    /// A parent was closed while children derived from it are still open.
    #[error("Cannot close {kind} handle {id}: {open} {} still open", .kind.children_label())]
    ChildrenOpen {
        kind: HandleKind,
        id: HandleId,
        open: u32,
    },

    /// Storage for a new object could not be obtained.
    #[error("Allocation failed for {kind}")]
    AllocationFailed { kind: HandleKind },

    #[error("{0}")]
    Other(String),
}

impl TetherError {
    /// The kind of handle the error concerns, when there is one.
    pub fn kind(&self) -> Option<HandleKind> {
        match self {
            TetherError::NullParent { kind }
            | TetherError::StaleHandle { kind, .. }
            | TetherError::ChildrenOpen { kind, .. }
            | TetherError::AllocationFailed { kind } => Some(*kind),
            TetherError::Other(_) => None,
        }
    }

    /// Whether the error is a lifetime violation (use after close, close out
    /// of order) rather than a recoverable creation failure.
    pub fn is_lifetime_violation(&self) -> bool {
        matches!(
            self,
            TetherError::StaleHandle { .. } | TetherError::ChildrenOpen { .. }
        )
    }
}

/// Result type alias for Tether operations.
pub type Result<T> = std::result::Result<T, TetherError>;
