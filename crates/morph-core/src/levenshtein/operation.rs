use std::fmt;

/// One unit edit taking an origin sequence toward a target sequence.
///
/// Positions always address the *original* coordinate spaces of the origin
/// and target, so a list of operations can be replayed in any order onto a
/// fresh copy of the origin, or onto a parallel array of labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOperation {
    /// Overwrite origin position `origin` with target token `target`.
    Replace { origin: usize, target: usize },
    /// Place target token `target` immediately after origin position `origin`.
    Insert { origin: usize, target: usize },
    /// Place target token `target` before origin position 0.
    Prepend { target: usize },
    /// Drop origin position `origin`.
    Delete { origin: usize },
}

impl EditOperation {
    /// The origin position this operation is anchored to, if any.
    pub fn origin_pos(&self) -> Option<usize> {
        match *self {
            Self::Replace { origin, .. }
            | Self::Insert { origin, .. }
            | Self::Delete { origin } => Some(origin),
            Self::Prepend { .. } => None,
        }
    }

    /// The target position this operation takes its token from, if any.
    pub fn target_pos(&self) -> Option<usize> {
        match *self {
            Self::Replace { target, .. }
            | Self::Insert { target, .. }
            | Self::Prepend { target } => Some(target),
            Self::Delete { .. } => None,
        }
    }
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Replace { origin, target } => write!(f, "Replace {origin} with {target}"),
            Self::Insert { origin, target } => write!(f, "Insert {target} at position {origin}"),
            Self::Prepend { target } => write!(f, "Prepend {target}"),
            Self::Delete { origin } => write!(f, "Delete at position {origin}"),
        }
    }
}
