use core::fmt;

/// Whether a [`Generator`] currently holds a lease it may issue IDs under.
///
/// [`Generator`]: crate::Generator
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// No lease is held. [`Generator::next_id`] fails with
    /// [`Error::NotRunning`] until the keepalive loop re-acquires a slot.
    ///
    /// [`Generator::next_id`]: crate::Generator::next_id
    /// [`Error::NotRunning`]: crate::Error::NotRunning
    Stopped = 0,
    /// A lease is held and IDs carry its worker id.
    Running = 1,
}

impl Status {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }

    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        })
    }
}
