use core::fmt;

use rand::Rng;

/// An opaque string naming one process instance.
///
/// It is stored as the lease value and compared on every renewal, so it must
/// differ between every pair of processes that may contend for a slot. It
/// does not need to be stable across restarts.
///
/// ```
/// use snowlease::Identity;
///
/// let a = Identity::random();
/// let b = Identity::random();
/// assert_ne!(a, b);
/// assert_eq!(Identity::new("pod-7").as_str(), "pod-7");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// 128 random bits, hex encoded.
    pub fn random() -> Self {
        let bits: u128 = rand::rng().random();
        Self(format!("{bits:032x}"))
    }

    /// `{hostname}-{pid}-{random suffix}`.
    ///
    /// The hostname is read from `HOSTNAME` (set in most container runtimes)
    /// or `COMPUTERNAME`, falling back to `localhost`. The random suffix keeps
    /// two instances distinct when pid namespaces make pids collide.
    pub fn host_pid() -> Self {
        let host = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .ok()
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| "localhost".to_owned());
        let suffix: u32 = rand::rng().random();
        Self(format!("{host}-{}-{suffix:08x}", std::process::id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(identity: String) -> Self {
        Self(identity)
    }
}

impl From<&str> for Identity {
    fn from(identity: &str) -> Self {
        Self(identity.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_pid_embeds_process_id() {
        let identity = Identity::host_pid();
        assert!(
            identity
                .as_str()
                .contains(&format!("-{}-", std::process::id()))
        );
        assert_ne!(identity, Identity::host_pid());
    }

    #[test]
    fn random_is_hex() {
        let identity = Identity::random();
        assert_eq!(identity.as_str().len(), 32);
        assert!(identity.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
