//! Screen identifiers and tab-bar ordering.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenId {
    Devices,
    Registry,
}

impl ScreenId {
    pub const ALL: [ScreenId; 2] = [Self::Devices, Self::Registry];

    pub fn number(self) -> u8 {
        match self {
            Self::Devices => 1,
            Self::Registry => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.number() == n)
    }

    /// Next screen in tab order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Devices => Self::Registry,
            Self::Registry => Self::Devices,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Devices => "Devices",
            Self::Registry => "Registry",
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_round_trip() {
        for id in ScreenId::ALL {
            assert_eq!(ScreenId::from_number(id.number()), Some(id));
        }
        assert_eq!(ScreenId::from_number(9), None);
    }

    #[test]
    fn next_wraps() {
        assert_eq!(ScreenId::Registry.next(), ScreenId::Devices);
        assert_eq!(ScreenId::Devices.next().next(), ScreenId::Devices);
    }
}
