//! The host-agnostic detail behind every command source.

use std::fmt;

use crate::id::SourceId;

/// What kind of thing issued a command.
///
/// Every command source is backed by exactly one of these. Hosts map their
/// own invoker hierarchy onto this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformSource {
    /// A connected player.
    Player(SourceId),
    /// A non-player entity (command block, minecart, NPC, ...).
    Entity(SourceId),
    /// The server console or any other system invoker.
    Console,
}

impl PlatformSource {
    /// Stable identity of this source. The console always maps to
    /// [`SourceId::CONSOLE`].
    pub fn id(&self) -> SourceId {
        match self {
            Self::Player(id) | Self::Entity(id) => *id,
            Self::Console => SourceId::CONSOLE,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Self::Player(_))
    }

    pub fn is_console(&self) -> bool {
        matches!(self, Self::Console)
    }

    /// Short lowercase label for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Player(_) => "player",
            Self::Entity(_) => "entity",
            Self::Console => "console",
        }
    }
}

impl fmt::Display for PlatformSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            other => write!(f, "{}:{}", other.kind_name(), other.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_has_nil_id() {
        assert_eq!(PlatformSource::Console.id(), SourceId::CONSOLE);
        assert!(PlatformSource::Console.is_console());
        assert!(!PlatformSource::Console.is_player());
    }

    #[test]
    fn entity_is_not_player() {
        let id = SourceId::from_u128(7);
        let entity = PlatformSource::Entity(id);
        assert_eq!(entity.id(), id);
        assert!(!entity.is_player());
        assert!(PlatformSource::Player(id).is_player());
    }

    #[test]
    fn display_includes_kind() {
        let p = PlatformSource::Player(SourceId::from_u128(1));
        assert_eq!(p.to_string(), "player:00000000-0000-0000-0000-000000000001");
        assert_eq!(PlatformSource::Console.to_string(), "console");
    }
}
