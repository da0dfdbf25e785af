//! The console's notion of "who typed this".

use herald_platform::EntityService;
use herald_types::SourceId;

/// Native sender handle for the interactive console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleSender {
    /// Whoever is at the keyboard.
    Operator,
    /// A simulated player (`as <name> ...`).
    Player { id: SourceId, name: String },
}

impl ConsoleSender {
    /// A simulated player whose id is derived from the name, so the same
    /// name always maps to the same identity.
    pub fn player(name: &str) -> Self {
        Self::Player {
            id: name_id(name),
            name: name.to_string(),
        }
    }
}

/// FNV-1a over the lowercased name, widened to 128 bits.
pub fn name_id(name: &str) -> SourceId {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = name
        .to_lowercase()
        .bytes()
        .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME));
    // Never collide with the console id.
    SourceId::from_u128((u128::from(hash) << 64) | 1)
}

pub struct ConsoleEntities;

impl EntityService for ConsoleEntities {
    type Native = ConsoleSender;

    fn resolve_identity(&self, native: &ConsoleSender) -> Option<SourceId> {
        match native {
            ConsoleSender::Operator => None,
            ConsoleSender::Player { id, .. } => Some(*id),
        }
    }

    fn is_player(&self, native: &ConsoleSender) -> bool {
        matches!(native, ConsoleSender::Player { .. })
    }

    fn display_name(&self, native: &ConsoleSender) -> String {
        match native {
            ConsoleSender::Operator => "Console".to_string(),
            ConsoleSender::Player { name, .. } => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_stable_ids() {
        assert_eq!(name_id("Ada"), name_id("ada"));
        assert_ne!(name_id("Ada"), name_id("Grace"));
        assert_ne!(name_id("Ada"), SourceId::CONSOLE);
    }

    #[test]
    fn operator_has_no_identity() {
        assert_eq!(ConsoleEntities.resolve_identity(&ConsoleSender::Operator), None);
        assert!(!ConsoleEntities.is_player(&ConsoleSender::Operator));
        assert!(ConsoleEntities.is_player(&ConsoleSender::player("Ada")));
        assert_eq!(ConsoleEntities.display_name(&ConsoleSender::player("Ada")), "Ada");
    }
}
