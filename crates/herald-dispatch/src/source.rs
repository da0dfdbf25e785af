//! Command sources and translation from host-native invoker handles.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use herald_platform::{EntityService, HostServices};
use herald_types::{HeraldError, Message, PlatformSource, Result, SourceId};

/// Whoever issued a command: a player, a non-player entity, or the console.
///
/// Carries the capabilities the dispatcher needs (identity, display name,
/// message delivery, permission checks) and keeps the host-native handle it
/// was translated from so it can be handed back to the host.
#[derive(Clone)]
pub struct CommandSource {
    detail: PlatformSource,
    name: String,
    services: HostServices,
    native: Arc<dyn Any + Send + Sync>,
}

impl CommandSource {
    pub fn new<N>(detail: PlatformSource, name: impl Into<String>, services: HostServices, native: N) -> Self
    where
        N: Any + Send + Sync,
    {
        Self {
            detail,
            name: name.into(),
            services,
            native: Arc::new(native),
        }
    }

    /// Stable identity. Not necessarily a player.
    pub fn id(&self) -> SourceId {
        self.detail.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The platform detail backing this source. Never fails.
    pub fn source(&self) -> &PlatformSource {
        &self.detail
    }

    /// Narrow to a player identity.
    pub fn player(&self) -> Result<SourceId> {
        match self.detail {
            PlatformSource::Player(id) => Ok(id),
            _ => Err(HeraldError::NotAPlayer(self.name.clone())),
        }
    }

    pub fn send_message(&self, message: impl Into<Message>) {
        self.services.send_message(&self.detail, &message.into());
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.services.has_permission(&self.detail, permission)
    }

    /// The host-native handle, if it has type `N`.
    pub fn native<N: Any>(&self) -> Option<&N> {
        self.native.downcast_ref::<N>()
    }
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSource")
            .field("detail", &self.detail)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Maps host-native invoker handles to [`CommandSource`]s and back.
///
/// Implementations hold no shared mutable state and may be called from any
/// worker thread.
pub trait SenderTranslator: Send + Sync + 'static {
    /// The host's native "who issued this" handle.
    type Native: Send + 'static;

    /// Never fails: handles without a richer identity become the console.
    fn translate(&self, native: Self::Native) -> CommandSource;

    /// Inverse of [`translate`](Self::translate).
    ///
    /// # Panics
    ///
    /// Panics if `source` was not produced by this translator.
    fn reverse(&self, source: &CommandSource) -> Self::Native;
}

/// Translator backed by a host [`EntityService`].
pub struct HostTranslator<E> {
    entities: E,
    services: HostServices,
}

impl<E> HostTranslator<E> {
    pub fn new(entities: E, services: HostServices) -> Self {
        Self { entities, services }
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }
}

impl<E> SenderTranslator for HostTranslator<E>
where
    E: EntityService + 'static,
    E::Native: Clone + Send + Sync + 'static,
{
    type Native = E::Native;

    fn translate(&self, native: E::Native) -> CommandSource {
        let detail = match self.entities.resolve_identity(&native) {
            None => PlatformSource::Console,
            Some(id) if self.entities.is_player(&native) => PlatformSource::Player(id),
            Some(id) => PlatformSource::Entity(id),
        };
        let name = self.entities.display_name(&native);
        CommandSource::new(detail, name, self.services.clone(), native)
    }

    fn reverse(&self, source: &CommandSource) -> E::Native {
        match source.native::<E::Native>() {
            Some(native) => native.clone(),
            None => panic!(
                "command source '{}' was not produced by this translator",
                source.name()
            ),
        }
    }
}
