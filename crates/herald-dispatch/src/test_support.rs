//! Shared fixtures for unit tests.

use std::sync::Arc;

use herald_platform::{EntityService, HostServices, MemoryHost};
use herald_types::SourceId;

use crate::source::{CommandSource, HostTranslator, SenderTranslator};

/// Stand-in for a host's native sender handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSender {
    Console,
    Player(u128, &'static str),
    Entity(u128),
}

pub struct TestEntities;

impl EntityService for TestEntities {
    type Native = TestSender;

    fn resolve_identity(&self, native: &TestSender) -> Option<SourceId> {
        match native {
            TestSender::Console => None,
            TestSender::Player(id, _) | TestSender::Entity(id) => Some(SourceId::from_u128(*id)),
        }
    }

    fn is_player(&self, native: &TestSender) -> bool {
        matches!(native, TestSender::Player(..))
    }

    fn display_name(&self, native: &TestSender) -> String {
        match native {
            TestSender::Console => "Console".to_string(),
            TestSender::Player(_, name) => (*name).to_string(),
            TestSender::Entity(id) => format!("entity-{id}"),
        }
    }
}

pub fn host_services(host: &Arc<MemoryHost>) -> HostServices {
    HostServices::from_host(Arc::clone(host))
}

pub fn translator(host: &Arc<MemoryHost>) -> HostTranslator<TestEntities> {
    HostTranslator::new(TestEntities, host_services(host))
}

pub fn console(host: &Arc<MemoryHost>) -> CommandSource {
    translator(host).translate(TestSender::Console)
}

pub fn player(host: &Arc<MemoryHost>, id: u128, name: &'static str) -> CommandSource {
    translator(host).translate(TestSender::Player(id, name))
}
