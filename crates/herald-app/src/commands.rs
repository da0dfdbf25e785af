//! Demo commands for the console.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, bail};
use herald_dispatch::{CommandManager, CommandSpec, Permission, Scope, SenderTranslator};
use herald_platform::MemoryHost;
use herald_types::{Message, PlatformSource};

use crate::host::name_id;

/// Usage lines shown by `help`, filled once registration is done.
pub type HelpIndex = Arc<OnceLock<Vec<String>>>;

pub fn register_demo_commands<T: SenderTranslator>(
    manager: &CommandManager<T>,
    host: &Arc<MemoryHost>,
) -> herald_types::Result<HelpIndex> {
    let help: HelpIndex = Arc::new(OnceLock::new());

    let index = Arc::clone(&help);
    manager.register(
        CommandSpec::new("help")
            .description("List commands")
            .handler(move |ctx| {
                for line in index.get().map(Vec::as_slice).unwrap_or_default() {
                    ctx.reply(line.as_str());
                }
                Ok(())
            }),
    )?;

    manager.register(
        CommandSpec::new("greet|hi <name> [message:greedy]")
            .description("Say hello to someone")
            .handler(|ctx| {
                let name = ctx.str("name")?;
                match ctx.get("message") {
                    Some(message) => ctx.reply(format!("{} greets {name}: {message}", ctx.source().name())),
                    None => ctx.reply(Message::success(format!("Hello, {name}!"))),
                }
                Ok(())
            }),
    )?;

    manager.register(
        CommandSpec::new("echo <text:greedy>")
            .description("Repeat the text back")
            .handler(|ctx| {
                ctx.reply(ctx.str("text")?);
                Ok(())
            }),
    )?;

    manager.register(
        CommandSpec::new("whoami")
            .description("Show your identity")
            .scope(Scope::PlayerOnly)
            .handler(|ctx| {
                let id = ctx.source().player()?;
                ctx.reply(format!("{} ({id})", ctx.source().name()));
                Ok(())
            }),
    )?;

    manager.register(
        CommandSpec::new("purge <range:int_range>")
            .description("Delete the records in a range")
            .permission(Permission::any([
                Permission::atom("herald.purge"),
                Permission::atom("herald.admin"),
            ]))
            .confirmation(true)
            .handler(|ctx| {
                let range = ctx.range("range")?;
                ctx.reply(Message::success(format!("Purged records {range}")));
                Ok(())
            }),
    )?;

    let grants = Arc::clone(host);
    manager.register(
        CommandSpec::new("grant <player> <permission>")
            .description("Grant a permission to a simulated player")
            .scope(Scope::ConsoleOnly)
            .handler(move |ctx| {
                let player = ctx.str("player")?;
                let permission = ctx.str("permission")?;
                grants.grant(PlatformSource::Player(name_id(&player)), &permission);
                ctx.reply(Message::success(format!("Granted {permission} to {player}")));
                Ok(())
            }),
    )?;

    let revokes = Arc::clone(host);
    manager.register(
        CommandSpec::new("revoke <player> <permission>")
            .description("Revoke a permission from a simulated player")
            .scope(Scope::ConsoleOnly)
            .handler(move |ctx| {
                let player = ctx.str("player")?;
                let permission = ctx.str("permission")?;
                revokes.revoke(PlatformSource::Player(name_id(&player)), &permission);
                ctx.reply(format!("Revoked {permission} from {player}"));
                Ok(())
            }),
    )?;

    manager.register(
        CommandSpec::new("divide <a:float> <b:float>")
            .description("Divide two numbers; fails on zero")
            .handler(|ctx| {
                let (a, b) = (ctx.float("a")?, ctx.float("b")?);
                if b == 0.0 {
                    bail!("cannot divide {a} by zero");
                }
                ctx.reply(format!("{}", a / b));
                Ok(())
            }),
    )?;

    manager.register(
        CommandSpec::new("boom [reason:greedy]")
            .description("Fail on purpose")
            .handler(|ctx| {
                let reason = ctx.str("reason").unwrap_or_else(|_| "no reason".to_string());
                Err(anyhow::anyhow!("{reason}")).context("boom command failed")
            }),
    )?;

    let lines = manager
        .commands()
        .iter()
        .map(|c| match &c.meta().description {
            Some(description) => format!("{:<40} {description}", c.usage()),
            None => c.usage(),
        })
        .collect();
    let indexed = help.get_or_init(|| lines).len();
    log::debug!("help index holds {indexed} commands");
    Ok(help)
}

#[cfg(test)]
mod tests {
    use herald_dispatch::{DispatchOutcome, HostTranslator};
    use herald_platform::HostServices;
    use herald_types::ErrorKind;

    use super::*;
    use crate::host::{ConsoleEntities, ConsoleSender};

    fn console() -> (Arc<MemoryHost>, CommandManager<HostTranslator<ConsoleEntities>>) {
        let host = Arc::new(MemoryHost::new());
        let translator =
            HostTranslator::new(ConsoleEntities, HostServices::from_host(Arc::clone(&host)));
        let manager = CommandManager::builder(translator).build().unwrap();
        register_demo_commands(&manager, &host).unwrap();
        (host, manager)
    }

    fn texts(host: &MemoryHost, detail: PlatformSource) -> Vec<String> {
        host.messages_for(&detail).into_iter().map(|m| m.text).collect()
    }

    #[test]
    fn help_lists_every_command() {
        let (host, manager) = console();
        manager.dispatch("help", ConsoleSender::Operator).wait().unwrap();
        let lines = texts(&host, PlatformSource::Console);
        assert!(lines.iter().any(|l| l.starts_with("purge <range:int_range>")));
        assert!(lines.iter().any(|l| l.starts_with("whoami")));
        assert_eq!(lines.len(), manager.commands().len());
    }

    #[test]
    fn help_index_is_filled_before_it_is_returned() {
        let host = Arc::new(MemoryHost::new());
        let translator =
            HostTranslator::new(ConsoleEntities, HostServices::from_host(Arc::clone(&host)));
        let manager = CommandManager::builder(translator).build().unwrap();
        let index = register_demo_commands(&manager, &host).unwrap();
        let lines = index.get().expect("index filled");
        assert_eq!(lines.len(), manager.commands().len());
        assert!(lines.iter().any(|l| l.starts_with("help")));
    }

    #[test]
    fn greet_with_and_without_message() {
        let (host, manager) = console();
        manager.dispatch("hi Ada", ConsoleSender::Operator).wait().unwrap();
        manager
            .dispatch("greet Ada nice to meet you", ConsoleSender::Operator)
            .wait()
            .unwrap();
        assert_eq!(
            texts(&host, PlatformSource::Console),
            ["Hello, Ada!", "Console greets Ada: nice to meet you"]
        );
    }

    #[test]
    fn granted_player_can_purge_after_confirming() {
        let (host, manager) = console();
        let ada = ConsoleSender::player("Ada");
        let detail = PlatformSource::Player(name_id("Ada"));

        let err = manager.dispatch("purge 1..5", ada.clone()).wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoPermission);

        manager
            .dispatch("grant ada herald.purge", ConsoleSender::Operator)
            .wait()
            .unwrap();
        let outcome = manager.dispatch("purge 1..5", ada.clone()).wait().unwrap();
        assert_eq!(outcome, DispatchOutcome::AwaitingConfirmation);
        manager.dispatch("confirm", ada).wait().unwrap();
        assert_eq!(texts(&host, detail).last().unwrap(), "Purged records 1..5");
    }

    #[test]
    fn player_cannot_grant() {
        let (_host, manager) = console();
        let err = manager
            .dispatch("grant Grace herald.admin", ConsoleSender::player("Ada"))
            .wait()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoPermission);
    }

    #[test]
    fn whoami_needs_a_player() {
        let (host, manager) = console();
        let err = manager.dispatch("whoami", ConsoleSender::Operator).wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAPlayer);

        manager.dispatch("whoami", ConsoleSender::player("Ada")).wait().unwrap();
        let lines = texts(&host, PlatformSource::Player(name_id("Ada")));
        assert_eq!(lines, [format!("Ada ({})", name_id("Ada"))]);
    }

    #[test]
    fn divide_by_zero_is_an_execution_failure() {
        let (_host, manager) = console();
        let err = manager.dispatch("divide 1 0", ConsoleSender::Operator).wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandExecution);
        assert!(err.execution_failure().unwrap().trace().contains("cannot divide"));
    }
}
