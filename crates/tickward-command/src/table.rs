//! Command registration and dispatch.

use std::collections::BTreeMap;

use tickward_protocol::ClientSlot;
use tracing::debug;

use crate::args::Args;
use crate::error::CommandError;
use crate::spec::ParamSpec;

/// Where a command may be invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandScope {
    /// Typed by players as `/name ...` in chat.
    Chat,
    /// Operator console only. Never reachable from chat.
    Console,
}

/// Handler invoked with the context, the issuing slot, and parsed args.
pub type CommandHandler<C> = Box<dyn Fn(&mut C, ClientSlot, &Args)>;

/// A registered command.
pub struct Command<C> {
    name: String,
    spec: ParamSpec,
    scope: CommandScope,
    help: String,
    handler: CommandHandler<C>,
}

impl<C> Command<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    pub fn scope(&self) -> CommandScope {
        self.scope
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// `name <arg> [arg]`, without the leading slash.
    pub fn usage(&self) -> String {
        if self.spec.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.spec.usage())
        }
    }
}

/// All registered commands, keyed by lowercase name.
///
/// The table is kept outside the context `C` that handlers mutate, so a
/// handler can borrow the context mutably while the table is borrowed
/// shared.
pub struct CommandTable<C> {
    commands: BTreeMap<String, Command<C>>,
}

impl<C> Default for CommandTable<C> {
    fn default() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }
}

impl<C> CommandTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command. Names are matched case-insensitively.
    pub fn register<F>(
        &mut self,
        name: &str,
        spec: &str,
        scope: CommandScope,
        help: &str,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&mut C, ClientSlot, &Args) + 'static,
    {
        let key = name.to_ascii_lowercase();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(CommandError::InvalidSpec {
                spec: spec.to_string(),
                reason: format!("bad command name '{name}'"),
            });
        }
        if self.commands.contains_key(&key) {
            return Err(CommandError::Duplicate(key));
        }
        let spec = ParamSpec::parse(spec)?;
        debug!(command = %key, usage = %spec, ?scope, "command registered");
        self.commands.insert(
            key.clone(),
            Command {
                name: key,
                spec,
                scope,
                help: help.to_string(),
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Command<C>> {
        self.commands.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands in `scope`, sorted by name.
    pub fn in_scope(&self, scope: CommandScope) -> impl Iterator<Item = &Command<C>> {
        self.commands.values().filter(move |c| c.scope == scope)
    }

    /// Dispatches a chat line such as `/sound 3`.
    ///
    /// The leading `/` is optional. The token runs up to the first space;
    /// only chat-scoped commands are considered.
    pub fn dispatch_chat(&self, ctx: &mut C, slot: ClientSlot, line: &str) -> Result<(), CommandError> {
        self.dispatch(ctx, slot, CommandScope::Chat, line)
    }

    /// Dispatches a line against commands of `scope`.
    pub fn dispatch(
        &self,
        ctx: &mut C,
        slot: ClientSlot,
        scope: CommandScope,
        line: &str,
    ) -> Result<(), CommandError> {
        let body = line.strip_prefix('/').unwrap_or(line);
        let (token, rest) = body.split_once(' ').unwrap_or((body, ""));

        let command = self
            .get(token)
            .filter(|c| c.scope == scope)
            .ok_or_else(|| CommandError::NotFound(token.to_string()))?;

        let Some(args) = command.spec.parse_args(rest) else {
            debug!(%slot, command = %command.name, input = rest, "command usage error");
            return Err(CommandError::Usage {
                name: command.name.clone(),
                usage: command.spec.usage(),
            });
        };

        debug!(%slot, command = %command.name, args = args.len(), "command dispatched");
        (command.handler)(ctx, slot, &args);
        Ok(())
    }
}
