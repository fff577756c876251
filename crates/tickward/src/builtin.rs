//! Built-in chat commands and the main menu.

use tickward_account::{AccountError, experience_for_level};
use tickward_command::{Args, CommandScope};
use tickward_protocol::{Arg, ClientSlot, Effect, GroupId, MenuAction, MenuPage, targs};
use tickward_session::MenuBuilder;
use tracing::{debug, warn};

use crate::{Engine, TickwardError, World};

/// Page listing every chat command.
pub const COMMANDS_PAGE: MenuPage = MenuPage(1);

/// Highest sound id `/sound` accepts.
const MAX_SOUND: i64 = 40;

/// World units per map tile, for `/pos`.
const TILE_SIZE: f32 = 32.0;

type Handler = fn(&mut World, ClientSlot, &Args) -> Result<(), TickwardError>;

/// Wraps a fallible handler: precondition failures are answered in chat,
/// anything else is logged.
fn guarded(handler: Handler) -> impl Fn(&mut World, ClientSlot, &Args) + 'static {
    move |world: &mut World, slot: ClientSlot, args: &Args| {
        let Err(e) = handler(world, slot, args) else {
            return;
        };
        match e {
            TickwardError::NotLoggedIn(_) => {
                world.notify(slot, "You must be signed in to use this.", targs![]);
            }
            TickwardError::NoCharacter(_) => {
                world.notify(slot, "You need a character in the world for that.", targs![]);
            }
            other => warn!(%slot, error = %other, "command failed"),
        }
    }
}

pub(crate) fn register(engine: &mut Engine) -> Result<(), TickwardError> {
    let chat = CommandScope::Chat;
    engine.register_command("cmdlist", "", chat, "List commands", guarded(cmd_list))?;
    engine.register_command("help", "", chat, "List commands", guarded(cmd_list))?;
    engine.register_command("login", "s[username] s[password]", chat, "Sign in", guarded(cmd_login))?;
    engine.register_command("pos", "", chat, "Show your position", guarded(cmd_pos))?;
    engine.register_command("sound", "i[sound]", chat, "Play a sound", guarded(cmd_sound))?;
    engine.register_command("gcreate", "r[guildname]", chat, "Create a guild", guarded(cmd_guild_create))?;
    engine.register_command("gexit", "", chat, "Leave your guild", guarded(cmd_guild_exit))?;
    engine.register_command(
        "group",
        "?s[element] ?i[number]",
        chat,
        "Group: create, join <id>, leave, list",
        guarded(cmd_group),
    )?;
    engine.register_command("hsell", "", chat, "Sell your house", guarded(cmd_house_sell))?;

    engine.register_menu(MenuPage::MAIN, main_menu);
    engine.register_menu(COMMANDS_PAGE, commands_menu);
    Ok(())
}

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

fn main_menu(world: &World, slot: ClientSlot, menu: &mut MenuBuilder) {
    menu.header(format!("Welcome to {}", world.world_name()));
    match world.account(slot) {
        Some(account) => {
            menu.header(format!(
                "{} - Level {} ({}/{} exp)",
                account.login(),
                account.level,
                account.exp,
                experience_for_level(account.level)
            ));
        }
        None => {
            menu.header("Not signed in. Use /login <username> <password>");
        }
    }
    menu.divider();
    menu.item("Command list", MenuAction::Page(COMMANDS_PAGE));
}

fn commands_menu(world: &World, _slot: ClientSlot, menu: &mut MenuBuilder) {
    menu.header("Commands");
    for line in world.command_help() {
        menu.header(line.as_str());
    }
    menu.divider();
    menu.back_item();
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_list(world: &mut World, slot: ClientSlot, _args: &Args) -> Result<(), TickwardError> {
    let lines = world.command_help().to_vec();
    world.chat_to(slot, "Command list:", &targs![])?;
    for line in lines {
        world.chat_to(slot, "{STR}", &targs![line])?;
    }
    Ok(())
}

fn cmd_login(world: &mut World, slot: ClientSlot, args: &Args) -> Result<(), TickwardError> {
    if world.account(slot).is_some() {
        return world.chat_to(slot, "You're already signed in.", &targs![]);
    }
    let username = args.string(0).unwrap_or_default();
    let password = args.string(1).unwrap_or_default();
    world.load_account(slot, username, password)
}

fn cmd_pos(world: &mut World, slot: ClientSlot, _args: &Args) -> Result<(), TickwardError> {
    let at = world.position(slot).ok_or(TickwardError::NoCharacter(slot))?;
    let args: Vec<Arg> = targs![
        world.world_name(),
        (at.x / TILE_SIZE) as i64,
        (at.y / TILE_SIZE) as i64
    ];
    world.chat_to(slot, "[{STR}] Position X: {INT} Y: {INT}.", &args)
}

fn cmd_sound(world: &mut World, slot: ClientSlot, args: &Args) -> Result<(), TickwardError> {
    let at = world.position(slot).ok_or(TickwardError::NoCharacter(slot))?;
    let sound = args.int(0).unwrap_or_default().clamp(0, MAX_SOUND) as u32;
    world.effect(Effect::Sound { sound, at });
    Ok(())
}

fn cmd_guild_create(world: &mut World, slot: ClientSlot, args: &Args) -> Result<(), TickwardError> {
    let leader = world.require_account(slot)?.id();
    let name = args.string(0).unwrap_or_default().to_string();
    if !(3..=8).contains(&name.chars().count()) {
        return world.chat_to(slot, "Guild name must contain 3-8 characters", &targs![]);
    }
    if world
        .aggregates
        .guilds
        .iter()
        .any(|g| g.name.eq_ignore_ascii_case(&name))
    {
        return world.chat_to(slot, "A guild named {STR} already exists.", &targs![name]);
    }
    match world.aggregates.create_guild(name.as_str(), leader) {
        Ok(guild) => {
            debug!(%slot, %guild, "guild created from chat");
            world.chat_to(slot, "Guild {STR} created!", &targs![name])
        }
        Err(AccountError::AlreadyMember(_)) => {
            world.chat_to(slot, "You are already in a guild.", &targs![])
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_guild_exit(world: &mut World, slot: ClientSlot, _args: &Args) -> Result<(), TickwardError> {
    let id = world.require_account(slot)?.id();
    let Some(guild) = world.aggregates.guilds.guild_of(id).map(|g| g.id) else {
        return world.chat_to(slot, "You are not in a guild.", &targs![]);
    };
    match world.aggregates.leave_guild(guild, id) {
        Ok(()) => world.chat_to(slot, "You left the guild.", &targs![]),
        Err(AccountError::NotMember(_)) => {
            world.chat_to(slot, "The leader cannot leave the guild.", &targs![])
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_group(world: &mut World, slot: ClientSlot, args: &Args) -> Result<(), TickwardError> {
    let id = world.require_account(slot)?.id();
    let current = world.aggregates.groups.group_of(id).map(|g| g.id);

    match args.string(0).unwrap_or_default() {
        "create" => match world.aggregates.create_group(id) {
            Ok(group) => world.chat_to(slot, "Group {INT} created.", &targs![group.0]),
            Err(AccountError::AlreadyMember(_)) => {
                world.chat_to(slot, "You are already in a group.", &targs![])
            }
            Err(e) => Err(e.into()),
        },
        "join" => {
            let Some(number) = args.int(1) else {
                return world.chat_to(slot, "Use: /group join <number>", &targs![]);
            };
            match world.aggregates.join_group(GroupId(number), id) {
                Ok(()) => world.chat_to(slot, "You joined group {INT}.", &targs![number]),
                Err(AccountError::AlreadyMember(_)) => {
                    world.chat_to(slot, "You are already in a group.", &targs![])
                }
                Err(AccountError::NoSuchGroup(_)) => {
                    world.chat_to(slot, "Group {INT} does not exist.", &targs![number])
                }
                Err(e) => Err(e.into()),
            }
        }
        "leave" => {
            let Some(group) = current else {
                return world.chat_to(slot, "You are not in a group.", &targs![]);
            };
            world.aggregates.leave_group(group, id)?;
            world.chat_to(slot, "You left the group.", &targs![])
        }
        "list" => {
            let Some(group) = current.and_then(|g| world.aggregates.groups.get(g)) else {
                return world.chat_to(slot, "You are not in a group.", &targs![]);
            };
            let names = group
                .members
                .iter()
                .map(|m| {
                    world
                        .accounts
                        .get(*m)
                        .map_or_else(|| m.to_string(), |a| a.login().to_string())
                })
                .collect::<Vec<_>>()
                .join(", ");
            let leader = group.leader;
            let args: Vec<Arg> = targs![group.id.0, leader.to_string(), names];
            world.chat_to(slot, "Group {INT} (leader {STR}): {STR}", &args)
        }
        _ => world.chat_to(slot, "Use: /group create | join <number> | leave | list", &targs![]),
    }
}

fn cmd_house_sell(world: &mut World, slot: ClientSlot, _args: &Args) -> Result<(), TickwardError> {
    let Some(house) = world.require_account(slot)?.house() else {
        return world.chat_to(slot, "You have no home.", &targs![]);
    };
    let price = world.aggregates.houses.get(house).map_or(0, |h| h.price);
    world.aggregates.sell_house(house)?;
    world.chat_to(slot, "You sold your house for {VAL} gold.", &targs![price])
}
