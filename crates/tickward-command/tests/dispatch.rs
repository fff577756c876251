//! Chat dispatch through a command table.

use tickward_command::{Args, CommandError, CommandScope, CommandTable};
use tickward_protocol::ClientSlot;

#[derive(Default)]
struct Ctx {
    sounds: Vec<(ClientSlot, i64)>,
    doors: Vec<(String, Option<i64>)>,
    guilds: Vec<String>,
    shutdowns: u32,
}

fn table() -> CommandTable<Ctx> {
    let mut t = CommandTable::new();
    t.register("sound", "i[sound]", CommandScope::Chat, "Play a sound", |ctx: &mut Ctx, slot, args: &Args| {
        ctx.sounds.push((slot, args.int(0).unwrap_or_default()));
    })
    .expect("sound");
    t.register("hdoor", "?s[element] ?i[number]", CommandScope::Chat, "House doors", |ctx: &mut Ctx, _, args: &Args| {
        let element = args.string(0).unwrap_or_default().to_string();
        ctx.doors.push((element, args.int(1)));
    })
    .expect("hdoor");
    t.register("gcreate", "r[guildname]", CommandScope::Chat, "Create a guild", |ctx: &mut Ctx, _, args: &Args| {
        ctx.guilds.push(args.string(0).unwrap_or_default().to_string());
    })
    .expect("gcreate");
    t.register("shutdown", "", CommandScope::Console, "Stop the server", |ctx: &mut Ctx, _, _| {
        ctx.shutdowns += 1;
    })
    .expect("shutdown");
    t
}

#[test]
fn test_dispatch_chat_runs_handler_with_args() {
    let t = table();
    let mut ctx = Ctx::default();
    t.dispatch_chat(&mut ctx, ClientSlot(3), "/sound 12").expect("ok");
    assert_eq!(ctx.sounds, vec![(ClientSlot(3), 12)]);
}

#[test]
fn test_dispatch_chat_bad_arg_gives_usage_naming_command() {
    let t = table();
    let mut ctx = Ctx::default();
    let err = t
        .dispatch_chat(&mut ctx, ClientSlot(0), "/sound abc")
        .expect_err("usage");
    let msg = err.user_message();
    assert_eq!(msg, "Use: /sound <sound>");
    assert!(ctx.sounds.is_empty());
}

#[test]
fn test_dispatch_chat_unknown_gives_not_found_with_token() {
    let t = table();
    let mut ctx = Ctx::default();
    let err = t
        .dispatch_chat(&mut ctx, ClientSlot(0), "/doesnotexist with words")
        .expect_err("not found");
    assert_eq!(err, CommandError::NotFound("doesnotexist".into()));
    assert!(err.user_message().contains("doesnotexist"));
}

#[test]
fn test_dispatch_chat_optional_args() {
    let t = table();
    let mut ctx = Ctx::default();
    t.dispatch_chat(&mut ctx, ClientSlot(0), "/hdoor").expect("no args");
    t.dispatch_chat(&mut ctx, ClientSlot(0), "/hdoor reverse 2").expect("both");
    assert_eq!(
        ctx.doors,
        vec![(String::new(), None), ("reverse".to_string(), Some(2))]
    );
}

#[test]
fn test_dispatch_chat_rest_param_keeps_spaces() {
    let t = table();
    let mut ctx = Ctx::default();
    t.dispatch_chat(&mut ctx, ClientSlot(0), "/gcreate Night Watch").expect("ok");
    assert_eq!(ctx.guilds, vec!["Night Watch".to_string()]);
}

#[test]
fn test_dispatch_chat_console_command_not_reachable() {
    let t = table();
    let mut ctx = Ctx::default();
    let err = t
        .dispatch_chat(&mut ctx, ClientSlot(0), "/shutdown")
        .expect_err("console only");
    assert!(matches!(err, CommandError::NotFound(_)));
    t.dispatch(&mut ctx, ClientSlot(0), CommandScope::Console, "shutdown")
        .expect("console");
    assert_eq!(ctx.shutdowns, 1);
}

#[test]
fn test_dispatch_chat_case_insensitive_token() {
    let t = table();
    let mut ctx = Ctx::default();
    t.dispatch_chat(&mut ctx, ClientSlot(1), "/SOUND 4").expect("ok");
    assert_eq!(ctx.sounds.len(), 1);
}

#[test]
fn test_in_scope_lists_chat_commands_sorted() {
    let t = table();
    let names: Vec<&str> = t.in_scope(CommandScope::Chat).map(|c| c.name()).collect();
    assert_eq!(names, vec!["gcreate", "hdoor", "sound"]);
}
