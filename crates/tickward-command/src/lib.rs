//! Chat commands for Tickward.
//!
//! Features register handlers under a name with a compact parameter spec:
//!
//! ```text
//! "sound"  "i[sound]"
//! "hdoor"  "?s[element] ?i[number]"
//! "gcreate" "r[guildname]"
//! ```
//!
//! A chat line such as `/hdoor reverse 2` is split into the command token
//! and the remainder, the remainder is parsed against the [`ParamSpec`] into typed
//! [`Args`], and the handler runs. When parsing fails the caller gets a
//! usage line synthesized from the parameters (`Use: /sound <sound>`).
//!
//! There is no authorization layer: each handler checks its own
//! preconditions (logged in, owns a house, ...).

mod args;
mod error;
mod spec;
mod table;

pub use args::{ArgValue, Args};
pub use error::CommandError;
pub use spec::{Param, ParamKind, ParamSpec};
pub use table::{Command, CommandHandler, CommandScope, CommandTable};
