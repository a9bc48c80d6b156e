//! REPL line parsing. Anything not starting with `/` is a message to the brain.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Empty,
    Say(String),
    State,
    Skills,
    Skill { name: String, args: Value },
    Save,
    Help,
    Quit,
}

pub const HELP: &str = "\
/state                 show the live state
/skills                list self skills
/skill <name> [json]   run one skill directly, e.g. /skill get_memory_recall {\"k\": 2}
/save                  save the session now
/quit                  save and exit";

pub fn parse(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplCommand::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ReplCommand::Say(line.to_string()));
    };

    let (cmd, tail) = match rest.split_once(char::is_whitespace) {
        Some((c, t)) => (c, t.trim()),
        None => (rest, ""),
    };
    match cmd {
        "state" => Ok(ReplCommand::State),
        "skills" => Ok(ReplCommand::Skills),
        "save" => Ok(ReplCommand::Save),
        "help" => Ok(ReplCommand::Help),
        "quit" | "exit" => Ok(ReplCommand::Quit),
        "skill" => {
            let (name, json) = match tail.split_once(char::is_whitespace) {
                Some((n, j)) => (n, j.trim()),
                None => (tail, ""),
            };
            if name.is_empty() {
                return Err("usage: /skill <name> [json]".to_string());
            }
            let args = if json.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(json).map_err(|e| format!("invalid JSON arguments: {}", e))?
            };
            Ok(ReplCommand::Skill {
                name: name.to_string(),
                args,
            })
        }
        other => Err(format!("unknown command /{} (try /help)", other)),
    }
}
