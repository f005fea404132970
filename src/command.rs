use anyhow::{Context, Result, bail};

use crate::alarm::model::{AlarmId, normalize_alarm_time};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    Add { time: String, name: String },
    Toggle(AlarmId),
    Delete(AlarmId),
    Edit { id: AlarmId, time: String, name: String },
    Dismiss,
    List,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "\
commands:
  add HH:MM [name]        add a daily alarm
  toggle ID               switch an alarm on/off (re-arms it)
  delete ID               remove an alarm
  edit ID HH:MM [name]    change time and name
  dismiss                 silence the ringing alarm (or press Enter)
  list                    show all alarms
  quit                    leave";

/// Parses one line typed at the runtime prompt. `ringing` makes an empty
/// line mean `dismiss`.
pub fn parse_command(line: &str, ringing: bool) -> Result<Option<Command>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ringing.then_some(Command::Dismiss));
    }

    let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (trimmed, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" | "a" => {
            let (time, name) = split_first(rest);
            Command::Add {
                time: normalize_alarm_time(time)?,
                name: name.to_string(),
            }
        }
        "toggle" | "t" => Command::Toggle(parse_id(rest)?),
        "delete" | "del" | "rm" => Command::Delete(parse_id(rest)?),
        "edit" | "e" => {
            let (id, rest) = split_first(rest);
            let (time, name) = split_first(rest);
            Command::Edit {
                id: parse_id(id)?,
                time: normalize_alarm_time(time)?,
                name: name.to_string(),
            }
        }
        "dismiss" | "d" => Command::Dismiss,
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command '{other}' (type `help`)"),
    };
    Ok(Some(command))
}

fn split_first(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (text, ""),
    }
}

fn parse_id(text: &str) -> Result<AlarmId> {
    if text.is_empty() {
        bail!("missing alarm id");
    }
    text.parse::<AlarmId>()
        .with_context(|| format!("invalid alarm id '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_with_multi_word_name() {
        let command = parse_command("add 7:05 Morning run", false)
            .expect("valid")
            .expect("command");
        assert_eq!(
            command,
            Command::Add {
                time: "07:05".to_string(),
                name: "Morning run".to_string()
            }
        );
    }

    #[test]
    fn parses_edit_and_id_commands() {
        assert_eq!(
            parse_command("edit 42 09:15 Standup", false).expect("valid"),
            Some(Command::Edit {
                id: AlarmId(42),
                time: "09:15".to_string(),
                name: "Standup".to_string()
            })
        );
        assert_eq!(
            parse_command("toggle 42", false).expect("valid"),
            Some(Command::Toggle(AlarmId(42)))
        );
        assert_eq!(
            parse_command("  RM 7 ", false).expect("valid"),
            Some(Command::Delete(AlarmId(7)))
        );
    }

    #[test]
    fn empty_line_dismisses_only_while_ringing() {
        assert_eq!(parse_command("", false).expect("valid"), None);
        assert_eq!(parse_command("   ", true).expect("valid"), Some(Command::Dismiss));
    }

    #[test]
    fn reports_bad_input() {
        let err = parse_command("add 25:00", false).expect_err("bad time");
        assert!(err.to_string().contains("invalid alarm time"));
        let err = parse_command("toggle", false).expect_err("missing id");
        assert!(err.to_string().contains("missing alarm id"));
        let err = parse_command("toggle abc", false).expect_err("bad id");
        assert!(err.to_string().contains("invalid alarm id"));
        let err = parse_command("snooze", false).expect_err("unknown");
        assert!(err.to_string().contains("unknown command"));
    }
}
