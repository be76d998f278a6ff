//! Command line parsing.

use std::path::PathBuf;
use study_engine::StudyMode;

pub const USAGE: &str = "\
Usage: study-forge <command> [args]

Commands:
  list                                  List study sets, newest first
  show <set>                            Show a set's cards, questions and guide
  import <content.json> <title> [notes] Create a set from generated content
  restore <set.json>                    Restore an exported set
  export <set> [dir]                    Write a set to <title>_studyforge.json
  delete <set>                          Delete a set
  edit <set> title <text>               Rename a set
  edit <set> description <text>         Change a set's description
  edit <set> add-card <front> <back>    Append a card
  edit <set> card <n> <front> <back>    Rewrite card n (as numbered by `show`)
  edit <set> rm-card <n>                Remove card n
  study <set> [standard|learn|review] [--shuffle]
                                        Flip through cards; learn mode grades them
  quiz <set>                            Answer a short quiz with instant feedback
  test <set> [5|10|15|20]               Take a test, then review and submit
  stats <set>                           Mastery and score summary
  config                                Show the config file, writing defaults if missing

<set> is a set id or a unique prefix of one.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Show(String),
    Import {
        content: PathBuf,
        title: String,
        notes: Option<PathBuf>,
    },
    Restore(PathBuf),
    Export {
        set: String,
        dir: Option<PathBuf>,
    },
    Delete(String),
    Edit {
        set: String,
        action: EditAction,
    },
    Study {
        set: String,
        mode: Option<StudyMode>,
        shuffle: bool,
    },
    Quiz(String),
    Test {
        set: String,
        length: Option<usize>,
    },
    Stats(String),
    Config,
    Help,
}

/// A change to a stored set. Card numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    Title(String),
    Description(String),
    AddCard { front: String, back: String },
    UpdateCard { card: usize, front: String, back: String },
    RemoveCard(usize),
}

impl EditAction {
    fn parse(args: &[String]) -> Result<Self, String> {
        let Some((verb, rest)) = args.split_first() else {
            return Err("missing edit action: title, description, add-card, card or rm-card".to_string());
        };
        match verb.as_str() {
            "title" => {
                let title = rest.join(" ");
                if title.trim().is_empty() {
                    return Err("missing argument: <text>".to_string());
                }
                Ok(EditAction::Title(title))
            }
            "description" | "desc" => Ok(EditAction::Description(rest.join(" "))),
            "add-card" => Ok(EditAction::AddCard {
                front: required(rest, 0, "front")?,
                back: required(rest, 1, "back")?,
            }),
            "card" => Ok(EditAction::UpdateCard {
                card: card_number(&required(rest, 0, "n")?)?,
                front: required(rest, 1, "front")?,
                back: required(rest, 2, "back")?,
            }),
            "rm-card" => Ok(EditAction::RemoveCard(card_number(&required(rest, 0, "n")?)?)),
            other => Err(format!("unknown edit action: {other}")),
        }
    }
}

impl Command {
    /// Parse arguments, not including the program name.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        match name.as_str() {
            "list" | "ls" => Ok(Command::List),
            "show" => Ok(Command::Show(required(rest, 0, "set")?)),
            "import" => Ok(Command::Import {
                content: required(rest, 0, "content file")?.into(),
                title: required(rest, 1, "title")?,
                notes: rest.get(2).map(PathBuf::from),
            }),
            "restore" => Ok(Command::Restore(required(rest, 0, "set file")?.into())),
            "export" => Ok(Command::Export {
                set: required(rest, 0, "set")?,
                dir: rest.get(1).map(PathBuf::from),
            }),
            "delete" | "rm" => Ok(Command::Delete(required(rest, 0, "set")?)),
            "edit" => Ok(Command::Edit {
                set: required(rest, 0, "set")?,
                action: EditAction::parse(rest.get(1..).unwrap_or_default())?,
            }),
            "study" => {
                let set = required(rest, 0, "set")?;
                let mut mode = None;
                let mut shuffle = false;
                for arg in &rest[1..] {
                    if arg == "--shuffle" {
                        shuffle = true;
                    } else {
                        mode = Some(arg.parse::<StudyMode>().map_err(|e| e.to_string())?);
                    }
                }
                Ok(Command::Study { set, mode, shuffle })
            }
            "quiz" => Ok(Command::Quiz(required(rest, 0, "set")?)),
            "test" => {
                let length = rest
                    .get(1)
                    .map(|s| s.parse::<usize>().map_err(|_| format!("invalid test length: {s}")))
                    .transpose()?;
                Ok(Command::Test {
                    set: required(rest, 0, "set")?,
                    length,
                })
            }
            "stats" => Ok(Command::Stats(required(rest, 0, "set")?)),
            "config" => Ok(Command::Config),
            "help" | "-h" | "--help" => Ok(Command::Help),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

fn required(args: &[String], idx: usize, what: &str) -> Result<String, String> {
    args.get(idx)
        .cloned()
        .ok_or_else(|| format!("missing argument: <{what}>"))
}

fn card_number(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("invalid card number: {s}")),
    }
}
