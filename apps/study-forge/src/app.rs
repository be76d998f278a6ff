//! Application state and command handlers.

use crate::cli::{Command, EditAction, USAGE};
use crate::config::Config;
use crate::db::Database;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::io::{BufRead, Write};
use std::path::Path;
use study_engine::generator::import_generated;
use study_engine::scheduler::format_interval;
use study_engine::{
    EngineError, FlashcardSession, GeneratedContent, History, Question, QuizLauncher,
    ScorerState, SessionResult, SessionScorer, SetStats, StoreLedger, StudyMode, StudySet,
    StudySetStore, TestLauncher, Verdict,
};
use tracing::{debug, info};

pub struct App<R, W> {
    pub db: Database,
    pub config: Config,
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> App<R, W> {
    pub fn new(db: Database, config: Config, input: R, out: W) -> Self {
        Self {
            db,
            config,
            input,
            out,
        }
    }

    pub fn run(&mut self, command: Command) -> Result<()> {
        debug!(?command, "running command");
        match command {
            Command::List => self.list(),
            Command::Show(set) => self.show(&set),
            Command::Import {
                content,
                title,
                notes,
            } => self.import(&content, &title, notes.as_deref()),
            Command::Restore(path) => self.restore(&path),
            Command::Export { set, dir } => self.export(&set, dir.as_deref()),
            Command::Delete(set) => self.delete(&set),
            Command::Edit { set, action } => self.edit(&set, action),
            Command::Study { set, mode, shuffle } => self.study(&set, mode, shuffle),
            Command::Quiz(set) => self.quiz(&set),
            Command::Test { set, length } => self.test(&set, length),
            Command::Stats(set) => self.stats(&set),
            Command::Config => self.show_config(),
            Command::Help => {
                writeln!(self.out, "{USAGE}")?;
                Ok(())
            }
        }
    }

    /// Find a set by id or unique id prefix.
    fn resolve(&self, key: &str) -> Result<StudySet> {
        let key = key.to_lowercase();
        let mut matches: Vec<StudySet> = self
            .db
            .list()?
            .into_iter()
            .filter(|s| s.id.to_string().starts_with(&key))
            .collect();
        match matches.len() {
            0 => bail!("no study set matches '{key}'"),
            1 => Ok(matches.remove(0)),
            n => bail!("'{key}' matches {n} study sets, use a longer prefix"),
        }
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    // Set management

    fn list(&mut self) -> Result<()> {
        let sets = self.db.list()?;
        if sets.is_empty() {
            writeln!(self.out, "No study sets yet. Import one with `study-forge import`.")?;
            return Ok(());
        }
        let now = Utc::now();
        for set in sets {
            let stats = SetStats::compute(&set, now);
            writeln!(
                self.out,
                "{}  {:<32} {:>4} cards ({:>3} due) {:>4} questions  {}",
                short_id(&set),
                set.title,
                stats.total_cards,
                stats.due_now,
                stats.total_questions,
                set.created_at.format("%Y-%m-%d"),
            )?;
        }
        Ok(())
    }

    fn show(&mut self, key: &str) -> Result<()> {
        let set = self.resolve(key)?;
        let now = Utc::now();
        writeln!(self.out, "{} ({})", set.title, set.id)?;
        if !set.description.is_empty() {
            writeln!(self.out, "{}", set.description)?;
        }
        if !set.tags.is_empty() {
            writeln!(self.out, "Tags: {}", set.tags.join(", "))?;
        }
        if !set.source_snippet.is_empty() {
            writeln!(self.out, "Source: {}", set.source_snippet)?;
        }

        writeln!(self.out, "\nFlashcards:")?;
        for (i, card) in set.flashcards.iter().enumerate() {
            let due = format_interval((card.next_review_at - now).num_days());
            writeln!(
                self.out,
                "{:>3}. [{}] {} => {} (due {due})",
                i + 1,
                card.mastery,
                card.front,
                card.back,
            )?;
        }

        writeln!(self.out, "\nQuestions:")?;
        for (i, q) in set.questions.iter().enumerate() {
            writeln!(self.out, "{:>3}. ({}) {}", i + 1, q.kind.name(), q.prompt)?;
        }

        if !set.study_guide.is_empty() {
            writeln!(self.out, "\nStudy guide:\n{}", set.study_guide)?;
        }

        if !set.results.is_empty() {
            writeln!(self.out, "\nHistory:")?;
            for result in History::of(&set).iter() {
                self.print_history_line(result)?;
            }
        }
        Ok(())
    }

    fn import(&mut self, content: &Path, title: &str, notes: Option<&Path>) -> Result<()> {
        let raw = std::fs::read_to_string(content)
            .with_context(|| format!("reading {}", content.display()))?;
        let generated: GeneratedContent = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", content.display()))?;
        let notes = notes
            .map(|p| {
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
            })
            .transpose()?;

        let set = import_generated(title, notes.as_deref(), generated, Utc::now());
        if set.title.is_empty() {
            bail!("a study set needs a title");
        }
        self.db.put(&set)?;
        info!(set = %set.id, "imported study set");
        writeln!(
            self.out,
            "Created '{}' ({}) with {} cards and {} questions.",
            set.title,
            short_id(&set),
            set.flashcards.len(),
            set.questions.len()
        )?;
        Ok(())
    }

    fn restore(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let set: StudySet = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        self.db.put(&set)?;
        writeln!(self.out, "Restored '{}' ({}).", set.title, short_id(&set))?;
        Ok(())
    }

    fn export(&mut self, key: &str, dir: Option<&Path>) -> Result<()> {
        let set = self.resolve(key)?;
        let path = dir.unwrap_or_else(|| Path::new(".")).join(set.export_file_name());
        let json = serde_json::to_string_pretty(&set)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        writeln!(self.out, "Exported to {}", path.display())?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let set = self.resolve(key)?;
        self.db.delete(set.id)?;
        writeln!(self.out, "Deleted '{}'.", set.title)?;
        Ok(())
    }

    fn edit(&mut self, key: &str, action: EditAction) -> Result<()> {
        let mut set = self.resolve(key)?;
        let message = match action {
            EditAction::Title(title) => {
                set.set_title(title)?;
                format!("Renamed to '{}'.", set.title)
            }
            EditAction::Description(description) => {
                set.description = description.trim().to_string();
                "Description updated.".to_string()
            }
            EditAction::AddCard { front, back } => {
                let id = set.add_card(Utc::now());
                set.update_card(id, front, back)?;
                format!("Added card {}.", set.flashcards.len())
            }
            EditAction::UpdateCard { card, front, back } => {
                let id = card_id(&set, card)?;
                set.update_card(id, front, back)?;
                format!("Updated card {card}.")
            }
            EditAction::RemoveCard(card) => {
                let id = card_id(&set, card)?;
                let removed = set.remove_card(id)?;
                format!("Removed card {card} ({}).", removed.front)
            }
        };
        self.db.put(&set)?;
        info!(set = %set.id, "edited study set");
        writeln!(self.out, "{message}")?;
        Ok(())
    }

    // Flashcards

    fn study(&mut self, key: &str, mode: Option<StudyMode>, shuffle: bool) -> Result<()> {
        let set = self.resolve(key)?;
        let mode = mode.unwrap_or(self.config.study.default_mode);
        let mut session = FlashcardSession::new(&set, mode, Utc::now());
        if shuffle || self.config.study.shuffle {
            session.shuffle(&mut rand::thread_rng());
        }
        if session.is_empty() {
            writeln!(self.out, "No cards to study in {mode} mode.")?;
            return Ok(());
        }

        writeln!(
            self.out,
            "Studying '{}' in {mode} mode, {} cards.",
            set.title,
            session.len()
        )?;
        while !session.is_finished() {
            let Some(card) = session.current().cloned() else {
                break;
            };
            writeln!(self.out, "\n[{}/{}] {}", session.position() + 1, session.len(), card.front)?;
            let prompt = if session.is_flipped() {
                writeln!(self.out, "    {}", card.back)?;
                if mode.is_graded() {
                    "Did you know it? [y/n] (p back, q quit): "
                } else {
                    "[Enter] next, p back, q quit: "
                }
            } else {
                "[Enter] flip, p back, q quit: "
            };

            let Some(line) = self.read_line(prompt)? else {
                break;
            };
            let cmd = line.trim().to_lowercase();
            match cmd.as_str() {
                "q" => break,
                "p" => {
                    session.prev();
                }
                "y" | "n" if session.is_flipped() && mode.is_graded() => {
                    let updated =
                        session.grade_and_commit(&mut self.db, cmd == "y", Utc::now())?;
                    writeln!(
                        self.out,
                        "    Box {}, next review in {}.",
                        updated.mastery,
                        format_interval(study_engine::interval_days(updated.mastery))
                    )?;
                }
                _ if !session.is_flipped() => session.flip(),
                _ if !mode.is_graded() => session.next(),
                _ => {}
            }
        }

        if mode.is_graded() {
            writeln!(
                self.out,
                "\nReviewed {} cards, {} correct.",
                session.reviewed(),
                session.correct()
            )?;
        }
        Ok(())
    }

    // Quiz and test

    fn quiz(&mut self, key: &str) -> Result<()> {
        let set = self.resolve(key)?;
        let launcher = QuizLauncher::new(self.config.study.quiz_length);
        let mut scorer = match launcher.start(&set, &mut rand::thread_rng()) {
            Err(EngineError::EmptySession) => {
                writeln!(self.out, "'{}' has no questions.", set.title)?;
                return Ok(());
            }
            other => other?,
        };

        while let Some(question) = scorer.current().cloned() {
            writeln!(
                self.out,
                "\nQuestion {}/{}",
                scorer.cursor() + 1,
                scorer.questions().len()
            )?;
            let Some(answer) = self.ask(&question)? else {
                writeln!(self.out, "\nQuiz abandoned, no result saved.")?;
                return Ok(());
            };

            if scorer.answer(answer)?.counts() {
                writeln!(self.out, "Correct!")?;
                self.explain(&question)?;
            } else {
                writeln!(self.out, "Incorrect. Answer: {}", question.expected_answer)?;
                self.explain(&question)?;
                let choice = self.read_line("[o] I was right, [Enter] continue: ")?;
                if choice.is_some_and(|c| c.trim().eq_ignore_ascii_case("o")) {
                    scorer.mark_correct(question.id);
                    writeln!(self.out, "Marked correct.")?;
                }
            }

            let mut ledger = StoreLedger::new(&mut self.db, set.id);
            if let Some(result) = scorer.next(Utc::now(), &mut ledger)? {
                self.print_result(&result)?;
                let choice = self.read_line("[r] retake same quiz, [Enter] done: ")?;
                if choice.is_some_and(|c| c.trim().eq_ignore_ascii_case("r")) {
                    scorer = SessionScorer::quiz(scorer.questions().to_vec())?;
                }
            }
        }
        Ok(())
    }

    fn test(&mut self, key: &str, length: Option<usize>) -> Result<()> {
        let set = self.resolve(key)?;
        let launcher = TestLauncher::new(length.unwrap_or(self.config.study.test_length))?;
        let mut scorer = match launcher.start(&set, None, &mut rand::thread_rng()) {
            Err(EngineError::EmptySession) => {
                writeln!(self.out, "'{}' has no questions.", set.title)?;
                return Ok(());
            }
            other => other?,
        };

        let total = scorer.questions().len();
        let questions = scorer.questions().to_vec();
        for (i, question) in questions.iter().enumerate() {
            writeln!(self.out, "\nQuestion {}/{total}", i + 1)?;
            let Some(answer) = self.ask_allow_blank(question)? else {
                writeln!(self.out, "\nTest abandoned, no result saved.")?;
                return Ok(());
            };
            scorer.set_answer(question.id, answer)?;
        }

        while scorer.state() == ScorerState::InProgress {
            match scorer.submit() {
                Ok(()) => {}
                Err(e @ EngineError::Unanswered { .. }) => {
                    writeln!(self.out, "\n{e}")?;
                    for question in &questions {
                        let blank = scorer
                            .answer_for(question.id)
                            .map_or(true, study_engine::evaluator::is_blank);
                        if !blank {
                            continue;
                        }
                        let Some(answer) = self.ask_allow_blank(question)? else {
                            writeln!(self.out, "\nTest abandoned, no result saved.")?;
                            return Ok(());
                        };
                        scorer.set_answer(question.id, answer)?;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.review(&mut scorer)?;
        let mut ledger = StoreLedger::new(&mut self.db, set.id);
        let result = scorer.finalize(Utc::now(), &mut ledger)?;
        self.print_result(&result)?;
        Ok(())
    }

    /// Show every verdict and take overrides until the learner is done.
    fn review(&mut self, scorer: &mut SessionScorer) -> Result<()> {
        loop {
            writeln!(self.out, "\nReview ({} / {}):", scorer.score(), scorer.questions().len())?;
            for (i, q) in scorer.questions().iter().enumerate() {
                let mark = match scorer.verdict(q.id) {
                    Some(Verdict::Correct) => "correct",
                    Some(Verdict::Overridden) => "marked correct",
                    _ => "incorrect",
                };
                writeln!(
                    self.out,
                    "{:>3}. {} | yours: {} | answer: {} [{mark}]",
                    i + 1,
                    q.prompt,
                    scorer.answer_for(q.id).unwrap_or(""),
                    q.expected_answer,
                )?;
            }

            let Some(line) = self.read_line("Number to mark correct, [Enter] to finish: ")? else {
                return Ok(());
            };
            let line = line.trim();
            if line.is_empty() {
                return Ok(());
            }
            let id = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| scorer.questions().get(i))
                .map(|q| q.id);
            match id {
                Some(id) if scorer.mark_correct(id) => {}
                Some(_) => writeln!(self.out, "Only incorrect answers can be marked correct.")?,
                None => writeln!(self.out, "No question {line}.")?,
            }
        }
    }

    /// Ask until a non-blank answer is given. `None` on end of input.
    fn ask(&mut self, question: &Question) -> Result<Option<String>> {
        loop {
            match self.ask_allow_blank(question)? {
                Some(a) if study_engine::evaluator::is_blank(&a) => {}
                other => return Ok(other),
            }
        }
    }

    fn ask_allow_blank(&mut self, question: &Question) -> Result<Option<String>> {
        writeln!(self.out, "{}", question.prompt)?;
        let choices = question.choices();
        for (i, choice) in choices.iter().enumerate() {
            writeln!(self.out, "  {}) {choice}", i + 1)?;
        }
        let Some(line) = self.read_line("> ")? else {
            return Ok(None);
        };
        Ok(Some(pick_choice(&choices, &line)))
    }

    fn explain(&mut self, question: &Question) -> Result<()> {
        if !question.explanation.is_empty() {
            writeln!(self.out, "{}", question.explanation)?;
        }
        Ok(())
    }

    fn print_result(&mut self, result: &SessionResult) -> Result<()> {
        writeln!(
            self.out,
            "\n{} finished: {}/{} ({}%) at {} difficulty.",
            result.mode,
            result.score,
            result.total_questions,
            result.percentage(),
            result.difficulty
        )?;
        Ok(())
    }

    fn show_config(&mut self) -> Result<()> {
        let Some(path) = Config::config_path() else {
            bail!("no config directory on this platform");
        };
        if !path.exists() {
            self.config.save()?;
            info!(path = %path.display(), "wrote default config");
        }
        writeln!(self.out, "{}", path.display())?;
        writeln!(self.out, "{}", toml::to_string_pretty(&self.config)?)?;
        Ok(())
    }

    // Stats

    fn stats(&mut self, key: &str) -> Result<()> {
        let set = self.resolve(key)?;
        let stats = SetStats::compute(&set, Utc::now());
        writeln!(self.out, "{}", set.title)?;
        writeln!(
            self.out,
            "Cards: {} ({} due, {} new or struggling, {} mastered, {:.0}%)",
            stats.total_cards,
            stats.due_now,
            stats.new_or_struggling,
            stats.mastered,
            stats.mastery_ratio() * 100.0
        )?;
        let levels: Vec<String> = stats
            .by_level
            .iter()
            .enumerate()
            .map(|(level, n)| format!("{level}:{n}"))
            .collect();
        writeln!(self.out, "Boxes: {}", levels.join(" "))?;
        writeln!(self.out, "Questions: {}", stats.total_questions)?;

        let history = History::of(&set);
        if history.is_empty() {
            writeln!(self.out, "No quiz or test results yet.")?;
            return Ok(());
        }
        if let Some(avg) = stats.average_percentage {
            writeln!(self.out, "Results: {} (average {avg:.0}%)", history.len())?;
        }
        if let Some(best) = history.best() {
            writeln!(
                self.out,
                "Best: {}% ({} on {})",
                best.percentage(),
                best.mode,
                best.date.format("%Y-%m-%d")
            )?;
        }
        for result in history.iter().rev().take(5) {
            self.print_history_line(result)?;
        }
        Ok(())
    }

    fn print_history_line(&mut self, result: &SessionResult) -> Result<()> {
        writeln!(
            self.out,
            "  {} {:<4} {}/{} ({}%)",
            result.date.format("%Y-%m-%d %H:%M"),
            result.mode,
            result.score,
            result.total_questions,
            result.percentage()
        )?;
        Ok(())
    }
}

/// Id of the 1-based card `n`, as numbered by `show`.
fn card_id(set: &StudySet, n: usize) -> Result<study_engine::CardId> {
    match n.checked_sub(1).and_then(|i| set.flashcards.get(i)) {
        Some(card) => Ok(card.id),
        None => bail!("'{}' has no card {n}", set.title),
    }
}

fn short_id(set: &StudySet) -> String {
    set.id.to_string()[..8].to_string()
}

/// Map a typed number or case-insensitive option text onto the option itself.
fn pick_choice(choices: &[String], input: &str) -> String {
    let input = input.trim();
    if let Some(choice) = input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| choices.get(i))
    {
        return choice.clone();
    }
    choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(input))
        .cloned()
        .unwrap_or_else(|| input.to_string())
}
