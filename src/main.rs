use std::{error::Error, sync::Arc, time::Duration};

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use chrono::Utc;
use mathmate::{
    config::Config,
    equation::{extract_equation, GraphRequest, PRESETS},
    games::{
        arithmetic::{parse_answer, AlgebraAdventure, SpeedAnswer, SpeedMath},
        geometry::GeometryQuest,
        memory::{parse_pair, MathMemory},
        pattern::PatternPuzzle,
        record_game,
        tile_merge::{Direction, TilePuzzle},
        xp_for_score, GameReport,
    },
    mock_test::{total_marks, BlueprintEntry},
    progress::{
        ActivityKind, JsonFileStore, NewActivity, ProgressManager, UserProgress, PROBLEM_XP,
        SUBJECT_CATALOG,
    },
    quiz::{
        ai_helper::{AiError, MathHelper, Persona},
        Difficulty, Quiz, PASS_PERCENTAGE,
    },
};
use rand::{rngs::StdRng, SeedableRng};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, ParseMode},
};

type MathDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;
type DialogueStorage = Arc<ErasedStorage<State>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Menu,
    TileMerge {
        puzzle: TilePuzzle,
    },
    Pattern {
        puzzle: PatternPuzzle,
    },
    Algebra {
        game: AlgebraAdventure,
    },
    SpeedMath {
        game: SpeedMath,
    },
    Geometry {
        quest: GeometryQuest,
    },
    Memory {
        game: MathMemory,
    },
    ReceiveQuizTopic,
    Quiz {
        quiz: Quiz,
    },
    ReceiveTestPlan,
    ProblemSolver,
    Graph,
}

const QUIZ_LENGTH: usize = 5;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    pretty_env_logger::init();
    log::info!("Starting MathMate bot...");

    if let Err(e) = run(config).await {
        log::error!("Bot stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn Error + Send + Sync>> {
    let bot = Bot::from_env();

    log::info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: DialogueStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await?
        .erase();

    let gpt = {
        let mut gpt = ChatGPT::new(config.chatgpt_api_key.clone())?;

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = Duration::from_secs(15);

        gpt
    };
    let helper = Arc::new(MathHelper::new(gpt, Persona::Friendly, config.retry));
    let config = Arc::new(config);

    let handler = Update::filter_message()
        .inspect(count_daily_visit)
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(dptree::case![State::Start].endpoint(start))
        .branch(dptree::case![State::Menu].endpoint(menu))
        .branch(dptree::case![State::TileMerge { puzzle }].endpoint(tile_merge))
        .branch(dptree::case![State::Pattern { puzzle }].endpoint(pattern))
        .branch(dptree::case![State::Algebra { game }].endpoint(algebra))
        .branch(dptree::case![State::SpeedMath { game }].endpoint(speed_math))
        .branch(dptree::case![State::Geometry { quest }].endpoint(geometry))
        .branch(dptree::case![State::Memory { game }].endpoint(memory))
        .branch(dptree::case![State::ReceiveQuizTopic].endpoint(receive_quiz_topic))
        .branch(dptree::case![State::Quiz { quiz }].endpoint(quiz_answer))
        .branch(dptree::case![State::ReceiveTestPlan].endpoint(receive_test_plan))
        .branch(dptree::case![State::ProblemSolver].endpoint(problem_solver))
        .branch(dptree::case![State::Graph].endpoint(graph));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, config, helper])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

fn progress_for(config: &Config, chat: ChatId) -> ProgressManager<JsonFileStore> {
    ProgressManager::new(JsonFileStore::for_profile(&config.data_dir, &chat.0.to_string()))
}

/// Runs ahead of every state, so a day spent only in the menu or a game
/// still counts towards the streak.
fn count_daily_visit(msg: Message, config: Arc<Config>) {
    let chat = msg.chat.id;
    match progress_for(&config, chat).record_daily_visit() {
        Ok(Some(snapshot)) => {
            log::info!("Chat {} is back today, streak {}", chat.0, snapshot.streak)
        }
        Ok(None) => {}
        Err(e) => log::warn!("Could not record the visit of chat {}: {}", chat.0, e),
    }
}

fn text_of(msg: &Message) -> String {
    msg.text().unwrap_or_default().trim().to_string()
}

const NUMBER_MAZE: &str = "Number Maze";
const PATTERN_PUZZLE: &str = "Pattern Puzzle";
const ALGEBRA_ADVENTURE: &str = "Algebra Adventure";
const SPEED_MATH: &str = "Speed Math";
const GEOMETRY_QUEST: &str = "Geometry Quest";
const MATH_MEMORY: &str = "Math Memory";
const TAKE_QUIZ: &str = "Take a quiz";
const MOCK_TEST: &str = "Mock test";
const SOLVE_PROBLEM: &str = "Solve a problem";
const GRAPH_EQUATION: &str = "Graph an equation";
const MY_PROGRESS: &str = "My progress";
const BACK: &str = "Back to menu";
const HINT: &str = "Hint";
const PRACTICE: &str = "Practice";

fn menu_keyboard() -> KeyboardMarkup {
    let labels = [
        NUMBER_MAZE,
        PATTERN_PUZZLE,
        ALGEBRA_ADVENTURE,
        SPEED_MATH,
        GEOMETRY_QUEST,
        MATH_MEMORY,
        TAKE_QUIZ,
        MOCK_TEST,
        SOLVE_PROBLEM,
        GRAPH_EQUATION,
        MY_PROGRESS,
    ];
    KeyboardMarkup::new(
        labels
            .chunks(2)
            .map(|row| row.iter().map(|l| KeyboardButton::new(*l)).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    )
}

fn keyboard(rows: &[&[&str]]) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.iter()
            .map(|row| row.iter().map(|l| KeyboardButton::new(*l)).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    )
}

/// One button per row.
fn column_keyboard<'a>(labels: impl IntoIterator<Item = &'a str>) -> KeyboardMarkup {
    KeyboardMarkup::new(
        labels
            .into_iter()
            .map(|l| vec![KeyboardButton::new(l)])
            .collect::<Vec<_>>(),
    )
}

fn back_keyboard() -> KeyboardMarkup {
    keyboard(&[&[BACK]])
}

async fn back_to_menu(bot: &Bot, dialogue: &MathDialogue, chat: ChatId, text: String) -> HandlerResult {
    bot.send_message(chat, text)
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::Menu).await?;
    Ok(())
}

const GREETING_TEXT: &str = "Hi! I'm MathMate. Pick a game, take a quiz or send me a problem to solve.";
async fn start(bot: Bot, dialogue: MathDialogue, config: Arc<Config>, msg: Message) -> HandlerResult {
    let progress = progress_for(&config, msg.chat.id);
    let snapshot = progress.ensure_first_login_achievement()?;
    log::info!(
        "Chat {} started a session, streak {}",
        msg.chat.id.0,
        snapshot.streak
    );

    bot.send_message(
        msg.chat.id,
        format!(
            "{}\n\nLevel {} | {} day streak",
            GREETING_TEXT, snapshot.level, snapshot.streak
        ),
    )
    .reply_markup(menu_keyboard())
    .await?;

    dialogue.update(State::Menu).await?;
    Ok(())
}

async fn menu(bot: Bot, dialogue: MathDialogue, config: Arc<Config>, msg: Message) -> HandlerResult {
    let chat = msg.chat.id;
    let mut rng = StdRng::from_entropy();
    match text_of(&msg).as_str() {
        "/start" => return start(bot, dialogue, config, msg).await,
        NUMBER_MAZE => {
            let now = Utc::now();
            let puzzle = TilePuzzle::new(now, config.puzzle_seconds, &mut rng);
            bot.send_message(
                chat,
                format!(
                    "Slide the tiles and merge equal numbers. You have {} seconds.\n{}",
                    config.puzzle_seconds,
                    board(&puzzle, now)
                ),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(direction_keyboard())
            .await?;
            dialogue.update(State::TileMerge { puzzle }).await?;
        }
        PATTERN_PUZZLE => {
            let puzzle = PatternPuzzle::new(&mut rng);
            bot.send_message(chat, format!("What comes next?\n\n{}", pattern_round(&puzzle)))
                .reply_markup(keyboard(&[&[HINT], &[BACK]]))
                .await?;
            dialogue.update(State::Pattern { puzzle }).await?;
        }
        ALGEBRA_ADVENTURE => {
            let game = AlgebraAdventure::new(&mut rng);
            bot.send_message(chat, format!("Solve for x: {}", game.current()))
                .reply_markup(back_keyboard())
                .await?;
            dialogue.update(State::Algebra { game }).await?;
        }
        SPEED_MATH => {
            let game = SpeedMath::new(Utc::now(), &mut rng);
            bot.send_message(chat, format!("Quick, 30 seconds!\n{}", game.current()))
                .reply_markup(back_keyboard())
                .await?;
            dialogue.update(State::SpeedMath { game }).await?;
        }
        GEOMETRY_QUEST => {
            let quest = GeometryQuest::new(&mut rng);
            bot.send_message(chat, geometry_round(&quest))
                .reply_markup(back_keyboard())
                .await?;
            dialogue.update(State::Geometry { quest }).await?;
        }
        MATH_MEMORY => {
            let game = MathMemory::new(&mut rng);
            bot.send_message(
                chat,
                format!(
                    "Match each sum with its value. Send two card numbers, like 3 7.\n\n{}",
                    memory_round(&game)
                ),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(back_keyboard())
            .await?;
            dialogue.update(State::Memory { game }).await?;
        }
        TAKE_QUIZ => {
            let topics = column_keyboard(
                SUBJECT_CATALOG
                    .iter()
                    .map(|(name, _)| *name)
                    .chain([PRACTICE, BACK]),
            );
            bot.send_message(chat, "Which topic?")
                .reply_markup(topics)
                .await?;
            dialogue.update(State::ReceiveQuizTopic).await?;
        }
        MOCK_TEST => {
            bot.send_message(
                chat,
                "Send the test plan. The first line is your level and the number of questions, \
                then one line per topic with its questions, difficulty (1-5) and marks per question:\n\n\
                high school, 5\nalgebra, 3, 2, 1\ngeometry, 2, 4, 2",
            )
            .reply_markup(back_keyboard())
            .await?;
            dialogue.update(State::ReceiveTestPlan).await?;
        }
        SOLVE_PROBLEM => {
            bot.send_message(chat, "Send me a math problem and I'll work through it step by step.")
                .reply_markup(back_keyboard())
                .await?;
            dialogue.update(State::ProblemSolver).await?;
        }
        GRAPH_EQUATION => {
            let presets = column_keyboard(PRESETS.iter().map(|(name, _)| *name).chain([BACK]));
            bot.send_message(chat, "Send an equation like y = x^2, or pick one:")
                .reply_markup(presets)
                .await?;
            dialogue.update(State::Graph).await?;
        }
        MY_PROGRESS => {
            let snapshot = progress_for(&config, chat).load();
            bot.send_message(chat, progress_report(&snapshot))
                .reply_markup(menu_keyboard())
                .await?;
        }
        _ => {
            bot.send_message(chat, "Please pick one of the options")
                .reply_markup(menu_keyboard())
                .await?;
        }
    }
    Ok(())
}

fn progress_report(p: &UserProgress) -> String {
    let mut report = format!(
        "Level {} ({}/{} XP)\nStreak: {} days\nQuizzes passed: {} | Problems solved: {}\n\nSubjects:",
        p.level, p.xp, p.total_xp, p.streak, p.quizzes_passed, p.problems_solved
    );
    for (name, subject) in &p.subject_progress {
        report.push_str(&format!("\n- {}: {}/{}", name, subject.completed, subject.total));
    }

    let earned: Vec<&str> = p
        .achievements
        .iter()
        .filter(|a| a.earned)
        .map(|a| a.name.as_str())
        .collect();
    report.push_str("\n\nAchievements: ");
    if earned.is_empty() {
        report.push_str("none yet");
    } else {
        report.push_str(&earned.join(", "));
    }

    let week: Vec<String> = p
        .weekly_stats
        .iter()
        .map(|(day, n)| format!("{} {}", day, n))
        .collect();
    report.push_str(&format!("\nThis week: {}", week.join(", ")));

    if !p.recent_activity.is_empty() {
        report.push_str("\n\nRecent:");
        for activity in &p.recent_activity {
            match &activity.score {
                Some(score) => report.push_str(&format!("\n- {} ({})", activity.title, score)),
                None => report.push_str(&format!("\n- {}", activity.title)),
            }
        }
    }
    report
}

async fn finish_game(
    bot: &Bot,
    dialogue: &MathDialogue,
    config: &Config,
    chat: ChatId,
    report: &GameReport,
) -> HandlerResult {
    let progress = progress_for(config, chat);
    let level_before = progress.load().level;
    let snapshot = record_game(&progress, report)?;

    let mut text = format!(
        "{} over! Final score: {} (+{} XP)",
        report.kind.title(),
        report.score,
        xp_for_score(report.score)
    );
    if snapshot.level > level_before {
        text.push_str(&format!("\nLevel up! You are now level {}.", snapshot.level));
    }
    back_to_menu(bot, dialogue, chat, text).await
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "Up",
        Direction::Down => "Down",
        Direction::Left => "Left",
        Direction::Right => "Right",
    }
}

fn direction_from(text: &str) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|d| direction_label(*d).eq_ignore_ascii_case(text))
}

fn direction_keyboard() -> KeyboardMarkup {
    keyboard(&[&["Up"], &["Left", "Right"], &["Down"], &[BACK]])
}

fn board(puzzle: &TilePuzzle, now: chrono::DateTime<Utc>) -> String {
    format!(
        "<pre>{}</pre>Score: {} | Moves: {} | {}s left",
        puzzle,
        puzzle.score(),
        puzzle.moves(),
        puzzle.remaining(now).num_seconds()
    )
}

async fn tile_merge(
    bot: Bot,
    dialogue: MathDialogue,
    config: Arc<Config>,
    mut puzzle: TilePuzzle,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let now = Utc::now();
    let text = text_of(&msg);

    if text == BACK {
        return match puzzle.abandon() {
            Some(report) => finish_game(&bot, &dialogue, &config, chat, &report).await,
            None => back_to_menu(&bot, &dialogue, chat, "See you next time!".to_string()).await,
        };
    }
    let Some(direction) = direction_from(&text) else {
        bot.send_message(chat, "Use the arrow buttons to move the tiles.")
            .reply_markup(direction_keyboard())
            .await?;
        return Ok(());
    };

    let summary = puzzle.apply_move(direction, now, &mut StdRng::from_entropy());
    for achievement in &summary.unlocked {
        bot.send_message(chat, format!("Achievement unlocked: {}", achievement.name()))
            .await?;
    }
    if let Some(report) = summary.finished {
        bot.send_message(chat, board(&puzzle, now))
            .parse_mode(ParseMode::Html)
            .await?;
        return finish_game(&bot, &dialogue, &config, chat, &report).await;
    }
    if !summary.moved {
        bot.send_message(chat, "Nothing moves that way, try another direction.")
            .await?;
        return Ok(());
    }

    let mut reply = board(&puzzle, now);
    if summary.combo_bonus > 0 {
        reply.push_str(&format!(
            "\nCombo x{}! +{} bonus",
            puzzle.combo(),
            summary.combo_bonus
        ));
    }
    bot.send_message(chat, reply)
        .parse_mode(ParseMode::Html)
        .reply_markup(direction_keyboard())
        .await?;
    dialogue.update(State::TileMerge { puzzle }).await?;
    Ok(())
}

fn pattern_round(puzzle: &PatternPuzzle) -> String {
    let terms: Vec<String> = puzzle.sequence().iter().map(|t| t.to_string()).collect();
    format!(
        "Level {} | Lives {} | Hints {}\n{}, ?",
        puzzle.level(),
        puzzle.lives(),
        puzzle.hints_left(),
        terms.join(", ")
    )
}

async fn pattern(
    bot: Bot,
    dialogue: MathDialogue,
    config: Arc<Config>,
    mut puzzle: PatternPuzzle,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    match text.as_str() {
        BACK => {
            return match puzzle.abandon() {
                Some(report) => finish_game(&bot, &dialogue, &config, chat, &report).await,
                None => back_to_menu(&bot, &dialogue, chat, "See you next time!".to_string()).await,
            };
        }
        HINT => {
            let reply = match puzzle.hint() {
                Some(hint) => format!("Hint: {}", hint),
                None => "No hints left.".to_string(),
            };
            bot.send_message(chat, reply).await?;
            dialogue.update(State::Pattern { puzzle }).await?;
            return Ok(());
        }
        _ => {}
    }

    let Ok(guess) = text.parse::<u64>() else {
        bot.send_message(chat, "Type the next number in the sequence.")
            .await?;
        return Ok(());
    };

    let verdict = puzzle.answer(guess, &mut StdRng::from_entropy());
    let mut reply = if verdict.correct {
        format!("Correct! +{} points", verdict.awarded)
    } else {
        format!(
            "Not quite, it was {}. Lives left: {}",
            verdict.expected, verdict.lives_left
        )
    };
    if let Some(report) = verdict.finished {
        bot.send_message(chat, reply).await?;
        return finish_game(&bot, &dialogue, &config, chat, &report).await;
    }

    reply.push_str("\n\n");
    reply.push_str(&pattern_round(&puzzle));
    bot.send_message(chat, reply)
        .reply_markup(keyboard(&[&[HINT], &[BACK]]))
        .await?;
    dialogue.update(State::Pattern { puzzle }).await?;
    Ok(())
}

async fn algebra(
    bot: Bot,
    dialogue: MathDialogue,
    config: Arc<Config>,
    mut game: AlgebraAdventure,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return finish_game(&bot, &dialogue, &config, chat, &game.finish()).await;
    }

    let Some(value) = parse_answer(&text) else {
        bot.send_message(chat, "Send a number, like 3 or x = 7/2").await?;
        return Ok(());
    };

    let reply = if game.answer(value, &mut StdRng::from_entropy()) {
        format!(
            "Correct! Solved {} so far.\nSolve for x: {}",
            game.solved(),
            game.current()
        )
    } else {
        format!("Not quite, try again.\nSolve for x: {}", game.current())
    };
    bot.send_message(chat, reply)
        .reply_markup(back_keyboard())
        .await?;
    dialogue.update(State::Algebra { game }).await?;
    Ok(())
}

async fn speed_math(
    bot: Bot,
    dialogue: MathDialogue,
    config: Arc<Config>,
    mut game: SpeedMath,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let now = Utc::now();
    let text = text_of(&msg);

    if let Some(report) = game.expire(now) {
        bot.send_message(chat, "Time's up!").await?;
        return finish_game(&bot, &dialogue, &config, chat, &report).await;
    }
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "Round cancelled.".to_string()).await;
    }
    let Some(value) = parse_answer(&text) else {
        bot.send_message(chat, "Numbers only!").await?;
        return Ok(());
    };

    let solution = game.current().solution();
    match game.answer(value, now, &mut StdRng::from_entropy()) {
        SpeedAnswer::Answered(correct) => {
            let verdict = if correct {
                "Correct!".to_string()
            } else {
                format!("It was {}.", solution)
            };
            bot.send_message(
                chat,
                format!(
                    "{} {}s left\n{}",
                    verdict,
                    game.remaining(now).num_seconds(),
                    game.current()
                ),
            )
            .await?;
            dialogue.update(State::SpeedMath { game }).await?;
            Ok(())
        }
        SpeedAnswer::TimeUp(report) => {
            bot.send_message(chat, "Time's up!").await?;
            finish_game(&bot, &dialogue, &config, chat, &report).await
        }
        SpeedAnswer::Over => {
            back_to_menu(&bot, &dialogue, chat, "That round is over.".to_string()).await
        }
    }
}

fn geometry_round(quest: &GeometryQuest) -> String {
    format!(
        "Score {} | Questions left {}\n{}",
        quest.score(),
        quest.questions_left(),
        quest.current()
    )
}

async fn geometry(
    bot: Bot,
    dialogue: MathDialogue,
    config: Arc<Config>,
    mut quest: GeometryQuest,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "Quest abandoned.".to_string()).await;
    }
    let Some(value) = parse_answer(&text) else {
        bot.send_message(chat, "Send the area as a number, like 12 or 7.5")
            .await?;
        return Ok(());
    };

    let verdict = quest.answer(value, &mut StdRng::from_entropy());
    let reply = if verdict.correct {
        "Correct!".to_string()
    } else {
        format!("Not quite, the area is {}.", verdict.expected)
    };
    if let Some(report) = verdict.finished {
        bot.send_message(chat, reply).await?;
        return finish_game(&bot, &dialogue, &config, chat, &report).await;
    }

    bot.send_message(chat, format!("{}\n\n{}", reply, geometry_round(&quest)))
        .reply_markup(back_keyboard())
        .await?;
    dialogue.update(State::Geometry { quest }).await?;
    Ok(())
}

fn memory_round(game: &MathMemory) -> String {
    format!(
        "<pre>{}</pre>Score: {} | Moves: {}",
        game.board(),
        game.score(),
        game.moves()
    )
}

async fn memory(
    bot: Bot,
    dialogue: MathDialogue,
    config: Arc<Config>,
    mut game: MathMemory,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "See you next time!".to_string()).await;
    }
    let Some((first, second)) = parse_pair(&text) else {
        bot.send_message(chat, "Send two card numbers, like 3 7.")
            .await?;
        return Ok(());
    };

    let flip = match game.flip(first, second) {
        Ok(flip) => flip,
        Err(e) => {
            bot.send_message(chat, format!("Can't do that: {}.", e))
                .await?;
            return Ok(());
        }
    };
    let verdict = if flip.matched {
        format!("{} and {} match!", flip.first, flip.second)
    } else {
        format!("{} and {} don't match.", flip.first, flip.second)
    };
    if let Some(report) = flip.finished {
        bot.send_message(chat, format!("{} Done in {} moves.", verdict, game.moves()))
            .await?;
        return finish_game(&bot, &dialogue, &config, chat, &report).await;
    }

    bot.send_message(chat, format!("{}\n{}", verdict, memory_round(&game)))
        .parse_mode(ParseMode::Html)
        .reply_markup(back_keyboard())
        .await?;
    dialogue.update(State::Memory { game }).await?;
    Ok(())
}

async fn receive_quiz_topic(
    bot: Bot,
    dialogue: MathDialogue,
    helper: Arc<MathHelper>,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "Maybe later!".to_string()).await;
    }

    let quiz = if text.eq_ignore_ascii_case(PRACTICE) {
        Quiz::practice()
    } else {
        let Some(&(subject, _)) = SUBJECT_CATALOG
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&text))
        else {
            bot.send_message(chat, "Please pick a topic from the list.")
                .await?;
            return Ok(());
        };

        // Not essential, so a failure here is ignored.
        let _ = bot.send_chat_action(chat, ChatAction::Typing).await;
        match helper
            .generate_quiz(&[subject.to_string()], Difficulty::default(), QUIZ_LENGTH)
            .await
        {
            Ok(questions) => Quiz::from_generated(subject, questions),
            Err(e) => {
                log::warn!("Quiz generation for {} failed: {}", subject, e);
                bot.send_message(
                    chat,
                    "I couldn't write new questions right now, so here is a practice quiz instead.",
                )
                .await?;
                Quiz::practice()
            }
        }
    };

    ask_question(&bot, chat, &quiz).await?;
    dialogue.update(State::Quiz { quiz }).await?;
    Ok(())
}

async fn ask_question(bot: &Bot, chat: ChatId, quiz: &Quiz) -> HandlerResult {
    let Some(question) = quiz.current() else {
        return Ok(());
    };
    let text = format!(
        "Question {} of {}:\n{}",
        quiz.current_question + 1,
        quiz.questions.len(),
        question.text
    );
    let mut rows: Vec<Vec<KeyboardButton>> = (0..question.answers.len())
        .filter_map(|i| question.option_label(i))
        .map(|label| vec![KeyboardButton::new(label)])
        .collect();
    rows.push(vec![KeyboardButton::new(BACK)]);

    bot.send_message(chat, text)
        .reply_markup(KeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

async fn quiz_answer(
    bot: Bot,
    dialogue: MathDialogue,
    config: Arc<Config>,
    helper: Arc<MathHelper>,
    mut quiz: Quiz,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "Quiz cancelled.".to_string()).await;
    }

    let question = quiz.current().cloned();
    let Some(check) = quiz.answer(&text) else {
        bot.send_message(chat, "Please pick one of the options").await?;
        return Ok(());
    };

    if check.correct {
        bot.send_message(chat, "Correct!").await?;
    } else {
        let explanation = match (check.explanation, question) {
            (Some(explanation), _) => explanation,
            (None, Some(question)) => {
                let _ = bot.send_chat_action(chat, ChatAction::Typing).await;
                // If the tutor is unavailable, the correct answer alone will do.
                helper
                    .explain_wrong_answer(&question, &check.chosen_text)
                    .await
                    .unwrap_or_else(|e| {
                        log::warn!("No explanation for {:?}: {}", question.text, e);
                        String::from("Keep practicing!")
                    })
            }
            (None, None) => String::new(),
        };
        bot.send_message(
            chat,
            format!(
                "Not quite. The correct answer is {}.\n\n{}",
                check.correct_text, explanation
            ),
        )
        .await?;
    }

    if quiz.is_complete() {
        return finish_quiz(&bot, &dialogue, &config, chat, &quiz).await;
    }
    ask_question(&bot, chat, &quiz).await?;
    dialogue.update(State::Quiz { quiz }).await?;
    Ok(())
}

async fn finish_quiz(
    bot: &Bot,
    dialogue: &MathDialogue,
    config: &Config,
    chat: ChatId,
    quiz: &Quiz,
) -> HandlerResult {
    let mut text = format!(
        "Quiz over! You got {} ({}%).",
        quiz.score_label(),
        quiz.percentage()
    );
    if quiz.passed() {
        let progress = progress_for(config, chat);
        let snapshot = progress.update_quizzes_passed(&quiz.score_label())?;
        if let Some(subject) = snapshot.subject_progress.get(&quiz.topic) {
            let completed = (subject.completed + 1).min(subject.total);
            progress.update_subject_progress(&quiz.topic, completed)?;
        }
        text.push_str(&format!(
            "\nPassed! That makes {} quizzes.",
            snapshot.quizzes_passed
        ));
    } else {
        text.push_str(&format!("\nYou need {}% to pass. Try again!", PASS_PERCENTAGE));
    }
    back_to_menu(bot, dialogue, chat, text).await
}

/// First line `<level>, <total questions>`, then one `BlueprintEntry` per line.
fn parse_test_plan(text: &str) -> Result<(String, u32, Vec<BlueprintEntry>), String> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let header = lines.next().ok_or("The plan is empty.")?;
    let (level, total) = header
        .rsplit_once(',')
        .ok_or("The first line should look like \"high school, 5\".")?;
    let total: u32 = total
        .trim()
        .parse()
        .map_err(|_| format!("{:?} is not a number of questions.", total.trim()))?;
    let entries = lines
        .map(str::parse::<BlueprintEntry>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    Ok((level.trim().to_string(), total, entries))
}

async fn receive_test_plan(
    bot: Bot,
    dialogue: MathDialogue,
    helper: Arc<MathHelper>,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "Maybe later!".to_string()).await;
    }

    let (level, total, entries) = match parse_test_plan(&text) {
        Ok(plan) => plan,
        Err(e) => {
            bot.send_message(chat, e).await?;
            return Ok(());
        }
    };

    let _ = bot.send_chat_action(chat, ChatAction::Typing).await;
    match helper.generate_mock_test(&level, &entries, total).await {
        Ok(questions) => {
            bot.send_message(
                chat,
                format!(
                    "Your mock test is ready: {} questions, {} marks in total.",
                    total,
                    total_marks(&entries)
                ),
            )
            .await?;
            let quiz = Quiz::from_generated(format!("{} mock test", level), questions);
            ask_question(&bot, chat, &quiz).await?;
            dialogue.update(State::Quiz { quiz }).await?;
            Ok(())
        }
        Err(AiError::Blueprint(e)) => {
            bot.send_message(chat, format!("{}. Fix the plan and send it again.", e))
                .await?;
            Ok(())
        }
        Err(e) => {
            log::warn!("Mock test generation failed: {}", e);
            back_to_menu(
                &bot,
                &dialogue,
                chat,
                "I couldn't generate the test right now. Please try again later.".to_string(),
            )
            .await
        }
    }
}

/// Telegram rejects longer messages. Counted in UTF-16 code units.
const MESSAGE_LIMIT: usize = 4096;

/// Splits `text` into messages of at most `limit` UTF-16 units, breaking
/// after the last newline that fits when there is one.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    loop {
        let mut units = 0;
        let overflow = rest.char_indices().find_map(|(i, c)| {
            units += c.len_utf16();
            (units > limit).then_some(i)
        });
        let Some(mut cut) = overflow else {
            break;
        };
        if let Some(newline) = rest[..cut].rfind('\n').filter(|&i| i > 0) {
            cut = newline + 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

async fn problem_solver(
    bot: Bot,
    config: Arc<Config>,
    dialogue: MathDialogue,
    helper: Arc<MathHelper>,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "Happy solving!".to_string()).await;
    }
    if text.is_empty() {
        bot.send_message(chat, "Please send the problem as text.").await?;
        return Ok(());
    }

    let _ = bot.send_chat_action(chat, ChatAction::Typing).await;
    let solution = match helper.solve_problem(&text).await {
        Ok(solution) => solution,
        Err(e) => {
            log::warn!("Solving {:?} failed: {}", text, e);
            bot.send_message(chat, "I couldn't reach the tutor right now. Please try again in a moment.")
                .await?;
            return Ok(());
        }
    };

    let mut reply = format!("{}\n\n+{} XP", solution, PROBLEM_XP);
    if let Some(equation) = extract_equation(&text) {
        reply.push_str(&format!(
            "\nTo see it, graph {} from the menu.",
            equation.graph_expression()
        ));
    }
    for chunk in split_message(&reply, MESSAGE_LIMIT) {
        bot.send_message(chat, chunk)
            .reply_markup(back_keyboard())
            .await?;
    }
    // Only credited once the whole solution went out.
    progress_for(&config, chat).update_problems_solved()?;
    Ok(())
}

async fn graph(bot: Bot, dialogue: MathDialogue, config: Arc<Config>, msg: Message) -> HandlerResult {
    let chat = msg.chat.id;
    let text = text_of(&msg);
    if text == BACK {
        return back_to_menu(&bot, &dialogue, chat, "Back to the menu.".to_string()).await;
    }

    let source = PRESETS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(&text))
        .map(|&(_, equation)| equation)
        .unwrap_or(text.as_str());

    let Some(equation) = extract_equation(source) else {
        bot.send_message(chat, "I couldn't find an equation there. Try something like y = x^2.")
            .await?;
        return Ok(());
    };
    let request = GraphRequest::new(&equation);
    progress_for(&config, chat).add_activity(NewActivity::new(
        ActivityKind::Visualizer,
        format!("Graphed {}", request.expression),
    ))?;

    bot.send_message(
        chat,
        format!(
            "{} graph of {}\nx from {} to {}, y from {} to {}",
            if request.three_d { "3D" } else { "2D" },
            request.expression,
            request.domain.min,
            request.domain.max,
            request.range.min,
            request.range.max
        ),
    )
    .await?;
    Ok(())
}
