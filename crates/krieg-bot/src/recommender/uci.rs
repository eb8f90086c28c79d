use super::{MoveRecommender, RecommenderError};
use chess::{Board, ChessMove};
use krieg_core::rules::{StandardRules, parse_uci_move};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{Level, event};

const QUIT_GRACE_POLLS: u32 = 50;
const QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// External UCI engine process, held for the lifetime of the agent.
///
/// The process is started and handshaken in [`UciEngine::spawn`] and released
/// exactly once, either by [`MoveRecommender::shutdown`] or on drop.
pub struct UciEngine {
    program: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
}

impl std::fmt::Debug for UciEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UciEngine")
            .field("program", &self.program)
            .field("running", &self.child.is_some())
            .finish()
    }
}

impl UciEngine {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, RecommenderError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| RecommenderError::Spawn {
                program: program.to_string(),
                source,
            })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);

        let mut engine = Self {
            program: program.to_string(),
            child: Some(child),
            stdin,
            stdout,
        };
        if let Err(err) = engine.handshake() {
            engine.shutdown();
            return Err(err);
        }
        event!(
            target: "krieg_bot::uci",
            Level::INFO,
            program,
            "engine ready"
        );
        Ok(engine)
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    fn handshake(&mut self) -> Result<(), RecommenderError> {
        self.send("uci")?;
        self.read_until("uciok")?;
        self.send("isready")?;
        self.read_until("readyok")?;
        Ok(())
    }

    fn send(&mut self, line: &str) -> Result<(), RecommenderError> {
        let stdin = self.stdin.as_mut().ok_or(RecommenderError::NotRunning)?;
        event!(target: "krieg_bot::uci", Level::TRACE, line, "-> engine");
        writeln!(stdin, "{line}")?;
        stdin.flush()?;
        Ok(())
    }

    /// Reads lines until one starts with `prefix`, returning it.
    fn read_until(&mut self, prefix: &str) -> Result<String, RecommenderError> {
        let stdout = self.stdout.as_mut().ok_or(RecommenderError::NotRunning)?;
        let mut line = String::new();
        loop {
            line.clear();
            if stdout.read_line(&mut line)? == 0 {
                return Err(RecommenderError::EngineExited);
            }
            let trimmed = line.trim();
            event!(target: "krieg_bot::uci", Level::TRACE, line = trimmed, "<- engine");
            if trimmed.starts_with(prefix) {
                return Ok(trimmed.to_string());
            }
        }
    }
}

fn parse_bestmove(line: &str) -> Result<Option<ChessMove>, RecommenderError> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return Err(RecommenderError::Protocol(format!("unexpected reply '{line}'")));
    }
    match tokens.next() {
        Some("(none)") | Some("0000") => Ok(None),
        Some(text) => parse_uci_move(text)
            .map(Some)
            .ok_or_else(|| RecommenderError::Protocol(format!("unparsable move '{text}'"))),
        None => Err(RecommenderError::Protocol("bestmove without a move".into())),
    }
}

impl MoveRecommender<StandardRules> for UciEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn suggest(
        &mut self,
        _rules: &StandardRules,
        state: &Board,
        depth: u32,
    ) -> Result<ChessMove, RecommenderError> {
        self.send(&format!("position fen {state}"))?;
        self.send(&format!("go depth {}", depth.max(1)))?;
        let reply = self.read_until("bestmove")?;
        let mv = parse_bestmove(&reply)?.ok_or(RecommenderError::NoLegalMoves)?;
        if !state.legal(mv) {
            return Err(RecommenderError::IllegalSuggestion(mv.to_string()));
        }
        Ok(mv)
    }

    fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Some(mut stdin) = self.stdin.take() {
            let _ = writeln!(stdin, "quit");
            let _ = stdin.flush();
        }
        self.stdout = None;

        for _ in 0..QUIT_GRACE_POLLS {
            match child.try_wait() {
                Ok(Some(status)) => {
                    event!(
                        target: "krieg_bot::uci",
                        Level::DEBUG,
                        program = %self.program,
                        %status,
                        "engine exited"
                    );
                    return;
                }
                Ok(None) => thread::sleep(QUIT_POLL_INTERVAL),
                Err(_) => break,
            }
        }
        event!(
            target: "krieg_bot::uci",
            Level::WARN,
            program = %self.program,
            "engine ignored quit; killing"
        );
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krieg_core::rules::RulesOracle;

    #[test]
    fn parses_bestmove_lines() {
        assert_eq!(
            parse_bestmove("bestmove e2e4 ponder e7e5").unwrap(),
            parse_uci_move("e2e4")
        );
        assert_eq!(parse_bestmove("bestmove (none)").unwrap(), None);
        assert!(matches!(
            parse_bestmove("bestmove zz"),
            Err(RecommenderError::Protocol(_))
        ));
        assert!(matches!(
            parse_bestmove("info depth 3"),
            Err(RecommenderError::Protocol(_))
        ));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let err = UciEngine::spawn("krieg-no-such-engine-binary", &[]).unwrap_err();
        assert!(matches!(err, RecommenderError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn scripted_engine(reply: &str) -> UciEngine {
        let script = format!(
            "while read line; do case \"$line\" in \
             uci) echo 'id name scripted'; echo uciok;; \
             isready) echo readyok;; \
             go*) echo 'info depth 1'; echo '{reply}';; \
             quit) exit 0;; \
             esac; done"
        );
        UciEngine::spawn("sh", &["-c".to_string(), script]).expect("sh is available")
    }

    #[cfg(unix)]
    #[test]
    fn round_trip_with_scripted_engine() {
        let mut engine = scripted_engine("bestmove e2e4");
        assert!(engine.is_running());
        let board = StandardRules.initial_state();
        let mv = engine.suggest(&StandardRules, &board, 3).unwrap();
        assert_eq!(mv, parse_uci_move("e2e4").unwrap());

        engine.shutdown();
        assert!(!engine.is_running());
        assert!(matches!(
            engine.suggest(&StandardRules, &board, 3),
            Err(RecommenderError::NotRunning)
        ));
        // Second release is a no-op.
        engine.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn illegal_suggestion_is_reported() {
        let mut engine = scripted_engine("bestmove e2e5");
        let board = StandardRules.initial_state();
        assert!(matches!(
            engine.suggest(&StandardRules, &board, 1),
            Err(RecommenderError::IllegalSuggestion(_))
        ));
    }
}
