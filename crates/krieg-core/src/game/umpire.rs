use crate::rules::{CodecError, StandardRules, StateCodec, insufficient_material};
use chess::{
    BitBoard, Board, BoardStatus, ChessMove, Color, EMPTY, MoveGen, Piece, Square,
    get_bishop_moves, get_king_moves, get_knight_moves, get_rook_moves,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{Level, event};

// Automatic draws; nobody claims the threefold or fifty-move draw.
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;
const REPETITION_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    pub fn as_str(self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWins => Some(Color::White),
            GameResult::BlackWins => Some(Color::Black),
            GameResult::Draw => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    Repetition,
    SeventyFiveMoves,
}

impl Termination {
    pub fn announcement(self) -> &'static str {
        match self {
            Termination::Checkmate => "Checkmate",
            Termination::Stalemate => "Stalemate",
            Termination::InsufficientMaterial => "draw by insufficient force",
            Termination::Repetition | Termination::SeventyFiveMoves => "draw",
        }
    }
}

/// What the umpire discloses about one attempted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub succeeded: bool,
    pub announcements: Vec<String>,
    /// Destination square of a successful move; `None` on rejection.
    pub destination: Option<Square>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UmpireError {
    #[error("game is already over ({0})")]
    GameOver(GameResult),
}

/// Ground-truth referee. Only the orchestrator may look at [`Umpire::board`].
#[derive(Debug, Clone)]
pub struct Umpire {
    board: Board,
    halfmove_clock: u32,
    history: Vec<u64>,
    plies: usize,
    result: Option<GameResult>,
    termination: Option<Termination>,
}

impl Default for Umpire {
    fn default() -> Self {
        Self::new()
    }
}

impl Umpire {
    pub fn new() -> Self {
        Self::from_board(Board::default())
    }

    pub fn from_board(board: Board) -> Self {
        Self {
            board,
            halfmove_clock: 0,
            history: vec![board.get_hash()],
            plies: 0,
            result: None,
            termination: None,
        }
    }

    /// Starts from a FEN position, taking the halfmove clock from its fifth field.
    pub fn from_fen(fen: &str) -> Result<Self, CodecError> {
        let mut umpire = Self::from_board(StandardRules.decode(fen)?);
        umpire.halfmove_clock = fen
            .split_whitespace()
            .nth(4)
            .and_then(|field| field.parse().ok())
            .unwrap_or(0);
        Ok(umpire)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn is_over(&self) -> bool {
        self.result.is_some()
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Successful moves so far.
    pub fn plies(&self) -> usize {
        self.plies
    }

    pub fn try_move(&mut self, mv: ChessMove) -> Result<MoveOutcome, UmpireError> {
        if let Some(result) = self.result {
            return Err(UmpireError::GameOver(result));
        }

        if !self.board.legal(mv) {
            let verdict = if pseudo_legal(&self.board, mv) {
                "No"
            } else {
                "Hell no"
            };
            event!(
                target: "krieg_core::umpire",
                Level::TRACE,
                mv = %mv,
                verdict,
                "move rejected"
            );
            return Ok(MoveOutcome {
                succeeded: false,
                announcements: vec![verdict.to_string()],
                destination: None,
            });
        }

        let destination = mv.get_dest();
        let captured = self.board.piece_on(destination);
        let pawn_move = self.board.piece_on(mv.get_source()) == Some(Piece::Pawn);
        let mover = self.board.side_to_move();

        self.board = self.board.make_move_new(mv);
        self.plies += 1;
        if pawn_move || captured.is_some() {
            self.halfmove_clock = 0;
            self.history.clear();
        } else {
            self.halfmove_clock += 1;
        }
        self.history.push(self.board.get_hash());

        let mut announcements = Vec::new();
        match captured {
            Some(Piece::Pawn) => announcements.push(format!("Pawn gone on {destination}")),
            Some(_) => announcements.push(format!("Piece gone on {destination}")),
            None => {}
        }
        if self.board.checkers().popcnt() > 0 {
            announcements.push(check_direction(&self.board).to_string());
        }

        if let Some(termination) = self.detect_termination() {
            let result = match termination {
                Termination::Checkmate => match mover {
                    Color::White => GameResult::WhiteWins,
                    Color::Black => GameResult::BlackWins,
                },
                _ => GameResult::Draw,
            };
            self.result = Some(result);
            self.termination = Some(termination);
            announcements.push(termination.announcement().to_string());
            event!(
                target: "krieg_core::umpire",
                Level::DEBUG,
                result = result.as_str(),
                ?termination,
                plies = self.plies,
                "game over"
            );
        } else {
            announcements.push(
                match self.board.side_to_move() {
                    Color::White => "White to move",
                    Color::Black => "Black to move",
                }
                .to_string(),
            );
        }

        Ok(MoveOutcome {
            succeeded: true,
            announcements,
            destination: Some(destination),
        })
    }

    fn detect_termination(&self) -> Option<Termination> {
        match self.board.status() {
            BoardStatus::Checkmate => return Some(Termination::Checkmate),
            BoardStatus::Stalemate => return Some(Termination::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if insufficient_material(&self.board) {
            return Some(Termination::InsufficientMaterial);
        }
        let current = self.board.get_hash();
        if self.history.iter().filter(|hash| **hash == current).count() >= REPETITION_LIMIT {
            return Some(Termination::Repetition);
        }
        if self.halfmove_clock >= SEVENTY_FIVE_MOVE_PLIES {
            return Some(Termination::SeventyFiveMoves);
        }
        None
    }
}

/// Whether `mv` is pseudo-legal on the true board: the piece can make the move
/// with every piece as a blocker, ignoring only the safety of its own king.
/// Castling counts only when fully legal.
pub fn pseudo_legal(board: &Board, mv: ChessMove) -> bool {
    if board.legal(mv) {
        return true;
    }
    let mover = board.side_to_move();
    let source = mv.get_source();
    let dest = mv.get_dest();
    if board.color_on(source) != Some(mover) || board.color_on(dest) == Some(mover) {
        return false;
    }
    let Some(piece) = board.piece_on(source) else {
        return false;
    };
    if piece != Piece::Pawn && mv.get_promotion().is_some() {
        return false;
    }

    let occupied = *board.combined();
    let target = BitBoard::from_square(dest);
    let reach = match piece {
        Piece::Knight => get_knight_moves(source),
        Piece::Bishop => get_bishop_moves(source, occupied),
        Piece::Rook => get_rook_moves(source, occupied),
        Piece::Queen => get_bishop_moves(source, occupied) | get_rook_moves(source, occupied),
        Piece::King => get_king_moves(source),
        Piece::Pawn => return pawn_reaches(board, mv, mover),
    };
    reach & target != EMPTY
}

fn pawn_reaches(board: &Board, mv: ChessMove, mover: Color) -> bool {
    let (src_rank, src_file) = coords(mv.get_source());
    let (dst_rank, dst_file) = coords(mv.get_dest());
    let (step, start_rank, last_rank) = match mover {
        Color::White => (1i32, 1i32, 7i32),
        Color::Black => (-1, 6, 0),
    };
    if (dst_rank == last_rank) != mv.get_promotion().is_some() {
        return false;
    }
    if matches!(mv.get_promotion(), Some(Piece::Pawn | Piece::King)) {
        return false;
    }
    let empty = |square: Square| board.piece_on(square).is_none();
    let forward = dst_rank - src_rank;
    let sideways = (dst_file - src_file).abs();
    match (forward * step, sideways) {
        (1, 0) => empty(mv.get_dest()),
        (2, 0) if src_rank == start_rank => {
            empty(square_at(src_rank + step, src_file)) && empty(mv.get_dest())
        }
        (1, 1) => {
            board.color_on(mv.get_dest()) == Some(!mover)
                || en_passant_target(board, mover) == Some(mv.get_dest())
        }
        _ => false,
    }
}

/// Square a pawn lands on when capturing en passant. `chess` records the
/// square of the pawn that can be taken.
fn en_passant_target(board: &Board, mover: Color) -> Option<Square> {
    let step = match mover {
        Color::White => 1,
        Color::Black => -1,
    };
    board.en_passant().map(|victim| {
        let (rank, file) = coords(victim);
        square_at(rank + step, file)
    })
}

fn check_direction(board: &Board) -> &'static str {
    let king = board.king_square(board.side_to_move());
    let (king_rank, king_file) = coords(king);
    for checker in *board.checkers() {
        let (rank, file) = coords(checker);
        match board.piece_on(checker) {
            Some(Piece::Knight) => return "Check by a knight",
            Some(Piece::Rook) => {
                return if file == king_file {
                    "Check on the vertical"
                } else {
                    "Check on the horizontal"
                };
            }
            Some(Piece::Bishop | Piece::Queen) => {
                let file_diff = (file - king_file).abs();
                let rank_diff = (rank - king_rank).abs();
                if file_diff == rank_diff {
                    return if file_diff >= 3 {
                        "Check on the long diagonal"
                    } else {
                        "Check on the short diagonal"
                    };
                }
                if board.piece_on(checker) == Some(Piece::Queen) {
                    return "Check";
                }
            }
            _ => {}
        }
    }
    "Check"
}

fn coords(square: Square) -> (i32, i32) {
    let index = square.to_index() as i32;
    (index / 8, index % 8)
}

fn square_at(rank: i32, file: i32) -> Square {
    chess::ALL_SQUARES[(rank * 8 + file) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_uci_move;
    use std::str::FromStr;

    fn mv(text: &str) -> ChessMove {
        parse_uci_move(text).expect("valid move")
    }

    fn play(umpire: &mut Umpire, moves: &[&str]) -> Vec<MoveOutcome> {
        moves
            .iter()
            .map(|text| umpire.try_move(mv(text)).expect("game continues"))
            .collect()
    }

    #[test]
    fn legal_move_announces_side_to_move() {
        let mut umpire = Umpire::new();
        let outcome = umpire.try_move(mv("e2e4")).unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.announcements, vec!["Black to move"]);
        assert_eq!(outcome.destination, Some(Square::E4));
        assert_eq!(umpire.plies(), 1);
    }

    #[test]
    fn rejections_distinguish_impossible_from_illegal() {
        let mut umpire = Umpire::new();
        // Bishop jumping like a knight.
        let outcome = umpire.try_move(mv("c1d3")).unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.announcements, vec!["Hell no"]);
        assert_eq!(outcome.destination, None);

        // Empty source square.
        assert_eq!(umpire.try_move(mv("e4e5")).unwrap().announcements, vec!["Hell no"]);

        // Pawn diagonal with nothing to capture.
        assert_eq!(umpire.try_move(mv("e2d3")).unwrap().announcements, vec!["Hell no"]);
        assert_eq!(umpire.plies(), 0);

        // Pseudo-legal but exposes the king.
        let pinned = Board::from_str("4k3/4r3/8/8/8/8/4B3/4K3 w - - 0 1").unwrap();
        let mut umpire = Umpire::from_board(pinned);
        assert_eq!(umpire.try_move(mv("e2d3")).unwrap().announcements, vec!["No"]);
    }

    #[test]
    fn every_piece_blocks_a_slide() {
        let board = Board::from_str("4k3/8/8/8/4p3/8/8/4R1K1 w - - 0 1").unwrap();
        let mut umpire = Umpire::from_board(board);
        assert_eq!(umpire.try_move(mv("e1e8")).unwrap().announcements, vec!["Hell no"]);

        let own_blocked = Board::from_str("4k3/8/8/8/4P3/8/8/4R1K1 w - - 0 1").unwrap();
        let mut umpire = Umpire::from_board(own_blocked);
        assert_eq!(umpire.try_move(mv("e1e8")).unwrap().announcements, vec!["Hell no"]);
    }

    #[test]
    fn pawn_diagonals_need_a_target() {
        let board = Board::from_str("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        assert!(pseudo_legal(&board, mv("e4d5")));
        assert!(!pseudo_legal(&board, mv("e4f5")));

        // After c7c5 the en passant capture exists but would expose the king on a5.
        let mut umpire = Umpire::from_fen("4k3/2p5/8/KP5r/8/8/8/8 b - - 0 1").unwrap();
        play(&mut umpire, &["c7c5"]);
        assert!(pseudo_legal(umpire.board(), mv("b5c6")));
        assert_eq!(umpire.try_move(mv("b5c6")).unwrap().announcements, vec!["No"]);
        assert_eq!(umpire.try_move(mv("b5a6")).unwrap().announcements, vec!["Hell no"]);
    }

    #[test]
    fn pinned_pawn_push_is_plain_no() {
        let board = Board::from_str("4k3/8/8/8/1b6/8/3P4/4K3 w - - 0 1").unwrap();
        let mut umpire = Umpire::from_board(board);
        assert_eq!(umpire.try_move(mv("d2d3")).unwrap().announcements, vec!["No"]);
    }

    #[test]
    fn capture_and_check_are_announced_in_order() {
        let mut umpire = Umpire::new();
        let outcomes = play(&mut umpire, &["e2e4", "d7d5", "e4d5"]);
        assert_eq!(outcomes[2].announcements, vec!["Pawn gone on d5", "Black to move"]);

        let board = Board::from_str("4k3/8/8/8/8/8/3n4/R3K3 w - - 0 1").unwrap();
        let mut umpire = Umpire::from_board(board);
        let outcome = umpire.try_move(mv("a1a8")).unwrap();
        assert_eq!(outcome.announcements, vec!["Check on the horizontal", "Black to move"]);
    }

    #[test]
    fn check_directions() {
        let cases = [
            ("4k3/8/8/8/8/8/R7/4K3 w - - 0 1", "a2e2", "Check on the vertical"),
            ("4k3/8/8/8/8/8/8/3BK3 w - - 0 1", "d1a4", "Check on the long diagonal"),
            ("4k3/7B/8/8/8/8/8/4K3 w - - 0 1", "h7g6", "Check on the short diagonal"),
            ("4k3/8/8/8/6N1/8/8/4K3 w - - 0 1", "g4f6", "Check by a knight"),
            ("4k3/8/3P4/8/8/8/8/4K3 w - - 0 1", "d6d7", "Check"),
        ];
        for (fen, text, expected) in cases {
            let board = Board::from_str(fen).unwrap();
            let outcome = Umpire::from_board(board).try_move(mv(text)).unwrap();
            assert_eq!(outcome.announcements[0], expected, "{text}");
        }
    }

    #[test]
    fn fools_mate_ends_game() {
        let mut umpire = Umpire::new();
        let outcomes = play(&mut umpire, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        let last = &outcomes[3];
        assert_eq!(last.announcements, vec!["Check on the long diagonal", "Checkmate"]);
        assert_eq!(umpire.result(), Some(GameResult::BlackWins));
        assert_eq!(umpire.termination(), Some(Termination::Checkmate));
        assert!(matches!(
            umpire.try_move(mv("a2a3")),
            Err(UmpireError::GameOver(GameResult::BlackWins))
        ));
    }

    #[test]
    fn capturing_last_piece_is_insufficient_force() {
        let board = Board::from_str("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
        let mut umpire = Umpire::from_board(board);
        let outcome = umpire.try_move(mv("e1e2")).unwrap();
        assert_eq!(
            outcome.announcements,
            vec!["Piece gone on e2", "draw by insufficient force"]
        );
        assert_eq!(umpire.result(), Some(GameResult::Draw));
    }

    #[test]
    fn stalemate_is_announced() {
        let board = Board::from_str("7k/8/6K1/5Q2/8/8/8/8 w - - 0 1").unwrap();
        let mut umpire = Umpire::from_board(board);
        let outcome = umpire.try_move(mv("f5f7")).unwrap();
        assert_eq!(outcome.announcements, vec!["Stalemate"]);
        assert_eq!(umpire.termination(), Some(Termination::Stalemate));
    }

    #[test]
    fn fivefold_repetition_is_a_draw() {
        let mut umpire = Umpire::new();
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        for _ in 0..3 {
            play(&mut umpire, &shuffle);
        }
        // The start position has now occurred four times.
        assert!(!umpire.is_over());
        play(&mut umpire, &shuffle[..3]);
        let outcome = umpire.try_move(mv("f6g8")).unwrap();
        assert_eq!(outcome.announcements.last().map(String::as_str), Some("draw"));
        assert_eq!(umpire.termination(), Some(Termination::Repetition));
        assert_eq!(umpire.result(), Some(GameResult::Draw));
    }

    #[test]
    fn seventy_five_move_rule_ends_the_game() {
        let mut umpire = Umpire::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 148 90").unwrap();
        assert_eq!(umpire.halfmove_clock(), 148);
        let outcome = umpire.try_move(mv("a1a2")).unwrap();
        assert_eq!(outcome.announcements, vec!["Black to move"]);
        let outcome = umpire.try_move(mv("e8d8")).unwrap();
        assert_eq!(outcome.announcements, vec!["draw"]);
        assert_eq!(umpire.termination(), Some(Termination::SeventyFiveMoves));
        assert!(matches!(umpire.try_move(mv("a2a3")), Err(UmpireError::GameOver(GameResult::Draw))));
    }

    #[test]
    fn from_fen_rejects_kingless_boards() {
        assert!(Umpire::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
    }

    #[test]
    fn halfmove_clock_resets_on_pawn_moves() {
        let mut umpire = Umpire::new();
        play(&mut umpire, &["g1f3", "g8f6"]);
        assert_eq!(umpire.halfmove_clock(), 2);
        play(&mut umpire, &["e2e4"]);
        assert_eq!(umpire.halfmove_clock(), 0);
    }

    #[test]
    fn castling_through_attack_is_impossible() {
        let open = Board::from_str("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(pseudo_legal(&open, mv("e1g1")));
        assert!(!pseudo_legal(&Board::default(), mv("e1g1")));
        let attacked = Board::from_str("4kr2/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let mut umpire = Umpire::from_board(attacked);
        assert_eq!(umpire.try_move(mv("e1g1")).unwrap().announcements, vec!["Hell no"]);
    }
}
