use super::{CodecError, IllegalMoveError, PieceClass, RulesOracle, StateCodec};
use chess::{
    BitBoard, Board, BoardBuilder, BoardStatus, ChessMove, Color, EMPTY, MoveGen, Piece, Square,
};
use std::str::FromStr;

/// Standard chess rules backed by the `chess` crate. Boards are `Copy` values,
/// so every hypothesis owns an independent snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    pub fn new() -> Self {
        Self
    }
}

impl RulesOracle for StandardRules {
    type State = Board;
    type Move = ChessMove;

    fn initial_state(&self) -> Board {
        Board::default()
    }

    fn legal_moves(&self, state: &Board) -> Vec<ChessMove> {
        MoveGen::new_legal(state).collect()
    }

    fn is_legal(&self, state: &Board, mv: ChessMove) -> bool {
        state.legal(mv)
    }

    fn apply(&self, state: &Board, mv: ChessMove) -> Result<Board, IllegalMoveError> {
        if !state.legal(mv) {
            return Err(IllegalMoveError::new(mv, state));
        }
        Ok(state.make_move_new(mv))
    }

    fn destination(&self, mv: ChessMove) -> Square {
        mv.get_dest()
    }

    fn side_to_move(&self, state: &Board) -> Color {
        state.side_to_move()
    }

    fn is_check(&self, state: &Board) -> bool {
        state.checkers().popcnt() > 0
    }

    fn is_checkmate(&self, state: &Board) -> bool {
        matches!(state.status(), BoardStatus::Checkmate)
    }

    fn is_stalemate(&self, state: &Board) -> bool {
        matches!(state.status(), BoardStatus::Stalemate)
    }

    fn is_game_over(&self, state: &Board) -> bool {
        !matches!(state.status(), BoardStatus::Ongoing) || insufficient_material(state)
    }

    fn occupant_at(&self, state: &Board, square: Square) -> Option<PieceClass> {
        state.piece_on(square).map(PieceClass::from)
    }
}

impl StateCodec for StandardRules {
    fn encode(&self, state: &Board) -> String {
        state.to_string()
    }

    fn decode(&self, input: &str) -> Result<Board, CodecError> {
        let input = input.trim();
        let invalid = || CodecError::InvalidPosition {
            input: input.to_string(),
        };
        let placement = input.split_whitespace().next().ok_or_else(invalid)?;
        if !placement_is_sane(placement) {
            return Err(invalid());
        }
        let builder = BoardBuilder::from_str(input).map_err(|_| invalid())?;
        Board::try_from(&builder).map_err(|_| invalid())
    }
}

/// Eight ranks of eight files, one king per side, no pawns on the back ranks.
/// `chess` assumes both kings exist once it builds a `Board`, so this gate runs first.
fn placement_is_sane(placement: &str) -> bool {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return false;
    }
    for rank in &ranks {
        let mut files = 0u32;
        for c in rank.chars() {
            files += match c {
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => 1,
                _ => match c.to_digit(10) {
                    Some(run @ 1..=8) => run,
                    _ => return false,
                },
            };
            if files > 8 {
                return false;
            }
        }
        if files != 8 {
            return false;
        }
    }
    let back_rank_pawn = [ranks[0], ranks[7]]
        .iter()
        .any(|rank| rank.contains(['p', 'P']));
    !back_rank_pawn && placement.matches('K').count() == 1 && placement.matches('k').count() == 1
}

const DARK_SQUARES: BitBoard = BitBoard(0xAA55_AA55_AA55_AA55);

/// Neither side can ever deliver mate.
pub fn insufficient_material(board: &Board) -> bool {
    lacks_mating_material(board, Color::White) && lacks_mating_material(board, Color::Black)
}

/// A lone knight facing nothing but king and queens, or bishops that all
/// stand on one square colour, cannot force mate.
fn lacks_mating_material(board: &Board, color: Color) -> bool {
    let own = *board.color_combined(color);
    let pawns = *board.pieces(Piece::Pawn);
    if own & (pawns | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen)) != EMPTY {
        return false;
    }
    let knights = *board.pieces(Piece::Knight);
    if own & knights != EMPTY {
        let kings_and_queens = *board.pieces(Piece::King) | *board.pieces(Piece::Queen);
        let enemy = *board.color_combined(!color);
        return own.popcnt() <= 2 && enemy & !kings_and_queens == EMPTY;
    }
    let bishops = *board.pieces(Piece::Bishop);
    if own & bishops != EMPTY {
        let one_colour = bishops & DARK_SQUARES == EMPTY || bishops & !DARK_SQUARES == EMPTY;
        return one_colour && pawns == EMPTY && knights == EMPTY;
    }
    true
}

pub fn parse_square(text: &str) -> Option<Square> {
    let text = text.trim();
    if text.len() != 2 || !text.is_ascii() {
        return None;
    }
    Square::from_str(&text.to_ascii_lowercase()).ok()
}

/// Parses long algebraic notation (`e2e4`, `e7e8q`).
pub fn parse_uci_move(text: &str) -> Option<ChessMove> {
    let text = text.trim();
    if !text.is_ascii() || !(text.len() == 4 || text.len() == 5) {
        return None;
    }
    let source = parse_square(&text[0..2])?;
    let dest = parse_square(&text[2..4])?;
    let promotion = match text[4..].to_ascii_lowercase().as_str() {
        "" => None,
        "q" => Some(Piece::Queen),
        "r" => Some(Piece::Rook),
        "b" => Some(Piece::Bishop),
        "n" => Some(Piece::Knight),
        _ => return None,
    };
    Some(ChessMove::new(source, dest, promotion))
}
