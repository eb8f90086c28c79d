use chess::{Board, Color, Piece};

const PIECES: [Piece; 5] = [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen];

/// Kings are not counted.
pub const fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 1,
        Piece::Knight | Piece::Bishop => 3,
        Piece::Rook => 5,
        Piece::Queen => 9,
        Piece::King => 0,
    }
}

/// Material of `color` minus material of its opponent.
pub fn material_balance(board: &Board, color: Color) -> i32 {
    let own = *board.color_combined(color);
    let theirs = *board.color_combined(!color);
    PIECES
        .iter()
        .map(|piece| {
            let pieces = *board.pieces(*piece);
            let diff = (pieces & own).popcnt() as i32 - (pieces & theirs).popcnt() as i32;
            diff * piece_value(*piece)
        })
        .sum()
}
