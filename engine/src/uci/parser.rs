use crate::{EngineInfo, Score, ScoreBound};
use cozy_chess::{File, Move, Piece, Rank, Square};

/// Incoming message from UCI engine
#[derive(Debug, Clone)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// `mv` is `None` for `bestmove (none)`, sent when the side to move has no legal moves.
    BestMove { mv: Option<Move>, ponder: Option<Move> },
    Info(EngineInfo),
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, crate::UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => {
            let mv = match tokens.get(1) {
                None => return Err(crate::UciError::MalformedMessage(line.to_string())),
                Some(&"(none)") | Some(&"0000") => None,
                Some(token) => Some(parse_uci_move(token)?),
            };
            let ponder = match (tokens.get(2), tokens.get(3)) {
                (Some(&"ponder"), Some(token)) => parse_uci_move(token).ok(),
                _ => None,
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        _ => Err(crate::UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse an "info" line from the engine. Unknown keywords and bad values are skipped.
fn parse_info_line(tokens: &[&str]) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "seldepth" => {
                i += 1;
                info.seldepth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "time" => {
                i += 1;
                info.time_ms = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                info.nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                info.nps = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        info.score = match score_type {
                            "cp" => value_str.parse().ok().map(Score::Centipawns),
                            "mate" => value_str.parse().ok().map(Score::Mate),
                            _ => None,
                        };
                    }
                }
            }
            "lowerbound" => info.bound = Some(ScoreBound::Lower),
            "upperbound" => info.bound = Some(ScoreBound::Upper),
            "pv" => {
                // The principal variation runs to the end of the line.
                // Anything after an unparseable token is not a usable line.
                for token in &tokens[i + 1..] {
                    match parse_uci_move(token) {
                        Ok(mv) => info.pv.push(mv),
                        Err(_) => break,
                    }
                }
                break;
            }
            "multipv" => {
                i += 1;
                info.multipv = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "currmove" => {
                i += 1;
                info.currmove = tokens.get(i).and_then(|s| parse_uci_move(s).ok());
            }
            "hashfull" => {
                i += 1;
                info.hashfull = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "string" => {
                info.string = Some(tokens[i + 1..].join(" "));
                break;
            }
            _ => {
                // Unknown keyword, skip
            }
        }
        i += 1;
    }

    info
}

/// Parse UCI move format (e2e4, e7e8q)
pub fn parse_uci_move(s: &str) -> Result<Move, crate::UciError> {
    if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
        return Err(crate::UciError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2])?;
    let to = parse_square(&s[2..4])?;

    let promotion = if s.len() == 5 {
        Some(match &s[4..5] {
            "q" => Piece::Queen,
            "r" => Piece::Rook,
            "b" => Piece::Bishop,
            "n" => Piece::Knight,
            _ => return Err(crate::UciError::InvalidPromotion(s.to_string())),
        })
    } else {
        None
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

fn parse_square(s: &str) -> Result<Square, crate::UciError> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return Err(crate::UciError::InvalidSquare(s.to_string()));
    }

    let file = match bytes[0] {
        b'a' => File::A,
        b'b' => File::B,
        b'c' => File::C,
        b'd' => File::D,
        b'e' => File::E,
        b'f' => File::F,
        b'g' => File::G,
        b'h' => File::H,
        _ => return Err(crate::UciError::InvalidSquare(s.to_string())),
    };

    let rank = match bytes[1] {
        b'1' => Rank::First,
        b'2' => Rank::Second,
        b'3' => Rank::Third,
        b'4' => Rank::Fourth,
        b'5' => Rank::Fifth,
        b'6' => Rank::Sixth,
        b'7' => Rank::Seventh,
        b'8' => Rank::Eighth,
        _ => return Err(crate::UciError::InvalidSquare(s.to_string())),
    };

    Ok(Square::new(file, rank))
}

/// Format move for UCI (cozy-chess Move → "e2e4")
pub fn format_uci_move(mv: &Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    match mv.promotion {
        Some(Piece::Queen) => s.push('q'),
        Some(Piece::Rook) => s.push('r'),
        Some(Piece::Bishop) => s.push('b'),
        Some(Piece::Knight) => s.push('n'),
        _ => {}
    }
    s
}

fn format_square(sq: Square) -> String {
    let file = match sq.file() {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    };
    let rank = match sq.rank() {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    };
    format!("{}{}", file, rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        match msg {
            UciMessage::BestMove { mv, ponder } => {
                assert_eq!(format_uci_move(&mv.unwrap()), "e2e4");
                assert_eq!(format_uci_move(&ponder.unwrap()), "e7e5");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_bestmove_none() {
        let msg = parse_uci_message("bestmove (none)").unwrap();
        assert!(matches!(msg, UciMessage::BestMove { mv: None, ponder: None }));
    }

    #[test]
    fn test_parse_info() {
        let msg = parse_uci_message("info depth 12 score cp 35 nodes 15234 pv e2e4 e7e5").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.depth, Some(12));
                assert!(matches!(info.score, Some(Score::Centipawns(35))));
                assert_eq!(info.nodes, Some(15234));
                assert_eq!(info.pv.len(), 2);
                assert_eq!(info.multipv, None);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_multipv_mate_line() {
        let line = "info depth 20 seldepth 28 multipv 2 score mate -3 nodes 900000 nps 1200000 \
                    hashfull 310 tbhits 0 time 750 pv g8f6 h5f7";
        let UciMessage::Info(info) = parse_uci_message(line).unwrap() else {
            panic!("Wrong message type");
        };
        assert_eq!(info.multipv, Some(2));
        assert_eq!(info.score, Some(Score::Mate(-3)));
        assert_eq!(info.seldepth, Some(28));
        assert_eq!(info.hashfull, Some(310));
        assert_eq!(info.time_ms, Some(750));
        let pv: Vec<String> = info.pv.iter().map(format_uci_move).collect();
        assert_eq!(pv, vec!["g8f6", "h5f7"]);
    }

    #[test]
    fn test_parse_bound() {
        let line = "info depth 18 multipv 1 score cp 40 lowerbound nodes 10 pv d2d4";
        let UciMessage::Info(info) = parse_uci_message(line).unwrap() else {
            panic!("Wrong message type");
        };
        assert_eq!(info.bound, Some(ScoreBound::Lower));
        assert_eq!(info.pv.len(), 1);
    }

    #[test]
    fn test_pv_stops_at_garbage() {
        let line = "info depth 5 score cp 10 pv e2e4 e7e5 zz99 g1f3";
        let UciMessage::Info(info) = parse_uci_message(line).unwrap() else {
            panic!("Wrong message type");
        };
        assert_eq!(info.pv.len(), 2);
    }

    #[test]
    fn test_info_string_is_kept_verbatim() {
        let line = "info string NNUE evaluation using nn-b1a57edbea57.nnue enabled";
        let UciMessage::Info(info) = parse_uci_message(line).unwrap() else {
            panic!("Wrong message type");
        };
        assert_eq!(
            info.string.as_deref(),
            Some("NNUE evaluation using nn-b1a57edbea57.nnue enabled")
        );
        assert!(info.depth.is_none());
        assert!(info.pv.is_empty());
    }

    #[test]
    fn test_parse_id() {
        let msg = parse_uci_message("id name Stockfish 16.1").unwrap();
        match msg {
            UciMessage::Id { name, value } => {
                assert_eq!(name, "name");
                assert_eq!(value, "Stockfish 16.1");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert!(matches!(
            parse_uci_message("Stockfish 16 by the Stockfish developers"),
            Err(crate::UciError::UnknownMessage(_))
        ));
        assert!(matches!(
            parse_uci_message("bestmove"),
            Err(crate::UciError::MalformedMessage(_))
        ));
        assert!(parse_uci_message("").is_err());
    }

    #[test]
    fn test_move_parsing_edge_cases() {
        assert_eq!(format_uci_move(&parse_uci_move("e7e8q").unwrap()), "e7e8q");
        assert!(matches!(
            parse_uci_move("e7e8k"),
            Err(crate::UciError::InvalidPromotion(_))
        ));
        assert!(parse_uci_move("e9e4").is_err());
        assert!(parse_uci_move("e2").is_err());
        assert!(parse_uci_move("éé").is_err());
        assert!(parse_uci_move("e2e4qq").is_err());
    }
}
