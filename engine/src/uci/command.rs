use crate::EngineCommand;

/// Render a command as a single UCI line, without the trailing newline.
pub fn format_command(cmd: &EngineCommand) -> String {
    match cmd {
        EngineCommand::Uci => "uci".to_string(),
        EngineCommand::IsReady => "isready".to_string(),
        EngineCommand::UciNewGame => "ucinewgame".to_string(),
        EngineCommand::SetOption { name, value } => match value {
            Some(val) => format!("setoption name {} value {}", name, val),
            None => format!("setoption name {}", name),
        },
        EngineCommand::SetPosition { fen } => format!("position fen {}", fen),
        EngineCommand::Go(params) => {
            let mut go_cmd = "go".to_string();
            if let Some(depth) = params.depth {
                go_cmd.push_str(&format!(" depth {}", depth));
            }
            if let Some(movetime) = params.movetime {
                go_cmd.push_str(&format!(" movetime {}", movetime));
            }
            if params.infinite || (params.depth.is_none() && params.movetime.is_none()) {
                go_cmd.push_str(" infinite");
            }
            go_cmd
        }
        EngineCommand::Stop => "stop".to_string(),
        EngineCommand::Quit => "quit".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GoParams;

    #[test]
    fn test_go_depth_and_movetime() {
        let cmd = EngineCommand::Go(GoParams {
            depth: Some(14),
            movetime: Some(750),
            infinite: false,
        });
        assert_eq!(format_command(&cmd), "go depth 14 movetime 750");
    }

    #[test]
    fn test_go_depth_only() {
        let cmd = EngineCommand::Go(GoParams {
            depth: Some(10),
            ..Default::default()
        });
        assert_eq!(format_command(&cmd), "go depth 10");
    }

    #[test]
    fn test_go_without_limits_is_infinite() {
        assert_eq!(
            format_command(&EngineCommand::Go(GoParams::default())),
            "go infinite"
        );
    }

    #[test]
    fn test_setoption() {
        let cmd = EngineCommand::SetOption {
            name: "MultiPV".into(),
            value: Some("3".into()),
        };
        assert_eq!(format_command(&cmd), "setoption name MultiPV value 3");

        let cmd = EngineCommand::SetOption {
            name: "Clear Hash".into(),
            value: None,
        };
        assert_eq!(format_command(&cmd), "setoption name Clear Hash");
    }

    #[test]
    fn test_position() {
        let cmd = EngineCommand::SetPosition {
            fen: "8/8/8/8/8/8/8/K6k w - - 0 1".into(),
        };
        assert_eq!(format_command(&cmd), "position fen 8/8/8/8/8/8/8/K6k w - - 0 1");
    }
}
