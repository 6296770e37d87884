use crate::story::Choice;

/// A parsed line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Zero-based index into the current branch's choices
    Choose(usize),
    Look,
    Help,
    Status,
    Restart,
    Unknown(String),
}

impl Command {
    /// Built-in commands win over choices; then a 1-based number, a choice id, or the exact choice text.
    pub fn parse(input: &str, choices: &[Choice]) -> Self {
        let input = input.trim();

        match input.to_lowercase().as_str() {
            "look" | "l" | "观察" | "查看" | "看" => return Self::Look,
            "help" | "h" | "?" | "帮助" => return Self::Help,
            "status" | "状态" => return Self::Status,
            "restart" | "重新开始" => return Self::Restart,
            _ => {}
        }

        if let Ok(number) = input.parse::<usize>() {
            if (1..=choices.len()).contains(&number) {
                return Self::Choose(number - 1);
            }
        }

        choices
            .iter()
            .position(|c| !c.id.is_empty() && c.id == input)
            .or_else(|| choices.iter().position(|c| c.choice == input))
            .map(Self::Choose)
            .unwrap_or_else(|| Self::Unknown(input.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: &str, text: &str) -> Choice {
        Choice {
            id: id.into(),
            choice: text.into(),
            next_branch: None,
            effect: None,
            status_update: None,
            status_changes: vec![],
            end_game: false,
        }
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(Command::parse("LOOK", &[]), Command::Look);
        assert_eq!(Command::parse(" 帮助 ", &[]), Command::Help);
        assert_eq!(Command::parse("Status", &[]), Command::Status);
    }

    #[test]
    fn numbers_out_of_range_are_unknown() {
        let choices = [choice("a", "开门")];
        assert_eq!(Command::parse("1", &choices), Command::Choose(0));
        assert_eq!(Command::parse("0", &choices), Command::Unknown("0".into()));
        assert_eq!(Command::parse("2", &choices), Command::Unknown("2".into()));
    }

    #[test]
    fn id_is_matched_before_text() {
        let choices = [choice("x", "y"), choice("y", "x")];
        assert_eq!(Command::parse("y", &choices), Command::Choose(1));
    }
}
